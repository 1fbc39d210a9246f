//! Wallet management and key pairs
//!
//! Named ECDSA P-256 key pairs with double-SHA-256 addresses, persisted
//! to a keystore file.

#[allow(clippy::module_inception)]
pub mod wallet;
pub mod wallets;

pub use wallet::Wallet;
pub use wallets::{Wallets, KEYSTORE_FILE};
