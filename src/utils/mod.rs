//! Utility functions and helpers
//!
//! Cryptographic primitives, canonical timestamps, and the on-disk
//! value codec used by the store and the wallet keystore.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    current_timestamp, double_sha256, ecdsa_sign, ecdsa_verify, generate_private_key,
    public_key_from_pkcs8, sha256,
};

pub use serialization::{deserialize, serialize};
