//! Core chain functionality
//!
//! Blocks, transactions, the chain engine over the store, the monetary
//! schedule, and proof-of-work consensus.

pub mod block;
pub mod chain;
pub mod monetary;
pub mod proof_of_work;
pub mod transaction;

/// 32-byte SHA-256 digest; equality is byte-exact.
pub type Hash = [u8; 32];

/// Parent hash of the genesis block and the coinbase outpoint sentinel.
pub const ZERO_HASH: Hash = [0u8; 32];

pub use block::Block;
pub use chain::Chain;
pub use monetary::{block_reward, circulating_supply, DENOMINATION, HALVING_INTERVAL, SUBSIDY};
pub use proof_of_work::ProofOfWork;
pub use transaction::{OutputRef, TXInput, TXOutput, Transaction};
