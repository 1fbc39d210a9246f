//! # Hubchain - UTXO blockchain node with hub-relayed gossip
//!
//! An educational-scale blockchain node mimicking Bitcoin's essential
//! mechanics: proof-of-work mining over a leading-zero hex target,
//! ECDSA-signed transactions on an unspent-output model, a persistent
//! chain store, and a gossip protocol where every peer synchronizes
//! through one well-known central hub.
//!
//! ## How the code is organized
//! - `core/`: blocks, transactions, the chain engine, the monetary
//!   schedule, and proof-of-work
//! - `storage/`: the Sled-backed block store with the persisted mempool
//!   and the UTXO index
//! - `network/`: the JSON message codec, the per-message TCP transport,
//!   the peer set, and the node orchestrator
//! - `wallet/`: named ECDSA P-256 key pairs and the keystore file
//! - `config/`: node configuration and the binary's env-backed defaults
//! - `utils/`: hashing, signing, and row-encoding helpers
//! - `cli/`: argument parsing for the binary
//!
//! ## Key design decisions
//! - Sled trees stand in for relational tables; a transaction row and its
//!   UTXO mutations commit atomically
//! - The chain never reorganizes: a block is accepted only when it
//!   extends the current tip
//! - Mining runs to completion and a post-mine race check discards stale
//!   work instead of cancelling mid-search
//! - The transport holds its handler as a weak back reference, so node
//!   and transport can point at each other without leaking

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod storage;
pub mod utils;
pub mod wallet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::{Config, NodeConfig, NodeRole, GLOBAL_CONFIG};
pub use core::{
    block_reward, circulating_supply, Block, Chain, Hash, OutputRef, ProofOfWork, TXInput,
    TXOutput, Transaction, DENOMINATION, HALVING_INTERVAL, SUBSIDY, ZERO_HASH,
};
pub use error::{NodeError, Result};
pub use network::{
    send_once, BlocksPayload, Command as WireCommand, EmptyPayload, GetBlocksPayload, Message,
    MessageHandler, Node, NodeDelegate, Peers, TcpTransport, TransactionsPayload, VersionPayload,
    NODE_VERSION,
};
pub use storage::{BlockStore, Payment, UtxoEntry};
pub use utils::{
    current_timestamp, double_sha256, ecdsa_sign, ecdsa_verify, generate_private_key,
    public_key_from_pkcs8, sha256,
};
pub use wallet::{Wallet, Wallets, KEYSTORE_FILE};
