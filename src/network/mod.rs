//! Hub-and-spoke networking
//!
//! Message codec, stream transport, the shared peer set, and the node
//! orchestrator. Every peer talks to the one well-known central node,
//! which relays gossip to everyone else.

pub mod message;
pub mod node;
pub mod peers;
pub mod transport;

pub use message::{
    BlocksPayload, Command, EmptyPayload, GetBlocksPayload, Message, TransactionsPayload,
    VersionPayload,
};
pub use node::{Node, NodeDelegate, NODE_VERSION};
pub use peers::Peers;
pub use transport::{send_once, MessageHandler, TcpTransport};
