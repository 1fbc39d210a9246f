//! Error handling for the node
//!
//! One crate-wide error enum; local rule violations carry structured data,
//! infrastructure failures carry the underlying message.

use std::fmt;

/// Result type alias for node operations
pub type Result<T> = std::result::Result<T, NodeError>;

/// Error types for every node operation
#[derive(Debug, Clone)]
pub enum NodeError {
    /// Database-related errors
    Storage(String),
    /// Cryptographic operation errors
    Crypto(String),
    /// Network communication errors
    Network(String),
    /// Wire codec errors (malformed envelopes or payloads)
    Codec(String),
    /// Serialization/deserialization errors for stored rows
    Serialization(String),
    /// File I/O errors
    Io(String),
    /// Transaction value was zero
    InvalidValue,
    /// Sender and recipient address are the same
    SourceEqualsDestination,
    /// Sender balance does not cover the requested value
    InsufficientBalance { overdraft: u64 },
    /// A freshly signed input failed local verification
    UnverifiedTransaction,
    /// The chain tip moved while proof-of-work was running
    BlockAlreadyMined,
    /// A transaction with this hash is already stored
    DuplicateTransaction,
    /// Block failed validation (bad proof, bad structure, stale parent)
    InvalidBlock(String),
    /// Proof-of-work search failures
    Mining(String),
    /// Wallet/keystore errors
    Wallet(String),
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::Storage(msg) => write!(f, "Storage error: {msg}"),
            NodeError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            NodeError::Network(msg) => write!(f, "Network error: {msg}"),
            NodeError::Codec(msg) => write!(f, "Codec error: {msg}"),
            NodeError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            NodeError::Io(msg) => write!(f, "I/O error: {msg}"),
            NodeError::InvalidValue => write!(f, "Transaction value must be positive"),
            NodeError::SourceEqualsDestination => {
                write!(f, "Sender and recipient must differ")
            }
            NodeError::InsufficientBalance { overdraft } => {
                write!(f, "Insufficient balance: short by {overdraft}")
            }
            NodeError::UnverifiedTransaction => {
                write!(f, "Transaction failed local signature verification")
            }
            NodeError::BlockAlreadyMined => {
                write!(f, "Another block arrived while mining; work discarded")
            }
            NodeError::DuplicateTransaction => {
                write!(f, "Transaction already known")
            }
            NodeError::InvalidBlock(msg) => write!(f, "Invalid block: {msg}"),
            NodeError::Mining(msg) => write!(f, "Mining error: {msg}"),
            NodeError::Wallet(msg) => write!(f, "Wallet error: {msg}"),
        }
    }
}

impl std::error::Error for NodeError {}

impl From<std::io::Error> for NodeError {
    fn from(err: std::io::Error) -> Self {
        NodeError::Io(err.to_string())
    }
}

impl From<sled::Error> for NodeError {
    fn from(err: sled::Error) -> Self {
        NodeError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(err: serde_json::Error) -> Self {
        NodeError::Codec(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for NodeError {
    fn from(err: bincode::error::EncodeError) -> Self {
        NodeError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for NodeError {
    fn from(err: bincode::error::DecodeError) -> Self {
        NodeError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_variants_display() {
        let e = NodeError::InsufficientBalance { overdraft: 42 };
        assert!(e.to_string().contains("42"));

        let e = NodeError::BlockAlreadyMined;
        assert!(e.to_string().contains("mining"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e: NodeError = io.into();
        assert!(matches!(e, NodeError::Io(_)));
    }
}
