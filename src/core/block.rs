use crate::core::{Hash, Transaction};
use crate::error::{NodeError, Result};
use crate::utils::{deserialize, serialize, sha256};
use serde::{Deserialize, Serialize};
use sled::IVec;

/// One link of the chain. The hash is the SHA-256 of the canonical
/// encoding and must satisfy the difficulty prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Block {
    timestamp: u32,
    transactions: Vec<Transaction>,
    nonce: u32,
    hash: Hash,
    previous_hash: Hash,
}

impl Block {
    pub fn new(
        timestamp: u32,
        transactions: Vec<Transaction>,
        nonce: u32,
        hash: Hash,
        previous_hash: Hash,
    ) -> Block {
        Block {
            timestamp,
            transactions,
            nonce,
            hash,
            previous_hash,
        }
    }

    pub fn get_timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_nonce(&self) -> u32 {
        self.nonce
    }

    pub fn get_hash(&self) -> &Hash {
        &self.hash
    }

    pub fn get_previous_hash(&self) -> &Hash {
        &self.previous_hash
    }

    /// Canonical pre-image: previous hash, timestamp (LE), nonce (LE), then
    /// every transaction's canonical bytes in block order.
    pub fn header_bytes(
        previous_hash: &Hash,
        timestamp: u32,
        nonce: u32,
        transactions: &[Transaction],
    ) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend(previous_hash);
        bytes.extend(timestamp.to_le_bytes());
        bytes.extend(nonce.to_le_bytes());
        for tx in transactions {
            bytes.extend(tx.to_bytes());
        }
        bytes
    }

    /// Recompute the hash from the block's own fields.
    pub fn compute_hash(&self) -> Hash {
        let bytes = Self::header_bytes(
            &self.previous_hash,
            self.timestamp,
            self.nonce,
            &self.transactions,
        );
        sha256(bytes.as_slice())
    }

    /// Shape rules: exactly one coinbase, positioned last, and every
    /// transaction structurally sound.
    pub fn check_structure(&self) -> Result<()> {
        if self.transactions.is_empty() {
            return Err(NodeError::InvalidBlock(
                "Block must contain at least one transaction".to_string(),
            ));
        }

        let coinbase_count = self
            .transactions
            .iter()
            .filter(|tx| tx.is_coinbase())
            .count();
        if coinbase_count != 1 {
            return Err(NodeError::InvalidBlock(format!(
                "Block must contain exactly one coinbase, found {coinbase_count}"
            )));
        }

        let last = self
            .transactions
            .last()
            .expect("non-empty checked above");
        if !last.is_coinbase() {
            return Err(NodeError::InvalidBlock(
                "Coinbase must be the last transaction".to_string(),
            ));
        }

        for tx in &self.transactions {
            tx.check_structure()?;
        }
        Ok(())
    }

    /// The coinbase is always the last transaction.
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.last().filter(|tx| tx.is_coinbase())
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }
}

// Blocks land in the store as sled values; the conversion stays fallible
// so an encoding failure reaches the caller instead of panicking.
impl TryFrom<&Block> for IVec {
    type Error = NodeError;

    fn try_from(block: &Block) -> Result<IVec> {
        Ok(IVec::from(block.serialize()?))
    }
}
