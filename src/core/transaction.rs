// Transactions follow the UTXO model: inputs consume previous outputs,
// outputs lock value to a 32-byte address (double SHA-256 of the owner's
// public key). Canonical hashing is little-endian byte concatenation.

use crate::core::{Hash, ZERO_HASH};
use crate::error::{NodeError, Result};
use crate::utils::{double_sha256, sha256};
use serde::{Deserialize, Serialize};

/// A spendable amount locked to an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TXOutput {
    value: u64,
    address: Hash,
}

impl TXOutput {
    pub fn new(value: u64, address: Hash) -> Result<TXOutput> {
        if value == 0 {
            return Err(NodeError::InvalidValue);
        }
        Ok(TXOutput { value, address })
    }

    pub fn get_value(&self) -> u64 {
        self.value
    }

    pub fn get_address(&self) -> &Hash {
        &self.address
    }

    pub fn is_locked_to(&self, address: &Hash) -> bool {
        self.address.eq(address)
    }

    /// Canonical encoding: value (8 bytes LE) followed by the address.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + 32);
        bytes.extend(self.value.to_le_bytes());
        bytes.extend(self.address);
        bytes
    }

    pub fn hash(&self) -> Hash {
        sha256(self.to_bytes().as_slice())
    }
}

/// Points at one output of one transaction. The all-zero sentinel marks a
/// coinbase input.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct OutputRef {
    hash: Hash,
    index: u32,
}

impl OutputRef {
    pub fn new(hash: Hash, index: u32) -> OutputRef {
        OutputRef { hash, index }
    }

    pub fn coinbase() -> OutputRef {
        OutputRef {
            hash: ZERO_HASH,
            index: 0,
        }
    }

    pub fn get_hash(&self) -> &Hash {
        &self.hash
    }

    pub fn get_index(&self) -> u32 {
        self.index
    }

    pub fn is_coinbase(&self) -> bool {
        self.hash == ZERO_HASH && self.index == 0
    }

    /// Key form used by the UTXO tree: outpoint hash followed by the
    /// big-endian index so entries of one transaction stay adjacent.
    pub fn utxo_key(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(32 + 4);
        key.extend(self.hash);
        key.extend(self.index.to_be_bytes());
        key
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(32 + 4);
        bytes.extend(self.hash);
        bytes.extend(self.index.to_le_bytes());
        bytes
    }
}

/// Spends a previous output. Coinbase inputs carry an empty signature and
/// the miner address in the public-key field so reward payments remain
/// attributable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TXInput {
    previous_output: OutputRef,
    public_key: Vec<u8>,
    signature: Vec<u8>,
}

impl TXInput {
    pub fn new(previous_output: OutputRef, public_key: Vec<u8>, signature: Vec<u8>) -> TXInput {
        TXInput {
            previous_output,
            public_key,
            signature,
        }
    }

    pub fn get_previous_output(&self) -> &OutputRef {
        &self.previous_output
    }

    pub fn get_public_key(&self) -> &[u8] {
        self.public_key.as_slice()
    }

    pub fn get_signature(&self) -> &[u8] {
        self.signature.as_slice()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.previous_output.to_bytes();
        bytes.extend(self.public_key.as_slice());
        bytes.extend(self.signature.as_slice());
        bytes
    }
}

/// A transfer of value: inputs consumed, outputs created, lock time in unix
/// seconds. The hash is derived, never stored, so it cannot go stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Transaction {
    inputs: Vec<TXInput>,
    outputs: Vec<TXOutput>,
    lock_time: u32,
}

impl Transaction {
    pub fn new(inputs: Vec<TXInput>, outputs: Vec<TXOutput>, lock_time: u32) -> Transaction {
        Transaction {
            inputs,
            outputs,
            lock_time,
        }
    }

    /// The reward mint for a mined block. No real input exists; the miner
    /// address rides in the public-key field.
    pub fn new_coinbase(miner_address: Hash, reward: u64, lock_time: u32) -> Result<Transaction> {
        let output = TXOutput::new(reward, miner_address)?;
        let input = TXInput::new(OutputRef::coinbase(), miner_address.to_vec(), vec![]);
        Ok(Transaction {
            inputs: vec![input],
            outputs: vec![output],
            lock_time,
        })
    }

    pub fn get_inputs(&self) -> &[TXInput] {
        self.inputs.as_slice()
    }

    pub fn get_outputs(&self) -> &[TXOutput] {
        self.outputs.as_slice()
    }

    pub fn get_lock_time(&self) -> u32 {
        self.lock_time
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_coinbase()
    }

    /// Canonical encoding: all inputs, all outputs, lock time (4 bytes LE).
    /// Lengths are recoverable from higher-level framing, so no prefixes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for input in &self.inputs {
            bytes.extend(input.to_bytes());
        }
        for output in &self.outputs {
            bytes.extend(output.to_bytes());
        }
        bytes.extend(self.lock_time.to_le_bytes());
        bytes
    }

    pub fn hash(&self) -> Hash {
        sha256(self.to_bytes().as_slice())
    }

    /// Address of the spender, derived from the first input's public key.
    /// Coinbase transactions have no spender.
    pub fn sender_address(&self) -> Option<Hash> {
        if self.is_coinbase() {
            return None;
        }
        self.inputs
            .first()
            .map(|input| double_sha256(input.get_public_key()))
    }

    /// The miner address a coinbase input carries in its public-key field.
    pub fn miner_address(&self) -> Option<Hash> {
        if !self.is_coinbase() {
            return None;
        }
        let bytes = self.inputs[0].get_public_key();
        let mut address = ZERO_HASH;
        if bytes.len() != address.len() {
            return None;
        }
        address.copy_from_slice(bytes);
        Some(address)
    }

    pub fn total_output_value(&self) -> Result<u64> {
        let mut total = 0u64;
        for output in &self.outputs {
            total = total
                .checked_add(output.get_value())
                .ok_or_else(|| NodeError::InvalidBlock("Output value overflow".to_string()))?;
        }
        Ok(total)
    }

    /// Shape rules every transaction obeys regardless of context: a
    /// coinbase has exactly one output; everything else needs at least one
    /// input and one output, all outputs positive.
    pub fn check_structure(&self) -> Result<()> {
        if self.is_coinbase() {
            if self.outputs.len() != 1 {
                return Err(NodeError::InvalidBlock(
                    "Coinbase must have exactly one output".to_string(),
                ));
            }
        } else {
            if self.inputs.is_empty() {
                return Err(NodeError::InvalidBlock(
                    "Transaction has no inputs".to_string(),
                ));
            }
            if self.outputs.is_empty() {
                return Err(NodeError::InvalidBlock(
                    "Transaction has no outputs".to_string(),
                ));
            }
        }
        for output in &self.outputs {
            if output.get_value() == 0 {
                return Err(NodeError::InvalidBlock(
                    "Output value must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Hash {
        [byte; 32]
    }

    #[test]
    fn test_output_rejects_zero_value() {
        assert!(matches!(
            TXOutput::new(0, addr(1)),
            Err(NodeError::InvalidValue)
        ));
    }

    #[test]
    fn test_output_hash_covers_value_and_address() {
        let a = TXOutput::new(5, addr(1)).unwrap();
        let b = TXOutput::new(5, addr(1)).unwrap();
        let c = TXOutput::new(6, addr(1)).unwrap();
        let d = TXOutput::new(5, addr(2)).unwrap();

        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
        assert_ne!(a.hash(), d.hash());
    }

    #[test]
    fn test_coinbase_shape() {
        let tx = Transaction::new_coinbase(addr(7), 1_000_000, 1_700_000_000).unwrap();

        assert!(tx.is_coinbase());
        assert_eq!(tx.get_inputs().len(), 1);
        assert!(tx.get_inputs()[0].get_signature().is_empty());
        assert_eq!(tx.miner_address(), Some(addr(7)));
        assert_eq!(tx.sender_address(), None);
        tx.check_structure().unwrap();
    }

    #[test]
    fn test_hash_is_deterministic_across_equal_values() {
        // Independently constructed transactions with equal fields must
        // hash identically.
        let build = || {
            let input = TXInput::new(OutputRef::new(addr(3), 1), vec![1, 2, 3], vec![4, 5]);
            let output = TXOutput::new(9, addr(4)).unwrap();
            Transaction::new(vec![input], vec![output], 42)
        };

        assert_eq!(build().hash(), build().hash());
    }

    #[test]
    fn test_hash_changes_with_lock_time() {
        let input = TXInput::new(OutputRef::new(addr(3), 1), vec![1], vec![]);
        let output = TXOutput::new(9, addr(4)).unwrap();
        let a = Transaction::new(vec![input.clone()], vec![output.clone()], 1);
        let b = Transaction::new(vec![input], vec![output], 2);

        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_structure_rejects_empty_inputs() {
        let output = TXOutput::new(9, addr(4)).unwrap();
        let tx = Transaction::new(vec![], vec![output], 0);
        assert!(tx.check_structure().is_err());
    }
}
