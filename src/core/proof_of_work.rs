use crate::core::{Block, Hash, Transaction};
use crate::error::{NodeError, Result};
use crate::utils::sha256;
use data_encoding::HEXLOWER;
use log::{debug, info};

/// Hex-prefix proof-of-work: a hash satisfies the target when its lowercase
/// hex encoding starts with `difficulty` zero characters.
pub struct ProofOfWork {
    difficulty: u32,
}

impl ProofOfWork {
    pub fn new(difficulty: u32) -> ProofOfWork {
        ProofOfWork { difficulty }
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn meets_target(&self, hash: &Hash) -> bool {
        let hex = HEXLOWER.encode(hash);
        hex.bytes()
            .take(self.difficulty as usize)
            .filter(|b| *b == b'0')
            .count()
            == self.difficulty as usize
    }

    /// Single-threaded nonce search. Runs to completion; stale-tip handling
    /// happens at the caller's boundaries, not mid-loop.
    pub fn run(
        &self,
        previous_hash: &Hash,
        timestamp: u32,
        transactions: &[Transaction],
    ) -> Result<(Hash, u32)> {
        info!(
            "Mining with difficulty {} over {} transactions",
            self.difficulty,
            transactions.len()
        );

        let mut nonce: u32 = 0;
        loop {
            let data = Block::header_bytes(previous_hash, timestamp, nonce, transactions);
            let candidate = sha256(data.as_slice());

            if self.meets_target(&candidate) {
                debug!(
                    "Found nonce {} -> {}",
                    nonce,
                    HEXLOWER.encode(candidate.as_ref())
                );
                return Ok((candidate, nonce));
            }

            nonce = match nonce.checked_add(1) {
                Some(next) => next,
                None => {
                    return Err(NodeError::Mining(
                        "Nonce space exhausted without meeting the target".to_string(),
                    ))
                }
            };
        }
    }

    /// Re-derive the candidate hash from the block fields and the expected
    /// parent, then check both the stored hash and the prefix.
    pub fn validate(&self, block: &Block, previous_hash: &Hash) -> bool {
        let data = Block::header_bytes(
            previous_hash,
            block.get_timestamp(),
            block.get_nonce(),
            block.get_transactions(),
        );
        let candidate = sha256(data.as_slice());

        candidate.eq(block.get_hash()) && self.meets_target(&candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Transaction, ZERO_HASH};

    fn coinbase() -> Transaction {
        Transaction::new_coinbase([9; 32], 1_000_000, 1_700_000_000).unwrap()
    }

    fn mine(difficulty: u32) -> (Block, Vec<Transaction>) {
        let transactions = vec![coinbase()];
        let pow = ProofOfWork::new(difficulty);
        let (hash, nonce) = pow.run(&ZERO_HASH, 77, &transactions).unwrap();
        (
            Block::new(77, transactions.clone(), nonce, hash, ZERO_HASH),
            transactions,
        )
    }

    #[test]
    fn test_mined_hash_satisfies_prefix() {
        let pow = ProofOfWork::new(2);
        let (block, _) = mine(2);
        let hex = HEXLOWER.encode(block.get_hash().as_ref());
        assert!(hex.starts_with("00"));
        assert!(pow.meets_target(block.get_hash()));
    }

    #[test]
    fn test_validate_accepts_mined_block() {
        let pow = ProofOfWork::new(2);
        let (block, _) = mine(2);
        assert!(pow.validate(&block, &ZERO_HASH));
    }

    #[test]
    fn test_validate_rejects_wrong_parent() {
        let pow = ProofOfWork::new(2);
        let (block, _) = mine(2);
        assert!(!pow.validate(&block, &[1; 32]));
    }

    #[test]
    fn test_validate_rejects_tampered_nonce() {
        let pow = ProofOfWork::new(2);
        let (block, transactions) = mine(2);
        let tampered = Block::new(
            block.get_timestamp(),
            transactions,
            block.get_nonce().wrapping_add(1),
            *block.get_hash(),
            *block.get_previous_hash(),
        );
        assert!(!pow.validate(&tampered, &ZERO_HASH));
    }

    #[test]
    fn test_same_inputs_same_result() {
        let transactions = vec![coinbase()];
        let pow = ProofOfWork::new(1);
        let a = pow.run(&ZERO_HASH, 5, &transactions).unwrap();
        let b = pow.run(&ZERO_HASH, 5, &transactions).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_difficulty_accepts_everything() {
        let pow = ProofOfWork::new(0);
        assert!(pow.meets_target(&[0xff; 32]));
    }
}
