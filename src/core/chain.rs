// The chain engine wraps the store with the monetary schedule and block
// assembly. It holds no in-memory block list; every query goes through
// the store.

use crate::core::monetary;
use crate::core::proof_of_work::ProofOfWork;
use crate::core::{Block, Hash, Transaction, ZERO_HASH};
use crate::error::{NodeError, Result};
use crate::storage::{BlockStore, Payment, UtxoEntry};
use log::info;

#[derive(Clone)]
pub struct Chain {
    store: BlockStore,
    difficulty: u32,
}

impl Chain {
    pub fn new(store: BlockStore, difficulty: u32) -> Chain {
        Chain { store, difficulty }
    }

    pub fn get_store(&self) -> &BlockStore {
        &self.store
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn block_height(&self) -> Result<u64> {
        self.store.block_height()
    }

    pub fn latest_block_hash(&self) -> Result<Option<Hash>> {
        self.store.latest_block_hash()
    }

    /// Hash a freshly assembled block must chain onto: the tip, or zeros
    /// for the genesis block.
    pub fn expected_previous_hash(&self) -> Result<Hash> {
        Ok(self.store.latest_block_hash()?.unwrap_or(ZERO_HASH))
    }

    /// Reward the next mined block will mint.
    pub fn current_block_reward(&self) -> Result<u64> {
        Ok(monetary::block_reward(self.store.block_height()?))
    }

    pub fn circulating_supply(&self) -> Result<u64> {
        Ok(monetary::circulating_supply(self.store.block_height()?))
    }

    pub fn balance(&self, address: &Hash) -> Result<u64> {
        self.store.balance(address)
    }

    pub fn unspent(&self, address: &Hash) -> Result<Vec<UtxoEntry>> {
        self.store.unspent(address)
    }

    pub fn utxo(&self, outpoint: &crate::core::OutputRef) -> Result<Option<UtxoEntry>> {
        self.store.utxo(outpoint)
    }

    pub fn payments(&self, public_key: &[u8]) -> Result<Vec<Payment>> {
        self.store.payments(public_key)
    }

    pub fn mempool(&self) -> Result<Vec<Transaction>> {
        self.store.mempool()
    }

    pub fn add_transaction(&self, tx: &Transaction) -> Result<()> {
        self.store.add_transaction(tx)
    }

    pub fn blocks(&self, from_hash: Option<&Hash>) -> Result<Vec<Block>> {
        self.store.blocks(from_hash)
    }

    /// Persist a block received from the network. Validation happens
    /// before this call.
    pub fn add_block(&self, block: &Block) -> Result<()> {
        self.store.add_block(block)
    }

    /// Assemble a block from mined fields and persist it.
    pub fn create_block(
        &self,
        nonce: u32,
        hash: Hash,
        previous_hash: Hash,
        timestamp: u32,
        transactions: Vec<Transaction>,
    ) -> Result<Block> {
        let block = Block::new(timestamp, transactions, nonce, hash, previous_hash);
        self.store.add_block(&block)?;
        info!("Chain extended to height {}", self.store.block_height()?);
        Ok(block)
    }

    /// Full acceptance check for a block claiming to extend the tip:
    /// parent linkage, proof-of-work, structure, and coinbase reward.
    pub fn validate_block(&self, block: &Block) -> Result<()> {
        let expected_previous = self.expected_previous_hash()?;
        if !block.get_previous_hash().eq(&expected_previous) {
            return Err(NodeError::InvalidBlock(
                "Block does not extend the current tip".to_string(),
            ));
        }

        let pow = ProofOfWork::new(self.difficulty);
        if !pow.validate(block, &expected_previous) {
            return Err(NodeError::InvalidBlock(
                "Proof-of-work check failed".to_string(),
            ));
        }

        block.check_structure()?;

        let reward = monetary::block_reward(self.store.block_height()?);
        let coinbase = block
            .coinbase()
            .ok_or_else(|| NodeError::InvalidBlock("Missing coinbase".to_string()))?;
        let minted = coinbase.total_output_value()?;
        if minted != reward {
            return Err(NodeError::InvalidBlock(format!(
                "Coinbase mints {minted}, expected {reward}"
            )));
        }

        Ok(())
    }

    pub fn save_state(&self) -> Result<()> {
        self.store.save_state()
    }

    pub fn clear_state(&self) -> Result<()> {
        self.store.clear_state()
    }
}
