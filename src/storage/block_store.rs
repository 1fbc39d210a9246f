// Persistent chain state on Sled. Three trees stand in for the relational
// tables: "blocks" (hash -> block, plus tip/height metadata keys),
// "transactions" (hash -> row with nullable block hash and acceptance
// sequence), and "utxo" (outpoint -> value/address). A transaction row and
// its UTXO mutations always commit in one database transaction.

use crate::core::{Block, Hash, OutputRef, Transaction};
use crate::error::{NodeError, Result};
use crate::utils::{deserialize, double_sha256, serialize};
use log::info;
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, IVec, Transactional, Tree};
use std::path::{Path, PathBuf};

const BLOCKS_TREE: &str = "blocks";
const TRANSACTIONS_TREE: &str = "transactions";
const UTXO_TREE: &str = "utxo";

// Metadata keys live in the blocks tree; string keys cannot collide with
// the 32-byte hash keys.
const TIP_BLOCK_HASH_KEY: &str = "tip_block_hash";
const BLOCK_HEIGHT_KEY: &str = "block_height";

/// One stored transaction: the entity itself, the block it belongs to
/// (`None` while in the mempool), and the order it was accepted in.
#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
struct TransactionRow {
    transaction: Transaction,
    block_hash: Option<Hash>,
    seq: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
struct UtxoRow {
    value: u64,
    address: Hash,
}

/// A spendable output as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoEntry {
    pub outpoint: OutputRef,
    pub value: u64,
    pub address: Hash,
}

/// One row of payment history. `from` is `None` for minted rewards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    pub tx_hash: Hash,
    pub from: Option<Hash>,
    pub to: Hash,
    pub value: u64,
    pub lock_time: u32,
}

#[derive(Clone)]
pub struct BlockStore {
    db: Db,
    db_path: PathBuf,
}

impl BlockStore {
    pub fn open(db_path: &Path) -> Result<BlockStore> {
        let db = sled::open(db_path)
            .map_err(|e| NodeError::Storage(format!("Failed to open database: {e}")))?;

        // Open all trees up front so later lookups cannot fail on creation.
        for name in [BLOCKS_TREE, TRANSACTIONS_TREE, UTXO_TREE] {
            db.open_tree(name)
                .map_err(|e| NodeError::Storage(format!("Failed to open tree {name}: {e}")))?;
        }

        Ok(BlockStore {
            db,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn get_db_path(&self) -> &PathBuf {
        &self.db_path
    }

    fn blocks_tree(&self) -> Result<Tree> {
        self.db
            .open_tree(BLOCKS_TREE)
            .map_err(|e| NodeError::Storage(format!("Failed to open blocks tree: {e}")))
    }

    fn transactions_tree(&self) -> Result<Tree> {
        self.db
            .open_tree(TRANSACTIONS_TREE)
            .map_err(|e| NodeError::Storage(format!("Failed to open transactions tree: {e}")))
    }

    fn utxo_tree(&self) -> Result<Tree> {
        self.db
            .open_tree(UTXO_TREE)
            .map_err(|e| NodeError::Storage(format!("Failed to open utxo tree: {e}")))
    }

    /// Persist a validated block: the block row, every contained
    /// transaction (mempool rows migrate to this block, unseen rows are
    /// inserted with their UTXO effects), tip and height metadata.
    pub fn add_block(&self, block: &Block) -> Result<()> {
        let blocks = self.blocks_tree()?;
        let transactions = self.transactions_tree()?;
        let utxo = self.utxo_tree()?;

        let block_hash = *block.get_hash();
        if blocks
            .get(block_hash)
            .map_err(|e| NodeError::Storage(format!("Failed to check block existence: {e}")))?
            .is_some()
        {
            return Ok(());
        }

        let block_bytes = IVec::try_from(block)?;
        let db = self.db.clone();

        (&blocks, &transactions, &utxo)
            .transaction(|(btree, ttree, utree)| {
                btree.insert(&block_hash[..], block_bytes.clone())?;
                btree.insert(TIP_BLOCK_HASH_KEY, &block_hash[..])?;

                let height = match btree.get(BLOCK_HEIGHT_KEY)? {
                    Some(bytes) => decode_height(bytes.as_ref())
                        .map_err(ConflictableTransactionError::Abort)?,
                    None => 0,
                };
                btree.insert(BLOCK_HEIGHT_KEY, &(height + 1).to_be_bytes()[..])?;

                for tx in block.get_transactions() {
                    let tx_hash = tx.hash();
                    match ttree.get(tx_hash)? {
                        Some(bytes) => {
                            // Known row: migrate out of the mempool. Its
                            // UTXO effects were applied on first insertion.
                            let mut row: TransactionRow = deserialize(bytes.as_ref())
                                .map_err(ConflictableTransactionError::Abort)?;
                            row.block_hash = Some(block_hash);
                            let row_bytes = serialize(&row)
                                .map_err(ConflictableTransactionError::Abort)?;
                            ttree.insert(&tx_hash[..], row_bytes)?;
                        }
                        None => {
                            let seq = db.generate_id().map_err(|e| {
                                ConflictableTransactionError::Abort(NodeError::from(e))
                            })?;
                            let row = TransactionRow {
                                transaction: tx.clone(),
                                block_hash: Some(block_hash),
                                seq,
                            };
                            let row_bytes = serialize(&row)
                                .map_err(ConflictableTransactionError::Abort)?;
                            ttree.insert(&tx_hash[..], row_bytes)?;
                            apply_utxo_updates(utree, tx, &tx_hash)?;
                        }
                    }
                }
                Ok(())
            })
            .map_err(flatten_transaction_error)?;

        info!(
            "Stored block {} with {} transactions",
            data_encoding::HEXLOWER.encode(&block_hash),
            block.get_transactions().len()
        );
        Ok(())
    }

    /// Insert a transaction into the mempool (null block reference) and
    /// apply its UTXO effects atomically. Duplicate hashes fail.
    pub fn add_transaction(&self, tx: &Transaction) -> Result<()> {
        let transactions = self.transactions_tree()?;
        let utxo = self.utxo_tree()?;

        let tx_hash = tx.hash();
        let seq = self
            .db
            .generate_id()
            .map_err(|e| NodeError::Storage(format!("Failed to allocate sequence: {e}")))?;

        (&transactions, &utxo)
            .transaction(|(ttree, utree)| {
                if ttree.get(tx_hash)?.is_some() {
                    return Err(ConflictableTransactionError::Abort(
                        NodeError::DuplicateTransaction,
                    ));
                }

                let row = TransactionRow {
                    transaction: tx.clone(),
                    block_hash: None,
                    seq,
                };
                let row_bytes = serialize(&row).map_err(ConflictableTransactionError::Abort)?;
                ttree.insert(&tx_hash[..], row_bytes)?;
                apply_utxo_updates(utree, tx, &tx_hash)?;
                Ok(())
            })
            .map_err(flatten_transaction_error)?;

        Ok(())
    }

    /// All transactions not yet associated with a block, in acceptance
    /// order. This order is part of the block hash pre-image when mined.
    pub fn mempool(&self) -> Result<Vec<Transaction>> {
        let transactions = self.transactions_tree()?;
        let mut pending: Vec<(u64, Transaction)> = Vec::new();

        for item in transactions.iter() {
            let (_, value) = item
                .map_err(|e| NodeError::Storage(format!("Failed to scan transactions: {e}")))?;
            let row: TransactionRow = deserialize(value.as_ref())?;
            if row.block_hash.is_none() {
                pending.push((row.seq, row.transaction));
            }
        }

        pending.sort_by_key(|(seq, _)| *seq);
        Ok(pending.into_iter().map(|(_, tx)| tx).collect())
    }

    pub fn latest_block_hash(&self) -> Result<Option<Hash>> {
        let blocks = self.blocks_tree()?;
        let tip = blocks
            .get(TIP_BLOCK_HASH_KEY)
            .map_err(|e| NodeError::Storage(format!("Failed to read tip: {e}")))?;

        match tip {
            Some(bytes) => {
                if bytes.len() != 32 {
                    return Err(NodeError::Storage("Corrupt tip hash".to_string()));
                }
                let mut hash = [0u8; 32];
                hash.copy_from_slice(bytes.as_ref());
                Ok(Some(hash))
            }
            None => Ok(None),
        }
    }

    pub fn block_height(&self) -> Result<u64> {
        let blocks = self.blocks_tree()?;
        match blocks
            .get(BLOCK_HEIGHT_KEY)
            .map_err(|e| NodeError::Storage(format!("Failed to read height: {e}")))?
        {
            Some(bytes) => decode_height(bytes.as_ref()),
            None => Ok(0),
        }
    }

    pub fn get_block(&self, hash: &Hash) -> Result<Option<Block>> {
        let blocks = self.blocks_tree()?;
        match blocks
            .get(hash)
            .map_err(|e| NodeError::Storage(format!("Failed to get block: {e}")))?
        {
            Some(bytes) => Ok(Some(Block::deserialize(bytes.as_ref())?)),
            None => Ok(None),
        }
    }

    /// Chain listing. `None` returns the whole chain oldest-first;
    /// `Some(anchor)` returns newest-first down to and including the
    /// anchor. An unknown anchor is an error.
    pub fn blocks(&self, from_hash: Option<&Hash>) -> Result<Vec<Block>> {
        let mut descending = Vec::new();
        let mut cursor = self.latest_block_hash()?;

        while let Some(hash) = cursor {
            let block = self.get_block(&hash)?.ok_or_else(|| {
                NodeError::Storage("Chain link points at a missing block".to_string())
            })?;
            let reached_anchor = from_hash.map(|anchor| anchor.eq(&hash)).unwrap_or(false);
            let previous = *block.get_previous_hash();
            descending.push(block);

            if reached_anchor {
                return Ok(descending);
            }
            cursor = if previous == crate::core::ZERO_HASH {
                None
            } else {
                Some(previous)
            };
        }

        if from_hash.is_some() {
            return Err(NodeError::InvalidBlock(
                "Unknown anchor hash in chain listing".to_string(),
            ));
        }

        descending.reverse();
        Ok(descending)
    }

    pub fn balance(&self, address: &Hash) -> Result<u64> {
        let mut balance = 0u64;
        for entry in self.unspent(address)? {
            balance = balance
                .checked_add(entry.value)
                .ok_or_else(|| NodeError::Storage("Balance overflow".to_string()))?;
        }
        Ok(balance)
    }

    /// Look up one spendable output by outpoint.
    pub fn utxo(&self, outpoint: &OutputRef) -> Result<Option<UtxoEntry>> {
        let utxo = self.utxo_tree()?;
        match utxo
            .get(outpoint.utxo_key())
            .map_err(|e| NodeError::Storage(format!("Failed to get utxo: {e}")))?
        {
            Some(bytes) => {
                let row: UtxoRow = deserialize(bytes.as_ref())?;
                Ok(Some(UtxoEntry {
                    outpoint: outpoint.clone(),
                    value: row.value,
                    address: row.address,
                }))
            }
            None => Ok(None),
        }
    }

    /// Spendable outputs for an address, in stable key order.
    pub fn unspent(&self, address: &Hash) -> Result<Vec<UtxoEntry>> {
        let utxo = self.utxo_tree()?;
        let mut entries = Vec::new();

        for item in utxo.iter() {
            let (key, value) =
                item.map_err(|e| NodeError::Storage(format!("Failed to scan utxo: {e}")))?;
            let row: UtxoRow = deserialize(value.as_ref())?;
            if row.address.eq(address) {
                entries.push(UtxoEntry {
                    outpoint: decode_utxo_key(key.as_ref())?,
                    value: row.value,
                    address: row.address,
                });
            }
        }
        Ok(entries)
    }

    /// Sum of every spendable output regardless of owner.
    pub fn total_unspent_value(&self) -> Result<u64> {
        let utxo = self.utxo_tree()?;
        let mut total = 0u64;
        for item in utxo.iter() {
            let (_, value) =
                item.map_err(|e| NodeError::Storage(format!("Failed to scan utxo: {e}")))?;
            let row: UtxoRow = deserialize(value.as_ref())?;
            total = total
                .checked_add(row.value)
                .ok_or_else(|| NodeError::Storage("Supply overflow".to_string()))?;
        }
        Ok(total)
    }

    /// Payment history for a public key: rewards and transfers received at
    /// its address plus transfers it signed, change outputs filtered.
    pub fn payments(&self, public_key: &[u8]) -> Result<Vec<Payment>> {
        let own_address = double_sha256(public_key);
        let mut history = Vec::new();

        let mut record = |tx: &Transaction| {
            let tx_hash = tx.hash();
            let sender = tx.sender_address();
            let sent_by_key = tx
                .get_inputs()
                .iter()
                .any(|input| input.get_public_key().eq(public_key));

            for output in tx.get_outputs() {
                let to = *output.get_address();
                // A change output pays the sender back; it is movement, not
                // a payment.
                if sender.map(|s| s.eq(&to)).unwrap_or(false) {
                    continue;
                }
                if to.eq(&own_address) || sent_by_key {
                    history.push(Payment {
                        tx_hash,
                        from: sender,
                        to,
                        value: output.get_value(),
                        lock_time: tx.get_lock_time(),
                    });
                }
            }
        };

        for block in self.blocks(None)? {
            for tx in block.get_transactions() {
                record(tx);
            }
        }
        for tx in self.mempool()? {
            record(&tx);
        }

        Ok(history)
    }

    /// Flush everything to disk.
    pub fn save_state(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| NodeError::Storage(format!("Failed to flush database: {e}")))?;
        Ok(())
    }

    /// Wipe the chain, the mempool, and the UTXO index.
    pub fn clear_state(&self) -> Result<()> {
        for name in [BLOCKS_TREE, TRANSACTIONS_TREE, UTXO_TREE] {
            self.db
                .open_tree(name)?
                .clear()
                .map_err(|e| NodeError::Storage(format!("Failed to clear tree {name}: {e}")))?;
        }
        self.save_state()
    }
}

/// UTXO rules applied when a transaction row is first recorded: spent
/// outpoints leave the index, the transaction's own outputs enter it.
fn apply_utxo_updates(
    utree: &sled::transaction::TransactionalTree,
    tx: &Transaction,
    tx_hash: &Hash,
) -> std::result::Result<(), ConflictableTransactionError<NodeError>> {
    if !tx.is_coinbase() {
        for input in tx.get_inputs() {
            utree.remove(input.get_previous_output().utxo_key())?;
        }
    }
    for (index, output) in tx.get_outputs().iter().enumerate() {
        let outpoint = OutputRef::new(*tx_hash, index as u32);
        let row = UtxoRow {
            value: output.get_value(),
            address: *output.get_address(),
        };
        let row_bytes = serialize(&row).map_err(ConflictableTransactionError::Abort)?;
        utree.insert(outpoint.utxo_key(), row_bytes)?;
    }
    Ok(())
}

fn flatten_transaction_error(err: TransactionError<NodeError>) -> NodeError {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => NodeError::from(e),
    }
}

fn decode_height(bytes: &[u8]) -> Result<u64> {
    if bytes.len() != 8 {
        return Err(NodeError::Storage("Corrupt height counter".to_string()));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Ok(u64::from_be_bytes(buf))
}

fn decode_utxo_key(key: &[u8]) -> Result<OutputRef> {
    if key.len() != 36 {
        return Err(NodeError::Storage("Corrupt utxo key".to_string()));
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&key[..32]);
    let mut index = [0u8; 4];
    index.copy_from_slice(&key[32..]);
    Ok(OutputRef::new(hash, u32::from_be_bytes(index)))
}
