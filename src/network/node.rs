// The node ties the pieces together: transaction creation, the mining
// loop with its post-mine race check, the message handlers, and the
// hub-side liveness pruning. One node, one transport, one store.

use crate::config::{NodeConfig, NodeRole};
use crate::core::{block_reward, Block, Chain, Hash, ProofOfWork, TXInput, TXOutput, Transaction};
use crate::error::{NodeError, Result};
use crate::network::message::{
    BlocksPayload, Command, EmptyPayload, GetBlocksPayload, Message, TransactionsPayload,
    VersionPayload,
};
use crate::network::peers::Peers;
use crate::network::transport::{MessageHandler, TcpTransport};
use crate::storage::UtxoEntry;
use crate::utils::{current_timestamp, double_sha256, ecdsa_sign, ecdsa_verify};
use crate::wallet::Wallet;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const NODE_VERSION: u32 = 1;

/// Lifecycle observer. Every callback has a no-op default so callers
/// implement only what they watch.
pub trait NodeDelegate: Send + Sync {
    fn transaction_created(&self, _tx: &Transaction) {}
    fn transaction_received(&self, _tx: &Transaction) {}
    fn block_mined(&self, _block: &Block) {}
    fn block_received(&self, _block: &Block) {}
    fn peer_added(&self, _peer: SocketAddr) {}
    fn peer_removed(&self, _peer: SocketAddr) {}
}

struct NoopDelegate;

impl NodeDelegate for NoopDelegate {}

pub struct Node {
    config: NodeConfig,
    chain: Chain,
    transport: Arc<TcpTransport>,
    peers: Peers,
    delegate: Arc<dyn NodeDelegate>,
    synced: AtomicBool,
    shutdown: Arc<AtomicBool>,
    liveness_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Node {
    pub fn new(config: NodeConfig, chain: Chain) -> Arc<Node> {
        Self::with_delegate(config, chain, Arc::new(NoopDelegate))
    }

    pub fn with_delegate(
        config: NodeConfig,
        chain: Chain,
        delegate: Arc<dyn NodeDelegate>,
    ) -> Arc<Node> {
        let transport = Arc::new(TcpTransport::new(config.listen_port));
        let node = Arc::new(Node {
            synced: AtomicBool::new(config.role == NodeRole::Central),
            config,
            chain,
            transport,
            peers: Peers::new(),
            delegate,
            shutdown: Arc::new(AtomicBool::new(false)),
            liveness_thread: Mutex::new(None),
        });

        // The transport calls back into the node; a weak reference breaks
        // the ownership cycle.
        let node_dyn: Arc<dyn MessageHandler> = node.clone();
        let handler: Weak<dyn MessageHandler> = Arc::downgrade(&node_dyn);
        node.transport.set_handler(handler);
        node
    }

    pub fn get_chain(&self) -> &Chain {
        &self.chain
    }

    pub fn get_config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn get_peers(&self) -> &Peers {
        &self.peers
    }

    /// Whether this node believes it has caught up with the network.
    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }

    /// Start listening. A peer introduces itself to the hub; the hub
    /// starts the liveness task.
    pub fn connect(self: &Arc<Self>) -> Result<()> {
        self.transport.start()?;
        match self.config.role {
            NodeRole::Peer => {
                let central = self.central_endpoint()?;
                self.peers.add_peer(central);
                self.send_version(central)?;
            }
            NodeRole::Central => {
                self.start_liveness_task();
            }
        }
        Ok(())
    }

    /// Stop the listener and the liveness task. In-flight outbound sends
    /// may still complete.
    pub fn disconnect(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let thread = {
            let mut slot = self
                .liveness_thread
                .lock()
                .expect("Failed to acquire lock on liveness thread - this should never happen");
            slot.take()
        };
        if let Some(thread) = thread {
            let _ = thread.join();
        }
        self.transport.stop();
    }

    /// Build, sign, persist, and gossip a transfer from the wallet to the
    /// recipient address.
    pub fn create_transaction(
        &self,
        wallet: &Wallet,
        recipient: Hash,
        value: u64,
    ) -> Result<Transaction> {
        if value == 0 {
            return Err(NodeError::InvalidValue);
        }
        let sender = wallet.get_address();
        if recipient == sender {
            return Err(NodeError::SourceEqualsDestination);
        }
        let balance = self.chain.balance(&sender)?;
        if balance < value {
            return Err(NodeError::InsufficientBalance {
                overdraft: value - balance,
            });
        }

        // Accumulate spendable outputs in iteration order until the value
        // is covered.
        let mut spend_value = 0u64;
        let mut selected: Vec<UtxoEntry> = Vec::new();
        for entry in self.chain.unspent(&sender)? {
            if spend_value >= value {
                break;
            }
            spend_value = spend_value
                .checked_add(entry.value)
                .ok_or_else(|| NodeError::Storage("Spend accumulation overflow".to_string()))?;
            selected.push(entry);
        }
        let change = spend_value - value;

        let mut inputs = Vec::with_capacity(selected.len());
        for entry in &selected {
            let message = entry.outpoint.get_hash();
            let signature = ecdsa_sign(wallet.get_pkcs8(), message)?;
            // Defense in depth: never gossip a transaction this node could
            // not verify itself.
            if !ecdsa_verify(wallet.get_public_key(), message, &signature) {
                return Err(NodeError::UnverifiedTransaction);
            }
            inputs.push(TXInput::new(
                entry.outpoint.clone(),
                wallet.get_public_key().to_vec(),
                signature,
            ));
        }

        let mut outputs = vec![TXOutput::new(value, recipient)?];
        if change > 0 {
            outputs.push(TXOutput::new(change, sender)?);
        }

        let tx = Transaction::new(inputs, outputs, current_timestamp()?);
        self.chain.add_transaction(&tx)?;
        info!(
            "Created transaction spending {spend_value} ({} inputs, change {change})",
            tx.get_inputs().len()
        );

        self.broadcast(
            Command::Transactions,
            &TransactionsPayload {
                transactions: vec![tx.clone()],
            },
        );
        self.delegate.transaction_created(&tx);
        Ok(tx)
    }

    /// Mine the current mempool into a block rewarding `miner_address`.
    /// If another block arrives during the search, the stale work is
    /// discarded instead of forking the chain.
    pub fn mine_block(&self, miner_address: Hash) -> Result<Block> {
        let mut transactions = self.chain.mempool()?;
        let height = self.chain.block_height()?;
        let timestamp = current_timestamp()?;
        // The height doubles as the coinbase lock time so rewards minted
        // for the same address in the same second still hash apart.
        let coinbase =
            Transaction::new_coinbase(miner_address, block_reward(height), height as u32)?;
        transactions.push(coinbase.clone());

        let previous_hash = self.chain.expected_previous_hash()?;
        let pow = ProofOfWork::new(self.config.difficulty);
        let (hash, nonce) = pow.run(&previous_hash, timestamp, &transactions)?;

        // The tip may have moved while the search ran; the arriving block
        // has already been ingested and the mempool cleaned.
        if self.chain.expected_previous_hash()? != previous_hash {
            info!("Tip moved during proof-of-work; discarding stale block");
            return Err(NodeError::BlockAlreadyMined);
        }

        self.chain.add_transaction(&coinbase)?;
        let block = self
            .chain
            .create_block(nonce, hash, previous_hash, timestamp, transactions)?;

        self.broadcast(
            Command::Blocks,
            &BlocksPayload {
                blocks: vec![block.clone()],
            },
        );
        self.delegate.block_mined(&block);
        Ok(block)
    }

    fn handle_version(&self, message: &Message, sender: SocketAddr) -> Result<()> {
        let payload: VersionPayload = message.decode_payload()?;
        if payload.version != NODE_VERSION {
            warn!(
                "Rejecting {sender}: speaks version {}, local version {NODE_VERSION}",
                payload.version
            );
            return Ok(());
        }

        let local_height = self.chain.block_height()?;
        if local_height < payload.block_height {
            // Behind: ask the taller peer for what we miss.
            let from_block_hash = match self.chain.latest_block_hash()? {
                Some(hash) => hash.to_vec(),
                None => vec![],
            };
            self.send_message(sender, Command::GetBlocks, &GetBlocksPayload { from_block_hash });
            self.send_message(sender, Command::GetTransactions, &EmptyPayload {});
            self.synced.store(false, Ordering::SeqCst);
        } else if local_height > payload.block_height {
            self.send_version(sender)?;
        } else if !self.peers.is_known(&sender) {
            self.send_version(sender)?;
        }

        if self.config.role == NodeRole::Central && self.peers.add_peer(sender) {
            info!("Registered peer {sender}");
            self.delegate.peer_added(sender);
        }
        if local_height >= payload.block_height {
            self.synced.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn handle_get_transactions(&self, sender: SocketAddr) -> Result<()> {
        let transactions = self.chain.mempool()?;
        self.send_message(sender, Command::Transactions, &TransactionsPayload { transactions });
        Ok(())
    }

    fn handle_transactions(&self, message: &Message, sender: SocketAddr) -> Result<()> {
        let payload: TransactionsPayload = message.decode_payload()?;
        for tx in payload.transactions {
            if !self.verify_transaction(&tx) {
                warn!("Skipping transaction from {sender} that failed verification");
                continue;
            }
            match self.chain.add_transaction(&tx) {
                Ok(()) => self.delegate.transaction_received(&tx),
                Err(NodeError::DuplicateTransaction) => {}
                Err(e) => error!("Failed to store transaction from {sender}: {e}"),
            }
        }

        if self.config.role == NodeRole::Central {
            self.rebroadcast(message, sender);
        }
        Ok(())
    }

    fn handle_get_blocks(&self, message: &Message, sender: SocketAddr) -> Result<()> {
        let payload: GetBlocksPayload = message.decode_payload()?;
        let listing = if payload.from_block_hash.is_empty() {
            self.chain.blocks(None)
        } else if payload.from_block_hash.len() == 32 {
            let mut anchor = [0u8; 32];
            anchor.copy_from_slice(payload.from_block_hash.as_slice());
            self.chain.blocks(Some(&anchor))
        } else {
            Err(NodeError::Codec("Malformed from_block_hash".to_string()))
        };

        match listing {
            Ok(blocks) => {
                self.send_message(sender, Command::Blocks, &BlocksPayload { blocks });
            }
            Err(e) => {
                // Unknown anchors get no answer, only a log line.
                info!("Not answering GET_BLOCKS from {sender}: {e}");
            }
        }
        Ok(())
    }

    fn handle_blocks(&self, message: &Message, sender: SocketAddr) -> Result<()> {
        let payload: BlocksPayload = message.decode_payload()?;
        let mut accepted = 0usize;

        for block in payload.blocks {
            let expected = self.chain.expected_previous_hash()?;
            if !block.get_previous_hash().eq(&expected) {
                debug!("Skipping block from {sender} that does not extend the tip");
                continue;
            }
            if let Err(e) = self.chain.validate_block(&block) {
                warn!("Rejecting block from {sender}: {e}");
                continue;
            }
            // Ingesting the block also migrates matching mempool rows.
            self.chain.add_block(&block)?;
            accepted += 1;
            self.delegate.block_received(&block);
        }

        self.synced.store(true, Ordering::SeqCst);
        if accepted > 0 && self.config.role == NodeRole::Central {
            self.rebroadcast(message, sender);
        }
        Ok(())
    }

    /// Every input must verify: known unspent outpoint, public key hashing
    /// to the output's address, valid signature over the outpoint hash,
    /// no outpoint spent twice, and no value created.
    pub fn verify_transaction(&self, tx: &Transaction) -> bool {
        if tx.check_structure().is_err() {
            return false;
        }
        // Coinbases only enter through blocks; one arriving by gossip can
        // never have a verifiable input.
        if tx.is_coinbase() {
            return false;
        }

        let mut seen: HashSet<Vec<u8>> = HashSet::new();
        let mut input_value = 0u64;
        for input in tx.get_inputs() {
            let outpoint = input.get_previous_output();
            if !seen.insert(outpoint.utxo_key()) {
                return false;
            }
            let entry = match self.chain.utxo(outpoint) {
                Ok(Some(entry)) => entry,
                _ => return false,
            };
            if !entry.address.eq(&double_sha256(input.get_public_key())) {
                return false;
            }
            if !ecdsa_verify(
                input.get_public_key(),
                outpoint.get_hash(),
                input.get_signature(),
            ) {
                return false;
            }
            input_value = match input_value.checked_add(entry.value) {
                Some(value) => value,
                None => return false,
            };
        }

        match tx.total_output_value() {
            Ok(output_value) => input_value >= output_value,
            Err(_) => false,
        }
    }

    fn send_version(&self, to: SocketAddr) -> Result<()> {
        let payload = VersionPayload {
            version: NODE_VERSION,
            block_height: self.chain.block_height()?,
        };
        self.send_message(to, Command::Version, &payload);
        Ok(())
    }

    fn send_message<P: Serialize>(&self, to: SocketAddr, command: Command, payload: &P) {
        match Message::new(command, payload, self.config.listen_port) {
            Ok(message) => self.transport.send(to, message),
            Err(e) => error!("Failed to encode {command:?}: {e}"),
        }
    }

    fn broadcast<P: Serialize>(&self, command: Command, payload: &P) {
        match Message::new(command, payload, self.config.listen_port) {
            Ok(message) => {
                for peer in self.peers.get_peers() {
                    self.transport.send(peer, message.clone());
                }
            }
            Err(e) => error!("Failed to encode {command:?}: {e}"),
        }
    }

    /// Forward the original envelope untouched to every peer but the one
    /// it came from.
    fn rebroadcast(&self, message: &Message, except: SocketAddr) {
        for peer in self.peers.get_peers() {
            if !peer.eq(&except) {
                self.transport.send(peer, message.clone());
            }
        }
    }

    fn central_endpoint(&self) -> Result<SocketAddr> {
        self.config
            .central_addr()
            .to_socket_addrs()
            .map_err(|e| NodeError::Network(format!("Cannot resolve central node: {e}")))?
            .next()
            .ok_or_else(|| {
                NodeError::Network("Central node address resolves to nothing".to_string())
            })
    }

    fn start_liveness_task(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.config.ping_interval;

        let thread = thread::spawn(move || {
            while !shutdown.load(Ordering::SeqCst) {
                sleep_interruptible(interval, &shutdown);
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                let Some(node) = weak.upgrade() else { break };
                node.liveness_tick();
            }
        });

        let mut slot = self
            .liveness_thread
            .lock()
            .expect("Failed to acquire lock on liveness thread - this should never happen");
        *slot = Some(thread);
    }

    /// Prune peers whose latest PING went unanswered for more than half an
    /// interval, then ping every survivor.
    fn liveness_tick(&self) {
        let half = self.config.ping_interval / 2;
        let now = Instant::now();

        for peer in self.peers.get_peers() {
            let Some(sent) = self.peers.last_ping_sent(&peer) else {
                continue;
            };
            let answered = self
                .peers
                .last_pong_received(&peer)
                .map(|pong| pong >= sent && pong.duration_since(sent) <= half)
                .unwrap_or(false);
            if answered {
                continue;
            }
            if now.duration_since(sent) > half {
                info!("Pruning silent peer {peer}");
                self.peers.remove_peer(&peer);
                self.delegate.peer_removed(peer);
            }
        }

        for peer in self.peers.get_peers() {
            self.send_message(peer, Command::Ping, &EmptyPayload {});
            self.peers.record_ping_sent(peer);
        }
    }
}

impl MessageHandler for Node {
    fn handle_message(&self, message: Message, sender: SocketAddr) {
        debug!("Received {:?} from {sender}", message.command);
        let result = match message.command {
            Command::Version => self.handle_version(&message, sender),
            Command::GetTransactions => self.handle_get_transactions(sender),
            Command::Transactions => self.handle_transactions(&message, sender),
            Command::GetBlocks => self.handle_get_blocks(&message, sender),
            Command::Blocks => self.handle_blocks(&message, sender),
            Command::Ping => {
                // The transport already answered with PONG.
                self.peers.record_sighting(sender);
                Ok(())
            }
            Command::Pong => {
                self.peers.record_pong_received(sender);
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!("Error handling {:?} from {sender}: {e}", message.command);
        }
    }
}

fn sleep_interruptible(total: Duration, shutdown: &AtomicBool) {
    let slice = Duration::from_millis(50);
    let mut remaining = total;
    while remaining > Duration::ZERO && !shutdown.load(Ordering::SeqCst) {
        let step = remaining.min(slice);
        thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
}
