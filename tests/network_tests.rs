//! Hub-and-spoke network integration tests
//!
//! Real TCP on localhost: gossip propagation through the central node,
//! late-joiner synchronization, and liveness pruning.

use hubchain::{block_reward, BlockStore, Chain, Node, NodeConfig, Wallet};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const TEST_DIFFICULTY: u32 = 1;

fn spawn_central(dir: &Path, port: u16, ping: Duration) -> Arc<Node> {
    let mut config = NodeConfig::central(dir.to_path_buf());
    config.central_port = port;
    config.listen_port = port;
    config.difficulty = TEST_DIFFICULTY;
    config.ping_interval = ping;

    let store = BlockStore::open(dir).unwrap();
    let node = Node::new(config, Chain::new(store, TEST_DIFFICULTY));
    node.connect().unwrap();
    node
}

fn spawn_peer(dir: &Path, listen_port: u16, central_port: u16) -> Arc<Node> {
    let mut config = NodeConfig::peer(listen_port, dir.to_path_buf());
    config.central_port = central_port;
    config.difficulty = TEST_DIFFICULTY;

    let store = BlockStore::open(dir).unwrap();
    let node = Node::new(config, Chain::new(store, TEST_DIFFICULTY));
    node.connect().unwrap();
    node
}

fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    condition()
}

fn height_of(node: &Node) -> u64 {
    node.get_chain().block_height().unwrap()
}

fn mempool_len(node: &Node) -> usize {
    node.get_chain().mempool().unwrap().len()
}

#[test]
fn test_version_handshake_registers_peer() {
    let dirs: Vec<TempDir> = (0..2).map(|_| TempDir::new().unwrap()).collect();
    let central = spawn_central(dirs[0].path(), 39540, Duration::from_secs(10));
    let peer = spawn_peer(dirs[1].path(), 39541, 39540);

    assert!(wait_until(Duration::from_secs(3), || {
        central.get_peers().len() == 1 && peer.is_synced()
    }));

    peer.disconnect();
    central.disconnect();
}

#[test]
fn test_gossip_reaches_every_peer_through_the_hub() {
    let dirs: Vec<TempDir> = (0..6).map(|_| TempDir::new().unwrap()).collect();
    let central = spawn_central(dirs[0].path(), 39500, Duration::from_secs(10));
    let peer1 = spawn_peer(dirs[1].path(), 39501, 39500);
    let peer2 = spawn_peer(dirs[2].path(), 39502, 39500);
    let peer3 = spawn_peer(dirs[3].path(), 39503, 39500);

    let wallet1 = Wallet::new().unwrap();
    let wallet2 = Wallet::new().unwrap();

    assert!(wait_until(Duration::from_secs(3), || {
        central.get_peers().len() == 3
    }));

    // Peer1 mines the genesis block; everyone converges on height 1.
    peer1.mine_block(wallet1.get_address()).unwrap();
    assert!(wait_until(Duration::from_secs(3), || {
        height_of(&central) == 1 && height_of(&peer2) == 1 && height_of(&peer3) == 1
    }));

    // One coin to wallet2; every mempool reaches size 1.
    peer1
        .create_transaction(&wallet1, wallet2.get_address(), 1)
        .unwrap();
    assert!(wait_until(Duration::from_secs(3), || {
        mempool_len(&central) == 1 && mempool_len(&peer2) == 1 && mempool_len(&peer3) == 1
    }));

    // A late joiner catches up on both the chain and the mempool.
    let peer4 = spawn_peer(dirs[4].path(), 39504, 39500);
    assert!(wait_until(Duration::from_secs(3), || {
        height_of(&peer4) == 1 && mempool_len(&peer4) == 1
    }));

    // Peer2 mines the pending transfer; balances agree everywhere.
    peer2.mine_block(wallet2.get_address()).unwrap();
    assert!(wait_until(Duration::from_secs(3), || {
        [&central, &peer1, &peer2, &peer3, &peer4]
            .iter()
            .all(|node| height_of(node) == 2 && mempool_len(node) == 0)
    }));

    for node in [&central, &peer1, &peer3, &peer4] {
        assert_eq!(
            node.get_chain().balance(&wallet2.get_address()).unwrap(),
            block_reward(1) + 1
        );
        assert_eq!(
            node.get_chain().balance(&wallet1.get_address()).unwrap(),
            block_reward(0) - 1
        );
    }

    for node in [peer1, peer2, peer3, peer4, central] {
        node.disconnect();
    }
}

#[test]
fn test_silent_peer_is_pruned() {
    let dirs: Vec<TempDir> = (0..3).map(|_| TempDir::new().unwrap()).collect();
    let ping = Duration::from_millis(400);
    let central = spawn_central(dirs[0].path(), 39520, ping);
    let peer1 = spawn_peer(dirs[1].path(), 39521, 39520);
    let peer2 = spawn_peer(dirs[2].path(), 39522, 39520);

    assert!(wait_until(Duration::from_secs(3), || {
        central.get_peers().len() == 2
    }));

    // A disconnected peer stops answering PING and gets pruned within
    // five intervals; the healthy peer survives.
    peer2.disconnect();
    assert!(wait_until(5 * ping, || central.get_peers().len() == 1));

    let survivors = central.get_peers().get_peers();
    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].port(), 39521);

    peer1.disconnect();
    central.disconnect();
}
