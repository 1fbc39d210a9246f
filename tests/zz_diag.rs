use hubchain::{BlockStore, Chain, Node, NodeConfig, Wallet};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn spawn_central(dir: &Path, port: u16) -> std::sync::Arc<Node> {
    let mut config = NodeConfig::central(dir.to_path_buf());
    config.central_port = port;
    config.listen_port = port;
    config.difficulty = 1;
    config.ping_interval = Duration::from_secs(10);

    let store = BlockStore::open(dir).unwrap();
    let node = Node::new(config, Chain::new(store, 1));
    node.connect().unwrap();
    node
}

fn spawn_peer(dir: &Path, listen_port: u16, central_port: u16) -> std::sync::Arc<Node> {
    let mut config = NodeConfig::peer(listen_port, dir.to_path_buf());
    config.central_port = central_port;
    config.difficulty = 1;

    let store = BlockStore::open(dir).unwrap();
    let node = Node::new(config, Chain::new(store, 1));
    node.connect().unwrap();
    node
}

#[test]
fn diag() {
    let dirs: Vec<TempDir> = (0..4).map(|_| TempDir::new().unwrap()).collect();
    eprintln!("spawning central");
    let central = spawn_central(dirs[0].path(), 48600);
    eprintln!("spawning peer1");
    let peer1 = spawn_peer(dirs[1].path(), 48601, 48600);
    eprintln!("spawning peer2");
    let peer2 = spawn_peer(dirs[2].path(), 48602, 48600);
    eprintln!("spawning peer3");
    let peer3 = spawn_peer(dirs[3].path(), 48603, 48600);
    std::thread::sleep(Duration::from_secs(1));
    eprintln!("central peers: {}", central.get_peers().len());

    let wallet1 = Wallet::new().unwrap();
    eprintln!("mining block on peer1");
    peer1.mine_block(wallet1.get_address()).unwrap();
    eprintln!("mined");
    std::thread::sleep(Duration::from_secs(1));
    eprintln!("awake, checking central height");
    let ch = central.get_chain().block_height().unwrap();
    eprintln!("central height = {ch}");
    let p2h = peer2.get_chain().block_height().unwrap();
    eprintln!("peer2 height = {p2h}");
    let p3h = peer3.get_chain().block_height().unwrap();
    eprintln!("peer3 height = {p3h}");
    peer1.disconnect();
    peer2.disconnect();
    peer3.disconnect();
    central.disconnect();
}
