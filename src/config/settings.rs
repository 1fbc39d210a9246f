use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::Duration;

/// Hub or spoke. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Central,
    Peer,
}

pub const DEFAULT_DIFFICULTY: u32 = 3;
pub const DEFAULT_PING_INTERVAL_SECS: f64 = 10.0;
pub const DEFAULT_CENTRAL_HOST: &str = "127.0.0.1";
pub const DEFAULT_CENTRAL_PORT: u16 = 2001;

/// Everything a node needs at construction. Tests override behavior by
/// supplying a different config, never by mutating process globals.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub role: NodeRole,
    pub difficulty: u32,
    pub ping_interval: Duration,
    pub central_host: String,
    pub central_port: u16,
    pub listen_port: u16,
    pub store_path: PathBuf,
}

impl NodeConfig {
    /// The hub: listens on the well-known central port.
    pub fn central(store_path: PathBuf) -> NodeConfig {
        NodeConfig {
            role: NodeRole::Central,
            difficulty: DEFAULT_DIFFICULTY,
            ping_interval: Duration::from_secs_f64(DEFAULT_PING_INTERVAL_SECS),
            central_host: DEFAULT_CENTRAL_HOST.to_string(),
            central_port: DEFAULT_CENTRAL_PORT,
            listen_port: DEFAULT_CENTRAL_PORT,
            store_path,
        }
    }

    /// A spoke: listens on its own port and dials the hub on startup.
    pub fn peer(listen_port: u16, store_path: PathBuf) -> NodeConfig {
        NodeConfig {
            role: NodeRole::Peer,
            difficulty: DEFAULT_DIFFICULTY,
            ping_interval: Duration::from_secs_f64(DEFAULT_PING_INTERVAL_SECS),
            central_host: DEFAULT_CENTRAL_HOST.to_string(),
            central_port: DEFAULT_CENTRAL_PORT,
            listen_port,
            store_path,
        }
    }

    pub fn central_addr(&self) -> String {
        format!("{}:{}", self.central_host, self.central_port)
    }
}

/// Process-level settings for the CLI binary, seeded from the
/// environment. Library code never reads this; it takes a `NodeConfig`.
pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(Config::new);

const NODE_PORT_KEY: &str = "NODE_PORT";
const CENTRAL_HOST_KEY: &str = "CENTRAL_HOST";
const CENTRAL_PORT_KEY: &str = "CENTRAL_PORT";
const STORE_PATH_KEY: &str = "STORE_PATH";

pub struct Config {
    inner: RwLock<HashMap<String, String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Config {
        let mut map = HashMap::new();
        for key in [NODE_PORT_KEY, CENTRAL_HOST_KEY, CENTRAL_PORT_KEY, STORE_PATH_KEY] {
            if let Ok(value) = env::var(key) {
                map.insert(String::from(key), value);
            }
        }
        Config {
            inner: RwLock::new(map),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        let inner = self
            .inner
            .read()
            .expect("Failed to acquire read lock on config - this should never happen");
        inner.get(key).cloned()
    }

    pub fn get_node_port(&self) -> Option<u16> {
        self.get(NODE_PORT_KEY).and_then(|v| v.parse().ok())
    }

    pub fn get_central_host(&self) -> String {
        self.get(CENTRAL_HOST_KEY)
            .unwrap_or_else(|| DEFAULT_CENTRAL_HOST.to_string())
    }

    pub fn get_central_port(&self) -> u16 {
        self.get(CENTRAL_PORT_KEY)
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_CENTRAL_PORT)
    }

    pub fn get_store_path(&self) -> Option<PathBuf> {
        self.get(STORE_PATH_KEY).map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_central_defaults() {
        let config = NodeConfig::central(PathBuf::from("/tmp/store"));
        assert_eq!(config.role, NodeRole::Central);
        assert_eq!(config.difficulty, 3);
        assert_eq!(config.ping_interval, Duration::from_secs(10));
        assert_eq!(config.listen_port, config.central_port);
        assert_eq!(config.central_addr(), "127.0.0.1:2001");
    }

    #[test]
    fn test_peer_listens_on_own_port() {
        let config = NodeConfig::peer(3100, PathBuf::from("/tmp/store"));
        assert_eq!(config.role, NodeRole::Peer);
        assert_eq!(config.listen_port, 3100);
        assert_ne!(config.listen_port, config.central_port);
    }
}
