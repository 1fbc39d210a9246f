use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Mutex, RwLock};
use std::time::Instant;

/// The shared peer set plus the per-peer liveness bookkeeping. Mutated
/// only by the listener callback thread and the liveness task; every
/// access goes through a guard.
pub struct Peers {
    inner: RwLock<Vec<SocketAddr>>,
    ping_sent: Mutex<HashMap<SocketAddr, Instant>>,
    pong_received: Mutex<HashMap<SocketAddr, Instant>>,
    last_seen: Mutex<HashMap<SocketAddr, Instant>>,
}

impl Default for Peers {
    fn default() -> Self {
        Self::new()
    }
}

impl Peers {
    pub fn new() -> Peers {
        Peers {
            inner: RwLock::new(vec![]),
            ping_sent: Mutex::new(HashMap::new()),
            pong_received: Mutex::new(HashMap::new()),
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    /// Idempotent; returns true when the peer was new.
    pub fn add_peer(&self, addr: SocketAddr) -> bool {
        let mut inner = self
            .inner
            .write()
            .expect("Failed to acquire write lock on peers - this should never happen");
        if inner.iter().any(|x| x.eq(&addr)) {
            return false;
        }
        inner.push(addr);
        true
    }

    /// Drops the peer and all liveness state recorded for it.
    pub fn remove_peer(&self, addr: &SocketAddr) {
        let mut inner = self
            .inner
            .write()
            .expect("Failed to acquire write lock on peers - this should never happen");
        if let Some(idx) = inner.iter().position(|x| x.eq(addr)) {
            inner.remove(idx);
        }
        drop(inner);

        self.lock_ping_sent().remove(addr);
        self.lock_pong_received().remove(addr);
        self.lock_last_seen().remove(addr);
    }

    pub fn get_peers(&self) -> Vec<SocketAddr> {
        self.inner
            .read()
            .expect("Failed to acquire read lock on peers - this should never happen")
            .to_vec()
    }

    pub fn is_known(&self, addr: &SocketAddr) -> bool {
        self.inner
            .read()
            .expect("Failed to acquire read lock on peers - this should never happen")
            .iter()
            .any(|x| x.eq(addr))
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .expect("Failed to acquire read lock on peers - this should never happen")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn record_ping_sent(&self, addr: SocketAddr) {
        self.lock_ping_sent().insert(addr, Instant::now());
    }

    pub fn last_ping_sent(&self, addr: &SocketAddr) -> Option<Instant> {
        self.lock_ping_sent().get(addr).copied()
    }

    pub fn record_pong_received(&self, addr: SocketAddr) {
        self.lock_pong_received().insert(addr, Instant::now());
    }

    pub fn last_pong_received(&self, addr: &SocketAddr) -> Option<Instant> {
        self.lock_pong_received().get(addr).copied()
    }

    pub fn record_sighting(&self, addr: SocketAddr) {
        self.lock_last_seen().insert(addr, Instant::now());
    }

    pub fn last_seen(&self, addr: &SocketAddr) -> Option<Instant> {
        self.lock_last_seen().get(addr).copied()
    }

    fn lock_ping_sent(&self) -> std::sync::MutexGuard<'_, HashMap<SocketAddr, Instant>> {
        self.ping_sent
            .lock()
            .expect("Failed to acquire lock on ping map - this should never happen")
    }

    fn lock_pong_received(&self) -> std::sync::MutexGuard<'_, HashMap<SocketAddr, Instant>> {
        self.pong_received
            .lock()
            .expect("Failed to acquire lock on pong map - this should never happen")
    }

    fn lock_last_seen(&self) -> std::sync::MutexGuard<'_, HashMap<SocketAddr, Instant>> {
        self.last_seen
            .lock()
            .expect("Failed to acquire lock on sightings map - this should never happen")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_add_is_idempotent() {
        let peers = Peers::new();
        assert!(peers.add_peer(addr(3100)));
        assert!(!peers.add_peer(addr(3100)));
        assert_eq!(peers.len(), 1);
    }

    #[test]
    fn test_remove_clears_liveness_state() {
        let peers = Peers::new();
        peers.add_peer(addr(3100));
        peers.record_ping_sent(addr(3100));
        peers.record_pong_received(addr(3100));

        peers.remove_peer(&addr(3100));
        assert!(peers.is_empty());
        assert!(peers.last_ping_sent(&addr(3100)).is_none());
        assert!(peers.last_pong_received(&addr(3100)).is_none());
    }
}
