use crate::error::{NodeError, Result};
use crate::utils::{deserialize, serialize};
use crate::wallet::Wallet;
use log::warn;
use std::collections::HashMap;
use std::env::current_dir;
use std::fs;
use std::path::{Path, PathBuf};

pub const KEYSTORE_FILE: &str = "keystore.dat";

/// Named key pairs backed by a single keystore file. Lookups are by the
/// name chosen at generation time, not by address.
pub struct Wallets {
    wallets: HashMap<String, Wallet>,
    keystore_path: PathBuf,
}

impl Wallets {
    /// Open the keystore at the default location (`./keystore.dat`).
    pub fn new() -> Result<Wallets> {
        let path = current_dir()?.join(KEYSTORE_FILE);
        Ok(Self::open(&path))
    }

    pub fn open(keystore_path: &Path) -> Wallets {
        let mut wallets = Wallets {
            wallets: HashMap::new(),
            keystore_path: keystore_path.to_path_buf(),
        };
        if let Err(e) = wallets.load_from_file() {
            warn!("Could not load keystore: {e}");
        }
        wallets
    }

    /// Create a key pair under `name`. With `persist` the keystore file is
    /// rewritten; otherwise the pair lives only in this collection.
    pub fn generate_keypair(&mut self, name: &str, persist: bool) -> Result<&Wallet> {
        if self.wallets.contains_key(name) {
            return Err(NodeError::Wallet(format!(
                "A key pair named {name} already exists"
            )));
        }
        let wallet = Wallet::new()?;
        self.wallets.insert(name.to_string(), wallet);
        if persist {
            self.save_to_file()?;
        }
        Ok(self
            .wallets
            .get(name)
            .expect("inserted above"))
    }

    pub fn load_keypair(&self, name: &str) -> Option<&Wallet> {
        self.wallets.get(name)
    }

    pub fn get_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.wallets.keys().cloned().collect();
        names.sort();
        names
    }

    fn load_from_file(&mut self) -> Result<()> {
        if !self.keystore_path.exists() {
            return Ok(());
        }
        let bytes = fs::read(&self.keystore_path)?;
        self.wallets = deserialize(bytes.as_slice())?;
        Ok(())
    }

    fn save_to_file(&self) -> Result<()> {
        let bytes = serialize(&self.wallets)?;
        fs::write(&self.keystore_path, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_generate_and_load_by_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(KEYSTORE_FILE);

        let mut wallets = Wallets::open(&path);
        let address = wallets.generate_keypair("miner", true).unwrap().get_address();

        assert!(wallets.load_keypair("miner").is_some());
        assert!(wallets.load_keypair("nobody").is_none());

        // A fresh collection sees the persisted pair with the same identity.
        let reloaded = Wallets::open(&path);
        let wallet = reloaded.load_keypair("miner").unwrap();
        assert_eq!(wallet.get_address(), address);
    }

    #[test]
    fn test_unpersisted_keypair_stays_in_memory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(KEYSTORE_FILE);

        let mut wallets = Wallets::open(&path);
        wallets.generate_keypair("ephemeral", false).unwrap();

        let reloaded = Wallets::open(&path);
        assert!(reloaded.load_keypair("ephemeral").is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(KEYSTORE_FILE);

        let mut wallets = Wallets::open(&path);
        wallets.generate_keypair("alice", false).unwrap();
        assert!(wallets.generate_keypair("alice", false).is_err());
    }
}
