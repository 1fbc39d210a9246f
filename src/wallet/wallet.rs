use crate::core::Hash;
use crate::error::Result;
use crate::utils::{double_sha256, generate_private_key, public_key_from_pkcs8};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// One ECDSA P-256 key pair. The address is the double SHA-256 of the raw
/// public-key bytes and is the only owner identifier outputs ever see.
#[derive(Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Wallet {
    pkcs8: Vec<u8>,
    public_key: Vec<u8>,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        let pkcs8 = generate_private_key()?;
        let public_key = public_key_from_pkcs8(pkcs8.as_slice())?;
        Ok(Wallet { pkcs8, public_key })
    }

    /// Restore a wallet from stored private-key bytes.
    pub fn from_pkcs8(pkcs8: Vec<u8>) -> Result<Wallet> {
        let public_key = public_key_from_pkcs8(pkcs8.as_slice())?;
        Ok(Wallet { pkcs8, public_key })
    }

    pub fn get_address(&self) -> Hash {
        double_sha256(self.public_key.as_slice())
    }

    pub fn get_public_key(&self) -> &[u8] {
        self.public_key.as_slice()
    }

    pub fn get_pkcs8(&self) -> &[u8] {
        self.pkcs8.as_slice()
    }
}

impl Drop for Wallet {
    fn drop(&mut self) {
        self.pkcs8.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{ecdsa_sign, ecdsa_verify};

    #[test]
    fn test_address_is_double_sha256_of_public_key() {
        let wallet = Wallet::new().unwrap();
        assert_eq!(
            wallet.get_address(),
            double_sha256(wallet.get_public_key())
        );
    }

    #[test]
    fn test_restored_wallet_keeps_identity() {
        let wallet = Wallet::new().unwrap();
        let restored = Wallet::from_pkcs8(wallet.get_pkcs8().to_vec()).unwrap();

        assert_eq!(wallet.get_public_key(), restored.get_public_key());
        assert_eq!(wallet.get_address(), restored.get_address());

        // Signatures from either instance verify under the shared key.
        let message = [7u8; 32];
        let sig = ecdsa_sign(restored.get_pkcs8(), &message).unwrap();
        assert!(ecdsa_verify(wallet.get_public_key(), &message, &sig));
    }
}
