// Hashing and signing primitives. SHA-256 is the only digest in the
// system and always travels as a fixed 32-byte array; key pairs are
// ECDSA P-256 held as PKCS#8 documents.

use crate::error::{NodeError, Result};
use ring::digest;
use ring::rand::SystemRandom;
use ring::signature::{
    EcdsaKeyPair, KeyPair, UnparsedPublicKey, ECDSA_P256_SHA256_FIXED,
    ECDSA_P256_SHA256_FIXED_SIGNING,
};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in whole seconds. Block timestamps and transaction
/// lock times are both u32 seconds.
pub fn current_timestamp() -> Result<u32> {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| NodeError::Crypto(format!("System time error: {e}")))?
        .as_secs();

    if seconds > u32::MAX as u64 {
        return Err(NodeError::Crypto("Timestamp overflow".to_string()));
    }

    Ok(seconds as u32)
}

/// SHA-256 of arbitrary bytes, as the 32-byte array every hash field in
/// the system carries.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(digest::digest(&digest::SHA256, data).as_ref());
    out
}

/// Owner addresses are a digest of a digest: SHA-256 applied twice to the
/// raw public-key bytes.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Mint a fresh P-256 key pair, returned as its PKCS#8 document.
pub fn generate_private_key() -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let document = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
        .map_err(|e| NodeError::Crypto(format!("ECDSA key generation failed: {e}")))?;
    Ok(document.as_ref().to_vec())
}

fn key_pair_from_pkcs8(pkcs8: &[u8], rng: &SystemRandom) -> Result<EcdsaKeyPair> {
    EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, rng)
        .map_err(|e| NodeError::Crypto(format!("Key material is not valid PKCS#8: {e}")))
}

/// Raw public-key bytes of a stored key pair.
pub fn public_key_from_pkcs8(pkcs8: &[u8]) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let key_pair = key_pair_from_pkcs8(pkcs8, &rng)?;
    Ok(key_pair.public_key().as_ref().to_vec())
}

/// Sign a message with the private key held in `pkcs8`.
pub fn ecdsa_sign(pkcs8: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let signature = key_pair_from_pkcs8(pkcs8, &rng)?
        .sign(&rng, message)
        .map_err(|e| NodeError::Crypto(format!("Signing failed: {e}")))?;
    Ok(signature.as_ref().to_vec())
}

/// Check a signature over `message` against raw public-key bytes. Both
/// deterministic and randomized signatures are accepted.
pub fn ecdsa_verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, public_key)
        .verify(message, signature)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_is_deterministic() {
        assert_eq!(sha256(b"hub"), sha256(b"hub"));
        assert_ne!(sha256(b"hub"), sha256(b"chain"));
    }

    #[test]
    fn test_double_sha256_chains_the_digest() {
        let once = sha256(b"key bytes");
        assert_eq!(double_sha256(b"key bytes"), sha256(&once));
    }

    #[test]
    fn test_sign_and_verify_round_trip() {
        let pkcs8 = generate_private_key().unwrap();
        let public_key = public_key_from_pkcs8(&pkcs8).unwrap();
        let message = sha256(b"outpoint");

        let signature = ecdsa_sign(&pkcs8, &message).unwrap();
        assert!(ecdsa_verify(&public_key, &message, &signature));
    }

    #[test]
    fn test_signatures_interop_across_restored_key_pairs() {
        // A key pair restored from the same private-key bytes must produce
        // signatures that verify under the same public key.
        let pkcs8 = generate_private_key().unwrap();
        let public_key = public_key_from_pkcs8(&pkcs8).unwrap();
        let message = sha256(b"same message");

        let sig_a = ecdsa_sign(&pkcs8, &message).unwrap();
        let sig_b = ecdsa_sign(&pkcs8, &message).unwrap();

        assert!(ecdsa_verify(&public_key, &message, &sig_a));
        assert!(ecdsa_verify(&public_key, &message, &sig_b));
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let pkcs8 = generate_private_key().unwrap();
        let other_public = public_key_from_pkcs8(&generate_private_key().unwrap()).unwrap();
        let message = sha256(b"not yours");

        let signature = ecdsa_sign(&pkcs8, &message).unwrap();
        assert!(!ecdsa_verify(&other_public, &message, &signature));
    }

    #[test]
    fn test_garbage_signature_fails_verification() {
        let pkcs8 = generate_private_key().unwrap();
        let public_key = public_key_from_pkcs8(&pkcs8).unwrap();
        assert!(!ecdsa_verify(&public_key, &sha256(b"m"), &[0u8; 64]));
    }
}
