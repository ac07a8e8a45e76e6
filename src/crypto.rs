//! SHA-256 hashing and RSA-PSS release signatures
//!
//! Release files are signed offline: the signer hashes each file with SHA-256
//! and signs the digest with RSA-PSS. The embedded public key only ever
//! verifies; the private key never ships with the program.

use crate::error::{Error, Result};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{Pss, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;

/// Modulus size used by the keygen tool.
pub const KEY_BITS: usize = 2048;

/// A SHA-256 digest.
pub type Sha256Digest = [u8; 32];

/// Stream a file through SHA-256.
pub fn sha256_file(path: &Path) -> Result<Sha256Digest> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().into())
}

/// Load an RSA public key from PEM (PKCS#8 or PKCS#1) or raw DER bytes.
pub fn load_public_key(data: &[u8]) -> Result<RsaPublicKey> {
    if let Ok(text) = std::str::from_utf8(data) {
        let text = text.trim();
        if text.contains("BEGIN") {
            if let Ok(key) = RsaPublicKey::from_public_key_pem(text) {
                return Ok(key);
            }
            return RsaPublicKey::from_pkcs1_pem(text)
                .map_err(|e| Error::Crypto(format!("unreadable public key PEM: {e}")));
        }
    }
    RsaPublicKey::from_public_key_der(data)
        .map_err(|e| Error::Crypto(format!("unreadable public key DER: {e}")))
}

/// Load an RSA private key from PKCS#8 PEM text.
pub fn load_private_key(text: &str) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(text.trim())
        .map_err(|e| Error::Crypto(format!("unreadable private key PEM: {e}")))
}

/// Verify an RSA-PSS signature over a SHA-256 digest.
pub fn verify_signature(key: &RsaPublicKey, digest: &Sha256Digest, signature: &[u8]) -> Result<()> {
    key.verify(Pss::new::<Sha256>(), digest, signature)
        .map_err(|_| Error::Crypto("signature does not match digest".into()))
}

/// Produce an RSA-PSS signature over a SHA-256 digest.
pub fn sign_digest(key: &RsaPrivateKey, digest: &Sha256Digest) -> Result<Vec<u8>> {
    let mut rng = rand::rngs::OsRng;
    Ok(key.sign_with_rng(&mut rng, Pss::new::<Sha256>(), digest)?)
}

/// Generate a fresh signing keypair (keygen tool).
pub fn generate_keypair() -> Result<(RsaPrivateKey, RsaPublicKey)> {
    let mut rng = rand::rngs::OsRng;
    let private = RsaPrivateKey::new(&mut rng, KEY_BITS)?;
    let public = RsaPublicKey::from(&private);
    Ok((private, public))
}

/// Render a private key as PKCS#8 PEM.
pub fn private_key_to_pem(key: &RsaPrivateKey) -> Result<String> {
    Ok(key.to_pkcs8_pem(LineEnding::LF)?.to_string())
}

/// Render a public key as SPKI PEM.
pub fn public_key_to_pem(key: &RsaPublicKey) -> Result<String> {
    Ok(key.to_public_key_pem(LineEnding::LF)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    fn keypair() -> &'static (RsaPrivateKey, RsaPublicKey) {
        static KEYS: OnceLock<(RsaPrivateKey, RsaPublicKey)> = OnceLock::new();
        KEYS.get_or_init(|| generate_keypair().expect("keypair generation"))
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let (private, public) = keypair();
        let digest: Sha256Digest = Sha256::digest(b"release bytes").into();

        let signature = sign_digest(private, &digest).unwrap();
        verify_signature(public, &digest, &signature).unwrap();
    }

    #[test]
    fn tampered_digest_is_rejected() {
        let (private, public) = keypair();
        let digest: Sha256Digest = Sha256::digest(b"release bytes").into();
        let signature = sign_digest(private, &digest).unwrap();

        let mut tampered = digest;
        tampered[0] ^= 0x01;
        assert!(verify_signature(public, &tampered, &signature).is_err());
    }

    #[test]
    fn truncated_signature_is_rejected() {
        let (private, public) = keypair();
        let digest: Sha256Digest = Sha256::digest(b"release bytes").into();
        let signature = sign_digest(private, &digest).unwrap();

        assert!(verify_signature(public, &digest, &signature[..signature.len() - 1]).is_err());
    }

    #[test]
    fn pem_round_trip() {
        let (private, public) = keypair();

        let private_pem = private_key_to_pem(private).unwrap();
        let public_pem = public_key_to_pem(public).unwrap();

        assert_eq!(&load_private_key(&private_pem).unwrap(), private);
        assert_eq!(&load_public_key(public_pem.as_bytes()).unwrap(), public);
    }

    #[test]
    fn sha256_file_matches_in_memory_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"some file contents").unwrap();

        let expected: Sha256Digest = Sha256::digest(b"some file contents").into();
        assert_eq!(sha256_file(&path).unwrap(), expected);
    }
}
