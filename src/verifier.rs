//! Signature-manifest verification over an opened provider
//!
//! A release ships a manifest at [`MANIFEST_REL_PATH`] mapping every file's
//! relative path to a base64 RSA-PSS signature of its SHA-256 digest. The
//! manifest cannot sign itself, so it is excluded from the check; everything
//! else must be listed, present and correctly signed. Verification is
//! all-or-nothing and never touches the host installation.

use crate::crypto::{self, Sha256Digest};
use crate::error::{Error, Result, VerificationError};
use crate::provider::{FileInfo, FileKind, Provider};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Relative path of the signature manifest inside a release.
pub const MANIFEST_REL_PATH: &str = "signatures/manifest";

/// Mapping from archive-relative path to base64 signature of the file's
/// SHA-256 digest.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignatureManifest(BTreeMap<String, String>);

impl SignatureManifest {
    pub fn insert(&mut self, path: impl Into<String>, signature: &[u8]) {
        self.0.insert(path.into(), BASE64.encode(signature));
    }

    /// Decoded signature for `path`, if listed.
    pub fn signature(&self, path: &str) -> Option<Result<Vec<u8>>> {
        self.0.get(path).map(|encoded| {
            BASE64
                .decode(encoded)
                .map_err(|e| Error::Malformed(format!("signature for {path} is not base64: {e}")))
        })
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One verified file: where its scratch copy lives and its digest.
#[derive(Debug, Clone)]
pub struct VerifiedFile {
    pub scratch_path: PathBuf,
    pub digest: Sha256Digest,
}

/// Check every shipped file against the signature manifest while populating
/// `scratch_root` with the retrieved copies, so the engine can promote them
/// without re-downloading.
pub fn verify(
    provider: &mut dyn Provider,
    public_key: &RsaPublicKey,
    scratch_root: &Path,
) -> Result<BTreeMap<String, VerifiedFile>> {
    let manifest = fetch_manifest(provider, scratch_root)?;

    let mut entries: Vec<FileInfo> = Vec::new();
    provider.walk(&mut |info| {
        entries.push(info.clone());
        Ok(())
    })?;

    let mut verified = BTreeMap::new();
    let mut seen = BTreeSet::new();
    for info in entries {
        if info.path == MANIFEST_REL_PATH || info.is_dir() {
            continue;
        }
        if info.kind == FileKind::Symlink {
            return Err(Error::Malformed(format!(
                "symlink entry in release archive: {}",
                info.path
            )));
        }
        let signature = match manifest.signature(&info.path) {
            Some(signature) => signature?,
            None => return Err(VerificationError::Unlisted(info.path).into()),
        };

        let scratch_path = scratch_root.join(&info.path);
        provider.retrieve(&info.path, &scratch_path)?;
        let digest = crypto::sha256_file(&scratch_path)?;
        if crypto::verify_signature(public_key, &digest, &signature).is_err() {
            return Err(VerificationError::BadSignature(info.path).into());
        }

        seen.insert(info.path.clone());
        verified.insert(
            info.path,
            VerifiedFile {
                scratch_path,
                digest,
            },
        );
    }

    for path in manifest.paths() {
        if !seen.contains(path) {
            return Err(VerificationError::Missing(path.to_string()).into());
        }
    }
    Ok(verified)
}

fn fetch_manifest(provider: &mut dyn Provider, scratch_root: &Path) -> Result<SignatureManifest> {
    let manifest_path = scratch_root.join(MANIFEST_REL_PATH);
    if provider.retrieve(MANIFEST_REL_PATH, &manifest_path).is_err() {
        return Err(VerificationError::NoManifest.into());
    }
    let raw = fs::read(&manifest_path).map_err(|_| VerificationError::NoManifest)?;
    serde_json::from_slice(&raw).map_err(|_| VerificationError::NoManifest.into())
}

/// Sign every regular file under `root`, producing the manifest the verifier
/// consumes. The manifest's own path is skipped. Used by the offline signer.
pub fn sign_tree(root: &Path, key: &RsaPrivateKey) -> Result<SignatureManifest> {
    let mut manifest = SignatureManifest::default();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|_| Error::Malformed(format!("entry escapes {}", root.display())))?;
        let path = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if path == MANIFEST_REL_PATH {
            continue;
        }
        let digest = crypto::sha256_file(entry.path())?;
        let signature = crypto::sign_digest(key, &digest)?;
        manifest.insert(path, &signature);
    }
    Ok(manifest)
}

/// Write a manifest into a release tree at [`MANIFEST_REL_PATH`].
pub fn write_manifest(root: &Path, manifest: &SignatureManifest) -> Result<()> {
    let path = root.join(MANIFEST_REL_PATH);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, serde_json::to_vec_pretty(manifest)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Local;
    use std::sync::OnceLock;
    use tempfile::tempdir;

    fn keypair() -> &'static (RsaPrivateKey, RsaPublicKey) {
        static KEYS: OnceLock<(RsaPrivateKey, RsaPublicKey)> = OnceLock::new();
        KEYS.get_or_init(|| crypto::generate_keypair().expect("keypair generation"))
    }

    fn signed_release(root: &Path) {
        fs::create_dir_all(root.join("data")).unwrap();
        fs::write(root.join("VERSION"), "v1.0.0\n").unwrap();
        fs::write(root.join("tool"), b"tool payload").unwrap();
        fs::write(root.join("data/notes.txt"), b"notes").unwrap();
        let manifest = sign_tree(root, &keypair().0).unwrap();
        write_manifest(root, &manifest).unwrap();
    }

    fn verify_release(root: &Path) -> Result<BTreeMap<String, VerifiedFile>> {
        let mut provider = Local::new(root);
        provider.open().unwrap();
        let scratch = tempdir().unwrap();
        verify(&mut provider, &keypair().1, scratch.path())
    }

    #[test]
    fn well_signed_release_passes() {
        let dir = tempdir().unwrap();
        signed_release(dir.path());

        let mut provider = Local::new(dir.path());
        provider.open().unwrap();
        let scratch = tempdir().unwrap();
        let verified = verify(&mut provider, &keypair().1, scratch.path()).unwrap();
        assert_eq!(verified.len(), 3);
        let tool = &verified["tool"];
        assert_eq!(tool.digest, crypto::sha256_file(&tool.scratch_path).unwrap());
    }

    #[test]
    fn flipped_signature_byte_is_rejected() {
        let dir = tempdir().unwrap();
        signed_release(dir.path());

        let manifest_path = dir.path().join(MANIFEST_REL_PATH);
        let mut raw: BTreeMap<String, String> =
            serde_json::from_slice(&fs::read(&manifest_path).unwrap()).unwrap();
        let mut sig = BASE64.decode(raw.get("tool").unwrap()).unwrap();
        sig[0] ^= 0x01;
        raw.insert("tool".into(), BASE64.encode(&sig));
        fs::write(&manifest_path, serde_json::to_vec(&raw).unwrap()).unwrap();

        let err = verify_release(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            Error::Verification(VerificationError::BadSignature(path)) if path == "tool"
        ));
    }

    #[test]
    fn extra_unlisted_file_is_rejected() {
        let dir = tempdir().unwrap();
        signed_release(dir.path());
        fs::write(dir.path().join("extra.txt"), b"sneaky").unwrap();

        let err = verify_release(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            Error::Verification(VerificationError::Unlisted(path)) if path == "extra.txt"
        ));
    }

    #[test]
    fn missing_listed_file_is_rejected() {
        let dir = tempdir().unwrap();
        signed_release(dir.path());
        fs::remove_file(dir.path().join("data/notes.txt")).unwrap();

        let err = verify_release(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            Error::Verification(VerificationError::Missing(path)) if path == "data/notes.txt"
        ));
    }

    #[test]
    fn absent_manifest_is_rejected() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("tool"), b"tool payload").unwrap();

        let err = verify_release(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            Error::Verification(VerificationError::NoManifest)
        ));
    }

    #[test]
    fn signing_twice_does_not_sign_the_manifest() {
        let dir = tempdir().unwrap();
        signed_release(dir.path());

        // Re-signing after the manifest exists must still exclude it.
        let manifest = sign_tree(dir.path(), &keypair().0).unwrap();
        assert!(manifest.signature(MANIFEST_REL_PATH).is_none());
        assert_eq!(manifest.len(), 3);
    }
}
