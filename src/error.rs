//! Error types shared by the update engine and the providers

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("update source unavailable: {0}")]
    BackendUnavailable(#[from] reqwest::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("entry missing from release archive: {0}")]
    EntryMissing(String),

    #[error("malformed archive: {0}")]
    Malformed(String),

    #[error("provider is not open")]
    NotOpen,

    #[error("verification failed: {0}")]
    Verification(#[from] VerificationError),

    #[error("staged executable digest mismatch: expected {expected}, got {actual}")]
    StageCorruption { expected: String, actual: String },

    #[error("failed to promote staged executable, rollback required: {0}")]
    PromoteFailed(std::io::Error),

    #[error("no backup available to roll back to")]
    NoBackup,

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

/// Reasons the signature check over a release archive can fail.
///
/// Whatever the reason, the host installation is left untouched.
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("signature manifest is missing or unreadable")]
    NoManifest,

    #[error("file not listed in signature manifest: {0}")]
    Unlisted(String),

    #[error("signature does not match file: {0}")]
    BadSignature(String),

    #[error("file listed in manifest but absent from archive: {0}")]
    Missing(String),
}

impl From<rsa::Error> for Error {
    fn from(err: rsa::Error) -> Self {
        Error::Crypto(err.to_string())
    }
}

impl From<rsa::pkcs8::Error> for Error {
    fn from(err: rsa::pkcs8::Error) -> Self {
        Error::Crypto(err.to_string())
    }
}

impl From<rsa::pkcs8::spki::Error> for Error {
    fn from(err: rsa::pkcs8::spki::Error) -> Self {
        Error::Crypto(err.to_string())
    }
}
