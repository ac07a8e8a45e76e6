//! Operator configuration for the CLI front-end

use crate::crypto;
use crate::error::Result;
use crate::provider::{Bitbucket, Github, Gitlab, Local, Provider};
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Where release archives come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum ReleaseSource {
    /// GitHub repository, e.g. `github.com/acme/tool`.
    Github { repository: String },
    /// GitLab project id.
    Gitlab { project_id: u64 },
    /// BitBucket repository, e.g. `bitbucket.org/acme/tool`.
    Bitbucket { repository: String },
    /// Local release directory (testing and air-gapped installs).
    Local { path: PathBuf },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Archive name template; `{version}`, `{os}` and `{arch}` are expanded.
    pub archive_name: String,

    /// PEM file holding the release public key; unset means unsigned mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_path: Option<PathBuf>,

    pub source: ReleaseSource,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            archive_name: "skylift-{version}-{os}-{arch}.zip".into(),
            public_key_path: None,
            source: ReleaseSource::Github {
                repository: "github.com/example/skylift".into(),
            },
        }
    }
}

impl Config {
    /// Default config file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("skylift").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(toml::from_str(&fs::read_to_string(path)?)?)
    }

    /// Load configuration from `path` (or the default location), falling back
    /// to defaults when no file exists yet.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_path);
        if path.exists() {
            info!("loading configuration from {}", path.display());
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Build the provider described by this configuration.
    pub fn provider(&self) -> Box<dyn Provider> {
        match &self.source {
            ReleaseSource::Github { repository } => {
                Box::new(Github::new(repository, &self.archive_name))
            }
            ReleaseSource::Gitlab { project_id } => {
                Box::new(Gitlab::new(*project_id, &self.archive_name))
            }
            ReleaseSource::Bitbucket { repository } => {
                Box::new(Bitbucket::new(repository, &self.archive_name))
            }
            ReleaseSource::Local { path } => Box::new(Local::new(path)),
        }
    }

    /// Load the configured release public key, if any.
    pub fn public_key(&self) -> Result<Option<RsaPublicKey>> {
        match &self.public_key_path {
            Some(path) => Ok(Some(crypto::load_public_key(&fs::read(path)?)?)),
            None => Ok(None),
        }
    }
}
