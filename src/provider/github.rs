//! Provider over a GitHub repository's releases

use crate::error::{Error, Result};
use crate::fileio;
use crate::provider::{decompress, download, newest_tag, Provider, WalkFn};
use serde::Deserialize;
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, warn};

const API_BASE: &str = "https://api.github.com";
const RELEASES_BASE: &str = "https://github.com";

#[derive(Debug, Deserialize)]
struct GithubTag {
    name: String,
}

/// Releases are located by tag; the archive is fetched from the release's
/// download URL into a scratch directory and unpacked from there.
pub struct Github {
    repository_url: String,
    archive_name: String,
    scratch: Option<TempDir>,
    inner: Option<Box<dyn Provider>>,
}

impl Github {
    /// `repository_url` is a `github.com/<owner>/<repo>` URL; `archive_name`
    /// may contain `{version}`, `{os}` and `{arch}` placeholders.
    pub fn new(repository_url: impl Into<String>, archive_name: impl Into<String>) -> Self {
        Self {
            repository_url: repository_url.into(),
            archive_name: archive_name.into(),
            scratch: None,
            inner: None,
        }
    }

    fn repository_info(&self) -> Result<(String, String)> {
        download::repository_info(&self.repository_url, "github.com")
    }

    fn tags(&self) -> Result<Vec<String>> {
        let (owner, repo) = self.repository_info()?;
        let url = format!("{API_BASE}/repos/{owner}/{repo}/tags");
        let tags: Vec<GithubTag> = download::fetch_json(&url)?;
        Ok(tags.into_iter().map(|t| t.name).collect())
    }

    fn archive_url(&self, tag: &str, archive: &str) -> Result<String> {
        let (owner, repo) = self.repository_info()?;
        Ok(format!(
            "{RELEASES_BASE}/{owner}/{repo}/releases/download/{tag}/{archive}"
        ))
    }
}

impl Provider for Github {
    fn open(&mut self) -> Result<()> {
        if self.inner.is_some() {
            return Ok(());
        }
        let tag = self.latest_version()?;
        let archive = download::expand_archive_name(&self.archive_name, &tag);
        let url = self.archive_url(&tag, &archive)?;

        let scratch = fileio::scratch_dir()?;
        let archive_path = scratch.path().join(&archive);
        debug!("fetching release {tag} from {url}");
        download::download_to(&url, &archive_path)?;

        let mut inner = decompress(&archive_path)?;
        inner.open()?;
        self.scratch = Some(scratch);
        self.inner = Some(inner);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut inner) = self.inner.take() {
            if let Err(err) = inner.close() {
                warn!("failed to close inner archive provider: {err}");
            }
        }
        if let Some(scratch) = self.scratch.take() {
            if let Err(err) = scratch.close() {
                warn!("failed to remove scratch directory: {err}");
            }
        }
        Ok(())
    }

    fn walk(&mut self, visit: &mut WalkFn) -> Result<()> {
        self.inner.as_mut().ok_or(Error::NotOpen)?.walk(visit)
    }

    fn retrieve(&mut self, src: &str, dest: &Path) -> Result<()> {
        self.inner.as_mut().ok_or(Error::NotOpen)?.retrieve(src, dest)
    }

    fn latest_version(&self) -> Result<String> {
        newest_tag(self.tags()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_url_is_assembled_from_the_repository() {
        let provider = Github::new("https://github.com/acme/tool", "tool-{version}.zip");
        let url = provider.archive_url("v1.2.0", "tool-v1.2.0.zip").unwrap();
        assert_eq!(
            url,
            "https://github.com/acme/tool/releases/download/v1.2.0/tool-v1.2.0.zip"
        );
    }

    #[test]
    fn bad_repository_url_is_rejected() {
        let provider = Github::new("https://example.org/acme/tool", "tool.zip");
        assert!(provider.repository_info().is_err());
    }

    #[test]
    fn operations_require_open() {
        let mut provider = Github::new("github.com/acme/tool", "tool.zip");
        assert!(matches!(
            provider.walk(&mut |_| Ok(())).unwrap_err(),
            Error::NotOpen
        ));
        assert!(matches!(
            provider
                .retrieve("tool", Path::new("/tmp/tool"))
                .unwrap_err(),
            Error::NotOpen
        ));
        provider.close().unwrap();
    }
}
