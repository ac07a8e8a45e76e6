//! Provider over a GitLab project's releases

use crate::error::{Error, Result};
use crate::fileio;
use crate::provider::{decompress, download, newest_tag, Provider, WalkFn};
use serde::Deserialize;
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, warn};

const API_BASE: &str = "https://gitlab.com/api/v4";

#[derive(Debug, Deserialize)]
struct GitlabRelease {
    tag_name: String,
    assets: GitlabAssets,
}

#[derive(Debug, Deserialize)]
struct GitlabAssets {
    links: Vec<GitlabAssetLink>,
}

#[derive(Debug, Deserialize)]
struct GitlabAssetLink {
    name: String,
    url: String,
}

/// Releases are listed through the project releases API; the archive is the
/// release asset link whose name matches the configured archive name.
pub struct Gitlab {
    project_id: u64,
    archive_name: String,
    scratch: Option<TempDir>,
    inner: Option<Box<dyn Provider>>,
}

impl Gitlab {
    /// `archive_name` may contain `{version}`, `{os}` and `{arch}`
    /// placeholders.
    pub fn new(project_id: u64, archive_name: impl Into<String>) -> Self {
        Self {
            project_id,
            archive_name: archive_name.into(),
            scratch: None,
            inner: None,
        }
    }

    fn releases(&self) -> Result<Vec<GitlabRelease>> {
        let url = format!("{API_BASE}/projects/{}/releases", self.project_id);
        download::fetch_json(&url)
    }
}

impl Provider for Gitlab {
    fn open(&mut self) -> Result<()> {
        if self.inner.is_some() {
            return Ok(());
        }
        let releases = self.releases()?;
        let tag = newest_tag(releases.iter().map(|r| r.tag_name.clone()).collect())?;
        let archive = download::expand_archive_name(&self.archive_name, &tag);
        let release = releases
            .iter()
            .find(|r| r.tag_name == tag)
            .ok_or_else(|| Error::NotFound(format!("release {tag} disappeared")))?;
        let link = release
            .assets
            .links
            .iter()
            .find(|l| l.name == archive)
            .ok_or_else(|| {
                Error::NotFound(format!("release {tag} has no asset named {archive}"))
            })?;

        let scratch = fileio::scratch_dir()?;
        let archive_path = scratch.path().join(&archive);
        debug!("fetching release {tag} from {}", link.url);
        download::download_to(&link.url, &archive_path)?;

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
        let releases = self.releases()?;
        newest_tag(releases.into_iter().map(|r| r.tag_name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_payloads_deserialize() {
        let raw = r#"[{
            "tag_name": "v1.1.0",
            "assets": {"links": [{"name": "tool.zip", "url": "https://gitlab.com/x"}]}
        }]"#;
        let releases: Vec<GitlabRelease> = serde_json::from_str(raw).unwrap();
        assert_eq!(releases[0].tag_name, "v1.1.0");
        assert_eq!(releases[0].assets.links[0].name, "tool.zip");
    }

    #[test]
    fn operations_require_open() {
        let mut provider = Gitlab::new(24021648, "binaries_{os}.zip");
        assert!(matches!(
            provider.walk(&mut |_| Ok(())).unwrap_err(),
            Error::NotOpen
        ));
        provider.close().unwrap();
    }
}
