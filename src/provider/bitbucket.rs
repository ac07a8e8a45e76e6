//! Provider over a BitBucket repository's downloads area
//!
//! BitBucket has no releases feature; archives are published through the
//! repository downloads page and versions come from the tags API.

use crate::error::{Error, Result};
use crate::fileio;
use crate::provider::{decompress, download, newest_tag, Provider, WalkFn};
use serde::Deserialize;
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, warn};

const API_BASE: &str = "https://api.bitbucket.org/2.0";

#[derive(Debug, Deserialize)]
struct BitbucketTag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct BitbucketTagPage {
    values: Vec<BitbucketTag>,
}

pub struct Bitbucket {
    repository_url: String,
    archive_name: String,
    scratch: Option<TempDir>,
    inner: Option<Box<dyn Provider>>,
}

impl Bitbucket {
    /// `repository_url` is a `bitbucket.org/<owner>/<repo>` URL;
    /// `archive_name` may contain `{version}`, `{os}` and `{arch}`
    /// placeholders.
    pub fn new(repository_url: impl Into<String>, archive_name: impl Into<String>) -> Self {
        Self {
            repository_url: repository_url.into(),
            archive_name: archive_name.into(),
            scratch: None,
            inner: None,
        }
    }

    fn repository_info(&self) -> Result<(String, String)> {
        download::repository_info(&self.repository_url, "bitbucket.org")
    }

    fn tags(&self) -> Result<Vec<String>> {
        let (owner, repo) = self.repository_info()?;
        let url = format!("{API_BASE}/repositories/{owner}/{repo}/refs/tags");
        let page: BitbucketTagPage = download::fetch_json(&url)?;
        Ok(page.values.into_iter().map(|t| t.name).collect())
    }

    fn archive_url(&self, archive: &str) -> Result<String> {
        let (owner, repo) = self.repository_info()?;
        Ok(format!(
            "https://bitbucket.org/{owner}/{repo}/downloads/{archive}"
        ))
    }
}

impl Provider for Bitbucket {
    fn open(&mut self) -> Result<()> {
        if self.inner.is_some() {
            return Ok(());
        }
        let tag = self.latest_version()?;
        let archive = download::expand_archive_name(&self.archive_name, &tag);
        let url = self.archive_url(&archive)?;

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
