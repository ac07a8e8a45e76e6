//! Blocking HTTP plumbing shared by the forge providers

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("skylift/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetch a JSON document from a forge metadata API.
pub(crate) fn fetch_json<T: DeserializeOwned>(url: &str) -> Result<T> {
    debug!("fetching {url}");
    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()?;
    let response = client.get(url).send()?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(Error::NotFound(url.to_string()));
    }
    Ok(response.error_for_status()?.json()?)
}

/// Stream `url` into `dest`.
///
/// Archives can be large, so only the connection attempt is bounded; the
/// transfer itself is not.
pub(crate) fn download_to(url: &str, dest: &Path) -> Result<()> {
    debug!("downloading {url} to {}", dest.display());
    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(REQUEST_TIMEOUT)
        .build()?;
    let response = client.get(url).send()?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(Error::NotFound(url.to_string()));
    }
    let mut response = response.error_for_status()?;
    let mut file = File::create(dest)?;
    response.copy_to(&mut file)?;
    file.sync_all()?;
    Ok(())
}

/// Extract `(owner, repo)` from a `host/<owner>/<repo>` repository URL.
pub(crate) fn repository_info(url: &str, host: &str) -> Result<(String, String)> {
    let rest = url
        .split_once(host)
        .map(|(_, rest)| rest.trim_start_matches('/'))
        .ok_or_else(|| Error::Config(format!("not a {host} repository URL: {url}")))?;
    let mut segments = rest.trim_end_matches('/').split('/');
    match (segments.next(), segments.next()) {
        (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => Ok((
            owner.to_string(),
            repo.trim_end_matches(".git").to_string(),
        )),
        _ => Err(Error::Config(format!(
            "cannot extract owner and repository from URL: {url}"
        ))),
    }
}

/// Expand `{version}`, `{os}` and `{arch}` placeholders in an archive name.
pub(crate) fn expand_archive_name(template: &str, version: &str) -> String {
    template
        .replace("{version}", version)
        .replace("{os}", std::env::consts::OS)
        .replace("{arch}", std::env::consts::ARCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_urls_are_parsed() {
        let (owner, repo) = repository_info("https://github.com/acme/tool", "github.com").unwrap();
        assert_eq!(owner, "acme");
        assert_eq!(repo, "tool");

        let (owner, repo) = repository_info("github.com/acme/tool.git/", "github.com").unwrap();
        assert_eq!(owner, "acme");
        assert_eq!(repo, "tool");

        assert!(repository_info("https://example.org/acme/tool", "github.com").is_err());
        assert!(repository_info("github.com/acme", "github.com").is_err());
    }

    #[test]
    fn archive_name_placeholders_expand() {
        let name = expand_archive_name("tool-{version}-{os}-{arch}.zip", "v1.2.0");
        assert!(name.starts_with("tool-v1.2.0-"));
        assert!(name.contains(std::env::consts::OS));
        assert!(name.contains(std::env::consts::ARCH));
        assert_eq!(expand_archive_name("tool.zip", "v1.2.0"), "tool.zip");
    }
}
