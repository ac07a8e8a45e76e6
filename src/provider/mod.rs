//! Read-only access to release stores
//!
//! A [`Provider`] is a uniform streaming view over wherever releases live: a
//! local directory, a zip or tar archive, or a forge's release area. The
//! update engine only ever talks to this trait.
//!
//! Providers guarantee that two walks on the same open handle yield identical
//! sequences, that retrieved bytes are stable for the lifetime of the handle,
//! and that no scratch state survives `close`.

mod bitbucket;
mod decompress;
mod download;
mod github;
mod gitlab;
mod local;
mod tarball;
mod zip;

pub use self::bitbucket::Bitbucket;
pub use self::decompress::decompress;
pub use self::github::Github;
pub use self::gitlab::Gitlab;
pub use self::local::Local;
pub use self::tarball::Tarball;
pub use self::zip::Zip;

use crate::error::{Error, Result};
use crate::version;
use std::path::Path;

/// Relative path of the version sentinel inside a release.
pub const VERSION_SENTINEL: &str = "VERSION";

/// What an archive entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Directory,
    Regular,
    Symlink,
}

/// One entry yielded by [`Provider::walk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Path relative to the archive root, forward-slash separated.
    pub path: String,
    pub kind: FileKind,
    /// Size hint in bytes; zero for directories.
    pub size: u64,
}

impl FileInfo {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_regular(&self) -> bool {
        self.kind == FileKind::Regular
    }
}

/// Callback invoked once per entry during [`Provider::walk`].
///
/// Returning an error aborts the walk and propagates to the caller.
pub type WalkFn<'a> = dyn FnMut(&FileInfo) -> Result<()> + 'a;

/// Capability set every release store implements.
pub trait Provider {
    /// Acquire resources and materialise temporary state if needed
    /// (download + unzip). Opening an open provider is a no-op.
    fn open(&mut self) -> Result<()>;

    /// Release every temporary resource. Idempotent; callers log failures
    /// instead of propagating them.
    fn close(&mut self) -> Result<()>;

    /// Visit each entry exactly once, sorted lexicographically by path.
    fn walk(&mut self, visit: &mut WalkFn) -> Result<()>;

    /// Copy the bytes of the entry at relative path `src` into `dest`,
    /// creating intermediate directories. The destination appears atomically
    /// or not at all.
    fn retrieve(&mut self, src: &str, dest: &Path) -> Result<()>;

    /// Newest version tag known to the backend. Callable without `open`.
    fn latest_version(&self) -> Result<String>;
}

impl Provider for Box<dyn Provider> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn walk(&mut self, visit: &mut WalkFn) -> Result<()> {
        (**self).walk(visit)
    }

    fn retrieve(&mut self, src: &str, dest: &Path) -> Result<()> {
        (**self).retrieve(src, dest)
    }

    fn latest_version(&self) -> Result<String> {
        (**self).latest_version()
    }
}

/// Validate an archive entry path: relative, forward-slash separated, no
/// `..` components. Anything else is treated as a malicious archive.
pub(crate) fn sanitize_entry_path(raw: &str) -> Result<String> {
    if raw.contains('\\') {
        return Err(Error::Malformed(format!(
            "backslash in archive entry path: {raw}"
        )));
    }
    if raw.starts_with('/') || raw.chars().nth(1) == Some(':') {
        return Err(Error::Malformed(format!(
            "absolute archive entry path: {raw}"
        )));
    }
    let trimmed = raw.trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::Malformed("empty archive entry path".into()));
    }
    if trimmed
        .split('/')
        .any(|component| component.is_empty() || component == "." || component == "..")
    {
        return Err(Error::Malformed(format!(
            "unsafe archive entry path: {raw}"
        )));
    }
    Ok(trimmed.to_string())
}

/// Pick the newest tag under the crate's version ordering.
///
/// Forge APIs tend to return tags in date order; that ordering is never
/// trusted here.
pub(crate) fn newest_tag(mut tags: Vec<String>) -> Result<String> {
    tags.sort_by(|a, b| version::compare(a, b));
    tags.pop()
        .ok_or_else(|| Error::NotFound("no tags found in repository".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_paths_are_sanitized() {
        assert_eq!(sanitize_entry_path("bin/tool").unwrap(), "bin/tool");
        assert_eq!(sanitize_entry_path("dir/").unwrap(), "dir");

        assert!(sanitize_entry_path("../evil").is_err());
        assert!(sanitize_entry_path("a/../b").is_err());
        assert!(sanitize_entry_path("/etc/passwd").is_err());
        assert!(sanitize_entry_path("C:/windows").is_err());
        assert!(sanitize_entry_path("a\\b").is_err());
        assert!(sanitize_entry_path("").is_err());
        assert!(sanitize_entry_path("./tool").is_err());
    }

    #[test]
    fn newest_tag_ignores_input_order() {
        let tags = vec![
            "v1.2.0".to_string(),
            "v1.10.0".to_string(),
            "v1.9.0".to_string(),
        ];
        assert_eq!(newest_tag(tags).unwrap(), "v1.10.0");

        let with_pre_release = vec!["v2.0.0-rc1".to_string(), "v2.0.0".to_string()];
        assert_eq!(newest_tag(with_pre_release).unwrap(), "v2.0.0");
    }

    #[test]
    fn newest_tag_requires_at_least_one_tag() {
        assert!(newest_tag(Vec::new()).is_err());
    }
}
