//! By-extension adapter over downloaded archives
//!
//! The single composition point that keeps the fetch-then-unpack providers
//! uniform: they download into a scratch directory, then hand the file here.

use crate::error::{Error, Result};
use crate::provider::{Provider, Tarball, Zip};
use std::path::Path;

/// Pick the provider matching a downloaded archive's extension.
pub fn decompress(path: &Path) -> Result<Box<dyn Provider>> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if name.ends_with(".zip") {
        Ok(Box::new(Zip::new(path)))
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Ok(Box::new(Tarball::gzipped(path)))
    } else if name.ends_with(".tar") {
        Ok(Box::new(Tarball::new(path)))
    } else {
        Err(Error::Malformed(format!(
            "unsupported archive format: {}",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_on_extension() {
        assert!(decompress(Path::new("/tmp/release.zip")).is_ok());
        assert!(decompress(Path::new("/tmp/release.ZIP")).is_ok());
        assert!(decompress(Path::new("/tmp/release.tar.gz")).is_ok());
        assert!(decompress(Path::new("/tmp/release.tgz")).is_ok());
        assert!(decompress(Path::new("/tmp/release.tar")).is_ok());
    }

    #[test]
    fn unknown_formats_are_malformed() {
        assert!(matches!(
            decompress(Path::new("/tmp/release.rar")),
            Err(Error::Malformed(_))
        ));
        assert!(matches!(
            decompress(Path::new("/tmp/release")),
            Err(Error::Malformed(_))
        ));
    }
}
