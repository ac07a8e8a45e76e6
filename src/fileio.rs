//! Filesystem helpers shared by the providers and the engine

use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};

/// Create a fresh scratch directory, removed when the handle is dropped.
pub fn scratch_dir() -> Result<TempDir> {
    Ok(tempfile::tempdir()?)
}

/// True if `path` exists and is a regular file.
pub fn file_exists(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

/// Copy `src` to `dest`, creating intermediate directories.
///
/// The destination appears atomically: bytes land in a temp file next to
/// `dest` which is then renamed into place.
pub fn copy_file(src: &Path, dest: &Path) -> Result<()> {
    let mut input = File::open(src)?;
    write_atomic(dest, |out| {
        io::copy(&mut input, out)?;
        Ok(())
    })
}

/// Write `dest` atomically with the bytes produced by `fill`.
pub fn write_atomic(dest: &Path, fill: impl FnOnce(&mut File) -> Result<()>) -> Result<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| Error::Config(format!("destination has no parent: {}", dest.display())))?;
    fs::create_dir_all(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    fill(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}
