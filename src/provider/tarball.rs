//! Provider over a tar archive, optionally gzip-compressed
//!
//! Tar has no central directory, so the entry list is indexed up front for
//! sorted walking and `retrieve` rescans the archive.

use crate::error::{Error, Result};
use crate::fileio;
use crate::provider::{sanitize_entry_path, FileInfo, FileKind, Provider, WalkFn, VERSION_SENTINEL};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tar::{Archive, EntryType};

pub struct Tarball {
    path: PathBuf,
    gzipped: bool,
    entries: Option<Vec<FileInfo>>,
}

impl Tarball {
    /// Plain `.tar` archive.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            gzipped: false,
            entries: None,
        }
    }

    /// Gzip-compressed `.tar.gz` / `.tgz` archive.
    pub fn gzipped(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            gzipped: true,
            entries: None,
        }
    }

    fn reader(&self) -> Result<Box<dyn Read>> {
        let file = File::open(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound(self.path.display().to_string()),
            _ => Error::Io(e),
        })?;
        if self.gzipped {
            Ok(Box::new(GzDecoder::new(file)))
        } else {
            Ok(Box::new(file))
        }
    }

    fn entry_kind(entry_type: EntryType) -> Option<FileKind> {
        if entry_type.is_dir() {
            Some(FileKind::Directory)
        } else if entry_type == EntryType::Symlink || entry_type == EntryType::Link {
            Some(FileKind::Symlink)
        } else if entry_type.is_file() {
            Some(FileKind::Regular)
        } else {
            // Pax extension headers and other bookkeeping entries.
            None
        }
    }

    fn index(&self) -> Result<Vec<FileInfo>> {
        let mut archive = Archive::new(self.reader()?);
        let mut entries = Vec::new();
        for entry in archive
            .entries()
            .map_err(|e| Error::Malformed(e.to_string()))?
        {
            let entry = entry.map_err(|e| Error::Malformed(e.to_string()))?;
            let Some(kind) = Self::entry_kind(entry.header().entry_type()) else {
                continue;
            };
            let raw = entry
                .path()
                .map_err(|e| Error::Malformed(e.to_string()))?
                .to_string_lossy()
                .into_owned();
            let path = sanitize_entry_path(&raw)?;
            let size = entry.header().size().unwrap_or(0);
            entries.push(FileInfo { path, kind, size });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }
}

impl Provider for Tarball {
    fn open(&mut self) -> Result<()> {
        if self.entries.is_some() {
            return Ok(());
        }
        self.entries = Some(self.index()?);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.entries = None;
        Ok(())
    }

    fn walk(&mut self, visit: &mut WalkFn) -> Result<()> {
        let entries = self.entries.as_ref().ok_or(Error::NotOpen)?;
        for info in entries {
            visit(info)?;
        }
        Ok(())
    }

    fn retrieve(&mut self, src: &str, dest: &Path) -> Result<()> {
        if self.entries.is_none() {
            return Err(Error::NotOpen);
        }
        let want = sanitize_entry_path(src)?;
        let mut archive = Archive::new(self.reader()?);
        for entry in archive
            .entries()
            .map_err(|e| Error::Malformed(e.to_string()))?
        {
            let mut entry = entry.map_err(|e| Error::Malformed(e.to_string()))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let raw = entry
                .path()
                .map_err(|e| Error::Malformed(e.to_string()))?
                .to_string_lossy()
                .into_owned();
            if sanitize_entry_path(&raw)? == want {
                return fileio::write_atomic(dest, |out| {
                    io::copy(&mut entry, out)?;
                    Ok(())
                });
            }
        }
        Err(Error::EntryMissing(src.to_string()))
    }

    fn latest_version(&self) -> Result<String> {
        let mut archive = Archive::new(self.reader()?);
        for entry in archive
            .entries()
            .map_err(|e| Error::Malformed(e.to_string()))?
        {
            let mut entry = entry.map_err(|e| Error::Malformed(e.to_string()))?;
            let path = entry.path().map_err(|e| Error::Malformed(e.to_string()))?;
            if path.as_ref() == Path::new(VERSION_SENTINEL) {
                let mut raw = String::new();
                entry.read_to_string(&mut raw)?;
                return Ok(raw.trim().to_string());
            }
        }
        Err(Error::NotFound(format!(
            "no {VERSION_SENTINEL} entry in {}",
            self.path.display()
        )))
    }
}
