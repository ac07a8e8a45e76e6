//! Provider over a plain release directory on disk

use crate::error::{Error, Result};
use crate::fileio;
use crate::provider::{sanitize_entry_path, FileInfo, FileKind, Provider, WalkFn, VERSION_SENTINEL};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub struct Local {
    root: PathBuf,
    open: bool,
}

impl Local {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            open: false,
        }
    }

    fn entry_path(&self, src: &str) -> Result<PathBuf> {
        Ok(self.root.join(sanitize_entry_path(src)?))
    }
}

impl Provider for Local {
    fn open(&mut self) -> Result<()> {
        if self.open {
            return Ok(());
        }
        if !self.root.is_dir() {
            return Err(Error::NotFound(self.root.display().to_string()));
        }
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }

    fn walk(&mut self, visit: &mut WalkFn) -> Result<()> {
        if !self.open {
            return Err(Error::NotOpen);
        }
        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1) {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            let rel = entry.path().strip_prefix(&self.root).map_err(|_| {
                Error::Malformed(format!(
                    "entry escapes release root: {}",
                    entry.path().display()
                ))
            })?;
            let path = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let file_type = entry.file_type();
            let kind = if file_type.is_symlink() {
                FileKind::Symlink
            } else if file_type.is_dir() {
                FileKind::Directory
            } else {
                FileKind::Regular
            };
            let size = match kind {
                FileKind::Regular => entry.metadata().map(|m| m.len()).unwrap_or(0),
                _ => 0,
            };
            entries.push(FileInfo { path, kind, size });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        for info in &entries {
            visit(info)?;
        }
        Ok(())
    }

    fn retrieve(&mut self, src: &str, dest: &Path) -> Result<()> {
        if !self.open {
            return Err(Error::NotOpen);
        }
        let source = self.entry_path(src)?;
        if !fileio::file_exists(&source) {
            return Err(Error::EntryMissing(src.to_string()));
        }
        fileio::copy_file(&source, dest)
    }

    fn latest_version(&self) -> Result<String> {
        let sentinel = self.root.join(VERSION_SENTINEL);
        let raw = fs::read_to_string(&sentinel).map_err(|_| {
            Error::NotFound(format!(
                "no {VERSION_SENTINEL} sentinel in {}",
                self.root.display()
            ))
        })?;
        Ok(raw.trim().to_string())
    }
}
