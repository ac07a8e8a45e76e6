//! Provider over a zip archive's central directory

use crate::error::{Error, Result};
use crate::fileio;
use crate::provider::{sanitize_entry_path, FileInfo, FileKind, Provider, WalkFn, VERSION_SENTINEL};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use zip::result::ZipError;
use zip::ZipArchive;

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

pub struct Zip {
    path: PathBuf,
    archive: Option<ZipArchive<File>>,
    entries: Vec<FileInfo>,
}

impl Zip {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            archive: None,
            entries: Vec::new(),
        }
    }

    fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
            _ => Error::Io(e),
        })?;
        ZipArchive::new(file).map_err(|e| Error::Malformed(format!("{}: {e}", path.display())))
    }

    fn index(archive: &mut ZipArchive<File>) -> Result<Vec<FileInfo>> {
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let entry = archive
                .by_index(i)
                .map_err(|e| Error::Malformed(e.to_string()))?;
            let path = sanitize_entry_path(entry.name())?;
            let kind = if entry.is_dir() {
                FileKind::Directory
            } else if entry.unix_mode().is_some_and(|m| m & S_IFMT == S_IFLNK) {
                FileKind::Symlink
            } else {
                FileKind::Regular
            };
            entries.push(FileInfo {
                path,
                kind,
                size: entry.size(),
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }
}

impl Provider for Zip {
    fn open(&mut self) -> Result<()> {
        if self.archive.is_some() {
            return Ok(());
        }
        let mut archive = Self::open_archive(&self.path)?;
        self.entries = Self::index(&mut archive)?;
        self.archive = Some(archive);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.archive = None;
        self.entries.clear();
        Ok(())
    }

    fn walk(&mut self, visit: &mut WalkFn) -> Result<()> {
        if self.archive.is_none() {
            return Err(Error::NotOpen);
        }
        for info in &self.entries {
            visit(info)?;
        }
        Ok(())
    }

    fn retrieve(&mut self, src: &str, dest: &Path) -> Result<()> {
        let archive = self.archive.as_mut().ok_or(Error::NotOpen)?;
        let name = sanitize_entry_path(src)?;
        let mut entry = archive.by_name(&name).map_err(|e| match e {
            ZipError::FileNotFound => Error::EntryMissing(src.to_string()),
            ZipError::Io(io_err) => Error::Io(io_err),
            other => Error::Malformed(other.to_string()),
        })?;
        fileio::write_atomic(dest, |out| {
            io::copy(&mut entry, out)?;
            Ok(())
        })
    }

    fn latest_version(&self) -> Result<String> {
        let mut archive = Self::open_archive(&self.path)?;
        let mut entry = archive.by_name(VERSION_SENTINEL).map_err(|_| {
            Error::NotFound(format!(
                "no {VERSION_SENTINEL} entry in {}",
                self.path.display()
            ))
        })?;
        let mut raw = String::new();
        entry.read_to_string(&mut raw)?;
        Ok(raw.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    fn fixture(path: &Path) {
        write_zip(
            path,
            &[
                ("tool", b"zipped tool".as_slice()),
                (VERSION_SENTINEL, b"v2.0.1\n".as_slice()),
                ("data/readme.txt", b"docs".as_slice()),
            ],
        );
    }

    #[test]
    fn walk_yields_sorted_entries() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("release.zip");
        fixture(&archive);

        let mut provider = Zip::new(&archive);
        provider.open().unwrap();

        let mut paths = Vec::new();
        provider
            .walk(&mut |info| {
                paths.push((info.path.clone(), info.kind));
                Ok(())
            })
            .unwrap();
        assert_eq!(
            paths,
            vec![
                (VERSION_SENTINEL.to_string(), FileKind::Regular),
                ("data/readme.txt".to_string(), FileKind::Regular),
                ("tool".to_string(), FileKind::Regular),
            ]
        );
    }

    #[test]
    fn retrieve_extracts_one_member() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("release.zip");
        fixture(&archive);

        let mut provider = Zip::new(&archive);
        provider.open().unwrap();

        let dest = dir.path().join("out/tool");
        provider.retrieve("tool", &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"zipped tool");

        let err = provider
            .retrieve("missing", &dir.path().join("out/missing"))
            .unwrap_err();
        assert!(matches!(err, Error::EntryMissing(_)));
    }

    #[test]
    fn operations_require_open() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("release.zip");
        fixture(&archive);

        let mut provider = Zip::new(&archive);
        assert!(matches!(
            provider.walk(&mut |_| Ok(())).unwrap_err(),
            Error::NotOpen
        ));
        assert!(matches!(
            provider
                .retrieve("tool", &dir.path().join("x"))
                .unwrap_err(),
            Error::NotOpen
        ));

        // But the version sentinel is readable without open.
        assert_eq!(provider.latest_version().unwrap(), "v2.0.1");
    }

    #[test]
    fn hostile_entry_paths_poison_the_archive() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("evil.zip");
        write_zip(&archive, &[("../evil", b"boom".as_slice())]);

        let mut provider = Zip::new(&archive);
        assert!(matches!(provider.open().unwrap_err(), Error::Malformed(_)));
    }

    #[test]
    fn missing_archive_is_not_found() {
        let mut provider = Zip::new("/no/such/archive.zip");
        assert!(matches!(provider.open().unwrap_err(), Error::NotFound(_)));
    }

    #[test]
    fn garbage_archive_is_malformed() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("garbage.zip");
        fs::write(&archive, b"this is not a zip file").unwrap();

        let mut provider = Zip::new(&archive);
        assert!(matches!(provider.open().unwrap_err(), Error::Malformed(_)));
    }
}
