//! The update engine: staging, atomic swap, rollback, recovery
//!
//! The engine drives one synchronous state machine per update attempt:
//!
//! ```text
//! CanUpdate -> OpenProvider -> Verify -> LocateExe
//!           -> StageNew -> BackupOld -> PromoteNew
//! ```
//!
//! `BackupOld` and `PromoteNew` are same-directory renames, so every failure
//! before `BackupOld` leaves the installation byte-identical, and a failure
//! after it is recoverable through [`Updater::rollback`].

use crate::crypto;
use crate::error::{Error, Result};
use crate::fileio;
use crate::provider::Provider;
use crate::verifier;
use crate::version;
use rsa::RsaPublicKey;
use std::env::consts::EXE_SUFFIX;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const STAGED_SUFFIX: &str = ".new";
const BACKUP_SUFFIX: &str = ".old";
const DISCARDED_SUFFIX: &str = ".new.discarded";

/// Outcome of an [`Updater::update`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// The embedded version is already the newest the provider knows.
    UpToDate,
    /// The executable was replaced; the previous binary is kept for rollback.
    Updated,
    /// No verdict; only reported alongside an error.
    Unknown,
}

/// Self-update engine for the running executable.
pub struct Updater<P: Provider> {
    provider: P,
    executable_name: String,
    version: String,
    public_key: Option<RsaPublicKey>,
    override_executable: Option<PathBuf>,
}

impl<P: Provider> Updater<P> {
    /// `executable_name` is the base name of the binary inside the release
    /// archive; the host platform's executable suffix is appended at
    /// retrieval time. `version` is the embedded current version.
    pub fn new(
        provider: P,
        executable_name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            executable_name: executable_name.into(),
            version: version.into(),
            public_key: None,
            override_executable: None,
        }
    }

    /// Trust `key` for release verification. Without a key the engine runs
    /// in unsigned mode and applies releases as-is.
    pub fn with_public_key(mut self, key: RsaPublicKey) -> Self {
        self.public_key = Some(key);
        self
    }

    /// Use `path` instead of the auto-detected running binary (tests).
    pub fn with_override_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_executable = Some(path.into());
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Newest version advertised by the provider.
    pub fn latest_version(&self) -> Result<String> {
        self.provider.latest_version()
    }

    /// True iff the provider advertises a strictly newer version. Has no
    /// side effects on disk.
    pub fn can_update(&self) -> Result<bool> {
        let latest = self.provider.latest_version()?;
        Ok(version::is_newer(&latest, &self.version))
    }

    /// Absolute, symlink-resolved path of the running binary.
    pub fn executable(&self) -> Result<PathBuf> {
        let path = match &self.override_executable {
            Some(path) => path.clone(),
            None => std::env::current_exe()?,
        };
        // Canonicalisation fails when the live binary is missing (the
        // interrupted-update states); recovery still needs the raw path.
        Ok(fs::canonicalize(&path).unwrap_or(path))
    }

    /// Drive the full update state machine.
    pub fn update(&mut self) -> Result<UpdateStatus> {
        let latest = self.provider.latest_version()?;
        if !version::is_newer(&latest, &self.version) {
            debug!(current = %self.version, %latest, "already up to date");
            return Ok(UpdateStatus::UpToDate);
        }
        info!(current = %self.version, %latest, "update available");

        self.provider.open()?;
        let outcome = self.stage_and_promote();
        if let Err(err) = self.provider.close() {
            warn!("failed to close provider: {err}");
        }
        outcome
    }

    fn stage_and_promote(&mut self) -> Result<UpdateStatus> {
        let scratch = fileio::scratch_dir()?;
        let archive_exe = format!("{}{}", self.executable_name, EXE_SUFFIX);

        let (candidate, digest) = match &self.public_key {
            Some(key) => {
                let verified = verifier::verify(&mut self.provider, key, scratch.path())?;
                let file = verified.get(&archive_exe).ok_or_else(|| {
                    Error::NotFound(format!("executable {archive_exe} missing from release"))
                })?;
                (file.scratch_path.clone(), file.digest)
            }
            None => {
                warn!("no public key configured, applying unsigned release");
                let dest = scratch.path().join(&archive_exe);
                self.provider.retrieve(&archive_exe, &dest)?;
                let digest = crypto::sha256_file(&dest)?;
                (dest, digest)
            }
        };

        let exe = self.executable()?;
        let staged = path_with_suffix(&exe, STAGED_SUFFIX);
        stage(&candidate, &staged, &exe)?;

        // The bytes about to be promoted must still be the bytes that were
        // verified.
        let staged_digest = crypto::sha256_file(&staged)?;
        if staged_digest != digest {
            let _ = fs::remove_file(&staged);
            return Err(Error::StageCorruption {
                expected: hex::encode(digest),
                actual: hex::encode(staged_digest),
            });
        }

        ensure_same_device(&staged, &exe)?;
        backup_then_promote(&exe, &staged)?;
        info!(executable = %exe.display(), "update applied");
        Ok(UpdateStatus::Updated)
    }

    /// Restore the previous binary from `<exe>.old`.
    pub fn rollback(&self) -> Result<()> {
        let exe = self.executable()?;
        let backup = path_with_suffix(&exe, BACKUP_SUFFIX);
        if !fileio::file_exists(&backup) {
            return Err(Error::NoBackup);
        }
        let discarded = path_with_suffix(&exe, DISCARDED_SUFFIX);
        let had_live_binary = fileio::file_exists(&exe);
        if had_live_binary {
            fs::rename(&exe, &discarded)?;
        }
        if let Err(err) = fs::rename(&backup, &exe) {
            if had_live_binary {
                if let Err(undo) = fs::rename(&discarded, &exe) {
                    warn!("failed to restore discarded binary: {undo}");
                }
            }
            return Err(Error::Io(err));
        }
        if had_live_binary {
            if let Err(err) = fs::remove_file(&discarded) {
                warn!(path = %discarded.display(), "could not remove discarded binary: {err}");
            }
        }
        info!(executable = %exe.display(), "previous binary restored");
        Ok(())
    }

    /// Repair the installation to the nearest consistent state after an
    /// interrupted update: a missing live binary is restored from the backup,
    /// or promoted from a staged candidate as a last resort; stale staging
    /// artifacts are discarded when the live binary is intact.
    pub fn recover(&self) -> Result<()> {
        let exe = self.executable()?;
        let backup = path_with_suffix(&exe, BACKUP_SUFFIX);
        let staged = path_with_suffix(&exe, STAGED_SUFFIX);
        let discarded = path_with_suffix(&exe, DISCARDED_SUFFIX);

        if !fileio::file_exists(&exe) {
            if fileio::file_exists(&backup) {
                info!("live binary missing, restoring backup");
                fs::rename(&backup, &exe)?;
            } else if fileio::file_exists(&staged) {
                info!("live binary missing, promoting staged candidate");
                fs::rename(&staged, &exe)?;
            } else {
                return Err(Error::NotFound(format!(
                    "nothing to recover at {}",
                    exe.display()
                )));
            }
        }
        for leftover in [&staged, &discarded] {
            if fileio::file_exists(leftover) {
                warn!(path = %leftover.display(), "discarding stale update artifact");
                fs::remove_file(leftover)?;
            }
        }
        Ok(())
    }
}

/// `<exe>` -> `<exe><suffix>` (appended to the file name, keeping any
/// existing extension).
fn path_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Copy the verified candidate to `staged`, carrying over the live binary's
/// permission bits plus owner-execute.
fn stage(candidate: &Path, staged: &Path, exe: &Path) -> Result<()> {
    fileio::copy_file(candidate, staged)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(exe)?.permissions().mode() | 0o100;
        fs::set_permissions(staged, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    {
        let _ = exe;
    }
    Ok(())
}

/// Backup and promotion are same-directory renames; a staged file on another
/// device would silently turn them into copies, so refuse up front.
fn ensure_same_device(staged: &Path, exe: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        if fs::metadata(staged)?.dev() != fs::metadata(exe)?.dev() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "staged executable is on a different device than the target",
            )));
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (staged, exe);
    }
    Ok(())
}

fn backup_then_promote(exe: &Path, staged: &Path) -> Result<()> {
    let backup = path_with_suffix(exe, BACKUP_SUFFIX);
    rotate_backup(&backup)?;
    fs::rename(exe, &backup)?;
    if let Err(err) = fs::rename(staged, exe) {
        return Err(Error::PromoteFailed(err));
    }
    Ok(())
}

/// A backup left behind by an interrupted earlier run is kept as
/// `<exe>.old.<n>` with the smallest unused `n`; only `<exe>.old` itself is
/// visible to rollback.
fn rotate_backup(backup: &Path) -> Result<()> {
    if !fileio::file_exists(backup) {
        return Ok(());
    }
    let mut n = 1usize;
    loop {
        let generation = path_with_suffix(backup, &format!(".{n}"));
        if !generation.exists() {
            warn!(from = %backup.display(), to = %generation.display(), "rotating stale backup");
            fs::rename(backup, &generation)?;
            return Ok(());
        }
        n += 1;
    }
}
