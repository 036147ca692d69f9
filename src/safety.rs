use std::fs;
use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;

use crate::error::{EngineError, Result};

const BACKUP_SUFFIX: &str = ".mutscope.bak";

pub fn backup_path(source_file: &Path) -> PathBuf {
    let mut backup = source_file.to_path_buf();
    let name = format!(
        ".{}{}",
        source_file.file_name().unwrap_or_default().to_string_lossy(),
        BACKUP_SUFFIX
    );
    backup.set_file_name(name);
    backup
}

pub fn is_backup_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(BACKUP_SUFFIX)
}

/// The file a sidecar belongs to.
fn original_for_backup(backup: &Path) -> Option<PathBuf> {
    let name = backup.file_name()?.to_str()?;
    let original = name.strip_prefix('.')?.strip_suffix(BACKUP_SUFFIX)?;
    Some(backup.with_file_name(original))
}

/// Check if a backup file exists from a previous interrupted run.
pub fn check_interrupted_run(source_file: &Path) -> Option<PathBuf> {
    let bak = backup_path(source_file);
    if bak.exists() { Some(bak) } else { None }
}

pub fn restore_from_backup(source_file: &Path, backup_file: &Path) -> std::io::Result<()> {
    fs::copy(backup_file, source_file)?;
    fs::remove_file(backup_file)?;
    Ok(())
}

/// Restores every file under `root` that still has a sidecar. Returns the
/// restored files.
pub fn recover_backups(root: &Path) -> Result<Vec<PathBuf>> {
    let mut restored = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                pending.push(path);
                continue;
            }
            let is_backup = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_backup_name);
            if !is_backup {
                continue;
            }
            if let Some(original) = original_for_backup(&path) {
                log::warn!(
                    "Restoring {} from a backup left by an interrupted run",
                    original.display()
                );
                restore_from_backup(&original, &path)?;
                restored.push(original);
            }
        }
    }
    restored.sort();
    Ok(restored)
}

fn restore_failure(path: &Path, reason: impl Into<String>) -> EngineError {
    EngineError::RestoreFailure {
        path: Utf8PathBuf::from(path.to_string_lossy().into_owned()),
        reason: reason.into(),
    }
}

/// The exact bytes of a file at one moment.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl FileSnapshot {
    pub fn capture(path: &Path) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            bytes: fs::read(path)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Writes the captured bytes back and reads them again to make sure
    /// they landed.
    pub fn restore(&self) -> Result<()> {
        fs::write(&self.path, &self.bytes)
            .map_err(|e| restore_failure(&self.path, e.to_string()))?;
        let current = fs::read(&self.path).map_err(|e| restore_failure(&self.path, e.to_string()))?;
        if current != self.bytes {
            return Err(restore_failure(&self.path, "content differs after write"));
        }
        Ok(())
    }
}

/// A file holding mutated text. The original comes back on [`release`], or
/// on drop if the guard is abandoned (early return, unwinding panic).
///
/// [`release`]: MutationGuard::release
#[derive(Debug)]
pub struct MutationGuard {
    snapshot: FileSnapshot,
    backup: PathBuf,
    released: bool,
}

impl MutationGuard {
    pub fn acquire(path: &Path, mutated: &str) -> Result<Self> {
        let snapshot = FileSnapshot::capture(path)?;
        let backup = backup_path(path);
        fs::write(&backup, snapshot.bytes())?;
        let guard = Self {
            snapshot,
            backup,
            released: false,
        };
        // From here on the guard restores on drop, even if this write fails.
        fs::write(path, mutated)?;
        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        self.snapshot.path()
    }

    /// Restores and verifies the original. The sidecar is only removed once
    /// the file is known to be intact.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.snapshot.restore()?;
        fs::remove_file(&self.backup).map_err(|e| restore_failure(&self.backup, e.to_string()))?;
        Ok(())
    }
}

impl Drop for MutationGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match self.snapshot.restore() {
            Ok(()) => {
                let _ = fs::remove_file(&self.backup);
            }
            Err(e) => log::error!("{}", e),
        }
    }
}
