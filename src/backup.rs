use chrono::Local;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default directory, created next to each patched file, holding its backups.
pub const DEFAULT_BACKUP_DIR: &str = "VibeBackups";

/// Pre-write snapshot storage.
pub trait BackupStore: fmt::Debug + Send + Sync {
    /// Copy `target` somewhere safe and return where it went.
    fn backup(&self, target: &Path) -> io::Result<PathBuf>;
}

/// Stores `<dir>/<stem>_<YYYYMMDD_HHMMSS><ext>` beside the target.
///
/// Two backups of one file within the same second get `_1`, `_2`, ...
/// suffixes instead of overwriting each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiblingBackups {
    dir_name: String,
}

impl SiblingBackups {
    pub fn new(dir_name: impl Into<String>) -> Self {
        Self {
            dir_name: dir_name.into(),
        }
    }

    /// Directory receiving backups of `target`.
    pub fn backup_dir(&self, target: &Path) -> PathBuf {
        target
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&self.dir_name)
    }

    fn candidate(&self, target: &Path, stamp: &str, attempt: usize) -> PathBuf {
        let stem = target
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = target
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let name = match attempt {
            0 => format!("{stem}_{stamp}{ext}"),
            n => format!("{stem}_{stamp}_{n}{ext}"),
        };
        self.backup_dir(target).join(name)
    }
}

impl Default for SiblingBackups {
    fn default() -> Self {
        Self::new(DEFAULT_BACKUP_DIR)
    }
}

impl BackupStore for SiblingBackups {
    fn backup(&self, target: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(self.backup_dir(target))?;
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();

        let mut attempt = 0;
        let destination = loop {
            let candidate = self.candidate(target, &stamp, attempt);
            if !candidate.exists() {
                break candidate;
            }
            attempt += 1;
        };

        fs::copy(target, &destination)?;
        debug!(target = %target.display(), backup = %destination.display(), "backed up");
        Ok(destination)
    }
}
