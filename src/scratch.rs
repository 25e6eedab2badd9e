//! Isolated previews.
//!
//! Every target of a document is copied into a private temporary directory,
//! the document is applied there for real, and the before/after text of each
//! target is reported. The directory is dropped afterwards and the workspace
//! is never written.

use crate::edit::read_optional;
use crate::patch::{apply_batch, ApplyOptions, BatchError, RawPatch};
use crate::safety::{SafetyError, WorkspaceGuard};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilePreview {
    /// Path relative to the workspace root
    pub file: PathBuf,
    /// Content before the document ran; `None` if the file did not exist
    pub before: Option<String>,
    /// Content after; `None` if the file still does not exist
    pub after: Option<String>,
}

impl FilePreview {
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

#[derive(Error, Debug)]
pub enum ScratchError {
    #[error("scratch I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Unsafe(#[from] SafetyError),

    #[error(transparent)]
    Batch(#[from] BatchError),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ScratchError + '_ {
    move |source| ScratchError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Apply `records` to a scratch copy of their targets under `root`.
///
/// Dry-run and backup settings in `options` are ignored: the scratch run is
/// live and keeps no backups.
pub fn preview_in_scratch(
    records: &[RawPatch],
    root: &Path,
    options: &ApplyOptions,
) -> Result<Vec<FilePreview>, ScratchError> {
    let guard = WorkspaceGuard::new(root)?;
    let mut targets = BTreeSet::new();
    for record in records {
        let Some(file) = record.get("file").map(str::trim).filter(|f| !f.is_empty()) else {
            continue;
        };
        let resolved = guard.resolve(file)?;
        if let Ok(relative) = resolved.strip_prefix(guard.workspace_root()) {
            targets.insert(relative.to_path_buf());
        }
    }

    let scratch = tempfile::Builder::new()
        .prefix("vibe-scratch")
        .tempdir()
        .map_err(io_error(Path::new("<tempdir>")))?;
    debug!(dir = %scratch.path().display(), files = targets.len(), "prepared scratch copy");

    let mut befores = Vec::with_capacity(targets.len());
    for relative in &targets {
        let real = guard.workspace_root().join(relative);
        let before = read_optional(&real).map_err(io_error(&real))?;
        if let Some(text) = &before {
            let copy = scratch.path().join(relative);
            if let Some(parent) = copy.parent() {
                fs::create_dir_all(parent).map_err(io_error(parent))?;
            }
            fs::write(&copy, text).map_err(io_error(&copy))?;
        }
        befores.push(before);
    }

    let live = ApplyOptions {
        dry_run: false,
        backup: None,
        ..options.clone()
    };
    let _ = apply_batch(records, scratch.path(), &live)?;

    targets
        .into_iter()
        .zip(befores)
        .map(|(file, before)| {
            let copy = scratch.path().join(&file);
            let after = read_optional(&copy).map_err(io_error(&copy))?;
            Ok(FilePreview {
                file,
                before,
                after,
            })
        })
        .collect()
}
