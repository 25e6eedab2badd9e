//! End-to-end tests against temporary workspaces.

mod cli;
mod properties;
mod scenarios;
mod workflow;

use std::fs;
use std::path::Path;
use tempfile::TempDir;
use vibe_patcher::{apply_document, ApplyOptions, BatchReport, DocumentError};

/// Create a workspace holding `files` (relative path, content).
pub fn workspace(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (relative, content) in files {
        let path = dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
    dir
}

pub fn read(dir: &TempDir, relative: &str) -> String {
    fs::read_to_string(dir.path().join(relative)).unwrap()
}

/// Live options without backups, so workspaces only hold what tests write.
pub fn live() -> ApplyOptions {
    ApplyOptions::default().without_backups()
}

pub fn run(document: &str, dir: &Path, options: &ApplyOptions) -> Result<BatchReport, DocumentError> {
    apply_document(document, dir, options)
}

/// Dry-run `document` against a single `t.py` holding `source` and return
/// its final text.
pub fn preview(document: &str, source: &str) -> String {
    let dir = workspace(&[("t.py", source)]);
    let report = run(document, dir.path(), &ApplyOptions::dry_run()).unwrap();
    assert_eq!(read(&dir, "t.py"), source, "dry run must not write");
    report.files.into_values().next().unwrap()
}
