//! Batch orchestration: apply a document's records in order.
//!
//! Every record is validated before the first one is applied, so a schema
//! error never leaves a half-patched tree. Application is sequential and each
//! record sees the output of the ones before it: on disk for live runs, and
//! through an in-memory overlay for dry runs.

use super::applicator::{
    apply_at, patch_text, read_target, resolve_target, starting_text, ApplyError, ApplyOptions,
    ApplyOutcome,
};
use super::parser::{parse, ParseError, RawPatch};
use super::schema::{PatchKind, PatchRecord};
use super::validator::validate;
use crate::edit::atomic_write;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Outcome of one record within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordOutcome {
    /// 0-based position in the document
    pub index: usize,
    /// 1-based line of the record
    pub line: usize,
    pub kind: PatchKind,
    pub outcome: ApplyOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<RecordOutcome>,
    /// Final text of every touched file (dry runs only)
    pub files: BTreeMap<PathBuf, String>,
}

impl BatchReport {
    /// Files whose content a live run actually changed.
    pub fn changed_files(&self) -> Vec<&Path> {
        let mut files: Vec<&Path> = self
            .outcomes
            .iter()
            .filter(|o| matches!(o.outcome, ApplyOutcome::Written { changed: true, .. }))
            .map(|o| o.outcome.file())
            .collect();
        files.sort();
        files.dedup();
        files
    }
}

#[derive(Error, Debug)]
#[error("record {} (line {}) failed: {source}", .index + 1, .line)]
pub struct BatchError {
    pub index: usize,
    pub line: usize,
    /// Records that completed before the failure
    pub applied: Vec<RecordOutcome>,
    /// Files restored from their pre-batch snapshot
    pub rolled_back: Vec<PathBuf>,
    #[source]
    pub source: ApplyError,
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Batch(#[from] BatchError),
}

/// Parse `document` and apply all of its records under `root`.
pub fn apply_document(
    document: &str,
    root: &Path,
    options: &ApplyOptions,
) -> Result<BatchReport, DocumentError> {
    let records = parse(document)?;
    Ok(apply_batch(&records, root, options)?)
}

/// Validate, then apply, `records` in order.
pub fn apply_batch(
    records: &[RawPatch],
    root: &Path,
    options: &ApplyOptions,
) -> Result<BatchReport, BatchError> {
    let validated = records
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            validate(raw).map_err(|e| BatchError {
                index,
                line: raw.line,
                applied: Vec::new(),
                rolled_back: Vec::new(),
                source: e.into(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut run = BatchRun {
        root,
        options,
        report: BatchReport::default(),
        snapshots: BTreeMap::new(),
    };
    for (index, record) in validated.iter().enumerate() {
        let outcome = match run.apply_one(record) {
            Ok(outcome) => outcome,
            Err(source) => {
                let rolled_back = run.restore_snapshots();
                return Err(BatchError {
                    index,
                    line: record.line,
                    applied: run.report.outcomes,
                    rolled_back,
                    source,
                });
            }
        };
        run.report.outcomes.push(RecordOutcome {
            index,
            line: record.line,
            kind: record.kind(),
            outcome,
        });
    }

    info!(
        records = run.report.outcomes.len(),
        dry_run = options.dry_run,
        "batch complete"
    );
    Ok(run.report)
}

struct BatchRun<'a> {
    root: &'a Path,
    options: &'a ApplyOptions,
    report: BatchReport,
    /// Pre-batch bytes of each written file; `None` when it did not exist
    snapshots: BTreeMap<PathBuf, Option<Vec<u8>>>,
}

impl BatchRun<'_> {
    fn apply_one(&mut self, record: &PatchRecord) -> Result<ApplyOutcome, ApplyError> {
        let target = resolve_target(record, self.root)?;

        if self.options.dry_run {
            let current = match self.report.files.get(&target) {
                Some(text) => Some(text.clone()),
                None => read_target(&target)?,
            };
            let text = starting_text(record, &target, current.as_deref())?;
            let patched = patch_text(record, text, &target, self.options)?;
            self.report.files.insert(target.clone(), patched.clone());
            return Ok(ApplyOutcome::Preview {
                file: target,
                text: patched,
            });
        }

        if self.options.rollback_on_failure && !self.snapshots.contains_key(&target) {
            let snapshot = match fs::read(&target) {
                Ok(bytes) => Some(bytes),
                Err(e) if e.kind() == io::ErrorKind::NotFound => None,
                Err(source) => {
                    return Err(ApplyError::Io {
                        path: target,
                        source,
                    })
                }
            };
            self.snapshots.insert(target.clone(), snapshot);
        }
        apply_at(record, target, self.options)
    }

    /// Put every snapshotted file back; returns the paths restored.
    fn restore_snapshots(&mut self) -> Vec<PathBuf> {
        let mut restored = Vec::new();
        for (path, snapshot) in std::mem::take(&mut self.snapshots) {
            let result = match &snapshot {
                Some(bytes) => atomic_write(&path, bytes).map_err(|e| e.to_string()),
                None => match fs::remove_file(&path) {
                    Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                    other => other.map_err(|e| e.to_string()),
                },
            };
            match result {
                Ok(()) => {
                    info!(file = %path.display(), "rolled back");
                    restored.push(path);
                }
                Err(err) => warn!(file = %path.display(), %err, "rollback failed"),
            }
        }
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ADD_THEN_REMOVE: &str = "VibeSpec: 1.6
patch_type: add_function
file: m.py
code: |
  def foo():
      return 1
patch_type: remove_function
file: m.py
name: foo
--- code
";

    #[test]
    fn dry_batch_composes_through_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let report = apply_document(ADD_THEN_REMOVE, dir.path(), &ApplyOptions::dry_run()).unwrap();

        assert_eq!(report.outcomes.len(), 2);
        let text = report.files.values().next().unwrap();
        assert!(!text.contains("foo"), "{text}");
        assert!(!dir.path().join("m.py").exists());
    }

    #[test]
    fn validation_failure_aborts_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let doc = "VibeSpec: 1.6
patch_type: add_block
file: a.py
position: end
code: |
  x = 1
patch_type: replace_function
file: a.py
code: |
  def f():
      pass
";
        let options = ApplyOptions::default().without_backups();
        let err = apply_document(doc, dir.path(), &options).unwrap_err();
        match err {
            DocumentError::Batch(err) => {
                assert_eq!(err.index, 1);
                assert!(err.applied.is_empty());
                assert!(matches!(err.source, ApplyError::Validation(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dir.path().join("a.py").exists());
    }

    #[test]
    fn rollback_restores_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.py"), "x = 1\n").unwrap();
        let doc = "VibeSpec: 1.6
patch_type: add_block
file: keep.py
position: end
code: |
  y = 2
patch_type: add_class
file: new.py
code: |
  class A:
      pass
patch_type: remove_function
file: missing.py
name: f
--- code
";
        let options = ApplyOptions {
            rollback_on_failure: true,
            ..ApplyOptions::default().without_backups()
        };
        let err = apply_document(doc, dir.path(), &options).unwrap_err();
        let DocumentError::Batch(err) = err else {
            panic!("expected batch error");
        };
        assert_eq!(err.index, 2);
        assert_eq!(err.applied.len(), 2);
        assert!(matches!(err.source, ApplyError::TargetNotFound(_)));
        assert_eq!(err.rolled_back.len(), 2);

        assert_eq!(fs::read_to_string(dir.path().join("keep.py")).unwrap(), "x = 1\n");
        assert!(!dir.path().join("new.py").exists());
    }

    #[test]
    fn without_rollback_earlier_writes_stay() {
        let dir = tempfile::tempdir().unwrap();
        let doc = "VibeSpec: 1.6
patch_type: add_class
file: new.py
code: |
  class A:
      pass
patch_type: remove_class
file: missing.py
name: A
--- code
";
        let options = ApplyOptions::default().without_backups();
        let err = apply_document(doc, dir.path(), &options).unwrap_err();
        let DocumentError::Batch(err) = err else {
            panic!("expected batch error");
        };
        assert!(err.rolled_back.is_empty());
        assert_eq!(
            fs::read_to_string(dir.path().join("new.py")).unwrap(),
            "class A:\n    pass\n"
        );
    }
}
