//! Patch applicator - turns a validated record into an edit of its target
//!
//! Named-construct records are upserts: the construct is replaced in place
//! when the target defines it and inserted at its natural position when it
//! does not. Removals of absent constructs are no-ops. Block records resolve
//! their anchors against the current lines. Every result is normalized for
//! blank-line spacing before it is returned or written.

use super::parser::ParseError;
use super::schema::{AnchorPair, BlockPosition, PatchOp, PatchRecord};
use super::validator::ValidationError;
use crate::backup::{BackupStore, SiblingBackups};
use crate::block::{self, InsertionPoint};
use crate::edit::{
    atomic_write, join_lines, leading_ws, read_optional, reindent, split_lines, EditError, Splice,
    SpliceResult,
};
use crate::locate::indent::{body_indent, declared_names};
use crate::locate::{
    ConstructKind, ConstructTarget, ExtentFinder, ExtentStrategy, LocateError, Locator,
};
use crate::safety::{SafetyError, WorkspaceGuard};
use crate::spacing::{self, SpacingRules};
use crate::ts::introduces_syntax_errors;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Minimum Jaro-Winkler similarity for a "did you mean" hint.
const SUGGESTION_THRESHOLD: f64 = 0.8;

/// Knobs for one apply run.
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Compute results without touching disk
    pub dry_run: bool,
    /// Missing targets and anchors are errors instead of warnings
    pub strict: bool,
    /// Batch only: restore touched files when a later record fails
    pub rollback_on_failure: bool,
    pub strategy: ExtentStrategy,
    pub spacing: SpacingRules,
    /// Where pre-write snapshots go; `None` disables backups
    pub backup: Option<Arc<dyn BackupStore>>,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            strict: false,
            rollback_on_failure: false,
            strategy: ExtentStrategy::default(),
            spacing: SpacingRules::default(),
            backup: Some(Arc::new(SiblingBackups::default())),
        }
    }
}

impl ApplyOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }

    pub fn without_backups(mut self) -> Self {
        self.backup = None;
        self
    }
}

/// Result of applying a single record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
#[must_use = "ApplyOutcome should be reported"]
pub enum ApplyOutcome {
    /// Dry run: the text the target would have
    Preview { file: PathBuf, text: String },
    /// Live run
    Written {
        file: PathBuf,
        /// Snapshot taken before the write, if any
        backup: Option<PathBuf>,
        /// The target did not exist before
        created: bool,
        /// Content differed and was written
        changed: bool,
    },
}

impl ApplyOutcome {
    pub fn file(&self) -> &Path {
        match self {
            ApplyOutcome::Preview { file, .. } | ApplyOutcome::Written { file, .. } => file,
        }
    }
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyOutcome::Preview { file, .. } => write!(f, "Would patch {}", file.display()),
            ApplyOutcome::Written {
                file,
                changed: false,
                ..
            } => write!(f, "Already up to date: {}", file.display()),
            ApplyOutcome::Written {
                file,
                created: true,
                ..
            } => write!(f, "Created {}", file.display()),
            ApplyOutcome::Written {
                file,
                backup: Some(backup),
                ..
            } => write!(f, "Patched {} (backup: {})", file.display(), backup.display()),
            ApplyOutcome::Written { file, .. } => write!(f, "Patched {}", file.display()),
        }
    }
}

/// Errors during patch application
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("target file not found: {}", .0.display())]
    TargetNotFound(PathBuf),

    #[error("{target} not found in {}{}", .file.display(), hint(.suggestion))]
    ConstructNotFound {
        file: PathBuf,
        target: String,
        suggestion: Option<String>,
    },

    #[error("anchor {pattern} matched no line in {}", .file.display())]
    AnchorNotFound { file: PathBuf, pattern: String },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Unsafe(#[from] SafetyError),

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error("edit failed on {}: {source}", .file.display())]
    Edit {
        file: PathBuf,
        #[source]
        source: EditError,
    },
}

fn hint(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" (did you mean `{s}`?)"))
        .unwrap_or_default()
}

/// Resolve a record's target inside `root`.
pub fn resolve_target(record: &PatchRecord, root: &Path) -> Result<PathBuf, ApplyError> {
    Ok(WorkspaceGuard::new(root)?.resolve(&record.file)?)
}

pub(crate) fn read_target(target: &Path) -> Result<Option<String>, ApplyError> {
    read_optional(target).map_err(|source| ApplyError::Io {
        path: target.to_path_buf(),
        source,
    })
}

/// Text a record starts from: the current content, or empty for
/// record kinds that create missing files.
pub(crate) fn starting_text<'s>(
    record: &PatchRecord,
    target: &Path,
    existing: Option<&'s str>,
) -> Result<&'s str, ApplyError> {
    match existing {
        Some(text) => Ok(text),
        None if record.kind().creates_missing_target() => Ok(""),
        None => Err(ApplyError::TargetNotFound(target.to_path_buf())),
    }
}

/// Compute the patched text of `current` without touching disk.
///
/// `file` only labels diagnostics.
pub fn patch_text(
    record: &PatchRecord,
    current: &str,
    file: &Path,
    options: &ApplyOptions,
) -> Result<String, ApplyError> {
    Patcher {
        record,
        file,
        options,
        finder: Locator::new(options.strategy),
        source: current,
        lines: split_lines(current),
    }
    .run()
}

/// Apply one record under `root`.
pub fn apply(
    record: &PatchRecord,
    root: &Path,
    options: &ApplyOptions,
) -> Result<ApplyOutcome, ApplyError> {
    let target = resolve_target(record, root)?;
    apply_at(record, target, options)
}

/// Apply one record to an already resolved target.
pub(crate) fn apply_at(
    record: &PatchRecord,
    target: PathBuf,
    options: &ApplyOptions,
) -> Result<ApplyOutcome, ApplyError> {
    let existing = read_target(&target)?;
    let current = starting_text(record, &target, existing.as_deref())?;
    let patched = patch_text(record, current, &target, options)?;

    if options.dry_run {
        return Ok(ApplyOutcome::Preview {
            file: target,
            text: patched,
        });
    }
    write_result(record, target, existing.as_deref(), &patched, options)
}

fn write_result(
    record: &PatchRecord,
    target: PathBuf,
    existing: Option<&str>,
    patched: &str,
    options: &ApplyOptions,
) -> Result<ApplyOutcome, ApplyError> {
    if existing == Some(patched) {
        debug!(file = %target.display(), kind = %record.kind(), "content unchanged, skipping write");
        return Ok(ApplyOutcome::Written {
            file: target,
            backup: None,
            created: false,
            changed: false,
        });
    }

    let backup = match (existing, &options.backup) {
        (Some(_), Some(store)) => Some(store.backup(&target).map_err(|source| ApplyError::Io {
            path: target.clone(),
            source,
        })?),
        _ => None,
    };

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|source| ApplyError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    atomic_write(&target, patched.as_bytes()).map_err(|source| ApplyError::Edit {
        file: target.clone(),
        source,
    })?;

    info!(
        file = %target.display(),
        kind = %record.kind(),
        line = record.line,
        backup = ?backup,
        "patched"
    );
    Ok(ApplyOutcome::Written {
        file: target,
        backup,
        created: existing.is_none(),
        changed: true,
    })
}

struct Patcher<'a> {
    record: &'a PatchRecord,
    file: &'a Path,
    options: &'a ApplyOptions,
    finder: Locator,
    /// Text before the edit; lookups run against it
    source: &'a str,
    lines: Vec<String>,
}

impl Patcher<'_> {
    fn run(mut self) -> Result<String, ApplyError> {
        let record = self.record;
        match &record.op {
            PatchOp::AddFunction { name } => self.upsert(ConstructTarget::function(name.as_str()), false)?,
            PatchOp::ReplaceFunction { name } => {
                self.upsert(ConstructTarget::function(name.as_str()), true)?
            }
            PatchOp::AddClass { name } => self.upsert(ConstructTarget::class(name.as_str()), false)?,
            PatchOp::ReplaceClass { name } => self.upsert(ConstructTarget::class(name.as_str()), true)?,
            PatchOp::AddMethod { class, name } => {
                self.upsert(ConstructTarget::method(class.as_str(), name.as_str()), false)?
            }
            PatchOp::ReplaceMethod { class, name } => {
                self.upsert(ConstructTarget::method(class.as_str(), name.as_str()), true)?
            }
            PatchOp::RemoveFunction { name } => self.remove(ConstructTarget::function(name.as_str()))?,
            PatchOp::RemoveClass { name } => self.remove(ConstructTarget::class(name.as_str()))?,
            PatchOp::RemoveMethod { class, name } => {
                self.remove(ConstructTarget::method(class.as_str(), name.as_str()))?
            }
            PatchOp::AddBlock { position } => self.add_block(position)?,
            PatchOp::ReplaceBlock { anchors } => self.replace_block(anchors.as_ref())?,
            PatchOp::RemoveBlock { anchors } => self.remove_block(anchors.as_ref())?,
        }

        let lines = spacing::normalize(std::mem::take(&mut self.lines), &self.options.spacing);
        let patched = join_lines(&lines);
        self.check_syntax(&patched);
        Ok(patched)
    }

    fn edit_failed(&self, source: EditError) -> ApplyError {
        ApplyError::Edit {
            file: self.file.to_path_buf(),
            source,
        }
    }

    fn splice(&mut self, splice: Splice) -> Result<SpliceResult, ApplyError> {
        splice.apply(&mut self.lines).map_err(|e| self.edit_failed(e))
    }

    fn insert(&mut self, point: &InsertionPoint) -> Result<(), ApplyError> {
        block::insert_block(&mut self.lines, point, &self.record.code).map_err(|e| self.edit_failed(e))
    }

    /// Closest declared name of the same kind and scope.
    fn suggest(&self, target: &ConstructTarget) -> Option<String> {
        declared_names(self.source, target.kind, target.within_class.as_deref())
            .into_iter()
            .filter(|n| *n != target.name)
            .map(|n| (strsim::jaro_winkler(&target.name, &n), n))
            .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, n)| n)
    }

    fn not_found(&self, target: &ConstructTarget) -> ApplyError {
        ApplyError::ConstructNotFound {
            file: self.file.to_path_buf(),
            target: target.to_string(),
            suggestion: self.suggest(target),
        }
    }

    fn missing_anchor(&self, pattern: String, action: &str) -> Result<(), ApplyError> {
        if self.options.strict {
            return Err(ApplyError::AnchorNotFound {
                file: self.file.to_path_buf(),
                pattern,
            });
        }
        warn!(
            file = %self.file.display(),
            kind = %self.record.kind(),
            anchor = %pattern,
            "anchor matched no line, {action}"
        );
        Ok(())
    }

    fn upsert(&mut self, target: ConstructTarget, replacing: bool) -> Result<(), ApplyError> {
        let class_extent = match &target.within_class {
            Some(class) => {
                let class = ConstructTarget::class(class.as_str());
                match self.finder.locate(self.source, &class)? {
                    Some(extent) => Some(extent),
                    None => return Err(self.not_found(&class)),
                }
            }
            None => None,
        };

        if let Some(found) = self.finder.locate(self.source, &target)? {
            let indent = leading_ws(&self.lines[found.start_line]).to_string();
            let block = reindent(&self.record.code, &indent);
            let splice = Splice::replace(&self.lines, found.start_line, found.end_line + 1, block);
            let result = self.splice(splice)?;
            debug!(file = %self.file.display(), %target, ?result, "replaced in place");
            return Ok(());
        }

        if replacing {
            if self.options.strict {
                return Err(self.not_found(&target));
            }
            warn!(
                file = %self.file.display(),
                %target,
                suggestion = ?self.suggest(&target),
                "replacement target not found, inserting instead"
            );
        }

        let point = match class_extent {
            Some(class) => InsertionPoint {
                index: class.end_line + 1,
                indent: body_indent(&self.lines, &class).unwrap_or_else(|| {
                    format!("{}    ", leading_ws(&self.lines[class.start_line]))
                }),
            },
            None => match target.kind {
                ConstructKind::Function => InsertionPoint {
                    index: self
                        .finder
                        .first_top_level_class(self.source)?
                        .map_or(self.lines.len(), |class| class.start_line),
                    indent: String::new(),
                },
                ConstructKind::Class => InsertionPoint::end(&self.lines),
            },
        };
        debug!(file = %self.file.display(), %target, line = point.index + 1, "inserting");
        self.insert(&point)
    }

    fn remove(&mut self, target: ConstructTarget) -> Result<(), ApplyError> {
        match self.finder.locate(self.source, &target)? {
            Some(found) => {
                let splice = Splice::remove(&self.lines, found.start_line, found.end_line + 1);
                let _ = self.splice(splice)?;
                debug!(file = %self.file.display(), %target, "removed");
            }
            None => debug!(file = %self.file.display(), %target, "nothing to remove"),
        }
        Ok(())
    }

    fn add_block(&mut self, position: &BlockPosition) -> Result<(), ApplyError> {
        let point = match block::resolve_insertion(&self.lines, position) {
            Some(point) => point,
            None => {
                let pattern = position.anchor().map(|a| a.to_string()).unwrap_or_default();
                self.missing_anchor(pattern, "appending at end of file")?;
                InsertionPoint::end(&self.lines)
            }
        };
        self.insert(&point)
    }

    fn replace_block(&mut self, anchors: Option<&AnchorPair>) -> Result<(), ApplyError> {
        let Some(pair) = anchors else {
            warn!(file = %self.file.display(), "replace_block without anchors, appending code");
            return self.insert(&InsertionPoint::end(&self.lines));
        };

        match block::find_window(&self.lines, pair) {
            Some(window) => {
                block::replace_window(&mut self.lines, window, &self.record.code)
                    .map_err(|e| self.edit_failed(e))
            }
            None => {
                self.missing_anchor(
                    format!("{} .. {}", pair.start, pair.end),
                    "appending at end of file",
                )?;
                self.insert(&InsertionPoint::end(&self.lines))
            }
        }
    }

    fn remove_block(&mut self, anchors: Option<&AnchorPair>) -> Result<(), ApplyError> {
        let window = match anchors {
            Some(pair) => block::find_window(&self.lines, pair),
            None => block::find_verbatim(&self.lines, &self.record.code),
        };

        match window {
            Some(window) => {
                block::remove_window(&mut self.lines, window).map_err(|e| self.edit_failed(e))
            }
            None => {
                let pattern = match anchors {
                    Some(pair) => format!("{} .. {}", pair.start, pair.end),
                    None => "<verbatim code>".to_string(),
                };
                self.missing_anchor(pattern, "leaving file unchanged")
            }
        }
    }

    fn check_syntax(&self, patched: &str) {
        if self.finder.strategy() == ExtentStrategy::Indent {
            return;
        }
        match introduces_syntax_errors(self.source, patched) {
            Ok(true) => warn!(
                file = %self.file.display(),
                kind = %self.record.kind(),
                line = self.record.line,
                "edit introduced syntax errors"
            ),
            Ok(false) => {}
            Err(err) => debug!(%err, "syntax check unavailable"),
        }
    }
}
