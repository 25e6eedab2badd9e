//! Vibe Patcher: structured patch documents for Python sources
//!
//! A patch document names a construct in a target file (a function, a
//! method, a class, or an anchored run of lines) and supplies the code to add,
//! replace or remove. The engine parses the document, validates every record
//! against a versioned schema, locates the construct's line extent and splices
//! the edit in, normalizing blank-line spacing around it.
//!
//! # Architecture
//!
//! All edits compile down to one primitive: [`Splice`], a verified line-range
//! replacement. The intelligence lives in extent acquisition: a tree-sitter
//! walk for well-formed source ([`TreeFinder`]) and an indentation scan that
//! keeps working on source the parser rejects ([`IndentFinder`]).
//!
//! # Safety
//!
//! - Targets are resolved inside the workspace root; `..` and symlink escapes are rejected
//! - Atomic file writes (tempfile + fsync + rename)
//! - Timestamped backups before every live write
//! - Upserts and removals are idempotent
//!
//! # Example
//!
//! ```no_run
//! use vibe_patcher::{apply_document, ApplyOptions};
//! use std::path::Path;
//!
//! let document = "\
//! VibeSpec: 1.6
//! patch_type: add_function
//! file: hello.py
//! code: |
//!   def greet():
//!       return 'hi'
//! ";
//!
//! match apply_document(document, Path::new("."), &ApplyOptions::default()) {
//!     Ok(report) => println!("applied {} record(s)", report.outcomes.len()),
//!     Err(e) => eprintln!("patch failed: {}", e),
//! }
//! ```

pub mod backup;
pub mod block;
pub mod edit;
pub mod locate;
pub mod patch;
pub mod pool;
pub mod safety;
pub mod scratch;
pub mod settings;
pub mod spacing;
pub mod ts;

// Re-exports
pub use backup::{BackupStore, SiblingBackups};
pub use edit::{EditError, EditVerification, Splice, SpliceResult};
pub use locate::{
    ConstructKind, ConstructTarget, ExtentFinder, ExtentStrategy, IndentFinder, LocateError,
    Locator, SourceExtent, TreeFinder,
};
pub use patch::{
    apply, apply_batch, apply_document, parse, parse_file, validate, ApplyError, ApplyOptions,
    ApplyOutcome, BatchError, BatchReport, DocumentError, ParseError, PatchKind, PatchRecord,
    RawPatch, ValidationError,
};
pub use safety::{SafetyError, WorkspaceGuard};
pub use scratch::{preview_in_scratch, FilePreview, ScratchError};
pub use settings::{ConfigError, EngineSettings};
pub use spacing::SpacingRules;
pub use ts::TreeSitterError;
