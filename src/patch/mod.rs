pub mod applicator;
pub mod batch;
pub mod parser;
pub mod schema;
pub mod validator;
pub mod version;

pub use applicator::{apply, patch_text, resolve_target, ApplyError, ApplyOptions, ApplyOutcome};
pub use batch::{apply_batch, apply_document, BatchError, BatchReport, DocumentError, RecordOutcome};
pub use parser::{parse, parse_file, ParseError, RawPatch};
pub use schema::{Anchor, AnchorPair, BlockPosition, PatchKind, PatchOp, PatchRecord};
pub use validator::{validate, ValidationError, ValidationIssue};
pub use version::{SchemaVersion, VersionError, SCHEMA_KEY};
