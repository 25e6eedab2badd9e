use super::parser::RawPatch;
use super::schema::{Anchor, AnchorPair, BlockPosition, PatchKind, PatchOp, PatchRecord};
use super::version::{
    key_introduced_in, patch_type_introduced_in, SchemaVersion, VersionError, PATCH_TYPE_KEY,
    SCHEMA_KEY,
};
use crate::locate::indent::definition_name;
use crate::locate::ConstructKind;
use std::fmt;

const REQUIRED_KEYS: [&str; 3] = [SCHEMA_KEY, PATCH_TYPE_KEY, "file"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingKeys {
        keys: Vec<&'static str>,
    },
    UnsupportedVersion(VersionError),
    UnknownPatchType {
        value: String,
    },
    PatchTypeUnavailable {
        kind: PatchKind,
        version: String,
        since: &'static str,
    },
    KeyUnavailable {
        key: String,
        version: String,
        since: Option<&'static str>,
    },
    MissingField {
        kind: PatchKind,
        field: &'static str,
    },
    InvalidPosition {
        value: String,
    },
    IncompleteAnchorPair {
        missing: &'static str,
    },
    InvalidAnchor {
        key: &'static str,
        message: String,
    },
    UnnamedDefinition {
        kind: PatchKind,
        keyword: &'static str,
    },
    EmptyCode {
        kind: PatchKind,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingKeys { keys } => {
                write!(f, "missing required keys: {}", keys.join(", "))
            }
            ValidationIssue::UnsupportedVersion(err) => write!(f, "{}", err),
            ValidationIssue::UnknownPatchType { value } => {
                write!(f, "unknown patch_type '{}'", value)
            }
            ValidationIssue::PatchTypeUnavailable {
                kind,
                version,
                since,
            } => write!(
                f,
                "patch_type '{}' requires {} {} or later (declared {})",
                kind, SCHEMA_KEY, since, version
            ),
            ValidationIssue::KeyUnavailable {
                key,
                version,
                since: Some(since),
            } => write!(
                f,
                "key '{}' requires {} {} or later (declared {})",
                key, SCHEMA_KEY, since, version
            ),
            ValidationIssue::KeyUnavailable {
                key, since: None, ..
            } => write!(f, "unknown key '{}'", key),
            ValidationIssue::MissingField { kind, field } => {
                write!(f, "{} requires '{}'", kind, field)
            }
            ValidationIssue::InvalidPosition { value } => write!(
                f,
                "invalid position '{}' (expected start, end, before or after)",
                value
            ),
            ValidationIssue::IncompleteAnchorPair { missing } => write!(
                f,
                "anchor_start and anchor_end must be given together ('{}' is missing)",
                missing
            ),
            ValidationIssue::InvalidAnchor { key, message } => {
                write!(f, "'{}' is not a valid regex: {}", key, message)
            }
            ValidationIssue::UnnamedDefinition { kind, keyword } => write!(
                f,
                "{} code must contain a top-level `{}` header to name the construct",
                kind, keyword
            ),
            ValidationIssue::EmptyCode { kind } => write!(f, "{} requires non-empty code", kind),
        }
    }
}

/// Every issue found in one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// 1-based line of the record in its document
    pub line: usize,
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid patch record at line {}", self.line)?;
        for issue in &self.issues {
            write!(f, "\n  - {}", issue)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Check a raw record against the schema and build its typed operation.
///
/// Performs no I/O.
pub fn validate(raw: &RawPatch) -> Result<PatchRecord, ValidationError> {
    let fail = |issues: Vec<ValidationIssue>| ValidationError {
        line: raw.line,
        issues,
    };
    let value = |key: &str| raw.get(key).map(str::trim).filter(|v| !v.is_empty());

    let missing: Vec<&'static str> = REQUIRED_KEYS
        .into_iter()
        .filter(|&key| value(key).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(fail(vec![ValidationIssue::MissingKeys { keys: missing }]));
    }
    let declared = value(SCHEMA_KEY).unwrap_or_default();
    let patch_type = value(PATCH_TYPE_KEY).unwrap_or_default();
    let file = value("file").unwrap_or_default();

    let version = SchemaVersion::parse(declared)
        .map_err(|e| fail(vec![ValidationIssue::UnsupportedVersion(e)]))?;

    let kind: PatchKind = patch_type.parse().map_err(|()| {
        fail(vec![ValidationIssue::UnknownPatchType {
            value: patch_type.to_string(),
        }])
    })?;

    if !version.allows_patch_type(kind) {
        return Err(fail(vec![ValidationIssue::PatchTypeUnavailable {
            kind,
            version: version.to_string(),
            since: patch_type_introduced_in(kind).unwrap_or("?"),
        }]));
    }

    let mut issues = Vec::new();
    for key in raw.meta.keys() {
        if !version.allows_key(key) {
            issues.push(ValidationIssue::KeyUnavailable {
                key: key.clone(),
                version: version.to_string(),
                since: key_introduced_in(key),
            });
        }
    }

    let mut check = Checker {
        kind,
        code: &raw.code,
        issues,
    };
    let op = check.build_op(&value);

    match op {
        Some(op) if check.issues.is_empty() => Ok(PatchRecord {
            version,
            file: file.to_string(),
            op,
            code: raw.code.clone(),
            line: raw.line,
        }),
        _ => Err(fail(check.issues)),
    }
}

/// Collects stage-(e) issues while assembling the typed operation.
struct Checker<'a> {
    kind: PatchKind,
    code: &'a str,
    issues: Vec<ValidationIssue>,
}

impl Checker<'_> {
    fn require(&mut self, field: &'static str, value: Option<&str>) -> Option<String> {
        if value.is_none() {
            self.issues.push(ValidationIssue::MissingField {
                kind: self.kind,
                field,
            });
        }
        value.map(str::to_string)
    }

    fn anchor(&mut self, key: &'static str, pattern: &str) -> Option<Anchor> {
        match Anchor::new(pattern) {
            Ok(anchor) => Some(anchor),
            Err(e) => {
                self.issues.push(ValidationIssue::InvalidAnchor {
                    key,
                    message: e.to_string(),
                });
                None
            }
        }
    }

    /// Name of the construct an add_* record defines: `name` if given,
    /// otherwise the header in its code.
    fn defined_name(&mut self, explicit: Option<&str>, construct: ConstructKind) -> Option<String> {
        let name = explicit
            .map(str::to_string)
            .or_else(|| definition_name(self.code, construct));
        if name.is_none() {
            self.issues.push(ValidationIssue::UnnamedDefinition {
                kind: self.kind,
                keyword: construct.keyword(),
            });
        }
        name
    }

    fn require_code(&mut self) {
        if self.code.trim().is_empty() {
            self.issues.push(ValidationIssue::EmptyCode { kind: self.kind });
        }
    }

    fn anchor_pair(&mut self, start: Option<&str>, end: Option<&str>) -> Option<Option<AnchorPair>> {
        match (start, end) {
            (None, None) => Some(None),
            (Some(_), None) => {
                self.issues.push(ValidationIssue::IncompleteAnchorPair {
                    missing: "anchor_end",
                });
                None
            }
            (None, Some(_)) => {
                self.issues.push(ValidationIssue::IncompleteAnchorPair {
                    missing: "anchor_start",
                });
                None
            }
            (Some(start), Some(end)) => {
                let start = self.anchor("anchor_start", start);
                let end = self.anchor("anchor_end", end);
                Some(Some(AnchorPair {
                    start: start?,
                    end: end?,
                }))
            }
        }
    }

    fn block_position(&mut self, position: Option<&str>, anchor: Option<&str>) -> Option<BlockPosition> {
        let Some(position) = position else {
            return Some(BlockPosition::End);
        };
        match position.to_ascii_lowercase().as_str() {
            "start" => Some(BlockPosition::Start),
            "end" => Some(BlockPosition::End),
            mode @ ("before" | "after") => {
                let pattern = self.require("anchor", anchor)?;
                let anchor = self.anchor("anchor", &pattern)?;
                Some(if mode == "before" {
                    BlockPosition::Before(anchor)
                } else {
                    BlockPosition::After(anchor)
                })
            }
            _ => {
                self.issues.push(ValidationIssue::InvalidPosition {
                    value: position.to_string(),
                });
                None
            }
        }
    }

    fn build_op<'v>(&mut self, value: &impl Fn(&str) -> Option<&'v str>) -> Option<PatchOp> {
        let name = value("name");
        let class = value("class");

        let op = match self.kind {
            PatchKind::AddFunction => PatchOp::AddFunction {
                name: self.defined_name(name, ConstructKind::Function)?,
            },
            PatchKind::AddClass => PatchOp::AddClass {
                name: self.defined_name(name, ConstructKind::Class)?,
            },
            PatchKind::AddMethod => {
                let class = self.require("class", class);
                let name = self.defined_name(name, ConstructKind::Function);
                PatchOp::AddMethod {
                    class: class?,
                    name: name?,
                }
            }
            PatchKind::ReplaceFunction | PatchKind::ReplaceClass => {
                self.require_code();
                let name = self.require("name", name)?;
                if self.kind == PatchKind::ReplaceFunction {
                    PatchOp::ReplaceFunction { name }
                } else {
                    PatchOp::ReplaceClass { name }
                }
            }
            PatchKind::ReplaceMethod => {
                self.require_code();
                let class = self.require("class", class);
                let name = self.require("name", name);
                PatchOp::ReplaceMethod {
                    class: class?,
                    name: name?,
                }
            }
            PatchKind::RemoveFunction => PatchOp::RemoveFunction {
                name: self.require("name", name)?,
            },
            PatchKind::RemoveClass => PatchOp::RemoveClass {
                name: self.require("name", name)?,
            },
            PatchKind::RemoveMethod => {
                let class = self.require("class", class);
                let name = self.require("name", name);
                PatchOp::RemoveMethod {
                    class: class?,
                    name: name?,
                }
            }
            PatchKind::AddBlock => {
                self.require_code();
                PatchOp::AddBlock {
                    position: self.block_position(value("position"), value("anchor"))?,
                }
            }
            PatchKind::ReplaceBlock => {
                self.require_code();
                PatchOp::ReplaceBlock {
                    anchors: self.anchor_pair(value("anchor_start"), value("anchor_end"))?,
                }
            }
            PatchKind::RemoveBlock => {
                let anchors = self.anchor_pair(value("anchor_start"), value("anchor_end"))?;
                if anchors.is_none() {
                    self.require_code();
                }
                PatchOp::RemoveBlock { anchors }
            }
        };
        Some(op)
    }
}
