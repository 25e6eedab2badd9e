use super::version::SchemaVersion;
use crate::locate::{ConstructKind, ConstructTarget};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// The `patch_type` of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchKind {
    AddFunction,
    ReplaceFunction,
    RemoveFunction,
    AddMethod,
    ReplaceMethod,
    RemoveMethod,
    AddClass,
    ReplaceClass,
    RemoveClass,
    AddBlock,
    ReplaceBlock,
    RemoveBlock,
}

impl PatchKind {
    pub const ALL: [PatchKind; 12] = [
        PatchKind::AddFunction,
        PatchKind::ReplaceFunction,
        PatchKind::RemoveFunction,
        PatchKind::AddMethod,
        PatchKind::ReplaceMethod,
        PatchKind::RemoveMethod,
        PatchKind::AddClass,
        PatchKind::ReplaceClass,
        PatchKind::RemoveClass,
        PatchKind::AddBlock,
        PatchKind::ReplaceBlock,
        PatchKind::RemoveBlock,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PatchKind::AddFunction => "add_function",
            PatchKind::ReplaceFunction => "replace_function",
            PatchKind::RemoveFunction => "remove_function",
            PatchKind::AddMethod => "add_method",
            PatchKind::ReplaceMethod => "replace_method",
            PatchKind::RemoveMethod => "remove_method",
            PatchKind::AddClass => "add_class",
            PatchKind::ReplaceClass => "replace_class",
            PatchKind::RemoveClass => "remove_class",
            PatchKind::AddBlock => "add_block",
            PatchKind::ReplaceBlock => "replace_block",
            PatchKind::RemoveBlock => "remove_block",
        }
    }

    /// Whether a missing target file is created empty instead of failing.
    pub fn creates_missing_target(self) -> bool {
        !self.is_removal()
    }

    pub fn is_removal(self) -> bool {
        matches!(
            self,
            PatchKind::RemoveFunction
                | PatchKind::RemoveMethod
                | PatchKind::RemoveClass
                | PatchKind::RemoveBlock
        )
    }

    pub fn is_add(self) -> bool {
        matches!(
            self,
            PatchKind::AddFunction | PatchKind::AddMethod | PatchKind::AddClass | PatchKind::AddBlock
        )
    }

    /// Construct kind targeted by the named-construct patch types.
    pub fn construct(self) -> Option<ConstructKind> {
        match self {
            PatchKind::AddFunction
            | PatchKind::ReplaceFunction
            | PatchKind::RemoveFunction
            | PatchKind::AddMethod
            | PatchKind::ReplaceMethod
            | PatchKind::RemoveMethod => Some(ConstructKind::Function),
            PatchKind::AddClass | PatchKind::ReplaceClass | PatchKind::RemoveClass => {
                Some(ConstructKind::Class)
            }
            PatchKind::AddBlock | PatchKind::ReplaceBlock | PatchKind::RemoveBlock => None,
        }
    }

    pub fn is_method(self) -> bool {
        matches!(
            self,
            PatchKind::AddMethod | PatchKind::ReplaceMethod | PatchKind::RemoveMethod
        )
    }
}

impl fmt::Display for PatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatchKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PatchKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or(())
    }
}

/// A compiled line anchor. Matches anywhere in a line unless the pattern
/// itself carries `^`/`$`.
#[derive(Debug, Clone)]
pub struct Anchor {
    regex: Regex,
}

impl Anchor {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    /// Index of the first line at or after `from` the anchor matches.
    pub fn find_line<S: AsRef<str>>(&self, lines: &[S], from: usize) -> Option<usize> {
        lines
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, l)| self.is_match(l.as_ref()))
            .map(|(i, _)| i)
    }
}

impl PartialEq for Anchor {
    fn eq(&self, other: &Self) -> bool {
        self.pattern() == other.pattern()
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.pattern())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnchorPair {
    pub start: Anchor,
    pub end: Anchor,
}

/// Where `add_block` inserts its code.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockPosition {
    Start,
    End,
    Before(Anchor),
    After(Anchor),
}

impl BlockPosition {
    pub fn anchor(&self) -> Option<&Anchor> {
        match self {
            BlockPosition::Before(anchor) | BlockPosition::After(anchor) => Some(anchor),
            BlockPosition::Start | BlockPosition::End => None,
        }
    }
}

/// A validated operation. Each variant carries exactly the parameters its
/// patch type needs.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchOp {
    AddFunction { name: String },
    ReplaceFunction { name: String },
    RemoveFunction { name: String },
    AddMethod { class: String, name: String },
    ReplaceMethod { class: String, name: String },
    RemoveMethod { class: String, name: String },
    AddClass { name: String },
    ReplaceClass { name: String },
    RemoveClass { name: String },
    AddBlock { position: BlockPosition },
    ReplaceBlock { anchors: Option<AnchorPair> },
    RemoveBlock { anchors: Option<AnchorPair> },
}

impl PatchOp {
    pub fn kind(&self) -> PatchKind {
        match self {
            PatchOp::AddFunction { .. } => PatchKind::AddFunction,
            PatchOp::ReplaceFunction { .. } => PatchKind::ReplaceFunction,
            PatchOp::RemoveFunction { .. } => PatchKind::RemoveFunction,
            PatchOp::AddMethod { .. } => PatchKind::AddMethod,
            PatchOp::ReplaceMethod { .. } => PatchKind::ReplaceMethod,
            PatchOp::RemoveMethod { .. } => PatchKind::RemoveMethod,
            PatchOp::AddClass { .. } => PatchKind::AddClass,
            PatchOp::ReplaceClass { .. } => PatchKind::ReplaceClass,
            PatchOp::RemoveClass { .. } => PatchKind::RemoveClass,
            PatchOp::AddBlock { .. } => PatchKind::AddBlock,
            PatchOp::ReplaceBlock { .. } => PatchKind::ReplaceBlock,
            PatchOp::RemoveBlock { .. } => PatchKind::RemoveBlock,
        }
    }

    /// The named construct this operation targets, if any.
    pub fn target(&self) -> Option<ConstructTarget> {
        match self {
            PatchOp::AddFunction { name }
            | PatchOp::ReplaceFunction { name }
            | PatchOp::RemoveFunction { name } => Some(ConstructTarget::function(name.as_str())),
            PatchOp::AddMethod { class, name }
            | PatchOp::ReplaceMethod { class, name }
            | PatchOp::RemoveMethod { class, name } => {
                Some(ConstructTarget::method(class.as_str(), name.as_str()))
            }
            PatchOp::AddClass { name }
            | PatchOp::ReplaceClass { name }
            | PatchOp::RemoveClass { name } => Some(ConstructTarget::class(name.as_str())),
            PatchOp::AddBlock { .. } | PatchOp::ReplaceBlock { .. } | PatchOp::RemoveBlock { .. } => {
                None
            }
        }
    }
}

/// A validated patch record, ready for application.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchRecord {
    pub version: SchemaVersion,
    /// Target path, relative to the workspace root
    pub file: String,
    pub op: PatchOp,
    /// Dedented code payload
    pub code: String,
    /// 1-based line of the record in its document
    pub line: usize,
}

impl PatchRecord {
    pub fn kind(&self) -> PatchKind {
        self.op.kind()
    }
}

impl fmt::Display for PatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op.target() {
            Some(target) => write!(f, "{} {} in {}", self.kind(), target, self.file),
            None => write!(f, "{} in {}", self.kind(), self.file),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_names() {
        for kind in PatchKind::ALL {
            assert_eq!(kind.as_str().parse::<PatchKind>(), Ok(kind));
        }
        assert!("rename_function".parse::<PatchKind>().is_err());
    }

    #[test]
    fn removal_kinds_never_create_files() {
        assert!(!PatchKind::RemoveBlock.creates_missing_target());
        assert!(PatchKind::ReplaceClass.creates_missing_target());
        assert!(PatchKind::AddBlock.creates_missing_target());
    }

    #[test]
    fn anchors_search_forward() {
        let anchor = Anchor::new(r"^\s*return").unwrap();
        let lines = ["def f():", "    return 1", "def g():", "    return 2"];
        assert_eq!(anchor.find_line(&lines, 0), Some(1));
        assert_eq!(anchor.find_line(&lines, 2), Some(3));
        assert_eq!(anchor.find_line(&lines, 4), None);
    }

    #[test]
    fn op_targets() {
        let op = PatchOp::RemoveMethod {
            class: "A".into(),
            name: "b".into(),
        };
        assert_eq!(op.kind(), PatchKind::RemoveMethod);
        assert_eq!(op.target(), Some(ConstructTarget::method("A", "b")));
        assert_eq!(
            PatchOp::AddBlock {
                position: BlockPosition::End
            }
            .target(),
            None
        );
    }
}
