//! Schema revisions for patch documents.
//!
//! Revisions only ever add patch types and metadata keys, so the vocabulary
//! legal for a record is the union of every revision up to the version it
//! declares. Versions are written `MAJOR.MINOR` and compared with semver.

use super::schema::PatchKind;
use semver::Version;
use std::cmp::Ordering;
use std::fmt;

/// Metadata key declaring the schema version.
pub const SCHEMA_KEY: &str = "VibeSpec";

/// Metadata key selecting the operation.
pub const PATCH_TYPE_KEY: &str = "patch_type";

struct Revision {
    tag: &'static str,
    minor: u64,
    patch_types: &'static [PatchKind],
    keys: &'static [&'static str],
}

const REVISIONS: &[Revision] = &[
    Revision {
        tag: "1.0",
        minor: 0,
        patch_types: &[
            PatchKind::AddFunction,
            PatchKind::AddMethod,
            PatchKind::AddClass,
            PatchKind::AddBlock,
        ],
        keys: &["file", "class", "position", "anchor"],
    },
    Revision {
        tag: "1.1",
        minor: 1,
        patch_types: &[],
        keys: &["name"],
    },
    Revision {
        tag: "1.2",
        minor: 2,
        patch_types: &[
            PatchKind::ReplaceFunction,
            PatchKind::ReplaceMethod,
            PatchKind::ReplaceClass,
        ],
        keys: &[],
    },
    Revision {
        tag: "1.3",
        minor: 3,
        patch_types: &[
            PatchKind::RemoveFunction,
            PatchKind::RemoveMethod,
            PatchKind::RemoveClass,
        ],
        keys: &[],
    },
    Revision {
        tag: "1.4",
        minor: 4,
        patch_types: &[PatchKind::RemoveBlock],
        keys: &["anchor_start", "anchor_end"],
    },
    Revision {
        tag: "1.5",
        minor: 5,
        patch_types: &[PatchKind::ReplaceBlock],
        keys: &[],
    },
    Revision {
        tag: "1.6",
        minor: 6,
        patch_types: &[],
        keys: &[],
    },
];

/// Errors resolving a declared schema version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// Not a `MAJOR.MINOR` version string
    InvalidVersion { value: String, source: String },
    /// Well-formed but not a published revision
    Unsupported { value: String },
}

impl fmt::Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionError::InvalidVersion { value, source } => {
                write!(f, "invalid schema version '{}': {}", value, source)
            }
            VersionError::Unsupported { value } => write!(
                f,
                "unsupported schema version '{}' (supported: {})",
                value,
                supported_tags().join(", ")
            ),
        }
    }
}

impl std::error::Error for VersionError {}

/// A published schema revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaVersion {
    tag: &'static str,
    version: Version,
}

impl SchemaVersion {
    /// Resolve a declared version. `1.2` and `1.2.0` name the same revision.
    ///
    /// # Examples
    ///
    /// ```
    /// use vibe_patcher::patch::version::SchemaVersion;
    ///
    /// assert_eq!(SchemaVersion::parse("1.2").unwrap().as_str(), "1.2");
    /// assert_eq!(SchemaVersion::parse("1.2.0").unwrap().as_str(), "1.2");
    /// assert!(SchemaVersion::parse("2.0").is_err());
    /// ```
    pub fn parse(value: &str) -> Result<Self, VersionError> {
        let trimmed = value.trim();
        let normalized = match trimmed.matches('.').count() {
            0 => format!("{trimmed}.0.0"),
            1 => format!("{trimmed}.0"),
            _ => trimmed.to_string(),
        };
        let version = Version::parse(&normalized).map_err(|e| VersionError::InvalidVersion {
            value: value.to_string(),
            source: e.to_string(),
        })?;

        REVISIONS
            .iter()
            .find(|r| revision_version(r) == version)
            .map(|r| SchemaVersion {
                tag: r.tag,
                version,
            })
            .ok_or_else(|| VersionError::Unsupported {
                value: value.to_string(),
            })
    }

    /// The newest published revision.
    pub fn latest() -> Self {
        let last = &REVISIONS[REVISIONS.len() - 1];
        SchemaVersion {
            tag: last.tag,
            version: revision_version(last),
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.tag
    }

    fn revisions(&self) -> impl Iterator<Item = &'static Revision> + '_ {
        REVISIONS
            .iter()
            .filter(move |r| revision_version(r) <= self.version)
    }

    pub fn allows_patch_type(&self, kind: PatchKind) -> bool {
        self.revisions().any(|r| r.patch_types.contains(&kind))
    }

    pub fn allows_key(&self, key: &str) -> bool {
        key == SCHEMA_KEY
            || key == PATCH_TYPE_KEY
            || self.revisions().any(|r| r.keys.iter().any(|k| *k == key))
    }
}

impl PartialOrd for SchemaVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SchemaVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version.cmp(&other.version)
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag)
    }
}

fn revision_version(revision: &Revision) -> Version {
    Version::new(1, revision.minor, 0)
}

/// Every published version tag, oldest first.
pub fn supported_tags() -> Vec<&'static str> {
    REVISIONS.iter().map(|r| r.tag).collect()
}

/// Revision that introduced `kind`.
pub fn patch_type_introduced_in(kind: PatchKind) -> Option<&'static str> {
    REVISIONS
        .iter()
        .find(|r| r.patch_types.contains(&kind))
        .map(|r| r.tag)
}

/// Revision that introduced a metadata key; `None` for keys no revision defines.
pub fn key_introduced_in(key: &str) -> Option<&'static str> {
    if key == SCHEMA_KEY || key == PATCH_TYPE_KEY {
        return REVISIONS.first().map(|r| r.tag);
    }
    REVISIONS
        .iter()
        .find(|r| r.keys.iter().any(|k| *k == key))
        .map(|r| r.tag)
}
