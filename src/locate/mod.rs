//! Named-construct lookup over Python source.
//!
//! A lookup yields a [`SourceExtent`]: the inclusive line range a definition
//! occupies, decorators included, trailing blank lines excluded. Two finders
//! implement [`ExtentFinder`]:
//!
//! - [`TreeFinder`] walks a tree-sitter CST and is exact for well-formed input.
//! - [`IndentFinder`] scans headers and indentation and keeps working on
//!   source the parser rejects.
//!
//! [`Locator`] selects between them according to an [`ExtentStrategy`].

pub mod indent;

pub use crate::ts::TreeFinder;
pub use indent::IndentFinder;

use crate::ts::TreeSitterError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Kind of definition a lookup targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstructKind {
    Function,
    Class,
}

impl ConstructKind {
    /// The keyword that opens this kind of definition.
    pub fn keyword(self) -> &'static str {
        match self {
            ConstructKind::Function => "def",
            ConstructKind::Class => "class",
        }
    }

    /// Tree-sitter node kind for this definition.
    pub fn node_kind(self) -> &'static str {
        match self {
            ConstructKind::Function => "function_definition",
            ConstructKind::Class => "class_definition",
        }
    }
}

/// A named construct, optionally scoped to the body of a top-level class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructTarget {
    pub kind: ConstructKind,
    pub name: String,
    pub within_class: Option<String>,
}

impl ConstructTarget {
    pub fn function(name: impl Into<String>) -> Self {
        Self {
            kind: ConstructKind::Function,
            name: name.into(),
            within_class: None,
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self {
            kind: ConstructKind::Class,
            name: name.into(),
            within_class: None,
        }
    }

    pub fn method(class: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: ConstructKind::Function,
            name: name.into(),
            within_class: Some(class.into()),
        }
    }
}

impl fmt::Display for ConstructTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.within_class, self.kind) {
            (Some(class), _) => write!(f, "method `{}.{}`", class, self.name),
            (None, ConstructKind::Function) => write!(f, "function `{}`", self.name),
            (None, ConstructKind::Class) => write!(f, "class `{}`", self.name),
        }
    }
}

/// Inclusive, 0-based line range of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceExtent {
    /// First line: the outermost decorator, or the header if undecorated
    pub start_line: usize,
    /// Last non-blank line of the body
    pub end_line: usize,
    /// Column of the definition header
    pub indent: usize,
}

impl SourceExtent {
    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }
}

#[derive(Error, Debug)]
pub enum LocateError {
    #[error("source does not parse cleanly: {0}")]
    Unparseable(#[from] TreeSitterError),
}

/// Capability to resolve named constructs to line extents.
pub trait ExtentFinder {
    /// Extent of `target`, or `None` when the source does not define it.
    fn locate(&self, source: &str, target: &ConstructTarget)
        -> Result<Option<SourceExtent>, LocateError>;

    /// Extent of the first top-level class, if any.
    fn first_top_level_class(&self, source: &str) -> Result<Option<SourceExtent>, LocateError>;
}

/// Which finder a [`Locator`] consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtentStrategy {
    /// Tree first, indentation scan when the source does not parse
    #[default]
    Auto,
    Tree,
    Indent,
}

/// Strategy-selecting finder used by the applicator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Locator {
    strategy: ExtentStrategy,
}

impl Locator {
    pub fn new(strategy: ExtentStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> ExtentStrategy {
        self.strategy
    }

    fn with_fallback<T>(
        &self,
        tree: impl FnOnce() -> Result<T, LocateError>,
        scan: impl FnOnce() -> Result<T, LocateError>,
    ) -> Result<T, LocateError> {
        match self.strategy {
            ExtentStrategy::Tree => tree(),
            ExtentStrategy::Indent => scan(),
            ExtentStrategy::Auto => tree().or_else(|err| {
                debug!(%err, "structural lookup unavailable, scanning indentation");
                scan()
            }),
        }
    }
}

impl ExtentFinder for Locator {
    fn locate(
        &self,
        source: &str,
        target: &ConstructTarget,
    ) -> Result<Option<SourceExtent>, LocateError> {
        self.with_fallback(
            || TreeFinder.locate(source, target),
            || IndentFinder.locate(source, target),
        )
    }

    fn first_top_level_class(&self, source: &str) -> Result<Option<SourceExtent>, LocateError> {
        self.with_fallback(
            || TreeFinder.first_top_level_class(source),
            || IndentFinder.first_top_level_class(source),
        )
    }
}
