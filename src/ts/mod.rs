//! Tree-sitter integration for structural Python queries.
//!
//! Parses Python source into a concrete syntax tree and resolves named
//! definitions to line extents, decorators included, without losing comments
//! or formatting.

pub mod errors;
pub mod locator;
pub mod parser;
pub mod validator;

pub use errors::TreeSitterError;
pub use locator::TreeFinder;
pub use parser::{ParsedSource, PythonParser};
pub use validator::{introduces_syntax_errors, syntax_error_count};
