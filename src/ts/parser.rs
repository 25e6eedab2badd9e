use crate::ts::errors::TreeSitterError;
use ast_grep_language::{LanguageExt, SupportLang};
use tree_sitter::{Parser, Tree};

/// Tree-sitter parser wrapper for Python source code.
pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    pub fn new() -> Result<Self, TreeSitterError> {
        let mut parser = Parser::new();
        let ts_lang = SupportLang::Python.get_ts_language();
        parser
            .set_language(&ts_lang)
            .map_err(|_| TreeSitterError::LanguageSet)?;

        Ok(Self { parser })
    }

    /// Parse source code into a tree-sitter Tree.
    pub fn parse(&mut self, source: &str) -> Result<Tree, TreeSitterError> {
        self.parser
            .parse(source, None)
            .ok_or(TreeSitterError::ParseFailed)
    }

    /// Parse source code and return the tree along with the source.
    pub fn parse_with_source<'a>(
        &mut self,
        source: &'a str,
    ) -> Result<ParsedSource<'a>, TreeSitterError> {
        let tree = self.parse(source)?;
        Ok(ParsedSource { source, tree })
    }
}

/// A parsed source file with its tree-sitter tree.
pub struct ParsedSource<'a> {
    pub source: &'a str,
    pub tree: Tree,
}

impl<'a> ParsedSource<'a> {
    pub fn root_node(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    /// Check if the tree contains any ERROR or MISSING nodes, or an empty body.
    pub fn has_errors(&self) -> bool {
        !self.error_rows().is_empty()
    }

    /// Rows (0-based) of every ERROR or MISSING node and every empty body,
    /// in document order.
    pub fn error_rows(&self) -> Vec<usize> {
        let mut rows = Vec::new();
        collect_error_rows(self.tree.root_node(), &mut rows);
        rows
    }

    /// Reject sources that do not parse cleanly.
    pub fn ensure_clean(&self) -> Result<(), TreeSitterError> {
        let rows = self.error_rows();
        match rows.first() {
            None => Ok(()),
            Some(&row) => Err(TreeSitterError::SyntaxErrors {
                count: rows.len(),
                line: row + 1,
            }),
        }
    }

    /// Extract text for a node's byte range.
    pub fn node_text(&self, node: tree_sitter::Node<'_>) -> &'a str {
        &self.source[node.byte_range()]
    }
}

// The grammar recovers a header whose body lost its indentation as an empty
// `block` followed by sibling statements, without an ERROR node.
fn collect_error_rows(node: tree_sitter::Node<'_>, rows: &mut Vec<usize>) {
    if node.is_error() || node.is_missing() {
        rows.push(node.start_position().row);
        return;
    }
    if node.kind() == "block" && node.named_child_count() == 0 {
        rows.push(node.start_position().row);
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_error_rows(child, rows);
    }
}
