use crate::edit::is_blank;
use crate::locate::{ConstructKind, ConstructTarget, ExtentFinder, LocateError, SourceExtent};
use crate::pool::with_parser;
use tree_sitter::Node;

/// CST-backed finder.
///
/// Refuses sources with syntax errors so a caller can fall back to the
/// indentation scan instead of trusting a recovered tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeFinder;

/// A definition node and the statement that wraps it.
///
/// For decorated definitions `outer` is the `decorated_definition` so the
/// extent starts at the first decorator.
struct Definition<'tree> {
    outer: Node<'tree>,
    definition: Node<'tree>,
}

impl Definition<'_> {
    fn extent(&self, lines: &[&str]) -> SourceExtent {
        let start_line = self.outer.start_position().row;
        let end = self.definition.end_position();
        let mut end_line = if end.column == 0 && end.row > start_line {
            end.row - 1
        } else {
            end.row
        };
        end_line = end_line.min(lines.len().saturating_sub(1));
        while end_line > start_line && lines.get(end_line).is_some_and(|l| is_blank(l)) {
            end_line -= 1;
        }

        SourceExtent {
            start_line,
            end_line,
            indent: self.definition.start_position().column,
        }
    }
}

/// Unwrap `decorated_definition` statements to the definition they decorate.
fn unwrap_decorated(node: Node<'_>) -> Option<Node<'_>> {
    match node.kind() {
        "decorated_definition" => node.child_by_field_name("definition"),
        _ => Some(node),
    }
}

fn find_definition<'tree>(
    scope: Node<'tree>,
    source: &str,
    kind: ConstructKind,
    name: &str,
) -> Option<Definition<'tree>> {
    let mut cursor = scope.walk();
    let found = scope.named_children(&mut cursor).find_map(|outer| {
        let definition = unwrap_decorated(outer)?;
        if definition.kind() != kind.node_kind() {
            return None;
        }
        let declared = definition
            .child_by_field_name("name")?
            .utf8_text(source.as_bytes())
            .ok()?;
        (declared == name).then_some(Definition { outer, definition })
    });
    found
}

impl ExtentFinder for TreeFinder {
    fn locate(
        &self,
        source: &str,
        target: &ConstructTarget,
    ) -> Result<Option<SourceExtent>, LocateError> {
        with_parser(|parser| -> Result<Option<SourceExtent>, LocateError> {
            let parsed = parser.parse_with_source(source)?;
            parsed.ensure_clean()?;
            let lines: Vec<&str> = source.lines().collect();

            let root = parsed.root_node();
            let scope = match &target.within_class {
                None => root,
                Some(class) => {
                    match find_definition(root, source, ConstructKind::Class, class)
                        .and_then(|c| c.definition.child_by_field_name("body"))
                    {
                        Some(body) => body,
                        None => return Ok(None),
                    }
                }
            };

            Ok(find_definition(scope, source, target.kind, &target.name).map(|d| d.extent(&lines)))
        })?
    }

    fn first_top_level_class(&self, source: &str) -> Result<Option<SourceExtent>, LocateError> {
        with_parser(|parser| -> Result<Option<SourceExtent>, LocateError> {
            let parsed = parser.parse_with_source(source)?;
            parsed.ensure_clean()?;
            let lines: Vec<&str> = source.lines().collect();

            let root = parsed.root_node();
            let mut cursor = root.walk();
            let class = root.named_children(&mut cursor).find_map(|outer| {
                let definition = unwrap_decorated(outer)?;
                (definition.kind() == ConstructKind::Class.node_kind())
                    .then_some(Definition { outer, definition })
            });
            Ok(class.map(|d| d.extent(&lines)))
        })?
    }
}
