//! Indentation-based construct lookup.
//!
//! Works on logical lines: a definition header is recognized textually, its
//! block runs until the first statement indented at or below the header,
//! and same-column decorators directly above it are folded in. Continuation
//! lines belong to the statement that opened them, whatever their indentation.

use super::{ConstructKind, ConstructTarget, ExtentFinder, LocateError, SourceExtent};
use crate::edit::{is_blank, leading_ws};
use std::ops::Range;

/// Finder that needs no parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndentFinder;

/// Number of leading whitespace characters.
pub fn indent_width(line: &str) -> usize {
    leading_ws(line).chars().count()
}

/// Name declared by `line` if it is a `def`/`async def` or `class` header.
pub fn header_name(line: &str, kind: ConstructKind) -> Option<&str> {
    let rest = line.trim_start();
    let rest = match kind {
        ConstructKind::Function => {
            let rest = rest
                .strip_prefix("async")
                .filter(|r| r.starts_with(char::is_whitespace))
                .map_or(rest, str::trim_start);
            rest.strip_prefix("def")?
        }
        ConstructKind::Class => rest.strip_prefix("class")?,
    };
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let rest = rest.trim_start();
    let end = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    let (name, tail) = rest.split_at(end);
    let tail = tail.trim_start();
    let opens = match kind {
        ConstructKind::Function => tail.starts_with('('),
        ConstructKind::Class => tail.starts_with(['(', ':', '[']),
    };
    opens.then_some(name)
}

/// Whether `line` starts a definition or decorates one.
pub fn opens_definition(line: &str) -> bool {
    line.trim_start().starts_with('@')
        || header_name(line, ConstructKind::Function).is_some()
        || header_name(line, ConstructKind::Class).is_some()
}

/// Name of the first column-0 definition of `kind` in a dedented snippet.
pub fn definition_name(code: &str, kind: ConstructKind) -> Option<String> {
    code.lines()
        .filter(|l| indent_width(l) == 0)
        .find_map(|l| header_name(l, kind))
        .map(str::to_string)
}

const TRIPLE_QUOTES: [&str; 2] = ["\"\"\"", "'''"];

/// Lexical state carried from one physical line to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineState {
    /// Delimiter of the triple-quoted string still open, if any.
    pub string: Option<&'static str>,
    pub depth: usize,
    pub backslash: bool,
}

impl LineState {
    /// Whether the next physical line continues the current statement.
    pub fn is_open(&self) -> bool {
        self.string.is_some() || self.depth > 0 || self.backslash
    }

    /// State after scanning `line`.
    pub fn after(self, line: &str) -> Self {
        let bytes = line.as_bytes();
        let mut state = Self {
            backslash: false,
            ..self
        };
        let mut i = 0;
        while i < bytes.len() {
            if let Some(delim) = state.string {
                if bytes[i] == b'\\' {
                    i += 2;
                } else if bytes[i..].starts_with(delim.as_bytes()) {
                    state.string = None;
                    i += delim.len();
                } else {
                    i += 1;
                }
                continue;
            }
            if let Some(&delim) = TRIPLE_QUOTES
                .iter()
                .find(|d| bytes[i..].starts_with(d.as_bytes()))
            {
                state.string = Some(delim);
                i += delim.len();
                continue;
            }
            match bytes[i] {
                b'#' => return state,
                quote @ (b'"' | b'\'') => {
                    i = skip_quoted(bytes, i + 1, quote);
                    continue;
                }
                b'(' | b'[' | b'{' => state.depth += 1,
                b')' | b']' | b'}' => state.depth = state.depth.saturating_sub(1),
                _ => {}
            }
            i += 1;
        }
        state.backslash = state.string.is_none() && line.trim_end().ends_with('\\');
        state
    }
}

/// Index just past the closing `quote` of a single-line string body at `i`.
fn skip_quoted(bytes: &[u8], mut i: usize, quote: u8) -> usize {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Last physical line of the logical line starting at `start`.
pub fn logical_end<S: AsRef<str>>(lines: &[S], start: usize) -> usize {
    let mut state = LineState::default();
    let mut i = start;
    loop {
        state = state.after(lines[i].as_ref());
        if !state.is_open() || i + 1 >= lines.len() {
            return i;
        }
        i += 1;
    }
}

/// First line of every non-blank logical line in `range`, which must start
/// at a statement boundary.
pub fn statement_starts<S: AsRef<str>>(lines: &[S], range: Range<usize>) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut i = range.start;
    while i < range.end {
        if is_blank(lines[i].as_ref()) {
            i += 1;
            continue;
        }
        starts.push(i);
        i = logical_end(lines, i) + 1;
    }
    starts
}

/// Last non-blank line of the block opened by `lines[header]`.
///
/// The block ends before the first statement indented at or below the
/// header; a header with no deeper lines is its own block.
pub fn block_end<S: AsRef<str>>(lines: &[S], header: usize) -> usize {
    let indent = indent_width(lines[header].as_ref());
    let mut last = logical_end(lines, header);
    let mut i = last + 1;
    while i < lines.len() {
        let line = lines[i].as_ref();
        if is_blank(line) {
            i += 1;
            continue;
        }
        if indent_width(line) <= indent {
            break;
        }
        last = logical_end(lines, i);
        i = last + 1;
    }
    last
}

/// Whether the first statement after the `header` statement is indented deeper.
pub fn opens_block<S: AsRef<str>>(lines: &[S], header: usize) -> bool {
    let indent = indent_width(lines[header].as_ref());
    lines[logical_end(lines, header) + 1..]
        .iter()
        .map(AsRef::as_ref)
        .find(|l| !is_blank(l))
        .is_some_and(|l| indent_width(l) > indent)
}

fn is_decorator(line: &str) -> bool {
    line.trim_start().starts_with('@')
}

/// First line of the run of same-column decorators directly above `header`.
pub fn fold_decorators<S: AsRef<str>>(lines: &[S], header: usize, floor: usize) -> usize {
    let indent = indent_width(lines[header].as_ref());
    let mut run: Option<usize> = None;
    let mut next = floor;
    for start in statement_starts(lines, floor..header) {
        let line = lines[start].as_ref();
        if is_decorator(line) && indent_width(line) == indent {
            if run.is_none() || next != start {
                run = Some(start);
            }
            next = logical_end(lines, start) + 1;
        } else {
            run = None;
        }
    }
    match run {
        Some(first) if next == header => first,
        _ => header,
    }
}

/// Header line of the definition whose extent starts at `start`.
pub fn skip_decorator_lines<S: AsRef<str>>(lines: &[S], start: usize) -> usize {
    let mut i = start;
    while i < lines.len() && is_decorator(lines[i].as_ref()) {
        i = logical_end(lines, i) + 1;
    }
    i.min(lines.len().saturating_sub(1))
}

/// Indentation of the first body line of the class at `class`, if it has a body.
pub fn body_indent<S: AsRef<str>>(lines: &[S], class: &SourceExtent) -> Option<String> {
    let header = skip_decorator_lines(lines, class.start_line);
    let body = logical_end(lines, header) + 1;
    lines
        .get(body..=class.end_line)?
        .iter()
        .map(AsRef::as_ref)
        .find(|l| !is_blank(l) && indent_width(l) > class.indent)
        .map(|l| leading_ws(l).to_string())
}

struct Found {
    header: usize,
    extent: SourceExtent,
}

fn find_in(
    lines: &[&str],
    scope: Range<usize>,
    indent: usize,
    kind: ConstructKind,
    name: &str,
) -> Option<Found> {
    let floor = scope.start;
    statement_starts(lines, scope)
        .into_iter()
        .filter(|&i| indent_width(lines[i]) == indent)
        .find(|&i| header_name(lines[i], kind) == Some(name))
        .map(|header| Found {
            header,
            extent: SourceExtent {
                start_line: fold_decorators(lines, header, floor),
                end_line: block_end(lines, header),
                indent,
            },
        })
}

/// Every name of `kind` declared at the target's scope, for suggestions.
pub fn declared_names(source: &str, kind: ConstructKind, within_class: Option<&str>) -> Vec<String> {
    let lines: Vec<&str> = source.lines().collect();
    let Some((scope, indent)) = scope_of(&lines, within_class) else {
        return Vec::new();
    };
    statement_starts(&lines, scope)
        .into_iter()
        .filter(|&i| indent_width(lines[i]) == indent)
        .filter_map(|i| header_name(lines[i], kind))
        .map(str::to_string)
        .collect()
}

/// Line range and indentation in which members of `within_class` (or
/// top-level definitions) are declared.
fn scope_of(lines: &[&str], within_class: Option<&str>) -> Option<(Range<usize>, usize)> {
    match within_class {
        None => Some((0..lines.len(), 0)),
        Some(class) => {
            let found = find_in(lines, 0..lines.len(), 0, ConstructKind::Class, class)?;
            let body = logical_end(lines, found.header) + 1..found.extent.end_line + 1;
            let indent = lines[body.clone()]
                .iter()
                .find(|l| !is_blank(l))
                .map(|l| indent_width(l))?;
            Some((body, indent))
        }
    }
}

impl ExtentFinder for IndentFinder {
    fn locate(
        &self,
        source: &str,
        target: &ConstructTarget,
    ) -> Result<Option<SourceExtent>, LocateError> {
        let lines: Vec<&str> = source.lines().collect();
        let Some((scope, indent)) = scope_of(&lines, target.within_class.as_deref()) else {
            return Ok(None);
        };
        Ok(find_in(&lines, scope, indent, target.kind, &target.name).map(|f| f.extent))
    }

    fn first_top_level_class(&self, source: &str) -> Result<Option<SourceExtent>, LocateError> {
        let lines: Vec<&str> = source.lines().collect();
        let header = statement_starts(&lines, 0..lines.len())
            .into_iter()
            .find(|&i| indent_width(lines[i]) == 0 && header_name(lines[i], ConstructKind::Class).is_some());
        Ok(header.map(|header| SourceExtent {
            start_line: fold_decorators(&lines, header, 0),
            end_line: block_end(&lines, header),
            indent: 0,
        }))
    }
}
