//! Anchor-relative edits over a line buffer.
//!
//! Anchors select the first line their regex matches. Insertions are
//! re-indented to the anchor line and separated from neighbouring code by a
//! blank line whenever either side is a compound statement or the neighbour
//! sits at a different indentation. Runs of simple statements (imports,
//! assignments) stay contiguous.

use crate::edit::{is_blank, leading_ws, reindent, EditError, Splice};
use crate::locate::indent::{
    block_end, indent_width, logical_end, opens_block, opens_definition,
};
use crate::patch::schema::{AnchorPair, BlockPosition};

/// Where a block goes: before line `index`, indented with `indent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertionPoint {
    pub index: usize,
    pub indent: String,
}

impl InsertionPoint {
    pub fn start() -> Self {
        Self {
            index: 0,
            indent: String::new(),
        }
    }

    pub fn end(lines: &[String]) -> Self {
        Self {
            index: lines.len(),
            indent: String::new(),
        }
    }
}

/// Inclusive line window selected by an anchor pair or by verbatim code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

/// Resolve `position` against `lines`; `None` when its anchor matches nothing.
pub fn resolve_insertion(lines: &[String], position: &BlockPosition) -> Option<InsertionPoint> {
    match position {
        BlockPosition::Start => Some(InsertionPoint::start()),
        BlockPosition::End => Some(InsertionPoint::end(lines)),
        BlockPosition::Before(anchor) => {
            let index = anchor.find_line(lines, 0)?;
            Some(InsertionPoint {
                index,
                indent: leading_ws(&lines[index]).to_string(),
            })
        }
        BlockPosition::After(anchor) => {
            let index = anchor.find_line(lines, 0)?;
            let header = skip_decorators(lines, index);
            let last = if opens_block(lines, header) {
                block_end(lines, header)
            } else {
                logical_end(lines, header)
            };
            Some(InsertionPoint {
                index: last + 1,
                indent: leading_ws(&lines[index]).to_string(),
            })
        }
    }
}

/// From a decorator line, advance to the definition it decorates.
fn skip_decorators(lines: &[String], index: usize) -> usize {
    let indent = indent_width(&lines[index]);
    let mut i = index;
    while lines[i].trim_start().starts_with('@') {
        match (logical_end(lines, i) + 1..lines.len()).find(|&j| !is_blank(&lines[j])) {
            Some(next) if indent_width(&lines[next]) == indent => i = next,
            _ => break,
        }
    }
    i
}

fn is_compound(block: &[String], indent: &str) -> bool {
    let base = indent.chars().count();
    let mut non_blank = block.iter().filter(|l| !is_blank(l));
    let opens = non_blank.clone().next().is_some_and(|l| opens_definition(l));
    opens || non_blank.any(|l| indent_width(l) > base)
}

fn needs_separator(neighbour: &str, compound: bool, indent: &str) -> bool {
    !is_blank(neighbour)
        && (compound || leading_ws(neighbour) != indent || opens_definition(neighbour))
}

/// Insert `code` at `point`, adding blank separators where needed.
pub fn insert_block(
    lines: &mut Vec<String>,
    point: &InsertionPoint,
    code: &str,
) -> Result<(), EditError> {
    let mut block = reindent(code, &point.indent);
    if block.is_empty() {
        return Ok(());
    }
    let compound = is_compound(&block, &point.indent);

    let before = point.index.checked_sub(1).and_then(|i| lines.get(i));
    let after = lines.get(point.index);
    let separate_before = before.is_some_and(|l| needs_separator(l, compound, &point.indent));
    let separate_after = after.is_some_and(|l| needs_separator(l, compound, &point.indent));
    if separate_before {
        block.insert(0, String::new());
    }
    if separate_after {
        block.push(String::new());
    }

    let _ = Splice::insert(point.index, block).apply(lines)?;
    Ok(())
}

/// First `start` match and the first `end` match after it.
pub fn find_window(lines: &[String], anchors: &AnchorPair) -> Option<Window> {
    let start = anchors.start.find_line(lines, 0)?;
    let end = anchors.end.find_line(lines, start + 1)?;
    Some(Window { start, end })
}

/// First run of lines equal to `code` modulo indentation and trailing space.
pub fn find_verbatim(lines: &[String], code: &str) -> Option<Window> {
    let needle: Vec<&str> = code
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>();
    let first = needle.iter().position(|l| !l.is_empty())?;
    let last = needle.iter().rposition(|l| !l.is_empty())?;
    let needle = &needle[first..=last];

    (0..lines.len())
        .filter(|&start| start + needle.len() <= lines.len())
        .find(|&start| {
            needle
                .iter()
                .zip(&lines[start..start + needle.len()])
                .all(|(want, have)| *want == have.trim())
        })
        .map(|start| Window {
            start,
            end: start + needle.len() - 1,
        })
}

pub fn remove_window(lines: &mut Vec<String>, window: Window) -> Result<(), EditError> {
    let _ = Splice::remove(lines, window.start, window.end + 1).apply(lines)?;
    Ok(())
}

/// Replace the window with `code`, indented like the window's first line.
pub fn replace_window(lines: &mut Vec<String>, window: Window, code: &str) -> Result<(), EditError> {
    let indent = leading_ws(&lines[window.start]).to_string();
    let block = reindent(code, &indent);
    let _ = Splice::replace(lines, window.start, window.end + 1, block).apply(lines)?;
    Ok(())
}
