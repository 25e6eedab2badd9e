//! Blank-line normalization applied after every edit.
//!
//! Runs of blank lines are capped according to what follows them: a line at
//! column 0 may be preceded by up to `top_level_blank_lines`, an indented one
//! by up to `nested_blank_lines`. Leading and trailing blank lines are dropped.
//! Blank lines inside triple-quoted strings are content and stay untouched.
//!
//! Normalization is idempotent, so re-applying a patch leaves no drift.

use crate::edit::is_blank;
use crate::locate::indent::{indent_width, LineState};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpacingRules {
    pub top_level_blank_lines: usize,
    pub nested_blank_lines: usize,
}

impl Default for SpacingRules {
    fn default() -> Self {
        Self {
            top_level_blank_lines: 2,
            nested_blank_lines: 1,
        }
    }
}

/// Normalize blank-line runs across the whole buffer.
pub fn normalize(lines: Vec<String>, rules: &SpacingRules) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut pending_blanks = 0usize;
    let mut state = LineState::default();

    for line in lines {
        let in_string = state.string.is_some();
        if !in_string && is_blank(&line) {
            pending_blanks += 1;
            continue;
        }

        if !out.is_empty() && pending_blanks > 0 {
            let cap = if !in_string && indent_width(&line) == 0 {
                rules.top_level_blank_lines
            } else {
                rules.nested_blank_lines
            };
            out.extend(std::iter::repeat(String::new()).take(pending_blanks.min(cap)));
        }
        pending_blanks = 0;

        state = state.after(&line);
        out.push(line);
    }

    out
}
