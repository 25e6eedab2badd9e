use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// The fundamental edit primitive: line-range replacement with verification.
///
/// Every patch kind (upsert, removal, anchored insertion) compiles down to a
/// single splice over the target's lines. Intelligence lives in extent
/// acquisition (tree-sitter, indentation scan, anchors), not in application.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Splice does nothing until apply() is called"]
pub struct Splice {
    /// First line replaced (inclusive, 0-based)
    pub start: usize,
    /// Line after the last one replaced (exclusive)
    pub end: usize,
    /// Lines written in place of `[start, end)`
    pub replacement: Vec<String>,
    /// Verification of what we expect to find before applying
    pub expected_before: EditVerification,
}

/// Verification strategy for splice safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (faster for large spans)
    Hash(u64),
}

impl EditVerification {
    /// Check if the provided text matches the verification criteria.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("before-text verification failed for lines {start}..{end}")]
    BeforeTextMismatch { start: usize, end: usize, found: String },

    #[error("invalid line range [{start}, {end}) in source of {len} lines")]
    InvalidLineRange { start: usize, end: usize, len: usize },

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of applying a splice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "SpliceResult should be checked for applied/already-applied"]
pub enum SpliceResult {
    /// Lines were replaced
    Applied { removed: usize, inserted: usize },
    /// The range already held the replacement text
    AlreadyApplied,
}

impl Splice {
    /// Replace `[start, end)` of `lines`, capturing the current text as verification.
    pub fn replace(lines: &[String], start: usize, end: usize, replacement: Vec<String>) -> Self {
        let current = lines
            .get(start..end.min(lines.len()))
            .map(|span| span.join("\n"))
            .unwrap_or_default();
        Self {
            start,
            end,
            replacement,
            expected_before: EditVerification::from_text(&current),
        }
    }

    /// Insert `replacement` before line `at`.
    pub fn insert(at: usize, replacement: Vec<String>) -> Self {
        Self {
            start: at,
            end: at,
            replacement,
            expected_before: EditVerification::ExactMatch(String::new()),
        }
    }

    /// Remove `[start, end)` of `lines`.
    pub fn remove(lines: &[String], start: usize, end: usize) -> Self {
        Self::replace(lines, start, end, Vec::new())
    }

    fn validate(&self, lines: &[String]) -> Result<String, EditError> {
        if self.start > self.end || self.end > lines.len() {
            return Err(EditError::InvalidLineRange {
                start: self.start,
                end: self.end,
                len: lines.len(),
            });
        }

        let current = lines[self.start..self.end].join("\n");
        if !self.expected_before.matches(&current) {
            return Err(EditError::BeforeTextMismatch {
                start: self.start,
                end: self.end,
                found: current,
            });
        }
        Ok(current)
    }

    /// Apply this splice to an in-memory line buffer.
    pub fn apply(self, lines: &mut Vec<String>) -> Result<SpliceResult, EditError> {
        let current = self.validate(lines)?;

        if self.start != self.end && current == self.replacement.join("\n") {
            return Ok(SpliceResult::AlreadyApplied);
        }

        let removed = self.end - self.start;
        let inserted = self.replacement.len();
        lines.splice(self.start..self.end, self.replacement);
        Ok(SpliceResult::Applied { removed, inserted })
    }
}

/// Split source text into lines without terminators.
pub fn split_lines(source: &str) -> Vec<String> {
    source.lines().map(str::to_string).collect()
}

/// Join lines back into source text; non-empty output always ends in a newline.
pub fn join_lines(lines: &[String]) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// The leading whitespace of a line.
pub fn leading_ws(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

/// Strip the whitespace prefix common to every non-blank line.
///
/// Leading and trailing blank lines are dropped; interior blank lines become
/// empty strings.
pub fn dedent<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let first = lines.iter().position(|l| !is_blank(l.as_ref()));
    let last = lines.iter().rposition(|l| !is_blank(l.as_ref()));
    let (Some(first), Some(last)) = (first, last) else {
        return Vec::new();
    };
    let body = &lines[first..=last];

    let mut margin: Option<&str> = None;
    for line in body.iter().map(AsRef::as_ref).filter(|l| !is_blank(l)) {
        let ws = leading_ws(line);
        margin = Some(match margin {
            None => ws,
            Some(current) => common_prefix(current, ws),
        });
    }
    let margin = margin.unwrap_or("").len();

    body.iter()
        .map(|l| {
            let l = l.as_ref();
            if is_blank(l) {
                String::new()
            } else {
                l[margin..].trim_end().to_string()
            }
        })
        .collect()
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .char_indices()
        .zip(b.chars())
        .take_while(|((_, x), y)| x == y)
        .last()
        .map_or(0, |((i, c), _)| i + c.len_utf8());
    &a[..len]
}

/// Dedent `code` and re-indent every non-blank line with `indent`.
pub fn reindent(code: &str, indent: &str) -> Vec<String> {
    let lines: Vec<&str> = code.lines().collect();
    dedent(&lines)
        .into_iter()
        .map(|l| if l.is_empty() { l } else { format!("{indent}{l}") })
        .collect()
}

/// Atomic file write: tempfile + fsync + rename, then bump the mtime.
///
/// Either the full write succeeds or the target keeps its previous content.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    // Same directory keeps the rename on one filesystem
    let parent = path.parent().ok_or_else(|| {
        EditError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Path has no parent directory",
        ))
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    filetime::set_file_mtime(path, filetime::FileTime::now())?;
    Ok(())
}

/// Read a file that may not exist yet.
pub fn read_optional(path: &Path) -> std::io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
