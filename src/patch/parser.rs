//! Patch document parsing.
//!
//! Two layouts are accepted:
//!
//! ```text
//! # VibeSpec: 1.0                      VibeSpec: 1.6
//! # patch_type: add_function           ---
//! # file: hello.py                     patch_type: add_function
//! --- code                             file: hello.py
//! def greet():                         code: |
//!     return "hi"                        def greet():
//!                                            return "hi"
//! ```
//!
//! The legacy layout on the left holds exactly one record. The multi-record
//! layout on the right starts with an uncommented `VibeSpec` header and holds
//! any number of records. Parsing only extracts metadata and code; meaning is
//! checked by [`validate`](super::validator::validate).

use super::version::{key_introduced_in, PATCH_TYPE_KEY, SCHEMA_KEY};
use crate::edit::{dedent, is_blank};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Decoded metadata of one record, keyed by metadata key.
pub type Metadata = BTreeMap<String, String>;

/// One record as it appears in a document, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPatch {
    pub meta: Metadata,
    /// Code payload, dedented, without trailing blank lines
    pub code: String,
    /// 1-based line where the record starts
    pub line: usize,
}

impl RawPatch {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("line {line}: record has no `--- code` or `code: |` marker")]
    MissingCodeMarker { line: usize },

    #[error("line {line}: expected `key: value` metadata, found `{text}`")]
    MalformedMetadata { line: usize, text: String },

    #[error("line {line}: value of `{key}` cannot be decoded: {reason}")]
    UndecodableValue {
        line: usize,
        key: String,
        reason: String,
    },

    #[error("line {line}: code must be indented under its `code` marker: `{text}`")]
    UnindentedCode { line: usize, text: String },

    #[error("line {line}: unexpected content outside a record: `{text}`")]
    UnexpectedLine { line: usize, text: String },

    #[error("patch document contains no records")]
    Empty,

    #[error("failed to read patch document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ParseError {
    /// 1-based document line the error refers to, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::MissingCodeMarker { line }
            | ParseError::MalformedMetadata { line, .. }
            | ParseError::UndecodableValue { line, .. }
            | ParseError::UnexpectedLine { line, .. }
            | ParseError::UnindentedCode { line, .. } => Some(*line),
            ParseError::Empty | ParseError::Io { .. } => None,
        }
    }
}

/// Parse a patch document into its raw records, in document order.
pub fn parse(document: &str) -> Result<Vec<RawPatch>, ParseError> {
    let lines: Vec<&str> = document.lines().collect();
    let first = lines
        .iter()
        .position(|l| !is_blank(l) && !l.trim_start().starts_with('#'));

    let header = first.and_then(|i| {
        split_key_value(lines[i].trim())
            .filter(|(key, _)| *key == SCHEMA_KEY)
            .map(|(key, raw)| (i, key, raw))
    });

    match header {
        Some((i, key, raw)) => {
            let version = decode_value(i + 1, key, raw)?;
            let mut cursor = Cursor {
                lines: &lines,
                pos: i + 1,
            };
            parse_records(&mut cursor, &version)
        }
        None if lines.iter().all(|l| is_blank(l)) => Err(ParseError::Empty),
        None => parse_legacy(&lines).map(|record| vec![record]),
    }
}

/// Read and parse a patch document from disk.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Vec<RawPatch>, ParseError> {
    let path = path.as_ref();
    let document = fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&document)
}

struct Cursor<'a> {
    lines: &'a [&'a str],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.pos).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    /// 1-based line number of the current position.
    fn line(&self) -> usize {
        self.pos + 1
    }
}

fn parse_records(cursor: &mut Cursor<'_>, version: &str) -> Result<Vec<RawPatch>, ParseError> {
    let mut records = Vec::new();

    while let Some(line) = cursor.peek() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed == "---" {
            cursor.advance();
            continue;
        }

        let starts_record = !line.starts_with(char::is_whitespace)
            && split_key_value(trimmed).is_some_and(|(key, _)| key == PATCH_TYPE_KEY);
        if !starts_record {
            return Err(ParseError::UnexpectedLine {
                line: cursor.line(),
                text: trimmed.to_string(),
            });
        }
        records.push(parse_record(cursor, version)?);
    }

    if records.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(records)
}

fn parse_record(cursor: &mut Cursor<'_>, version: &str) -> Result<RawPatch, ParseError> {
    let start = cursor.line();
    let mut meta = Metadata::new();
    meta.insert(SCHEMA_KEY.to_string(), version.to_string());

    loop {
        let Some(line) = cursor.peek() else {
            return Err(ParseError::MissingCodeMarker { line: start });
        };
        let trimmed = line.trim();
        if is_code_marker(trimmed) {
            cursor.advance();
            break;
        }
        if trimmed.is_empty() || trimmed.starts_with('#') {
            cursor.advance();
            continue;
        }

        let (key, raw) = split_key_value(trimmed).ok_or_else(|| ParseError::MalformedMetadata {
            line: cursor.line(),
            text: trimmed.to_string(),
        })?;
        if key == PATCH_TYPE_KEY && cursor.line() != start {
            return Err(ParseError::MissingCodeMarker { line: start });
        }
        meta.insert(key.to_string(), decode_value(cursor.line(), key, raw)?);
        cursor.advance();
    }

    let mut body = Vec::new();
    while let Some(line) = cursor.peek() {
        if !is_blank(line) && !line.starts_with(char::is_whitespace) {
            break;
        }
        body.push(line);
        cursor.advance();
    }
    if body.iter().all(|l| is_blank(l)) {
        if let Some(next) = cursor.peek().map(str::trim) {
            let ends_record = next == "---"
                || next.starts_with('#')
                || split_key_value(next).is_some_and(|(key, _)| key == PATCH_TYPE_KEY);
            if !ends_record {
                return Err(ParseError::UnindentedCode {
                    line: cursor.line(),
                    text: next.to_string(),
                });
            }
        }
    }

    Ok(RawPatch {
        meta,
        code: dedent(&body).join("\n"),
        line: start,
    })
}

fn parse_legacy(lines: &[&str]) -> Result<RawPatch, ParseError> {
    let marker = lines
        .iter()
        .position(|l| l.trim_start().starts_with("--- code"))
        .ok_or(ParseError::MissingCodeMarker { line: 1 })?;

    let mut meta = Metadata::new();
    for raw_line in &lines[..marker] {
        let text = raw_line.trim_start();
        let text = text.strip_prefix('#').unwrap_or(text).trim();
        let Some((key, raw)) = split_key_value(text) else {
            continue;
        };
        // Free-form comments may look like `Note: ...`; only schema keys count.
        if key_introduced_in(key).is_none() {
            continue;
        }
        meta.insert(key.to_string(), unquote(raw).to_string());
    }

    let start = lines
        .iter()
        .position(|l| !is_blank(l))
        .map_or(1, |i| i + 1);

    Ok(RawPatch {
        meta,
        code: dedent(&lines[marker + 1..]).join("\n"),
        line: start,
    })
}

fn is_code_marker(trimmed: &str) -> bool {
    if trimmed.starts_with("--- code") {
        return true;
    }
    trimmed
        .strip_prefix("code:")
        .map(str::trim)
        .is_some_and(|rest| matches!(rest, "|" | "|-" | "|+"))
}

/// Split `key: value` where `key` is an identifier.
fn split_key_value(text: &str) -> Option<(&str, &str)> {
    let (key, value) = text.split_once(':')?;
    let key = key.trim();
    let mut chars = key.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some((key, value.trim()))
}

/// Decode a raw metadata value as a YAML scalar.
fn decode_value(line: usize, key: &str, raw: &str) -> Result<String, ParseError> {
    if raw.is_empty() {
        return Ok(String::new());
    }
    let undecodable = |reason: String| ParseError::UndecodableValue {
        line,
        key: key.to_string(),
        reason,
    };

    match serde_yaml::from_str::<Value>(raw) {
        Ok(Value::String(s)) => Ok(s),
        Ok(Value::Null) => Ok(String::new()),
        // Keep `1.10` as written rather than round-tripping through a float.
        Ok(Value::Number(_) | Value::Bool(_)) => Ok(strip_comment(raw).to_string()),
        Ok(Value::Sequence(_) | Value::Mapping(_)) => Err(undecodable(
            "expected a scalar, found a sequence or mapping (quote the value)".to_string(),
        )),
        Ok(Value::Tagged(_)) => Err(undecodable("tagged values are not supported".to_string())),
        Err(e) => Err(undecodable(e.to_string())),
    }
}

/// Legacy values are taken verbatim, minus one pair of matching quotes.
fn unquote(raw: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|&q| raw.strip_prefix(q)?.strip_suffix(q))
        .unwrap_or(raw)
}

fn strip_comment(raw: &str) -> &str {
    raw.split(" #").next().unwrap_or(raw).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_document() {
        let doc = "\
# VibeSpec: 1.0
# patch_type: add_function
# file: hello.py
# Note: comments are prose
--- code
def greet():
    return 'hi'

";
        let records = parse(doc).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.get("VibeSpec"), Some("1.0"));
        assert_eq!(record.get("patch_type"), Some("add_function"));
        assert_eq!(record.get("file"), Some("hello.py"));
        assert_eq!(record.get("Note"), None);
        assert_eq!(record.code, "def greet():\n    return 'hi'");
        assert_eq!(record.line, 1);
    }

    #[test]
    fn legacy_values_are_verbatim() {
        let doc = "\
# VibeSpec: 1.0
# patch_type: add_block
# file: 'app.py'
# position: after
# anchor: ^class Foo:
--- code
x = 1
";
        let records = parse(doc).unwrap();
        assert_eq!(records[0].get("anchor"), Some("^class Foo:"));
        assert_eq!(records[0].get("file"), Some("app.py"));

        let doc = doc.replace("^class Foo:", "@app.route(\"/\")");
        assert_eq!(parse(&doc).unwrap()[0].get("anchor"), Some("@app.route(\"/\")"));
        assert_eq!(unquote("\"a"), "\"a");
    }

    #[test]
    fn multi_record_document() {
        let doc = "\
VibeSpec: 1.6
---
patch_type: replace_function
file: \"pkg/mod.py\"
name: greet
code: |
  def greet():
      return 'hello'

---
# second record
patch_type: remove_block
file: pkg/mod.py
anchor_start: '^# begin'
anchor_end: '^# end'
--- code
";
        let records = parse(doc).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].get("file"), Some("pkg/mod.py"));
        assert_eq!(records[0].get("VibeSpec"), Some("1.6"));
        assert_eq!(records[0].code, "def greet():\n    return 'hello'");
        assert_eq!(records[0].line, 3);

        assert_eq!(records[1].get("anchor_start"), Some("^# begin"));
        assert_eq!(records[1].code, "");
        assert_eq!(records[1].line, 12);
    }

    #[test]
    fn record_version_overrides_header() {
        let doc = "VibeSpec: 1.6\npatch_type: add_class\nfile: a.py\nVibeSpec: 1.0\ncode: |\n  class A:\n      pass\n";
        let records = parse(doc).unwrap();
        assert_eq!(records[0].get("VibeSpec"), Some("1.0"));
    }

    #[test]
    fn missing_code_marker() {
        let doc = "VibeSpec: 1.6\npatch_type: add_class\nfile: a.py\npatch_type: add_class\n";
        assert!(matches!(
            parse(doc),
            Err(ParseError::MissingCodeMarker { line: 2 })
        ));
        assert!(matches!(
            parse("# VibeSpec: 1.0\n# file: a.py\n"),
            Err(ParseError::MissingCodeMarker { .. })
        ));
    }

    #[test]
    fn undecodable_value() {
        let doc = "VibeSpec: 1.6\npatch_type: add_block\nfile: [a.py, b.py]\ncode: |\n  x = 1\n";
        let err = parse(doc).unwrap_err();
        assert!(matches!(err, ParseError::UndecodableValue { line: 3, .. }));
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn malformed_metadata_and_stray_lines() {
        let doc = "VibeSpec: 1.6\npatch_type: add_block\njust words\ncode: |\n  x = 1\n";
        assert!(matches!(
            parse(doc),
            Err(ParseError::MalformedMetadata { line: 3, .. })
        ));

        let doc = "VibeSpec: 1.6\npatch_type: add_block\nfile: a.py\n--- code\nx = 1\n";
        let err = parse(doc).unwrap_err();
        assert!(matches!(err, ParseError::UnindentedCode { line: 5, .. }));
        assert!(err.to_string().contains("must be indented"));

        let doc = "VibeSpec: 1.6\nfile: a.py\n";
        assert!(matches!(
            parse(doc),
            Err(ParseError::UnexpectedLine { line: 2, .. })
        ));
    }

    #[test]
    fn empty_documents() {
        assert!(matches!(parse(""), Err(ParseError::Empty)));
        assert!(matches!(parse("VibeSpec: 1.6\n---\n"), Err(ParseError::Empty)));
    }

    #[test]
    fn scalar_decoding() {
        assert_eq!(decode_value(1, "k", "'^\\s*import'").unwrap(), "^\\s*import");
        assert_eq!(decode_value(1, "k", "1.10").unwrap(), "1.10");
        assert_eq!(decode_value(1, "k", "~").unwrap(), "");
        assert!(decode_value(1, "k", "{a: 1}").is_err());
    }

    #[test]
    fn code_markers() {
        assert!(is_code_marker("--- code"));
        assert!(is_code_marker("--- code ---"));
        assert!(is_code_marker("code: |"));
        assert!(is_code_marker("code: |-"));
        assert!(!is_code_marker("code: x"));
    }
}
