use crate::pool::with_parser;
use crate::ts::errors::TreeSitterError;

/// Number of ERROR/MISSING nodes and empty bodies in `source`.
pub fn syntax_error_count(source: &str) -> Result<usize, TreeSitterError> {
    with_parser(|parser| {
        parser
            .parse_with_source(source)
            .map(|parsed| parsed.error_rows().len())
    })?
}

/// Whether an edit turned a cleanly parsing source into one with errors.
///
/// Sources that were already broken never count as regressions.
pub fn introduces_syntax_errors(before: &str, after: &str) -> Result<bool, TreeSitterError> {
    if syntax_error_count(before)? > 0 {
        return Ok(false);
    }
    Ok(syntax_error_count(after)? > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_errors() {
        assert_eq!(syntax_error_count("x = 1\n").unwrap(), 0);
        assert!(syntax_error_count("def f(:\n").unwrap() > 0);
        assert!(syntax_error_count("class A:\ndef m(self):\n    pass\n").unwrap() > 0);
    }

    #[test]
    fn regression_detection() {
        let clean = "def f():\n    return 1\n";
        let broken = "def f():\nreturn 1\n";
        assert!(introduces_syntax_errors(clean, broken).unwrap());
        assert!(!introduces_syntax_errors(clean, clean).unwrap());
        assert!(!introduces_syntax_errors(broken, broken).unwrap());
    }
}
