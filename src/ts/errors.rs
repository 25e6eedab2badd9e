use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeSitterError {
    #[error("failed to set language for parser")]
    LanguageSet,

    #[error("failed to parse source code")]
    ParseFailed,

    #[error("source contains {count} syntax error(s), first at line {line}")]
    SyntaxErrors { count: usize, line: usize },
}
