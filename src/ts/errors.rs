use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn Python source into a usable syntax tree.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("failed to set language for parser")]
    LanguageSet,

    #[error("failed to parse source code")]
    ParseFailed,

    #[error("syntax error at line {line} (bytes {byte_start}..{byte_end})")]
    SyntaxError {
        line: usize,
        byte_start: usize,
        byte_end: usize,
    },

    #[error("{count} syntax errors, first at line {first_line}")]
    MultipleSyntaxErrors { count: usize, first_line: usize },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
