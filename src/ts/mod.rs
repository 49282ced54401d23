//! Tree-sitter integration for Python sources.
//!
//! Wraps the Python grammar shipped by `ast-grep-language` and produces an
//! immutable tree alongside the original text. Element extraction and
//! post-rewrite validation both build on [`ParsedSource`].

pub mod errors;
pub mod parser;
pub mod validator;

pub use errors::ParseError;
pub use parser::{ErrorNode, ParsedSource, PythonParser};
pub use validator::validate_syntax;
