//! Thread-local parser pooling.
//!
//! Creating a tree-sitter parser and loading the Python grammar is not free,
//! and every file (plus every post-rewrite validation) needs one. Each thread
//! keeps a single [`PythonParser`] and reuses it.

use crate::ts::{ParseError, PythonParser};
use std::cell::RefCell;

thread_local! {
    static PYTHON_PARSER: RefCell<Option<PythonParser>> = const { RefCell::new(None) };
}

/// Execute function with pooled parser instance.
///
/// # Example
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use docstring_patcher::pool::with_parser;
///
/// let has_errors = with_parser(|parser| {
///     parser.parse_with_source("def main():\n    pass\n").map(|p| p.has_errors())
/// })??;
/// # Ok(())
/// # }
/// ```
pub fn with_parser<F, R>(f: F) -> Result<R, ParseError>
where
    F: FnOnce(&mut PythonParser) -> R,
{
    PYTHON_PARSER.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            *slot = Some(PythonParser::new()?);
        }
        let parser = slot.as_mut().ok_or(ParseError::LanguageSet)?;
        Ok(f(parser))
    })
}
