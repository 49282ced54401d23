use crate::pool::with_parser;
use crate::ts::errors::ParseError;

/// Validate that Python source code has no syntax errors.
///
/// Returns Ok(()) if the code parses without ERROR or MISSING nodes.
pub fn validate_syntax(source: &str) -> Result<(), ParseError> {
    with_parser(|parser| {
        let parsed = parser.parse_with_source(source)?;
        parsed.ensure_valid()
    })?
}
