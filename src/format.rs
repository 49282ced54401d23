//! Docstring formatting: turns raw annotation text into a delimited block
//! indented to an element's body.

/// Python multi-line string delimiter used for every generated docstring.
pub const DELIMITER: &str = "\"\"\"";

/// Layout choices for generated docstrings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatStyle {
    /// Keep a single-line docstring on one delimited line. When false, every
    /// docstring gets the delimiters on their own lines.
    pub compact_single_line: bool,
}

impl Default for FormatStyle {
    fn default() -> Self {
        Self {
            compact_single_line: true,
        }
    }
}

/// Format `raw` as a docstring block indented by `indent` spaces.
///
/// The result has no trailing newline; each line of it becomes one buffer
/// line. Blank content lines are left empty instead of being padded.
pub fn format_docstring(raw: &str, indent: usize, style: FormatStyle) -> String {
    let pad = " ".repeat(indent);
    let lines = clean_lines(strip_delimiters(raw));

    if lines.len() <= 1 && style.compact_single_line {
        let line = lines.first().map(String::as_str).unwrap_or_default();
        return format!("{pad}{DELIMITER}{}{DELIMITER}", escape_closing_quote(line));
    }

    let mut block = Vec::with_capacity(lines.len() + 2);
    block.push(format!("{pad}{DELIMITER}"));
    for line in &lines {
        if line.is_empty() {
            block.push(String::new());
        } else {
            block.push(format!("{pad}{line}"));
        }
    }
    block.push(format!("{pad}{DELIMITER}"));
    block.join("\n")
}

/// Drop delimiters a provider wrapped around the text itself.
fn strip_delimiters(raw: &str) -> &str {
    let trimmed = raw.trim();
    for delimiter in [DELIMITER, "'''"] {
        let body = trimmed
            .strip_prefix('r')
            .or_else(|| trimmed.strip_prefix('R'))
            .unwrap_or(trimmed);
        if body.len() >= 2 * delimiter.len()
            && body.starts_with(delimiter)
            && body.ends_with(delimiter)
        {
            return &body[delimiter.len()..body.len() - delimiter.len()];
        }
    }
    trimmed
}

/// Trim surrounding blank lines and remove the common indentation of every
/// line after the first, escaping embedded delimiters.
fn clean_lines(text: &str) -> Vec<String> {
    let raw: Vec<&str> = text.lines().map(str::trim_end).collect();

    let margin = raw
        .iter()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut lines: Vec<String> = raw
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let line = if i == 0 {
                line.trim_start()
            } else {
                match (line.get(..margin), line.get(margin..)) {
                    (Some(indent), Some(rest)) if indent.trim().is_empty() => rest,
                    _ => line.trim_start(),
                }
            };
            line.replace(DELIMITER, "\\\"\\\"\\\"")
        })
        .collect();

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    let leading_blank = lines.iter().take_while(|l| l.is_empty()).count();
    lines.drain(..leading_blank);
    lines
}

/// Keep the closing delimiter intact: an unescaped quote right before it
/// would end the string early, an odd run of backslashes would escape it.
fn escape_closing_quote(line: &str) -> String {
    match line.strip_suffix('"') {
        Some(head) if trailing_backslashes(head) % 2 == 0 => format!("{head}\\\""),
        Some(_) => line.to_string(),
        None if trailing_backslashes(line) % 2 == 1 => format!("{line}\\"),
        None => line.to_string(),
    }
}

fn trailing_backslashes(text: &str) -> usize {
    text.len() - text.trim_end_matches('\\').len()
}
