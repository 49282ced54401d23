//! Element extraction: walks an immutable Python syntax tree and yields the
//! documentable units (module, classes, functions, methods) in ascending
//! line order, each with the span of its current docstring if it has one.
//!
//! All line numbers are 1-indexed and refer to the original, unmodified
//! source. Functions nested inside functions are part of their enclosing
//! body and are never emitted on their own, so spans of the same scope never
//! overlap.

use crate::pool::with_parser;
use crate::ts::{ParseError, ParsedSource};
use serde::{Deserialize, Serialize};
use std::fmt;
use tree_sitter::Node;

/// Indentation added for a body when the source gives no better hint.
pub const INDENT_UNIT: usize = 4;

/// Kind of documentable element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Module,
    Class,
    Function,
    Method,
}

impl ElementKind {
    pub const ALL: [ElementKind; 4] = [
        ElementKind::Module,
        ElementKind::Class,
        ElementKind::Function,
        ElementKind::Method,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Module => "module",
            ElementKind::Class => "class",
            ElementKind::Function => "function",
            ElementKind::Method => "method",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive, 1-indexed line range in original coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    pub start: usize,
    pub end: usize,
}

impl LineSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of lines covered.
    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn contains(&self, other: &LineSpan) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for LineSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// One documentable unit of a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub kind: ElementKind,
    /// Identifier; `None` for the module.
    pub name: Option<String>,
    /// First line of the element, decorators included.
    pub start_line: usize,
    pub end_line: usize,
    /// Column of the `def` / `class` keyword (0 for the module).
    pub indent: usize,
    /// Line holding the `:` that closes the header. A fresh docstring is
    /// inserted right after it. For the module this is the last line of the
    /// leading comment block (shebang, encoding), or 0.
    pub header_end_line: usize,
    /// Column at which the body's statements start.
    pub body_indent: usize,
    /// The body, or the docstring, shares a physical line with code that has
    /// to survive the rewrite (`def f(): pass`, `"""doc"""; x = 1`).
    pub inline_body: bool,
    pub existing_docstring_span: Option<LineSpan>,
    /// Text following the docstring on its last line, usually a trailing
    /// comment. Carried over onto the replacement.
    pub docstring_trailer: Option<String>,
    /// Source text of the whole element.
    pub source: String,
}

impl Element {
    pub fn span(&self) -> LineSpan {
        LineSpan::new(self.start_line, self.end_line)
    }

    pub fn has_docstring(&self) -> bool {
        self.existing_docstring_span.is_some()
    }

    /// Human readable identification used in logs and reports.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{} `{}` (lines {})", self.kind, name, self.span()),
            None => format!("{} (lines {})", self.kind, self.span()),
        }
    }
}

/// Extract the ordered element sequence from a parsed source.
///
/// Fails with a [`ParseError`] if the tree contains syntax errors.
pub fn extract_elements(parsed: &ParsedSource<'_>) -> Result<Vec<Element>, ParseError> {
    parsed.ensure_valid()?;

    let mut elements = Vec::new();
    let root = parsed.root_node();

    if !parsed.source.trim().is_empty() {
        elements.push(module_element(parsed, root));
    }
    walk_scope(parsed, root, false, &mut elements);

    elements.sort_by_key(|e| e.start_line);
    Ok(elements)
}

/// Parse `source` with the pooled parser and extract its elements.
pub fn list_elements(source: &str) -> Result<Vec<Element>, ParseError> {
    with_parser(|parser| {
        let parsed = parser.parse_with_source(source)?;
        extract_elements(&parsed)
    })?
}

fn module_element(parsed: &ParsedSource<'_>, root: Node<'_>) -> Element {
    let leading_comments = parsed
        .source
        .lines()
        .take_while(|line| line.trim_start().starts_with('#'))
        .count();

    let first = first_statement(root);
    let docstring = first.and_then(|stmt| docstring_span(parsed, stmt));
    let docstring_trailer = docstring.and(first).and_then(|stmt| line_trailer(parsed, stmt));
    let inline_body = match (first, docstring) {
        (Some(stmt), Some(_)) => shares_line_with_next(stmt),
        _ => false,
    };

    Element {
        kind: ElementKind::Module,
        name: None,
        start_line: 1,
        end_line: parsed.line_count().max(1),
        indent: 0,
        header_end_line: leading_comments,
        body_indent: 0,
        inline_body,
        existing_docstring_span: docstring,
        docstring_trailer,
        source: parsed.source.to_string(),
    }
}

fn walk_scope(
    parsed: &ParsedSource<'_>,
    container: Node<'_>,
    in_class: bool,
    out: &mut Vec<Element>,
) {
    let mut cursor = container.walk();
    for child in container.named_children(&mut cursor) {
        let definition = if child.kind() == "decorated_definition" {
            match child.child_by_field_name("definition") {
                Some(def) => def,
                None => continue,
            }
        } else {
            child
        };

        match definition.kind() {
            "function_definition" => {
                let kind = if in_class {
                    ElementKind::Method
                } else {
                    ElementKind::Function
                };
                out.push(definition_element(parsed, child, definition, kind));
            }
            "class_definition" => {
                out.push(definition_element(parsed, child, definition, ElementKind::Class));
                if let Some(body) = definition.child_by_field_name("body") {
                    walk_scope(parsed, body, true, out);
                }
            }
            _ => {}
        }
    }
}

fn definition_element(
    parsed: &ParsedSource<'_>,
    outer: Node<'_>,
    definition: Node<'_>,
    kind: ElementKind,
) -> Element {
    let name = definition
        .child_by_field_name("name")
        .map(|n| parsed.node_text(n).to_string());
    let indent = definition.start_position().column;
    let body = definition.child_by_field_name("body");
    let header_end_line =
        header_colon_line(definition).unwrap_or(definition.start_position().row + 1);

    let first = body.and_then(first_statement);
    let (inline_body, body_indent) = match first {
        Some(stmt) if stmt.start_position().row + 1 > header_end_line => {
            (false, stmt.start_position().column)
        }
        _ => (true, indent + INDENT_UNIT),
    };

    let docstring = first.and_then(|stmt| docstring_span(parsed, stmt));
    let inline_body =
        inline_body || (docstring.is_some() && first.is_some_and(shares_line_with_next));
    let docstring_trailer = docstring.and(first).and_then(|stmt| line_trailer(parsed, stmt));

    Element {
        kind,
        name,
        start_line: outer.start_position().row + 1,
        end_line: end_line(outer),
        indent,
        header_end_line,
        body_indent,
        inline_body,
        existing_docstring_span: docstring,
        docstring_trailer,
        source: parsed.node_text(outer).to_string(),
    }
}

/// Last line of a node, not counting a trailing position at column 0.
fn end_line(node: Node<'_>) -> usize {
    let start = node.start_position();
    let end = node.end_position();
    if end.column == 0 && end.row > start.row {
        end.row
    } else {
        end.row + 1
    }
}

/// Line of the `:` token that ends a `def` / `class` header.
fn header_colon_line(definition: Node<'_>) -> Option<usize> {
    let mut cursor = definition.walk();
    let colon = definition
        .children(&mut cursor)
        .filter(|child| child.kind() == ":")
        .last();
    colon.map(|c| c.start_position().row + 1)
}

/// First statement of a block or module; comments are not statements.
fn first_statement(container: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = container.walk();
    let first = container
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment");
    first
}

fn shares_line_with_next(stmt: Node<'_>) -> bool {
    let mut next = stmt.next_named_sibling();
    while let Some(node) = next {
        if node.kind() != "comment" {
            return node.start_position().row == stmt.end_position().row;
        }
        next = node.next_named_sibling();
    }
    false
}

/// Non-blank text after `stmt` on the physical line where it ends.
fn line_trailer(parsed: &ParsedSource<'_>, stmt: Node<'_>) -> Option<String> {
    if stmt.end_position().column == 0 {
        return None;
    }
    let rest = parsed.source.get(stmt.end_byte()..)?;
    let line = rest.split('\n').next().unwrap_or_default();
    let line = line.trim_end_matches('\r').trim_end();
    (!line.trim().is_empty()).then(|| line.to_string())
}

/// Span of `stmt` if it is a bare string-literal expression statement.
fn docstring_span(parsed: &ParsedSource<'_>, stmt: Node<'_>) -> Option<LineSpan> {
    if stmt.kind() != "expression_statement" || stmt.named_child_count() != 1 {
        return None;
    }
    let expr = stmt.named_child(0)?;
    let is_docstring = match expr.kind() {
        "string" => is_plain_string(parsed, expr),
        "concatenated_string" => {
            let mut cursor = expr.walk();
            let all_plain = expr
                .named_children(&mut cursor)
                .all(|part| part.kind() == "string" && is_plain_string(parsed, part));
            all_plain
        }
        _ => false,
    };

    is_docstring.then(|| LineSpan::new(stmt.start_position().row + 1, end_line(stmt)))
}

/// A string literal without f-string interpolation or a bytes prefix.
fn is_plain_string(parsed: &ParsedSource<'_>, string: Node<'_>) -> bool {
    let mut cursor = string.walk();
    let mut plain = true;
    for child in string.children(&mut cursor) {
        match child.kind() {
            "interpolation" => plain = false,
            "string_start" => {
                let prefix = parsed
                    .node_text(child)
                    .trim_end_matches(['"', '\''])
                    .to_ascii_lowercase();
                if prefix.contains('f') || prefix.contains('b') {
                    plain = false;
                }
            }
            _ => {}
        }
    }
    plain
}
