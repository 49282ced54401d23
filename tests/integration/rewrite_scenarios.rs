//! In-memory rewrites of complete Python sources.

use super::{Scripted, MODULE};
use docstring_patcher::{
    list_elements, AnnotationError, ElementKind, ElementState, FormatStyle, RewriteOptions,
    Rewriter, SkipReason,
};

/// Module docstring on lines 2-4, `compute` header on line 10.
const TWENTY_LINES: &str = r#"#!/usr/bin/env python
"""Helpers for
the scenario.
"""
import os

VALUE = 1


def compute(x):
    y = x + VALUE
    return y


CONSTANTS = {
    "a": os.sep,
}

# trailing comment
print(compute(1))
"#;

fn expanded() -> RewriteOptions {
    RewriteOptions {
        style: FormatStyle {
            compact_single_line: false,
        },
        ..RewriteOptions::default()
    }
}

/// Source lines outside every docstring region.
fn lines_outside_docstrings(source: &str) -> Vec<String> {
    let spans: Vec<_> = list_elements(source)
        .unwrap()
        .into_iter()
        .filter_map(|e| e.existing_docstring_span)
        .collect();
    source
        .split_inclusive('\n')
        .enumerate()
        .filter(|(i, _)| !spans.iter().any(|span| span.start <= i + 1 && i + 1 <= span.end))
        .map(|(_, line)| line.to_string())
        .collect()
}

#[test]
fn test_scenario_is_twenty_lines() {
    assert_eq!(TWENTY_LINES.lines().count(), 20);
    let elements = list_elements(TWENTY_LINES).unwrap();
    assert_eq!(elements.len(), 2);
    assert_eq!(elements[0].existing_docstring_span.unwrap().start, 2);
    assert_eq!(elements[0].existing_docstring_span.unwrap().end, 4);
    assert_eq!(elements[1].header_end_line, 10);
}

#[test]
fn test_module_replaced_and_function_inserted() {
    let provider = Scripted::new(&[(MODULE, Ok("A.\n\nB.")), ("compute", Ok("C."))]);
    let rewriter = Rewriter::new(&provider, expanded());
    let rewrite = rewriter.rewrite_source(TWENTY_LINES).unwrap();

    let expected = r#"#!/usr/bin/env python
"""
A.

B.
"""
import os

VALUE = 1


def compute(x):
    """
    C.
    """
    y = x + VALUE
    return y


CONSTANTS = {
    "a": os.sep,
}

# trailing comment
print(compute(1))
"#;
    assert_eq!(rewrite.text, expected);

    let new_module_len = 5;
    assert_eq!(rewrite.cumulative_offset, (new_module_len - 3) + 3);

    let module = rewrite.outcomes[0].patch.unwrap();
    assert_eq!(module.buffer_line, 2);
    assert_eq!(module.removed, 3);
    assert_eq!(module.inserted, 5);

    let function = rewrite.outcomes[1].patch.unwrap();
    assert_eq!(function.buffer_line, 11 + 2);
    assert_eq!(function.inserted, 3);
}

#[test]
fn test_failed_module_contributes_no_offset() {
    let provider = Scripted::new(&[
        (
            MODULE,
            Err(AnnotationError::Status {
                status: 500,
                body: "upstream".to_string(),
            }),
        ),
        ("compute", Ok("C.")),
    ]);
    let rewriter = Rewriter::new(&provider, expanded());
    let rewrite = rewriter.rewrite_source(TWENTY_LINES).unwrap();

    assert_eq!(rewrite.outcomes[0].state, ElementState::Skipped);
    assert!(rewrite.outcomes[0].patch.is_none());

    let function = rewrite.outcomes[1].patch.unwrap();
    assert_eq!(function.buffer_line, 11);
    assert_eq!(rewrite.cumulative_offset, 3);

    let lines: Vec<&str> = rewrite.text.lines().collect();
    assert_eq!(&lines[..4], &TWENTY_LINES.lines().take(4).collect::<Vec<_>>()[..]);
    assert_eq!(lines[9], "def compute(x):");
    assert_eq!(&lines[10..13], &["    \"\"\"", "    C.", "    \"\"\""]);
    assert_eq!(lines[13], "    y = x + VALUE");
}

#[test]
fn test_compact_single_line_layout() {
    let provider = Scripted::new(&[(MODULE, Ok("A.\n\nB.")), ("compute", Ok("C."))]);
    let rewriter = Rewriter::new(&provider, RewriteOptions::default());
    let rewrite = rewriter.rewrite_source(TWENTY_LINES).unwrap();

    assert!(rewrite
        .text
        .contains("def compute(x):\n    \"\"\"C.\"\"\"\n    y = x + VALUE\n"));
    assert_eq!(rewrite.cumulative_offset, 2 + 1);
}

const SERVICE: &str = r#"# -*- coding: utf-8 -*-
import functools


class Service:
    """Old service doc."""

    retries = 3

    def __init__(self, name):
        self.name = name

    @functools.lru_cache
    def lookup(self, key):
        '''Old lookup doc.

        Returns the value.
        '''
        return key.upper()

    async def close(self):
        pass


def helper(value):
    # comment before the body
    return value * 2
"#;

#[test]
fn test_bytes_outside_docstrings_preserved() {
    let provider = Scripted::new(&[
        (MODULE, Ok("Service helpers.")),
        ("Service", Ok("A service.\n\nHolds a name.")),
        ("__init__", Ok("Create a service.")),
        ("lookup", Ok("Look up a key.")),
        ("close", Ok("Close the service.\n\nIdempotent.")),
        ("helper", Ok("Double a value.")),
    ]);
    let rewriter = Rewriter::new(&provider, RewriteOptions::default());
    let rewrite = rewriter.rewrite_source(SERVICE).unwrap();

    assert_eq!(rewrite.patched(), 6);
    assert_eq!(rewrite.skipped(), 0);
    assert_eq!(
        lines_outside_docstrings(SERVICE),
        lines_outside_docstrings(&rewrite.text)
    );

    let elements = list_elements(&rewrite.text).unwrap();
    assert!(elements.iter().all(|e| e.has_docstring()));
}

#[test]
fn test_methods_use_body_indentation() {
    let provider = Scripted::new(&[
        (MODULE, Ok("Service helpers.")),
        ("Service", Ok("A service.")),
        ("__init__", Ok("Create a service.")),
        ("lookup", Ok("Look up a key.")),
        ("close", Ok("Close the service.\n\nIdempotent.")),
        ("helper", Ok("Double a value.")),
    ]);
    let rewriter = Rewriter::new(&provider, RewriteOptions::default());
    let rewrite = rewriter.rewrite_source(SERVICE).unwrap();

    assert!(rewrite.text.starts_with(
        "# -*- coding: utf-8 -*-\n\"\"\"Service helpers.\"\"\"\nimport functools\n"
    ));
    assert!(rewrite
        .text
        .contains("class Service:\n    \"\"\"A service.\"\"\"\n\n    retries = 3\n"));
    assert!(rewrite.text.contains(
        "    def __init__(self, name):\n        \"\"\"Create a service.\"\"\"\n        self.name = name\n"
    ));
    assert!(rewrite.text.contains(
        "    @functools.lru_cache\n    def lookup(self, key):\n        \"\"\"Look up a key.\"\"\"\n        return key.upper()\n"
    ));
    assert!(rewrite.text.contains(
        "    async def close(self):\n        \"\"\"\n        Close the service.\n\n        Idempotent.\n        \"\"\"\n        pass\n"
    ));
    assert!(rewrite.text.contains(
        "def helper(value):\n    \"\"\"Double a value.\"\"\"\n    # comment before the body\n"
    ));
}

#[test]
fn test_middle_failure_is_contained() {
    let source = "def a():\n    return 1\n\n\ndef b():\n    \"\"\"Keep me.\"\"\"\n    return 2\n\n\ndef c():\n    return 3\n";
    let provider = Scripted::new(&[
        (MODULE, Err(AnnotationError::Timeout)),
        ("a", Ok("First.")),
        ("b", Err(AnnotationError::Malformed("not json".to_string()))),
        ("c", Ok("Third.")),
    ]);
    let rewriter = Rewriter::new(&provider, RewriteOptions::default());
    let rewrite = rewriter.rewrite_source(source).unwrap();

    assert_eq!(
        rewrite.text,
        "def a():\n    \"\"\"First.\"\"\"\n    return 1\n\n\ndef b():\n    \"\"\"Keep me.\"\"\"\n    return 2\n\n\ndef c():\n    \"\"\"Third.\"\"\"\n    return 3\n"
    );

    let states: Vec<_> = rewrite.outcomes.iter().map(|o| o.state).collect();
    assert_eq!(
        states,
        vec![
            ElementState::Skipped,
            ElementState::Done,
            ElementState::Skipped,
            ElementState::Done
        ]
    );
    assert!(matches!(
        rewrite.outcomes[2].skip_reason,
        Some(SkipReason::Annotation(AnnotationError::Malformed(_)))
    ));
    assert_eq!(rewrite.cumulative_offset, 2);
}

#[test]
fn test_second_pass_is_stable() {
    let provider = Scripted::new(&[(MODULE, Ok("A.\n\nB.")), ("compute", Ok("C."))]);
    let rewriter = Rewriter::new(&provider, RewriteOptions::default());
    let first = rewriter.rewrite_source(TWENTY_LINES).unwrap();
    let second = rewriter.rewrite_source(&first.text).unwrap();

    assert_eq!(first.text, second.text);
    assert_eq!(second.cumulative_offset, 0);
    assert!(!second.changed());
}

#[test]
fn test_crlf_line_endings_survive() {
    let source = "import os\r\n\r\ndef f():\r\n    return os.sep\r\n";
    let provider = Scripted::new(&[(MODULE, Err(AnnotationError::Timeout)), ("f", Ok("Sep."))]);
    let rewriter = Rewriter::new(&provider, RewriteOptions::default());
    let rewrite = rewriter.rewrite_source(source).unwrap();

    assert_eq!(
        rewrite.text,
        "import os\r\n\r\ndef f():\r\n    \"\"\"Sep.\"\"\"\r\n    return os.sep\r\n"
    );
}

#[test]
fn test_missing_trailing_newline_is_kept() {
    let source = "def f():\n    \"\"\"Old.\"\"\"";
    let provider = Scripted::new(&[(MODULE, Err(AnnotationError::Timeout)), ("f", Ok("New."))]);
    let rewriter = Rewriter::new(&provider, RewriteOptions::default());
    let rewrite = rewriter.rewrite_source(source).unwrap();

    assert_eq!(rewrite.text, "def f():\n    \"\"\"New.\"\"\"");
}

#[test]
fn test_only_selected_kinds_are_annotated() {
    let provider = Scripted::new(&[
        (MODULE, Ok("Service helpers.")),
        ("Service", Ok("A service.")),
        ("__init__", Ok("Create.")),
        ("lookup", Ok("Look up.")),
        ("close", Ok("Close.")),
        ("helper", Ok("Double.")),
    ]);
    let options = RewriteOptions {
        kinds: vec![ElementKind::Method],
        ..RewriteOptions::default()
    };
    let rewriter = Rewriter::new(&provider, options);
    let rewrite = rewriter.rewrite_source(SERVICE).unwrap();

    assert_eq!(rewrite.patched(), 3);
    assert_eq!(provider.call_count(), 3);
    assert!(provider
        .calls
        .lock()
        .unwrap()
        .iter()
        .all(|(kind, _)| *kind == ElementKind::Method));
    assert!(rewrite.text.contains("    \"\"\"Old service doc.\"\"\"\n"));
}

#[test]
fn test_trailing_comments_on_docstring_lines_survive() {
    let source = "\"\"\"Old module.\"\"\"  # noqa: D400\n\n\ndef f():\n    \"\"\"Old.\"\"\"  # keep: noqa\n    return 1\n";
    let provider = Scripted::new(&[(MODULE, Ok("New module.")), ("f", Ok("New."))]);
    let rewriter = Rewriter::new(&provider, RewriteOptions::default());
    let rewrite = rewriter.rewrite_source(source).unwrap();

    assert_eq!(
        rewrite.text,
        "\"\"\"New module.\"\"\"  # noqa: D400\n\n\ndef f():\n    \"\"\"New.\"\"\"  # keep: noqa\n    return 1\n"
    );
    assert_eq!(rewrite.cumulative_offset, 0);
}
