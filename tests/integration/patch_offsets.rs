//! Offset bookkeeping of the patch engine against a naive rebuild.

use docstring_patcher::extract::LineSpan;
use docstring_patcher::{PatchOp, RewriteSession};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    Insert { gap: usize, lines: usize },
    Replace { gap: usize, removed: usize, lines: usize },
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0usize..4, 1usize..6).prop_map(|(gap, lines)| Step::Insert { gap, lines }),
        (0usize..4, 1usize..5, 1usize..6).prop_map(|(gap, removed, lines)| Step::Replace {
            gap,
            removed,
            lines
        }),
    ]
}

fn block(op: usize, lines: usize) -> String {
    (0..lines)
        .map(|k| format!("new{op}_{k}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Turn steps into ascending ops over an `n`-line file, dropping steps that
/// would run past its end.
fn plan(n: usize, steps: &[Step]) -> Vec<PatchOp> {
    let mut cursor = 0;
    let mut ops = Vec::new();
    for (i, step) in steps.iter().enumerate() {
        match *step {
            Step::Insert { gap, lines } => {
                let line = cursor + gap;
                if line > n {
                    break;
                }
                ops.push(PatchOp::insert_after(line, block(i, lines)));
                cursor = line;
            }
            Step::Replace {
                gap,
                removed,
                lines,
            } => {
                let start = cursor + gap + 1;
                let end = start + removed - 1;
                if end > n {
                    break;
                }
                ops.push(PatchOp::replace(LineSpan::new(start, end), block(i, lines)));
                cursor = end;
            }
        }
    }
    ops
}

/// Apply `ops` by rebuilding the file from scratch.
fn rebuild(original: &[String], ops: &[PatchOp]) -> String {
    let mut out = String::new();
    let mut next = 1;
    let emit_until = |out: &mut String, next: &mut usize, last: usize| {
        while *next <= last {
            out.push_str(&original[*next - 1]);
            *next += 1;
        }
    };

    for op in ops {
        match op.original_range {
            Some(range) => {
                emit_until(&mut out, &mut next, range.start - 1);
                next = range.end + 1;
            }
            None => emit_until(&mut out, &mut next, op.insertion_line),
        }
        for line in op.replacement_text.lines() {
            out.push_str(line);
            out.push('\n');
        }
    }
    emit_until(&mut out, &mut next, original.len());
    out
}

proptest! {
    #[test]
    fn offset_matches_naive_rebuild(
        n in 1usize..60,
        steps in prop::collection::vec(step(), 0..12),
    ) {
        let original: Vec<String> = (1..=n).map(|i| format!("line{i}\n")).collect();
        let text = original.concat();
        let ops = plan(n, &steps);

        let mut session = RewriteSession::new(&text);
        let mut expected_offset = 0isize;
        for op in &ops {
            let applied = session.apply(op).unwrap();
            expected_offset += op.delta();
            prop_assert_eq!(applied.offset_after, expected_offset);
        }

        prop_assert_eq!(session.cumulative_offset(), expected_offset);
        prop_assert_eq!(session.line_count() as isize, n as isize + expected_offset);
        prop_assert_eq!(session.render(), rebuild(&original, &ops));
    }

    #[test]
    fn untouched_tail_translates(n in 1usize..40, steps in prop::collection::vec(step(), 1..8)) {
        let original: Vec<String> = (1..=n).map(|i| format!("line{i}\n")).collect();
        let ops = plan(n, &steps);

        let mut session = RewriteSession::new(&original.concat());
        let mut last_touched = 0;
        for op in &ops {
            session.apply(op).unwrap();
            last_touched = op.original_range.map_or(op.insertion_line, |r| r.end);
        }

        for line in (last_touched + 1)..=n {
            let expected = format!("line{line}");
            let buffer_line = session.translate(line) as usize;
            prop_assert_eq!(session.line(buffer_line), Some(expected.as_str()));
        }
    }
}

#[test]
fn test_insert_only_offset() {
    let mut session = RewriteSession::new("a\nb\nc\n");
    session.apply(&PatchOp::insert_after(0, "x\ny")).unwrap();
    session.apply(&PatchOp::insert_after(2, "z")).unwrap();

    assert_eq!(session.cumulative_offset(), 3);
    assert_eq!(session.render(), "x\ny\na\nb\nz\nc\n");
}

#[test]
fn test_shrinking_then_growing() {
    let mut session = RewriteSession::new("1\n2\n3\n4\n5\n6\n");
    let shrink = session
        .apply(&PatchOp::replace(LineSpan::new(1, 3), "one"))
        .unwrap();
    assert_eq!(shrink.offset_after, -2);

    let grow = session
        .apply(&PatchOp::replace(LineSpan::new(5, 5), "five\nfive\nfive"))
        .unwrap();
    assert_eq!(grow.buffer_line, 3);
    assert_eq!(session.cumulative_offset(), 0);
    assert_eq!(session.render(), "one\n4\nfive\nfive\nfive\n6\n");
}
