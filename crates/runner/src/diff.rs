//! Actual-vs-expected comparison of query results.

use serde_json::Value;
use similar::{ChangeTag, TextDiff};

use tint_core::types::{DiffKind, DiffLine};

/// Result of comparing a query's output with its expected document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    /// Structural equality of the two documents.
    pub matches: bool,
    /// Line diff of the pretty-printed documents, for display.
    pub lines: Vec<DiffLine>,
}

/// Compare two JSON documents.
///
/// Lines only in `actual` are [`DiffKind::Removed`], lines only in `expected`
/// are [`DiffKind::Added`].
pub fn compare(actual: &Value, expected: &Value) -> Comparison {
    let actual_text = pretty(actual);
    let expected_text = pretty(expected);
    let lines = TextDiff::from_lines(&actual_text, &expected_text)
        .iter_all_changes()
        .map(|change| DiffLine {
            kind: match change.tag() {
                ChangeTag::Delete => DiffKind::Removed,
                ChangeTag::Insert => DiffKind::Added,
                ChangeTag::Equal => DiffKind::Unchanged,
            },
            text: change.value().trim_end_matches('\n').to_owned(),
        })
        .collect();

    Comparison {
        matches: actual == expected,
        lines,
    }
}

fn pretty(value: &Value) -> String {
    let mut text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    text.push('\n');
    text
}
