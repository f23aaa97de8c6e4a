//! # Parser
//!
//! Parses and writes the local env file format.
//!
//! ## Format
//!
//! - One `KEY=VALUE` pair per line, split on the first `=`
//! - Blank lines and lines starting with `#` are comments
//! - Values may be wrapped in one layer of matching `'` or `"` quotes
//! - Lines without `=` are ignored when parsing and kept verbatim when writing
//!
//! Inside double quotes `\"` stands for a literal `"`, the escape written for
//! values that contain quotes.
//!
//! Writing is merge-preserving: comments, blank lines and malformed lines are
//! re-emitted untouched, lines whose value is unchanged are kept as written,
//! only the lines of updated keys are rewritten, and new keys are appended at
//! the end in ascending key order. Line endings are normalized to `\n` and the
//! output carries no trailing newline.
//!
//! Nothing in this module fails. Malformed input degrades to "ignored". Values
//! with line breaks have no single-line form; [`is_representable`] tells callers
//! which values survive a write and read back unchanged.

use std::borrow::Cow;
use std::collections::BTreeSet;

use crate::model::Snapshot;

/// Parse env file text into a key → value mapping
///
/// Later occurrences of a key override earlier ones.
#[must_use]
pub fn parse(text: &str) -> Snapshot {
    let mut variables = Snapshot::new();

    for line in text.lines() {
        if let Some((key, value)) = parse_line(line) {
            variables.insert(key.to_string(), value.into_owned());
        }
    }

    variables
}

/// Serialize `updates` into `existing_text`, preserving everything else
#[must_use]
pub fn serialize(existing_text: &str, updates: &Snapshot) -> String {
    serialize_with_removals(existing_text, updates, &BTreeSet::new())
}

/// Like [`serialize`], but also drops the lines of keys in `removals`
///
/// A key present in both sets is treated as updated.
#[must_use]
pub fn serialize_with_removals(
    existing_text: &str,
    updates: &Snapshot,
    removals: &BTreeSet<String>,
) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut written: BTreeSet<&str> = BTreeSet::new();

    for line in existing_text.lines() {
        let Some((key, current)) = parse_line(line) else {
            // Comments, blanks and malformed lines survive as-is
            lines.push(line.to_string());
            continue;
        };

        if let Some((key, value)) = updates.get_key_value(key) {
            if current == value.as_str() {
                lines.push(line.to_string());
            } else {
                lines.push(format_line(key, value));
            }
            written.insert(key.as_str());
        } else if removals.contains(key) {
            continue;
        } else {
            lines.push(line.to_string());
        }
    }

    for (key, value) in updates {
        if !written.contains(key.as_str()) {
            lines.push(format_line(key, value));
        }
    }

    lines.join("\n")
}

/// Render a single `KEY=VALUE` line, quoting the value when required
#[must_use]
pub fn format_line(key: &str, value: &str) -> String {
    if needs_quotes(value) {
        format!("{key}=\"{}\"", value.replace('"', "\\\""))
    } else {
        format!("{key}={value}")
    }
}

/// Values are written double-quoted when they contain a space, `#` or `"`,
/// have leading or trailing whitespace, or are themselves wrapped in quotes
#[must_use]
pub fn needs_quotes(value: &str) -> bool {
    value.contains(' ')
        || value.contains('#')
        || value.contains('"')
        || value.trim() != value
        || is_wrapped_in_quotes(value)
}

/// True when `value` reads back unchanged after being written under `key`
#[must_use]
pub fn is_representable(key: &str, value: &str) -> bool {
    let line = format_line(key, value);
    let mut lines = line.lines();
    match (lines.next(), lines.next()) {
        (Some(only), None) => parse_line(only).is_some_and(|(k, v)| k == key && v == value),
        // Empty key or multi-line value
        _ => false,
    }
}

/// Split a line into key and unquoted value, or `None` for non-pair lines
fn parse_line(line: &str) -> Option<(&str, Cow<'_, str>)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let (key, value) = trimmed.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    Some((key, unquote(value.trim())))
}

fn is_wrapped_in_quotes(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() >= 2
        && bytes[0] == bytes[bytes.len() - 1]
        && (bytes[0] == b'"' || bytes[0] == b'\'')
}

/// Remove exactly one layer of matching outer quotes
///
/// Escaped quotes are unescaped inside double quotes only.
fn unquote(value: &str) -> Cow<'_, str> {
    if !is_wrapped_in_quotes(value) {
        return Cow::Borrowed(value);
    }
    let inner = &value[1..value.len() - 1];
    if value.starts_with('"') && inner.contains("\\\"") {
        Cow::Owned(inner.replace("\\\"", "\""))
    } else {
        Cow::Borrowed(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(pairs: &[(&str, &str)]) -> Snapshot {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_parse_skips_comments_blanks_and_malformed() {
        let text = "# header\n\nA=1\nnot a pair\n  # indented comment\nB = two \n=orphan\n";
        let parsed = parse(text);
        assert_eq!(parsed, snapshot(&[("A", "1"), ("B", "two")]));
    }

    #[test]
    fn test_parse_splits_on_first_equals() {
        let parsed = parse("URL=postgres://u:p@h/db?sslmode=require");
        assert_eq!(parsed["URL"], "postgres://u:p@h/db?sslmode=require");
    }

    #[test]
    fn test_parse_strips_one_layer_of_matching_quotes() {
        let parsed = parse("A=\"hello world\"\nB='single'\nC=\"'nested'\"\nD=\"unbalanced'\nE=\"");
        assert_eq!(parsed["A"], "hello world");
        assert_eq!(parsed["B"], "single");
        assert_eq!(parsed["C"], "'nested'");
        assert_eq!(parsed["D"], "\"unbalanced'");
        assert_eq!(parsed["E"], "\"");
    }

    #[test]
    fn test_parse_allows_empty_value() {
        let parsed = parse("EMPTY=\nQUOTED=\"\"");
        assert_eq!(parsed["EMPTY"], "");
        assert_eq!(parsed["QUOTED"], "");
    }

    #[test]
    fn test_parse_handles_crlf() {
        let parsed = parse("A=1\r\nB=2\r\n");
        assert_eq!(parsed, snapshot(&[("A", "1"), ("B", "2")]));
    }

    #[test]
    fn test_serialize_preserves_comments() {
        let out = serialize("# note\nA=1\n", &snapshot(&[("A", "2")]));
        assert_eq!(out, "# note\nA=2");
    }

    #[test]
    fn test_serialize_round_trip_is_stable() {
        let text = "# database\nDB_HOST=localhost\n\nDB_PORT=5432\n# trailing comment\nGREETING=\"hello world\"";
        let out = serialize(text, &Snapshot::new());
        assert_eq!(out, text);
        let out = serialize(text, &parse(text));
        assert_eq!(out, text);

        let hand_written = "SINGLE='x'\nSPACED = 1\nDOUBLE=\"plain\"\nESCAPED=\"say \\\"hi\\\"\"";
        assert_eq!(serialize(hand_written, &parse(hand_written)), hand_written);
    }

    #[test]
    fn test_unchanged_value_keeps_original_line() {
        let out = serialize("A = 1\nB='x'", &snapshot(&[("A", "1"), ("B", "y")]));
        assert_eq!(out, "A = 1\nB=y");
    }

    #[test]
    fn test_parse_unescapes_quotes_inside_double_quotes_only() {
        let parsed = parse("A=\"say \\\"hi\\\"\"\nB='a\\\"b'");
        assert_eq!(parsed["A"], "say \"hi\"");
        assert_eq!(parsed["B"], "a\\\"b");
    }

    #[test]
    fn test_quotes_edge_whitespace_and_quote_wrapped_values() {
        assert_eq!(format_line("K", "trailing\t"), "K=\"trailing\t\"");
        assert_eq!(format_line("K", " lead"), "K=\" lead\"");
        assert_eq!(format_line("K", "'quoted'"), "K=\"'quoted'\"");
        assert_eq!(format_line("K", "\"x\""), "K=\"\\\"x\\\"\"");
    }

    #[test]
    fn test_is_representable() {
        for value in ["", "plain", "two words", "'quoted'", "\"x\"", "say \"hi\"", "trailing\t", " lead", "a#b"] {
            assert!(is_representable("K", value), "{value:?}");
        }
        assert!(!is_representable("K", "line1\nline2"));
        assert!(!is_representable("", "value"));
    }

    #[test]
    fn test_serialize_appends_new_keys_in_order() {
        let out = serialize("B=1", &snapshot(&[("Z", "26"), ("A", "1")]));
        assert_eq!(out, "B=1\nA=1\nZ=26");
    }

    #[test]
    fn test_serialize_keeps_malformed_lines() {
        let out = serialize("garbage line\nA=1", &snapshot(&[("A", "3")]));
        assert_eq!(out, "garbage line\nA=3");
    }

    #[test]
    fn test_serialize_quotes_values_with_spaces_hash_and_quotes() {
        assert_eq!(format_line("KEY", "hello world"), "KEY=\"hello world\"");
        assert_eq!(format_line("KEY", "a#b"), "KEY=\"a#b\"");
        assert_eq!(format_line("KEY", "say \"hi\""), "KEY=\"say \\\"hi\\\"\"");
        assert_eq!(format_line("KEY", "plain"), "KEY=plain");
    }

    #[test]
    fn test_serialize_with_removals_drops_lines() {
        let removals: BTreeSet<String> = ["OLD".to_string()].into_iter().collect();
        let out = serialize_with_removals("# c\nOLD=1\nKEEP=2", &Snapshot::new(), &removals);
        assert_eq!(out, "# c\nKEEP=2");
    }

    #[test]
    fn test_serialize_into_empty_file() {
        let out = serialize("", &snapshot(&[("A", "1")]));
        assert_eq!(out, "A=1");
    }
}
