//! # Codec Tests
//!
//! Env file format: parsing, merge-preserving writes and quoting.

use envzip::model::Snapshot;
use envzip::parser::{parse, serialize, serialize_with_removals};
use std::collections::BTreeSet;

fn snapshot(pairs: &[(&str, &str)]) -> Snapshot {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

#[test]
fn test_comment_preservation() {
    let updated = serialize("# note\nA=1\n", &snapshot(&[("A", "2")]));
    assert_eq!(updated, "# note\nA=2");
}

#[test]
fn test_round_trip_of_serialized_values() {
    let values = snapshot(&[
        ("EMPTY", ""),
        ("PLAIN", "value"),
        ("SPACED", "two words"),
        ("HASH", "a#b"),
        ("URL", "postgres://u:p@h/db?x=1"),
        ("QUOTED", "say \"hi\""),
        ("WRAPPED", "'x'"),
        ("TAB", "trailing\t"),
    ]);
    let text = serialize("", &values);
    assert_eq!(parse(&text), values);
}

#[test]
fn test_hand_written_lines_survive_round_trip() {
    let text = "A='x'\nB = 1\nC=\"plain\"\n# note\nD=\"say \\\"hi\\\"\"";
    assert_eq!(serialize(text, &parse(text)), text);
}

#[test]
fn test_quoting_rules() {
    let text = serialize(
        "",
        &snapshot(&[("A", "has space"), ("B", "x#y"), ("C", "say \"hi\""), ("D", "plain")]),
    );
    assert_eq!(
        text,
        "A=\"has space\"\nB=\"x#y\"\nC=\"say \\\"hi\\\"\"\nD=plain"
    );
}

#[test]
fn test_parse_rules() {
    let parsed = parse(
        "# comment\n\n  KEY = value  \nSINGLE='quoted'\nDOUBLE=\"quoted\"\nnot a pair\n=orphan\nEQ=a=b\nMIXED=\"oops'\n",
    );
    assert_eq!(
        parsed,
        snapshot(&[
            ("DOUBLE", "quoted"),
            ("EQ", "a=b"),
            ("KEY", "value"),
            ("MIXED", "\"oops'"),
            ("SINGLE", "quoted"),
        ])
    );
}

#[test]
fn test_new_keys_appended_sorted_and_removals_dropped() {
    let existing = "# header\nKEEP=1\nDROP=2\nmalformed line\r\n";
    let removals: BTreeSet<String> = ["DROP".to_string()].into_iter().collect();
    let text = serialize_with_removals(existing, &snapshot(&[("Z", "26"), ("B", "2")]), &removals);
    assert_eq!(text, "# header\nKEEP=1\nmalformed line\nB=2\nZ=26");
}

#[test]
fn test_empty_update_reproduces_input() {
    let existing = "# a\r\nA=1\r\n\r\nB='x y'";
    assert_eq!(serialize(existing, &Snapshot::new()), "# a\nA=1\n\nB='x y'");
}
