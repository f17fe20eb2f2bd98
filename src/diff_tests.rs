//! Unit tests for the diff line counter.

use super::*;
use std::io::Cursor;

// ─── Test helpers ───────────────────────────────────────────────────

/// Two files: a.txt (3 added, 1 deleted) and b.txt (0 added, 2 deleted).
fn two_file_diff() -> &'static str {
    concat!(
        "Index: a.txt\n",
        "===================================================================\n",
        "--- a.txt\t(revision 1)\n",
        "+++ a.txt\t(revision 2)\n",
        "@@ -1,2 +1,4 @@\n",
        " unchanged\n",
        "-removed\n",
        "+added one\n",
        "+added two\n",
        "+added three\n",
        "Index: b.txt\n",
        "===================================================================\n",
        "--- b.txt\t(revision 1)\n",
        "+++ b.txt\t(revision 2)\n",
        "@@ -1,3 +1 @@\n",
        "-gone\n",
        "-also gone\n",
        " kept\n",
    )
}

// ─── Section parsing ────────────────────────────────────────────────

#[test]
fn test_two_file_diff() {
    let counts = parse_diff_counts(two_file_diff().as_bytes());
    assert_eq!(counts.len(), 2);
    assert_eq!(counts["/a.txt"], LineCounts::new(3, 1));
    assert_eq!(counts["/b.txt"], LineCounts::new(0, 2));
}

#[test]
fn test_streaming_matches_slice_parser() {
    let streamed = parse_diff_stream(Cursor::new(two_file_diff().as_bytes())).unwrap();
    assert_eq!(streamed, parse_diff_counts(two_file_diff().as_bytes()));
}

#[test]
fn test_empty_input() {
    assert!(parse_diff_counts(b"").is_empty());
}

#[test]
fn test_lines_before_first_header_are_ignored() {
    let diff = "+stray\n-stray\nIndex: x.c\n+one\n";
    let counts = parse_diff_counts(diff.as_bytes());
    assert_eq!(counts.len(), 1);
    assert_eq!(counts["/x.c"], LineCounts::new(1, 0));
}

#[test]
fn test_structural_markers_not_counted() {
    let diff = concat!(
        "Index: m.c\n",
        "===================================================================\n",
        "--- m.c\t(revision 3)\n",
        "+++ m.c\t(revision 4)\n",
        "@@ -10,2 +10,2 @@\n",
        "-a\n",
        "+b\n",
    );
    let counts = parse_diff_counts(diff.as_bytes());
    assert_eq!(counts["/m.c"], LineCounts::new(1, 1));
}

#[test]
fn test_nested_path_gets_leading_slash() {
    let diff = "Index: trunk/src//main.c\n+x\n";
    let counts = parse_diff_counts(diff.as_bytes());
    assert!(counts.contains_key("/trunk/src/main.c"));
}

#[test]
fn test_crlf_line_endings() {
    let diff = "Index: w.txt\r\n--- w.txt\r\n+++ w.txt\r\n@@ -1 +1 @@\r\n-a\r\n+b\r\n";
    let counts = parse_diff_counts(diff.as_bytes());
    assert_eq!(counts["/w.txt"], LineCounts::new(1, 1));
}

#[test]
fn test_no_newline_marker_ignored() {
    let diff = "Index: n.txt\n@@ -1 +1 @@\n-a\n\\ No newline at end of file\n+b\n\\ No newline at end of file\n";
    let counts = parse_diff_counts(diff.as_bytes());
    assert_eq!(counts["/n.txt"], LineCounts::new(1, 1));
}

// ─── Property sections ──────────────────────────────────────────────

#[test]
fn test_property_only_change() {
    let diff = "Property changes on: c.txt\n";
    let counts = parse_diff_counts(diff.as_bytes());
    assert_eq!(counts.len(), 1);
    assert_eq!(counts["/c.txt"], LineCounts::new(0, 0));
}

#[test]
fn test_property_values_are_not_content() {
    let diff = concat!(
        "Property changes on: c.txt\n",
        "___________________________________________________________________\n",
        "Added: svn:eol-style\n",
        "## -0,0 +1 ##\n",
        "+native\n",
    );
    let counts = parse_diff_counts(diff.as_bytes());
    assert_eq!(counts["/c.txt"], LineCounts::new(0, 0));
}

#[test]
fn test_property_section_does_not_reset_content_counts() {
    let diff = concat!(
        "Index: c.txt\n",
        "===================================================================\n",
        "--- c.txt\t(revision 5)\n",
        "+++ c.txt\t(revision 6)\n",
        "@@ -1 +1,2 @@\n",
        "+one\n",
        "+two\n",
        "-zero\n",
        "\n",
        "Property changes on: c.txt\n",
        "___________________________________________________________________\n",
        "Modified: svn:keywords\n",
        "## -1 +1 ##\n",
        "-Id\n",
        "+Id Rev\n",
    );
    let counts = parse_diff_counts(diff.as_bytes());
    assert_eq!(counts.len(), 1);
    assert_eq!(counts["/c.txt"], LineCounts::new(2, 1));
}

#[test]
fn test_content_after_property_section_starts_fresh() {
    let diff = concat!(
        "Property changes on: p.txt\n",
        "+value\n",
        "Index: q.txt\n",
        "+one\n",
    );
    let counts = parse_diff_counts(diff.as_bytes());
    assert_eq!(counts["/p.txt"], LineCounts::new(0, 0));
    assert_eq!(counts["/q.txt"], LineCounts::new(1, 0));
}

// ─── Encoding ───────────────────────────────────────────────────────

#[test]
fn test_latin1_bytes_in_content() {
    let mut diff = b"Index: legacy.txt\n@@ -1 +1 @@\n-caf".to_vec();
    diff.push(0xE9);
    diff.extend_from_slice(b"\n+caf\xc3\xa9\n");
    let counts = parse_diff_counts(&diff);
    assert_eq!(counts["/legacy.txt"], LineCounts::new(1, 1));
}

#[test]
fn test_latin1_bytes_in_header() {
    let mut diff = b"Index: r".to_vec();
    diff.push(0xE9);
    diff.extend_from_slice(b"sum\xe9.txt\n+x\n");
    let counts = parse_diff_counts(&diff);
    assert_eq!(counts["/résumé.txt"], LineCounts::new(1, 0));
}

// ─── Single-file reduction ──────────────────────────────────────────

#[test]
fn test_single_file_counts_uses_base_name_section() {
    let diff = "Index: main.c\n+a\n+b\n-c\n";
    let counts = parse_diff_counts(diff.as_bytes());
    assert_eq!(single_file_counts(&counts), LineCounts::new(2, 1));
}

#[test]
fn test_single_file_counts_empty_diff() {
    assert_eq!(single_file_counts(&DiffCountMap::new()), LineCounts::default());
}

#[test]
fn test_line_counts_add() {
    assert_eq!(LineCounts::new(1, 2) + LineCounts::new(3, 4), LineCounts::new(4, 6));
}
