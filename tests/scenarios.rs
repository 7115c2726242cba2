//! Integration tests for the six literal scenarios and the black-box invariants from the
//! formatter's testable-properties section.

use blockfmt::config::FormatOptions;
use blockfmt::format;
use rstest::rstest;

fn opts(mutate: impl FnOnce(&mut FormatOptions)) -> FormatOptions {
    let mut o = FormatOptions::default();
    mutate(&mut o);
    o
}

#[test]
fn scenario_1_simple_end_insertion() {
    let out = format(
        "if x:\n\tdo()\n",
        &opts(|o| o.insert_end = true),
    )
    .unwrap();
    assert_eq!(out.text, "if x:\n\tdo()\nend\n");
    assert!(!out.end_mark_already_defined);
}

#[test]
fn scenario_2_end_migrates_past_blank_lines() {
    let out = format(
        "if a:\n\tf()\n\n\ng()\n",
        &opts(|o| o.insert_end = true),
    )
    .unwrap();
    assert_eq!(out.text, "if a:\n\tf()\nend\n\n\ng()\n");
}

#[test]
fn scenario_3_implicit_closer_suppresses_synthesis() {
    let out = format(
        "if a:\n\tf()\nelse:\n\tg()\n",
        &opts(|o| o.insert_end = true),
    )
    .unwrap();
    assert_eq!(out.text, "if a:\n\tf()\nelse:\n\tg()\nend\n");
    assert_eq!(out.text.matches("end\n").count(), 1);
}

#[test]
fn scenario_4_coalesced_brackets_share_one_indent_step() {
    let out = format(
        "f({\n\t\"k\": [\n\t\t1,\n\t]\n})\n",
        &FormatOptions::default(),
    )
    .unwrap();
    assert_eq!(out.text, "f({\n\t\"k\": [\n\t\t1,\n\t]\n})\n");
}

#[test]
fn scenario_5_ignore_indent_round_trip() {
    let out = format(
        "if a:\nf()\nend\n",
        &opts(|o| o.ignore_indent = true),
    )
    .unwrap();
    assert_eq!(out.text, "if a:\n\tf()\nend\n");
}

#[test]
fn scenario_6_spacing_decisions() {
    let out = format("a [ 0 : n ]+b\n", &FormatOptions::default()).unwrap();
    assert_eq!(out.text, "a[0:n] + b\n");
}

#[test]
fn scenario_7_bracket_continued_header_keeps_block_head_and_dangling_comment_depth() {
    let out = format(
        "if (\n    a\n):\n\t# note\n\tx\n",
        &opts(|o| o.insert_end = true),
    )
    .unwrap();
    assert_eq!(out.text, "if (\n\ta\n):\n\t# note\n\tx\nend\n");
}

#[test]
fn ignore_indent_tolerates_inconsistent_leading_whitespace() {
    let out = format(
        "if a:\n    f()\n  g()\nend\n",
        &opts(|o| o.ignore_indent = true),
    )
    .unwrap();
    assert_eq!(out.text, "if a:\n\tf()\n\tg()\nend\n");
}

#[rstest]
#[case("if x:\n\tdo()\n")]
#[case("a = 1\nb = 2\n")]
#[case("f(1, 2)\n")]
#[case("if a:\n\tif b:\n\t\tc()\n")]
fn idempotent_without_mode_flags(#[case] source: &str) {
    let once = format(source, &FormatOptions::default()).unwrap();
    let twice = format(&once.text, &FormatOptions::default()).unwrap();
    assert_eq!(once.text, twice.text);
}

#[test]
fn strip_then_insert_round_trips_on_end_mark_correct_input() {
    let source = "if x:\n\tdo()\nend\n";
    let stripped = format(source, &opts(|o| o.strip_end = true)).unwrap();
    assert_eq!(stripped.text, "if x:\n\tdo()\n");
    let reinserted = format(&stripped.text, &opts(|o| o.insert_end = true)).unwrap();
    assert_eq!(reinserted.text, source);
}

#[test]
fn conflicting_insert_and_strip_is_a_usage_error() {
    let result = format(
        "a\n",
        &opts(|o| {
            o.insert_end = true;
            o.strip_end = true;
        }),
    );
    assert!(result.is_err());
}

#[test]
fn preexisting_definition_is_reported_and_no_preamble_is_needed() {
    let out = format(
        "end = None\nif x:\n\tdo()\n",
        &opts(|o| o.insert_end = true),
    )
    .unwrap();
    assert!(out.end_mark_already_defined);
    assert_eq!(out.text, "end = None\nif x:\n\tdo()\nend\n");
}
