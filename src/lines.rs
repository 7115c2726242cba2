//! Stage D: line grouper and indent solver
//!
//! Splits the linked lexeme stream into [`Line`]s and computes two running indent counters
//! per line: `logicalIndent` (block-nesting depth) and `opticalIndent` (visible depth, always
//! `>= logicalIndent`). Bracket openers and closers contribute to *subsequent* lines via a
//! pair of deferred deltas rather than to the line containing the bracket itself - that
//! deferral is what keeps a closer's own line from being over-indented.

use crate::token::{Document, LexKind, LexemeId, Line, LineId};

#[derive(Default)]
struct Deferred {
    logical: i64,
    optical: i64,
}

/// Group `doc.lexemes` into `doc.lines` and solve logical/optical indentation.
/// `ignore_indent` enables the BLOCK_START/BLOCK_END/implicit-closer rows of the indent table
/// that only apply when blocks are being re-derived from end-marks rather than from the
/// tokenizer's own INDENT/DEDENT.
pub fn group_and_solve(doc: &mut Document, ignore_indent: bool) {
    doc.lines.clear();

    let mut running = Deferred::default();
    let mut deferred = Deferred::default();
    let mut current = Line::new(None);
    let mut prev_break: Option<LexKind> = None;
    // Whether we've seen any non-WHITESPACE lexeme yet on the current physical line; used to
    // tell whether a closing bracket is the first real content on its line.
    let mut seen_real_on_line = false;
    // First NAME lexeme since the last *true* NEWLINE, reset only there - a header spanning
    // several physical lines via a bracket or backslash continuation (NL/ESCAPED_NL) must not
    // lose it partway through.
    let mut line_first_name: Option<LexemeId> = None;
    // First NAME of the most recent *true* NEWLINE-terminated line (skipping NL-terminated
    // blank/comment lines) - exactly "the first NAME after the last-but-one NEWLINE" relative
    // to whatever INDENT comes next.
    let mut last_header_name: Option<LexemeId> = None;

    let len = doc.lexemes.len();
    for i in 0..len {
        let id = LexemeId(i);
        let kind = doc.lexemes[i].kind;
        let src = doc.lexemes[i].src_string.clone();

        if kind.ends_line() {
            current.lexemes.push(id);
            current.logical_indent = running.logical;
            current.optical_indent = running.optical;
            current.break_before = prev_break;
            let finished = std::mem::replace(&mut current, Line::new(None));
            doc.push_line(finished);

            if kind == LexKind::Newline {
                last_header_name = line_first_name;
                line_first_name = None;
            }
            prev_break = Some(kind);
            running.logical += deferred.logical;
            running.optical += deferred.optical;
            deferred = Deferred::default();
            seen_real_on_line = false;

            if kind == LexKind::EscapedNl {
                // A line-continuing backslash outside any bracket nudges the *next* physical
                // line over by one, for this one line only - folded into the same deferred
                // mechanism used for brackets since it resets identically.
                deferred.optical += 1;
            }
            continue;
        }

        match kind {
            LexKind::Op if is_open_bracket(&src) => {
                if !doc.lexemes[i].coalesce {
                    deferred.optical += 1;
                }
            }
            LexKind::Op if is_close_bracket(&src) => {
                if !doc.lexemes[i].coalesce {
                    if !seen_real_on_line {
                        running.optical -= 1;
                    } else {
                        deferred.optical -= 1;
                    }
                }
            }
            LexKind::Indent => {
                running.logical += 1;
                running.optical += 1;
                doc.get_mut(id).new_string = String::new();
                doc.get_mut(id).block_head = last_header_name;
            }
            LexKind::Dedent => {
                running.logical -= 1;
                running.optical -= 1;
            }
            LexKind::BlockStart if ignore_indent => {
                deferred.logical += 1;
                deferred.optical += 1;
            }
            LexKind::BlockEnd if ignore_indent => {
                running.logical -= 1;
                running.optical -= 1;
            }
            LexKind::Name if ignore_indent && is_implicit_closer(&src) && prev_break == Some(LexKind::Newline) => {
                running.logical -= 1;
                running.optical -= 1;
            }
            _ => {}
        }

        if !matches!(kind, LexKind::Whitespace) {
            seen_real_on_line = true;
        }
        if line_first_name.is_none() && matches!(kind, LexKind::Name) {
            line_first_name = Some(id);
        }

        current.lexemes.push(id);
    }

    if !current.lexemes.is_empty() {
        current.logical_indent = running.logical;
        current.optical_indent = running.optical;
        current.break_before = prev_break;
        current.omit = true; // final synthetic trailing line, per Invariant 3
        doc.push_line(current);
    }

    assign_lexeme_lines(doc);
    resolve_dangling_header_lines(doc);
    repair_continuations(doc);
}

/// Back-fill each lexeme's owning [`LineId`] now that every [`Line`] has a final index. Also
/// used by stage F after it inserts synthesized end-mark Lines, which shifts every later
/// Line's index.
pub(crate) fn assign_lexeme_lines(doc: &mut Document) {
    for idx in 0..doc.lines.len() {
        let line_id = LineId(idx);
        let ids: Vec<LexemeId> = doc.lines[idx].lexemes.clone();
        for id in ids {
            doc.get_mut(id).line = Some(line_id);
        }
    }
}

fn is_open_bracket(s: &str) -> bool {
    matches!(s, "(" | "[" | "{")
}
fn is_close_bracket(s: &str) -> bool {
    matches!(s, ")" | "]" | "}")
}
fn is_implicit_closer(s: &str) -> bool {
    matches!(s, "elif" | "else" | "catch" | "finally")
}

/// For each INDENT, walk forward from its governing `:`'s own Line to the INDENT's Line and
/// bump the indent fields of every Line strictly in between, so that comments or blank lines
/// dangling between a block header and its first indented statement land at the new depth
/// instead of the header's depth. Anchoring on the colon rather than `blockHead` matters when
/// the header itself spans several physical lines via a bracket or backslash continuation:
/// the header's continuation lines sit between `blockHead`'s line and the colon's line, and
/// must keep their own continuation indent rather than being pulled to the new block's depth.
/// No governing colon (a bracket-only indent) means no header line to walk forward from.
fn resolve_dangling_header_lines(doc: &mut Document) {
    let indent_entries: Vec<(usize, Option<usize>)> = doc
        .lines
        .iter()
        .enumerate()
        .filter_map(|(line_idx, line)| {
            line.lexemes
                .iter()
                .find(|&&id| doc.lexemes[id.0].kind == LexKind::Indent)
                .map(|&id| (line_idx, governing_colon_line(doc, id)))
        })
        .collect();

    for (indent_line_idx, colon_line_idx) in indent_entries {
        let Some(colon_line_idx) = colon_line_idx else { continue };
        if colon_line_idx + 1 >= indent_line_idx {
            continue;
        }

        let target_logical = doc.lines[indent_line_idx].logical_indent;
        let target_optical = doc.lines[indent_line_idx].optical_indent;
        for line in &mut doc.lines[(colon_line_idx + 1)..indent_line_idx] {
            if line.logical_indent < target_logical {
                line.logical_indent = target_logical;
            }
            if line.optical_indent < target_optical {
                line.optical_indent = target_optical;
            }
        }
    }
}

/// Scan backward from an INDENT lexeme for the nearest BLOCK_START, the colon that actually
/// opened this block - distinct from `blockHead`, which anchors on the header's first NAME and
/// can sit several physical lines earlier when the header itself continues across lines.
fn governing_colon_line(doc: &Document, indent_id: LexemeId) -> Option<usize> {
    let mut i = indent_id.0;
    while i > 0 {
        i -= 1;
        if doc.lexemes[i].kind == LexKind::BlockStart {
            return doc.lexemes[i].line.map(|l| l.0);
        }
    }
    None
}

/// For every Line i>0 whose optical indent happens to equal the previous line's but whose
/// logical indent differs, walk backwards bumping optical indent on the contiguous run of
/// lines with optical indent >= this line's, so a continuation never renders flush with the
/// statement that follows it.
fn repair_continuations(doc: &mut Document) {
    for i in 1..doc.lines.len() {
        let optical_i = doc.lines[i].optical_indent;
        let logical_i = doc.lines[i].logical_indent;
        if doc.lines[i - 1].optical_indent != optical_i || doc.lines[i - 1].logical_indent == logical_i {
            continue;
        }
        let mut j = i;
        while j > 0 && doc.lines[j - 1].optical_indent >= optical_i {
            j -= 1;
            doc.lines[j].optical_indent += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::link_scopes;
    use crate::whitespace::build_document;

    fn build(source: &str) -> Document {
        let mut doc = build_document(source, false).unwrap();
        link_scopes(&mut doc, "end").unwrap();
        group_and_solve(&mut doc, false);
        doc
    }

    #[test]
    fn simple_block_increases_then_decreases_indent() {
        let doc = build("if x:\n\tdo()\n");
        let indents: Vec<i64> = doc.lines.iter().map(|l| l.logical_indent).collect();
        assert_eq!(indents[0], 0);
        assert_eq!(indents[1], 1);
    }

    #[test]
    fn optical_never_below_logical() {
        let doc = build("f(\n\t1,\n\t2,\n)\n");
        for line in &doc.lines {
            assert!(line.optical_indent >= line.logical_indent);
        }
    }

    #[test]
    fn closing_bracket_first_on_line_does_not_double_indent() {
        let doc = build("f(\n\t1,\n)\n");
        // the line with the lone ')' should be back at optical indent 0, not 1.
        let last_real = doc.lines.iter().rev().find(|l| !l.is_blank()).unwrap();
        assert_eq!(last_real.optical_indent, 0);
    }

    #[test]
    fn final_line_is_marked_omitted() {
        let doc = build("a\n");
        assert!(doc.lines.last().unwrap().omit);
    }
}
