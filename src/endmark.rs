//! Stage F: end-mark synthesizer and stripper
//!
//! Insertion walks every DEDENT left-to-right (processed in reverse so earlier insertions
//! never invalidate the Line index of a DEDENT not yet handled) and, unless suppressed,
//! synthesizes a BLOCK_END Line. The line is placed *above* any trailing blank/comment lines
//! by decrementing their indent fields rather than physically moving them, per the design
//! note on stable line ordering.

use crate::lines::assign_lexeme_lines;
use crate::token::{Document, LexKind, Lexeme, LexemeId, Line};

fn is_implicit_closer(s: &str) -> bool {
    matches!(s, "elif" | "else" | "catch" | "finally")
}

/// Insert a BLOCK_END line after every qualifying DEDENT. `is_clipboard` additionally
/// suppresses synthesis when a DEDENT closes directly onto ENDMARKER, since a fragment is
/// allowed to end mid-block.
pub fn synthesize_end_marks(doc: &mut Document, end_mark: &str, is_clipboard: bool) {
    let dedent_indices: Vec<usize> = (0..doc.lexemes.len())
        .filter(|&i| doc.lexemes[i].kind == LexKind::Dedent && !should_suppress(doc, i, is_clipboard))
        .collect();

    for i in dedent_indices.into_iter().rev() {
        insert_one_end_mark(doc, i, end_mark);
    }
}

/// Peek two lexemes ahead of a DEDENT (skipping the one WHITESPACE lexeme stage B always
/// inserts between any two lexemes) to decide whether synthesis is suppressed: the dedent
/// already closes onto a BLOCK_END, an implicit closer keyword, a `case` header, or (fragment
/// mode only) ENDMARKER.
fn should_suppress(doc: &Document, dedent_idx: usize, is_clipboard: bool) -> bool {
    let content_idx = dedent_idx + 2;
    if content_idx >= doc.lexemes.len() {
        return true;
    }
    let content = &doc.lexemes[content_idx];
    if content.kind == LexKind::BlockEnd {
        return true;
    }
    if is_clipboard && content.kind == LexKind::EndMarker {
        return true;
    }
    if content.kind == LexKind::Name && is_implicit_closer(&content.src_string) {
        return true;
    }
    if let Some(indent_id) = doc.lexemes[dedent_idx].corresponding {
        if let Some(head_id) = doc.lexemes[indent_id.0].block_head {
            if doc.lexemes[head_id.0].src_string == "case" {
                return true;
            }
        }
    }
    false
}

/// The character length of the leading whitespace (plus a leading INDENT token's own length,
/// if the header line is itself freshly indented) of the DEDENT's `blockHead`'s Line. Null
/// `blockHead` (a bracket-only INDENT) falls back to 0, per the open question in the design
/// notes.
fn original_indent_before_dedent(doc: &Document, dedent_idx: usize) -> usize {
    let Some(indent_id) = doc.lexemes[dedent_idx].corresponding else {
        return 0;
    };
    let Some(head_id) = doc.lexemes[indent_id.0].block_head else {
        return 0;
    };
    let Some(head_line) = doc.lexemes[head_id.0].line else {
        return 0;
    };
    let line = &doc.lines[head_line.0];
    let mut width = 0usize;
    if let Some(&first_id) = line.lexemes.first() {
        width += doc.lexemes[first_id.0].src_string.chars().count();
    }
    if line.lexemes.len() > 1 {
        let second = &doc.lexemes[line.lexemes[1].0];
        if second.kind == LexKind::Indent {
            width += second.src_string.chars().count();
        }
    }
    width
}

fn qualifies_for_migration(doc: &Document, line_idx: usize, threshold: usize) -> bool {
    let line = &doc.lines[line_idx];
    if line.is_blank() {
        return true;
    }
    let is_pure_comment =
        line.lexemes.len() == 3 && doc.lexemes[line.lexemes[1].0].kind == LexKind::Comment;
    if !is_pure_comment {
        return false;
    }
    let leading = line
        .lexemes
        .first()
        .map(|&id| doc.lexemes[id.0].src_string.chars().count())
        .unwrap_or(0);
    leading <= threshold
}

fn insert_one_end_mark(doc: &mut Document, dedent_idx: usize, end_mark: &str) {
    let Some(dedent_line_id) = doc.lexemes[dedent_idx].line else {
        return;
    };
    let dedent_line_idx = dedent_line_id.0;
    let threshold = original_indent_before_dedent(doc, dedent_idx);
    let target_logical = doc.lines[dedent_line_idx].logical_indent;
    let target_optical = doc.lines[dedent_line_idx].optical_indent;

    let mut insert_pos = dedent_line_idx;
    let mut j = dedent_line_idx;
    while j > 0 {
        j -= 1;
        if qualifies_for_migration(doc, j, threshold) {
            doc.lines[j].logical_indent -= 1;
            doc.lines[j].optical_indent -= 1;
            insert_pos = j;
        } else {
            break;
        }
    }

    let break_before = if insert_pos > 0 {
        doc.lines[insert_pos - 1]
            .lexemes
            .last()
            .map(|&id| doc.lexemes[id.0].kind)
    } else {
        None
    };

    let ws_id = doc.push_lexeme(Lexeme::synthesized(LexKind::Whitespace, ""));
    let end_id = doc.push_lexeme(Lexeme::synthesized(LexKind::BlockEnd, end_mark));
    let nl_id = doc.push_lexeme(Lexeme::synthesized(LexKind::Newline, "\n"));

    let mut new_line = Line::new(break_before);
    new_line.lexemes = vec![ws_id, end_id, nl_id];
    new_line.logical_indent = target_logical;
    new_line.optical_indent = target_optical;

    doc.lines.insert(insert_pos, new_line);
    assign_lexeme_lines(doc);

    if insert_pos + 1 < doc.lines.len() {
        doc.lines[insert_pos + 1].break_before = Some(LexKind::Newline);
    }
}

/// Mark every BLOCK_END lexeme (and, normally, its whole Line) for omission from emission. A
/// BLOCK_END sharing its line with a trailing COMMENT only has itself and its preceding
/// WHITESPACE omitted, so the comment survives.
pub fn strip_end_marks(doc: &mut Document) {
    let block_end_indices: Vec<usize> = (0..doc.lexemes.len())
        .filter(|&i| doc.lexemes[i].kind == LexKind::BlockEnd)
        .collect();

    for i in block_end_indices {
        let Some(line_id) = doc.lexemes[i].line else {
            continue;
        };
        let line_idx = line_id.0;
        let has_trailing_comment = doc.lines[line_idx]
            .lexemes
            .iter()
            .any(|&id| doc.lexemes[id.0].kind == LexKind::Comment);

        if has_trailing_comment {
            doc.get_mut(LexemeId(i)).omit = true;
            let pos_in_line = doc.lines[line_idx].lexemes.iter().position(|&id| id.0 == i);
            if let Some(pos) = pos_in_line {
                if pos > 0 {
                    let prev_id = doc.lines[line_idx].lexemes[pos - 1];
                    if doc.lexemes[prev_id.0].kind == LexKind::Whitespace {
                        doc.get_mut(prev_id).omit = true;
                    }
                }
            }
        } else {
            doc.lines[line_idx].omit = true;
        }
    }
}

/// Scan for an existing top-level definition of the end-mark identifier (`end = ...` or an
/// import binding it) before its first real use, so the CLI collaborator knows whether the
/// preamble needs to be injected. This is the one core entry point the boundary-concern
/// preamble logic in §4.F depends on.
pub fn end_mark_already_defined(doc: &Document, end_mark: &str) -> bool {
    for i in 0..doc.lexemes.len() {
        let lex = &doc.lexemes[i];
        if lex.kind == LexKind::BlockEnd {
            break;
        }
        if lex.kind != LexKind::Name || lex.src_string != end_mark {
            continue;
        }
        if let Some(n) = next_non_whitespace(doc, i) {
            if doc.lexemes[n].src_string == "=" {
                return true;
            }
        }
        if let Some(p) = prev_non_whitespace(doc, i) {
            if doc.lexemes[p].kind == LexKind::Name && doc.lexemes[p].src_string == "import" {
                return true;
            }
        }
    }
    false
}

fn next_non_whitespace(doc: &Document, mut i: usize) -> Option<usize> {
    i += 1;
    while i < doc.lexemes.len() {
        if doc.lexemes[i].kind != LexKind::Whitespace {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn prev_non_whitespace(doc: &Document, i: usize) -> Option<usize> {
    if i == 0 {
        return None;
    }
    let mut j = i - 1;
    loop {
        if doc.lexemes[j].kind != LexKind::Whitespace {
            return Some(j);
        }
        if j == 0 {
            return None;
        }
        j -= 1;
    }
}
