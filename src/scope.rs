//! Stage C: scope linker
//!
//! A single left-to-right pass over the lexeme arena that pairs every opening bracket with
//! its closer and every INDENT with its DEDENT, then reclassifies two kinds in place:
//! a `:` that introduces a block becomes BLOCK_START, and a bare end-mark identifier becomes
//! BLOCK_END. A second, short pass over the now-linked brackets marks coalesced pairs.

use crate::error::FormatError;
use crate::token::{Document, LexKind, LexemeId};

fn is_open_bracket(s: &str) -> bool {
    matches!(s, "(" | "[" | "{")
}
fn is_close_bracket(s: &str) -> bool {
    matches!(s, ")" | "]" | "}")
}
fn brackets_match(opener: &str, closer: &str) -> bool {
    matches!((opener, closer), ("(", ")") | ("[", "]") | ("{", "}"))
}

/// Link bracket and indent scopes and reclassify BLOCK_START/BLOCK_END lexemes in place.
pub fn link_scopes(doc: &mut Document, end_mark: &str) -> Result<(), FormatError> {
    let mut bracket_stack: Vec<LexemeId> = Vec::new();
    let mut indent_stack: Vec<LexemeId> = Vec::new();
    let len = doc.lexemes.len();

    for i in 0..len {
        let kind = doc.lexemes[i].kind;
        let src = doc.lexemes[i].src_string.clone();
        let id = LexemeId(i);

        match kind {
            LexKind::Op if is_open_bracket(&src) => {
                if let Some(&top) = bracket_stack.last() {
                    doc.get_mut(id).outer = Some(top);
                }
                bracket_stack.push(id);
            }
            LexKind::Op if is_close_bracket(&src) => {
                let opener = bracket_stack.pop().ok_or_else(|| FormatError::UnbalancedScope {
                    opener: src.clone(),
                    line: doc.lexemes[i].original_line,
                })?;
                let opener_src = doc.get(opener).src_string.clone();
                if !brackets_match(&opener_src, &src) {
                    return Err(FormatError::UnbalancedScope {
                        opener: opener_src,
                        line: doc.get(opener).original_line,
                    });
                }
                doc.get_mut(id).corresponding = Some(opener);
                doc.get_mut(opener).corresponding = Some(id);
            }
            LexKind::Indent => {
                if let Some(&top) = indent_stack.last() {
                    doc.get_mut(id).outer = Some(top);
                }
                indent_stack.push(id);
            }
            LexKind::Dedent => {
                let opener = indent_stack.pop().ok_or_else(|| FormatError::UnbalancedScope {
                    opener: "INDENT".to_string(),
                    line: doc.lexemes[i].original_line,
                })?;
                doc.get_mut(id).corresponding = Some(opener);
                doc.get_mut(opener).corresponding = Some(id);
            }
            LexKind::Op if src == ":" && bracket_stack.is_empty() => {
                if let Some(n) = next_non_whitespace_idx(doc, i) {
                    if matches!(doc.lexemes[n].kind, LexKind::Newline | LexKind::Comment) {
                        doc.get_mut(id).kind = LexKind::BlockStart;
                    }
                }
            }
            LexKind::Name if src == end_mark && bracket_stack.is_empty() => {
                let prev_ok = prev_non_whitespace_idx(doc, i)
                    .map(|p| {
                        matches!(
                            doc.lexemes[p].kind,
                            LexKind::Newline | LexKind::Nl | LexKind::Dedent | LexKind::Indent
                        )
                    })
                    .unwrap_or(false);
                let next_ok = next_non_whitespace_idx(doc, i)
                    .map(|n| matches!(doc.lexemes[n].kind, LexKind::Newline | LexKind::Comment))
                    .unwrap_or(false);
                if prev_ok && next_ok {
                    doc.get_mut(id).kind = LexKind::BlockEnd;
                }
            }
            _ => {}
        }
    }

    if let Some(&id) = bracket_stack.first() {
        return Err(FormatError::UnbalancedScope {
            opener: doc.get(id).src_string.clone(),
            line: doc.get(id).original_line,
        });
    }
    if let Some(&id) = indent_stack.first() {
        return Err(FormatError::UnbalancedScope {
            opener: "INDENT".to_string(),
            line: doc.get(id).original_line,
        });
    }

    detect_coalesce(doc);
    Ok(())
}

fn next_non_whitespace_idx(doc: &Document, mut i: usize) -> Option<usize> {
    i += 1;
    while i < doc.lexemes.len() {
        if doc.lexemes[i].kind != LexKind::Whitespace {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn prev_non_whitespace_idx(doc: &Document, i: usize) -> Option<usize> {
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

/// A bracket pair coalesces with its immediate outer pair when both the openers and both the
/// closers share an input line - the two pairs then occupy one level of optical indentation.
fn detect_coalesce(doc: &mut Document) {
    for i in 0..doc.lexemes.len() {
        if doc.lexemes[i].kind != LexKind::Op || !is_open_bracket(&doc.lexemes[i].src_string) {
            continue;
        }
        let Some(outer) = doc.lexemes[i].outer else { continue };
        let Some(closer) = doc.lexemes[i].corresponding else { continue };
        let Some(outer_closer) = doc.get(outer).corresponding else { continue };

        let same_open_line = doc.lexemes[i].original_line == doc.get(outer).original_line;
        let same_close_line = doc.get(closer).original_line == doc.get(outer_closer).original_line;

        if same_open_line && same_close_line {
            doc.get_mut(LexemeId(i)).coalesce = true;
            doc.get_mut(closer).coalesce = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::whitespace::build_document;

    #[test]
    fn links_matching_brackets() {
        let mut doc = build_document("f(x)\n", false).unwrap();
        link_scopes(&mut doc, "end").unwrap();
        let open = doc.lexemes.iter().position(|l| l.src_string == "(").unwrap();
        let close = doc.lexemes.iter().position(|l| l.src_string == ")").unwrap();
        assert_eq!(doc.lexemes[open].corresponding, Some(LexemeId(close)));
        assert_eq!(doc.lexemes[close].corresponding, Some(LexemeId(open)));
    }

    #[test]
    fn mismatched_bracket_kind_is_rejected() {
        // tokenizer only tracks depth, not bracket identity; scope linker must catch this.
        let mut doc = build_document("f(x]\n", false).unwrap();
        assert!(link_scopes(&mut doc, "end").is_err());
    }

    #[test]
    fn colon_before_newline_becomes_block_start() {
        let mut doc = build_document("if x:\n\tdo()\n", false).unwrap();
        link_scopes(&mut doc, "end").unwrap();
        let colon = doc
            .lexemes
            .iter()
            .find(|l| l.src_string == ":")
            .unwrap();
        assert_eq!(colon.kind, LexKind::BlockStart);
    }

    #[test]
    fn slice_colon_is_not_block_start() {
        let mut doc = build_document("a[1:2]\n", false).unwrap();
        link_scopes(&mut doc, "end").unwrap();
        let colon = doc.lexemes.iter().find(|l| l.src_string == ":").unwrap();
        assert_eq!(colon.kind, LexKind::Op);
    }

    #[test]
    fn bare_end_identifier_becomes_block_end() {
        let mut doc = build_document("if x:\n\tdo()\nend\n", false).unwrap();
        link_scopes(&mut doc, "end").unwrap();
        let end = doc.lexemes.iter().find(|l| l.src_string == "end").unwrap();
        assert_eq!(end.kind, LexKind::BlockEnd);
    }

    #[test]
    fn end_as_call_argument_is_not_block_end() {
        let mut doc = build_document("f(end)\n", false).unwrap();
        link_scopes(&mut doc, "end").unwrap();
        let end = doc.lexemes.iter().find(|l| l.src_string == "end").unwrap();
        assert_eq!(end.kind, LexKind::Name);
    }

    #[test]
    fn coalesced_brackets_share_one_indent_step() {
        let mut doc = build_document("f({\n\t1,\n})\n", false).unwrap();
        link_scopes(&mut doc, "end").unwrap();
        let paren = doc.lexemes.iter().position(|l| l.src_string == "(").unwrap();
        assert!(doc.lexemes[paren].coalesce);
    }
}
