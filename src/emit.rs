//! Stage G: emitter and validator
//!
//! Rendering concatenates every non-omitted [`Line`]'s indent fill and non-omitted lexemes.
//! Validation re-tokenizes the rendered text independently of the in-progress [`Document`] and
//! compares it, under a fixed filter, against a fresh tokenization of the original source - it
//! never trusts the mutated arena's own bookkeeping.

use crate::config::IMPLICIT_BLOCK_END;
use crate::error::FormatError;
use crate::scope;
use crate::token::{Document, LexKind};
use crate::tokenizer;

/// Render `doc` to text. `indent_with` fills each optical indent step; in `debug` mode that
/// derived fill is suppressed entirely and the INDENT/DEDENT lexemes render as `>`/`<` glyphs
/// in their actual stream position instead, so the dump shows exactly where the pipeline placed
/// each structural token rather than a synthesized depth unrelated to it.
pub fn render(doc: &Document, indent_with: &str, debug: bool) -> String {
    let mut out = String::new();
    for line in &doc.lines {
        if line.omit {
            continue;
        }
        if !debug && !line.is_blank() {
            for _ in 0..line.optical_indent {
                out.push_str(indent_with);
            }
        }
        for &id in &line.lexemes {
            let lex = &doc.lexemes[id.0];
            if lex.omit {
                continue;
            }
            match lex.kind {
                LexKind::Indent => out.push_str(if debug { ">" } else { "" }),
                LexKind::Dedent => out.push_str(if debug { "<" } else { "" }),
                LexKind::Whitespace if debug => {
                    for c in lex.new_string.chars() {
                        out.push(match c {
                            ' ' => '\u{b7}',
                            '\t' => '\u{2192}',
                            other => other,
                        });
                    }
                }
                _ => out.push_str(&lex.new_string),
            }
        }
    }
    out
}

/// Re-tokenize `original_source` and `output` independently, link their scopes against
/// `end_mark`, filter both streams identically, and compare. Also checks the two DEDENT
/// adjacency invariants directly on the output's own re-tokenization.
///
/// `ignore_indent` additionally drops INDENT/DEDENT from both filtered streams before
/// comparing: re-deriving indentation from end-marks necessarily introduces INDENT/DEDENT
/// pairs the flat, end-mark-driven original never had, so that structural difference is
/// exactly what this mode is for, not a validation failure.
pub fn validate(
    original_source: &str,
    output: &str,
    end_mark: &str,
    is_clipboard: bool,
    insert_end: bool,
    ignore_indent: bool,
) -> Result<(), FormatError> {
    let input_doc = tokenize_and_link(original_source, end_mark, is_clipboard)?;
    let output_doc = tokenize_and_link(output, end_mark, is_clipboard)?;

    let input_filtered = filtered_stream(&input_doc, ignore_indent);
    let output_filtered = filtered_stream(&output_doc, ignore_indent);

    if input_filtered.len() != output_filtered.len() {
        return Err(FormatError::ValidationFailed {
            detail: format!(
                "token count mismatch: input has {}, output has {}",
                input_filtered.len(),
                output_filtered.len()
            ),
        });
    }

    for (idx, ((ik, is_str), (ok, os_str))) in
        input_filtered.iter().zip(output_filtered.iter()).enumerate()
    {
        if ik != ok {
            return Err(FormatError::ValidationFailed {
                detail: format!("kind mismatch at position {idx}: {ik:?} vs {ok:?}"),
            });
        }
        if *ik != LexKind::Indent && is_str != os_str {
            return Err(FormatError::ValidationFailed {
                detail: format!("text mismatch at position {idx}: {is_str:?} vs {os_str:?}"),
            });
        }
    }

    check_dedent_adjacency(&output_doc, insert_end, is_clipboard)
}

fn tokenize_and_link(source: &str, end_mark: &str, is_clipboard: bool) -> Result<Document, FormatError> {
    let normalized = tokenizer::ensure_trailing_newline(source);
    let tokens = tokenizer::tokenize(&normalized, is_clipboard)?;
    let mut doc = Document::new();
    for (lex, _) in tokens {
        doc.push_lexeme(lex);
    }
    scope::link_scopes(&mut doc, end_mark)?;
    Ok(doc)
}

fn filtered_stream(doc: &Document, drop_indentation: bool) -> Vec<(LexKind, String)> {
    let kept: Vec<(LexKind, String)> = doc
        .lexemes
        .iter()
        .filter(|lex| !matches!(lex.kind, LexKind::Nl | LexKind::Comment))
        .filter(|lex| !drop_indentation || !matches!(lex.kind, LexKind::Indent | LexKind::Dedent))
        .map(|lex| (lex.kind, lex.src_string.clone()))
        .collect();

    let mut result = Vec::with_capacity(kept.len());
    let mut i = 0;
    while i < kept.len() {
        if i + 1 < kept.len() && kept[i].0 == LexKind::BlockEnd && kept[i + 1].0 == LexKind::Newline {
            i += 2;
            continue;
        }
        result.push(kept[i].clone());
        i += 1;
    }
    result
}

fn check_dedent_adjacency(doc: &Document, insert_end: bool, is_clipboard: bool) -> Result<(), FormatError> {
    for i in 0..doc.lexemes.len() {
        let kind = doc.lexemes[i].kind;
        if kind == LexKind::BlockEnd {
            let prev_is_dedent = i > 0 && doc.lexemes[i - 1].kind == LexKind::Dedent;
            if !prev_is_dedent {
                return Err(FormatError::ValidationFailed {
                    detail: "a BLOCK_END in the output is not immediately preceded by a DEDENT".to_string(),
                });
            }
        }
        if insert_end && kind == LexKind::Dedent {
            let next = doc.lexemes.get(i + 1);
            let ok = next
                .map(|n| {
                    matches!(n.kind, LexKind::BlockEnd)
                        || (is_clipboard && n.kind == LexKind::EndMarker)
                        || (n.kind == LexKind::Name && IMPLICIT_BLOCK_END.contains(&n.src_string.as_str()))
                })
                .unwrap_or(false);
            if !ok {
                return Err(FormatError::ValidationFailed {
                    detail: "a DEDENT in the output is not immediately followed by an end-mark, implicit closer, or ENDMARKER".to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lines::group_and_solve;
    use crate::spacing::apply_spacing;
    use crate::whitespace::build_document;

    fn build(source: &str) -> Document {
        let mut doc = build_document(source, false).unwrap();
        scope::link_scopes(&mut doc, "end").unwrap();
        group_and_solve(&mut doc, false);
        apply_spacing(&mut doc);
        doc
    }

    #[test]
    fn renders_simple_block_with_tab_indent() {
        let doc = build("if x:\n\tdo()\n");
        assert_eq!(render(&doc, "\t", false), "if x:\n\tdo()\n");
    }

    #[test]
    fn debug_mode_shows_indent_glyphs() {
        let doc = build("if x:\n\tdo()\n");
        let out = render(&doc, "\t", true);
        assert!(out.contains('>'));
    }

    #[test]
    fn validate_accepts_unchanged_source() {
        let source = "if x:\n\tdo()\n";
        assert!(validate(source, source, "end", false, false, false).is_ok());
    }

    #[test]
    fn validate_rejects_dropped_token() {
        let source = "if x:\n\tdo()\n";
        let broken = "if x:\n\tdo\n";
        assert!(validate(source, broken, "end", false, false, false).is_err());
    }

    #[test]
    fn validate_ignores_introduced_indentation_in_ignore_indent_mode() {
        let source = "if a:\nf()\nend\n";
        let output = "if a:\n\tf()\nend\n";
        assert!(validate(source, output, "end", false, false, true).is_ok());
    }
}
