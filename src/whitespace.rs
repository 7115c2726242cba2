//! Stage B: whitespace reinjector
//!
//! The tokenizer adapter's underlying lexer treats spaces, tabs and backslash-newline
//! continuations as insignificant and skips over them. This stage walks the gaps between
//! consecutive lexeme spans in the original source and turns each one back into real
//! lexemes - WHITESPACE and ESCAPED_NL - so every later stage can rewrite spacing without
//! ever touching the source text directly.

use crate::error::FormatError;
use crate::token::{Document, LexKind, Lexeme};
use crate::tokenizer;
use std::ops::Range;

/// Tokenize `source` and reinject whitespace in one step, producing the [`Document`] stage C
/// onward will mutate in place.
pub fn build_document(source: &str, is_clipboard: bool) -> Result<Document, FormatError> {
    let tokens = tokenizer::tokenize(source, is_clipboard)?;
    Ok(reinject_whitespace(source, &tokens))
}

/// Expand each gap between consecutive lexeme spans into WHITESPACE/ESCAPED_NL lexemes and
/// interleave them with the real lexemes from stage A.
pub fn reinject_whitespace(source: &str, tokens: &[(Lexeme, Range<usize>)]) -> Document {
    let mut doc = Document::new();
    let mut prev_end = 0usize;

    for (i, (lexeme, span)) in tokens.iter().enumerate() {
        let gap = &source[prev_end..span.start];
        if i > 0 {
            for (kind, text) in split_gap(gap) {
                doc.push_lexeme(Lexeme::new(kind, text, -1));
            }
        }
        doc.push_lexeme(lexeme.clone());
        prev_end = span.end;
    }

    doc
}

/// Split a gap substring (guaranteed by the tokenizer's skip pattern to contain only spaces,
/// tabs, and `\`-newline markers) into an alternating WHITESPACE/ESCAPED_NL/.../WHITESPACE
/// sequence. Always ends on a WHITESPACE segment, possibly empty.
fn split_gap(gap: &str) -> Vec<(LexKind, String)> {
    let mut segments = Vec::new();
    let mut rest = gap;
    loop {
        match find_backslash_newline(rest) {
            Some((pos, len)) => {
                segments.push((LexKind::Whitespace, rest[..pos].to_string()));
                segments.push((LexKind::EscapedNl, rest[pos..pos + len].to_string()));
                rest = &rest[pos + len..];
            }
            None => {
                segments.push((LexKind::Whitespace, rest.to_string()));
                break;
            }
        }
    }
    segments
}

fn find_backslash_newline(s: &str) -> Option<(usize, usize)> {
    let crlf = s.find("\\\r\n").map(|p| (p, 3));
    let lf = s.find("\\\n").map(|p| (p, 2));
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_gap_before_encoding_is_discarded() {
        let source = tokenizer::ensure_trailing_newline("  a\n");
        let doc = build_document(&source, false).unwrap();
        assert_eq!(doc.lexemes[0].kind, LexKind::Encoding);
        // Gap before ENCODING is dropped; the very next lexeme is the WHITESPACE preceding 'a'.
        assert_eq!(doc.lexemes[1].kind, LexKind::Whitespace);
        assert_eq!(doc.lexemes[1].src_string, "  ");
    }

    #[test]
    fn backslash_newline_becomes_escaped_nl() {
        let source = tokenizer::ensure_trailing_newline("a + \\\n    b\n");
        let doc = build_document(&source, false).unwrap();
        let kinds: Vec<_> = doc.lexemes.iter().map(|l| l.kind).collect();
        assert!(kinds.contains(&LexKind::EscapedNl));
        let esc = doc
            .lexemes
            .iter()
            .find(|l| l.kind == LexKind::EscapedNl)
            .unwrap();
        assert_eq!(esc.src_string, "\\\n");
    }

    #[test]
    fn adjacent_lexemes_with_no_gap_get_empty_whitespace() {
        let source = tokenizer::ensure_trailing_newline("f()\n");
        let doc = build_document(&source, false).unwrap();
        let names_and_ops: Vec<_> = doc
            .lexemes
            .windows(2)
            .filter(|w| w[0].kind == LexKind::Name && w[1].kind == LexKind::Whitespace)
            .collect();
        assert!(names_and_ops.iter().any(|w| w[1].src_string.is_empty()));
    }
}
