//! Pipeline entry point
//!
//! Drives stages A through G over a single [`token::Document`], mutating it in place from
//! stage D onward rather than handing off a new structure at each step.

use crate::config::FormatOptions;
use crate::emit;
use crate::endmark;
use crate::error::FormatError;
use crate::lines;
use crate::scope;
use crate::spacing;
use crate::tokenizer;
use crate::whitespace;

/// The result of formatting one source text.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatResult {
    pub text: String,
    /// Whether the end-mark identifier was already bound before this call (by `= ` or an
    /// `import`). Only meaningful when `insert_end` was requested; the CLI uses this to decide
    /// whether to inject its own preamble.
    pub end_mark_already_defined: bool,
}

/// Format `source` per `opts`. Normalizes the trailing newline, optionally strips leading
/// whitespace for ignore-indent mode, then runs the tokenizer through the emitter/validator.
pub fn format(source: &str, opts: &FormatOptions) -> Result<FormatResult, FormatError> {
    opts.validate_options()?;

    let normalized = tokenizer::ensure_trailing_newline(source);
    let working = if opts.ignore_indent {
        tokenizer::strip_for_ignore_indent(&normalized)?
    } else {
        normalized.clone()
    };

    let mut doc = whitespace::build_document(&working, opts.is_clipboard)?;
    scope::link_scopes(&mut doc, &opts.end_mark)?;
    lines::group_and_solve(&mut doc, opts.ignore_indent);
    spacing::apply_spacing(&mut doc);

    let end_mark_already_defined = endmark::end_mark_already_defined(&doc, &opts.end_mark);

    if opts.insert_end {
        endmark::synthesize_end_marks(&mut doc, &opts.end_mark, opts.is_clipboard);
    }
    if opts.strip_end {
        endmark::strip_end_marks(&mut doc);
    }

    let text = emit::render(&doc, &opts.indent_with, opts.debug);

    if opts.validate && !opts.debug {
        // In ignore-indent mode the pipeline formats `working` (leading whitespace already
        // stripped), not `normalized` - the raw source's own indentation is exactly what this
        // mode exists to tolerate and may not even re-tokenize on its own.
        let validation_source = if opts.ignore_indent { &working } else { &normalized };
        emit::validate(
            validation_source,
            &text,
            &opts.end_mark,
            opts.is_clipboard,
            opts.insert_end,
            opts.ignore_indent,
        )?;
    }

    Ok(FormatResult {
        text,
        end_mark_already_defined,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_simple_block_unchanged() {
        let out = format("if x:\n\tdo()\n", &FormatOptions::default()).unwrap();
        assert_eq!(out.text, "if x:\n\tdo()\n");
    }

    #[test]
    fn insert_end_adds_closing_mark() {
        let opts = FormatOptions {
            insert_end: true,
            ..FormatOptions::default()
        };
        let out = format("if x:\n\tdo()\n", &opts).unwrap();
        assert_eq!(out.text, "if x:\n\tdo()\nend\n");
        assert!(!out.end_mark_already_defined);
    }

    #[test]
    fn strip_end_removes_closing_mark() {
        let opts = FormatOptions {
            strip_end: true,
            ..FormatOptions::default()
        };
        let out = format("if x:\n\tdo()\nend\n", &opts).unwrap();
        assert_eq!(out.text, "if x:\n\tdo()\n");
    }

    #[test]
    fn ignore_indent_reconstructs_indentation() {
        let opts = FormatOptions {
            ignore_indent: true,
            ..FormatOptions::default()
        };
        let out = format("if a:\nf()\nend\n", &opts).unwrap();
        assert_eq!(out.text, "if a:\n\tf()\nend\n");
    }

    #[test]
    fn conflicting_options_are_rejected_before_any_work() {
        let opts = FormatOptions {
            insert_end: true,
            strip_end: true,
            ..FormatOptions::default()
        };
        assert!(matches!(
            format("a\n", &opts),
            Err(FormatError::ConflictingOptions { .. })
        ));
    }

    #[test]
    fn detects_preexisting_end_definition() {
        let opts = FormatOptions {
            insert_end: true,
            ..FormatOptions::default()
        };
        let out = format("end = None\nif x:\n\tdo()\n", &opts).unwrap();
        assert!(out.end_mark_already_defined);
    }
}
