//! Formatter configuration
//!
//! [`FormatOptions`] is the validated configuration consumed by [`crate::format::format`]. It
//! mirrors the mode flags and tuning knobs listed as the core's external interface: three
//! mutually exclusive modes (`insert_end`, `ignore_indent`, `strip_end`), an indent string, and
//! the clipboard/validate/debug toggles.

use crate::error::FormatError;

/// The identifier that, placed alone on a line, closes the innermost indented block.
pub const DEFAULT_END_MARK: &str = "end";

/// The implicit closer keywords that suppress end-mark synthesis and drive dedent
/// bookkeeping in ignore-indent mode.
pub const IMPLICIT_BLOCK_END: &[&str] = &["elif", "else", "catch", "finally"];

/// Configuration consumed by the core formatting pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatOptions {
    /// After each DEDENT, synthesize an end-mark line (unless suppressed, see `endmark`).
    pub insert_end: bool,

    /// Strip leading whitespace before tokenizing; derive blocks from `:` and the end mark
    /// instead of the original INDENT/DEDENT pattern. Mutually exclusive with `insert_end`.
    pub ignore_indent: bool,

    /// Remove end-mark lines, preserving trailing same-line comments. Mutually exclusive
    /// with `insert_end`.
    pub strip_end: bool,

    /// The identifier recognized as (and synthesized as) the block end mark.
    pub end_mark: String,

    /// String repeated per optical indent step.
    pub indent_with: String,

    /// Treat the input as a clipboard fragment: it may start already indented and may end
    /// in an unpaired DEDENT; validation is relaxed accordingly and the preamble is never
    /// injected.
    pub is_clipboard: bool,

    /// Perform the post-emit equivalence check.
    pub validate: bool,

    /// Render INDENT/DEDENT/space/newline as visible glyphs and suppress validation.
    pub debug: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions {
            insert_end: false,
            ignore_indent: false,
            strip_end: false,
            end_mark: DEFAULT_END_MARK.to_string(),
            indent_with: "\t".to_string(),
            is_clipboard: false,
            validate: true,
            debug: false,
        }
    }
}

impl FormatOptions {
    /// Check the mode flags for the two conflicting combinations named in the spec.
    pub fn validate_options(&self) -> Result<(), FormatError> {
        if self.insert_end && self.ignore_indent {
            return Err(FormatError::ConflictingOptions {
                detail: "insert_end and ignore_indent are mutually exclusive".to_string(),
            });
        }
        if self.insert_end && self.strip_end {
            return Err(FormatError::ConflictingOptions {
                detail: "insert_end and strip_end are mutually exclusive".to_string(),
            });
        }
        Ok(())
    }
}
