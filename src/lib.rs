//! # blockfmt
//!
//!     A formatter for an indentation-sensitive scripting language that optionally supports
//!     an explicit block end mark: a single identifier that, placed alone on a line, closes
//!     the innermost indented block.
//!
//! Pipeline
//!
//!     The formatter is a strict, single-pass-per-stage pipeline:
//!
//!     1. **Tokenizer** ([`tokenizer`]) - raw lexeme stream with source spans
//!     2. **Whitespace** ([`whitespace`]) - reinjects the gaps between lexemes as real tokens
//!     3. **Scope** ([`scope`]) - links bracket/indent pairs, detects block boundaries
//!     4. **Lines** ([`lines`]) - groups lexemes into logical lines, solves indentation
//!     5. **Spacing** ([`spacing`]) - rewrites inter-token whitespace
//!     6. **End marks** ([`endmark`]) - inserts or strips block end mark lines
//!     7. **Emit** ([`emit`]) - renders the result and validates it against the input
//!
//!     [`format::format`] drives stages 1-7 in order; stages 4-6 mutate the same
//!     [`token::Document`] in place rather than handing off a new structure at each step.
//!
//! Data model
//!
//!     Lexemes and lines live in two arenas owned by a single [`token::Document`]; every
//!     cross-reference between them ([`token::LexemeId`], [`token::LineId`]) is a plain
//!     index, never a shared pointer. See [`token`] for the full invariants.

pub mod config;
pub mod emit;
pub mod endmark;
pub mod error;
pub mod format;
pub mod lines;
pub mod scope;
pub mod spacing;
pub mod token;
pub mod tokenizer;
pub mod whitespace;

pub use config::FormatOptions;
pub use error::FormatError;
pub use format::{format, FormatResult};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_a_trivial_block() {
        let opts = FormatOptions::default();
        let out = format("if x:\n\tdo()\n", &opts).unwrap();
        assert_eq!(out.text, "if x:\n\tdo()\n");
    }
}
