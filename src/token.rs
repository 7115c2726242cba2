//! The lexeme/line data model shared by every pipeline stage
//!
//! Lexemes and lines live in two arenas owned by a single [`Document`]. Cross-references
//! ([`LexemeId`], [`LineId`]) are plain indices, never shared pointers, so the structure is
//! acyclic by construction and every pass over it is O(n).

use serde::{Deserialize, Serialize};

/// An index into [`Document::lexemes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LexemeId(pub usize);

/// An index into [`Document::lines`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineId(pub usize);

/// The classification of a lexeme.
///
/// NAME..ENDMARKER come out of the tokenizer adapter (stage A); WHITESPACE and ESCAPED_NL
/// are synthesized by the whitespace reinjector (stage B); BLOCK_START and BLOCK_END are
/// reclassified from OP/NAME by the scope linker (stage C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LexKind {
    Name,
    Number,
    String,
    Op,
    Comment,
    /// Logical statement terminator.
    Newline,
    /// Non-logical line break inside brackets (also used for blank/comment-only lines).
    Nl,
    Indent,
    Dedent,
    Encoding,
    EndMarker,
    /// Synthesized by the whitespace reinjector: the gap between two real lexemes.
    Whitespace,
    /// Synthesized by the whitespace reinjector: a `\` immediately followed by a newline.
    EscapedNl,
    /// A `:` immediately followed by NEWLINE or COMMENT.
    BlockStart,
    /// The end-mark identifier, surrounded by line boundaries.
    BlockEnd,
}

impl LexKind {
    /// Kinds around which the spacing engine never inserts a space (§4.E rule 2/4).
    pub fn is_no_space_kind(self) -> bool {
        matches!(
            self,
            LexKind::Indent
                | LexKind::Dedent
                | LexKind::Newline
                | LexKind::Nl
                | LexKind::Encoding
                | LexKind::EndMarker
        )
    }

    /// Kinds the spacing engine skips when looking for the "prior significant lexeme"
    /// (§4.E rule 6 and its `**` post-rule).
    pub fn is_insignificant_for_expression_scan(self) -> bool {
        matches!(
            self,
            LexKind::Whitespace
                | LexKind::Nl
                | LexKind::EscapedNl
                | LexKind::Comment
                | LexKind::Indent
                | LexKind::Dedent
        )
    }

    /// True for lexemes that terminate a line and should end the current [`Line`].
    pub fn ends_line(self) -> bool {
        matches!(self, LexKind::Newline | LexKind::Nl | LexKind::EscapedNl)
    }
}

/// A classified run of source characters, plus the fields needed to link it into a bracket
/// or indent scope. Every lexeme is one record (not a class hierarchy): the scope fields are
/// simply unset (`None`/`false`) on lexemes for which they don't apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lexeme {
    pub kind: LexKind,
    /// The exact input substring (possibly empty for synthesized lexemes).
    pub src_string: String,
    /// The text the emitter renders; equal to `src_string` until stage E (whitespace) or
    /// stage D (INDENT, whose rendered form is always empty) rewrites it.
    pub new_string: String,
    /// 1-based source line; `-1` for lexemes synthesized by stage F.
    pub original_line: i64,
    /// Set by stage D once this lexeme is assigned to a [`Line`].
    pub line: Option<LineId>,

    /// The paired opener/closer (INDENT↔DEDENT or bracket↔bracket). Set by stage C.
    pub corresponding: Option<LexemeId>,
    /// On openers only: the enclosing opener one level up. Set by stage C.
    pub outer: Option<LexemeId>,
    /// On brackets only: true when this bracket and its outer share both an opening and a
    /// closing input line, so they share one level of optical indentation. Set by stage C.
    pub coalesce: bool,
    /// On INDENT only: the first NAME of the header that introduced this block. Set by
    /// stage D.
    pub block_head: Option<LexemeId>,

    /// Set by stage F: excluded from emission.
    pub omit: bool,
}

impl Lexeme {
    pub fn new(kind: LexKind, src_string: impl Into<String>, original_line: i64) -> Self {
        let src_string = src_string.into();
        Lexeme {
            new_string: src_string.clone(),
            kind,
            src_string,
            original_line,
            line: None,
            corresponding: None,
            outer: None,
            coalesce: false,
            block_head: None,
            omit: false,
        }
    }

    pub fn synthesized(kind: LexKind, new_string: impl Into<String>) -> Self {
        let mut lex = Lexeme::new(kind, "", -1);
        lex.new_string = new_string.into();
        lex
    }
}

/// An ordered sequence of lexemes making up one logical or physical line of the output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub lexemes: Vec<LexemeId>,
    /// The kind of the newline lexeme that ended the *previous* line; `None` for the first.
    pub break_before: Option<LexKind>,
    pub logical_indent: i64,
    pub optical_indent: i64,
    /// Set by stage F: the whole line is excluded from emission.
    pub omit: bool,
}

impl Line {
    pub fn new(break_before: Option<LexKind>) -> Self {
        Line {
            lexemes: Vec::new(),
            break_before,
            logical_indent: 0,
            optical_indent: 0,
            omit: false,
        }
    }

    /// A Line with only a WHITESPACE and a newline lexeme carries no content.
    pub fn is_blank(&self) -> bool {
        self.lexemes.len() <= 2
    }
}

/// The two arenas threaded through every stage of the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub lexemes: Vec<Lexeme>,
    pub lines: Vec<Line>,
}

impl Document {
    pub fn new() -> Self {
        Document::default()
    }

    pub fn push_lexeme(&mut self, lexeme: Lexeme) -> LexemeId {
        let id = LexemeId(self.lexemes.len());
        self.lexemes.push(lexeme);
        id
    }

    pub fn push_line(&mut self, line: Line) -> LineId {
        let id = LineId(self.lines.len());
        self.lines.push(line);
        id
    }

    pub fn get(&self, id: LexemeId) -> &Lexeme {
        &self.lexemes[id.0]
    }

    pub fn get_mut(&mut self, id: LexemeId) -> &mut Lexeme {
        &mut self.lexemes[id.0]
    }

    pub fn line(&self, id: LineId) -> &Line {
        &self.lines[id.0]
    }

    pub fn line_mut(&mut self, id: LineId) -> &mut Line {
        &mut self.lines[id.0]
    }
}
