//! The closed token-kind enumeration (spec.md §2, §3).
//!
//! Declaration order is load-bearing: [`TokenKind::is_keyword`],
//! [`TokenKind::is_operator`] and [`TokenKind::is_fence`] are expressed as
//! range checks over the derived [`Ord`] impl, exactly the way the
//! teacher's `SyntaxKind` classifies reserved-keyword/literal ranges.

/// One recognized lexeme class. See `examples/original_source/src/cedro.c`'s
/// `TokenType` for the enumeration this is ported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum TokenKind {
    /// Inert span: either the pre-pragma prelude, or unrecognized bytes
    /// that the unparser must still emit verbatim.
    None,

    Identifier,

    // --- keywords: Type ..= ControlFlowLabel, see `is_keyword` ---
    Type,
    TypeStruct,
    TypeQualifier,
    /// `auto`, the default defer introducer.
    TypeQualifierAuto,
    Typedef,
    ControlFlowIf,
    ControlFlowLoop,
    ControlFlowSwitch,
    /// `case` or `default`.
    ControlFlowCase,
    ControlFlowBreak,
    ControlFlowContinue,
    ControlFlowReturn,
    ControlFlowGoto,
    /// `defer`, the opt-in defer introducer (`#pragma Cedro X.Y defer`).
    ControlFlowDefer,
    /// An identifier retyped by the lexer's `:` disambiguation rule.
    ControlFlowLabel,
    // --- end keywords ---
    Number,
    String,
    Character,

    Space,
    Comment,
    Preprocessor,
    /// `_Generic`.
    GenericMacro,

    // --- fences: BlockStart ..= IndexEnd, see `is_fence` ---
    BlockStart,
    BlockEnd,
    TupleStart,
    TupleEnd,
    IndexStart,
    IndexEnd,
    // --- end fences ---

    // --- operators: Op1 ..= Comma, see `is_operator` / `precedence` ---
    Op1,
    Op2,
    Op3,
    Op4,
    Op5,
    Op6,
    Op7,
    Op8,
    Op9,
    Op10,
    Op11,
    Op12,
    Op13,
    Op14,
    /// OP_15 in spec.md's numbering.
    Comma,
    // --- end operators ---
    Semicolon,
    LabelColon,
    /// `@`.
    Backstitch,
    /// `..` or `...`.
    Ellipsis,

    Other,
}

impl TokenKind {
    pub fn is_keyword(self) -> bool {
        self >= TokenKind::Type && self <= TokenKind::ControlFlowLabel
    }

    pub fn is_operator(self) -> bool {
        self >= TokenKind::Op1 && self <= TokenKind::Comma
    }

    pub fn is_fence(self) -> bool {
        self >= TokenKind::BlockStart && self <= TokenKind::IndexEnd
    }

    pub fn is_fence_start(self) -> bool {
        matches!(
            self,
            TokenKind::BlockStart | TokenKind::TupleStart | TokenKind::IndexStart
        )
    }

    pub fn is_fence_end(self) -> bool {
        matches!(
            self,
            TokenKind::BlockEnd | TokenKind::TupleEnd | TokenKind::IndexEnd
        )
    }

    pub fn matching_fence(self) -> Option<TokenKind> {
        Some(match self {
            TokenKind::BlockStart => TokenKind::BlockEnd,
            TokenKind::BlockEnd => TokenKind::BlockStart,
            TokenKind::TupleStart => TokenKind::TupleEnd,
            TokenKind::TupleEnd => TokenKind::TupleStart,
            TokenKind::IndexStart => TokenKind::IndexEnd,
            TokenKind::IndexEnd => TokenKind::IndexStart,
            _ => return None,
        })
    }

    /// `precedence(OP_k) = k`; comma is precedence 15. `None` for non-operators.
    pub fn precedence(self) -> Option<u8> {
        use TokenKind::*;
        Some(match self {
            Op1 => 1,
            Op2 => 2,
            Op3 => 3,
            Op4 => 4,
            Op5 => 5,
            Op6 => 6,
            Op7 => 7,
            Op8 => 8,
            Op9 => 9,
            Op10 => 10,
            Op11 => 11,
            Op12 => 12,
            Op13 => 13,
            Op14 => 14,
            Comma => 15,
            _ => return None,
        })
    }

    /// Whether a token of this kind, if it was the last significant token
    /// seen, makes the following `+`/`-`/`*`/`&` a binary operator rather
    /// than a prefix one (spec.md §4.1's `previous_token_is_value`).
    pub fn is_value_like(self) -> bool {
        matches!(
            self,
            TokenKind::Identifier
                | TokenKind::Number
                | TokenKind::String
                | TokenKind::Character
                | TokenKind::TupleEnd
                | TokenKind::IndexEnd
        )
    }

    /// Whitespace or comment: skipped when scanning for "significant" tokens.
    pub fn is_trivia(self) -> bool {
        matches!(self, TokenKind::Space | TokenKind::Comment)
    }
}
