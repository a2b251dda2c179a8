//! The streaming lexer, prelude pass, and operator/colon disambiguation
//! (spec.md §4.1).

use logos::Logos;
use unicode_xid::UnicodeXID;

use crate::buffer::Buffer;
use crate::error::LexError;
use crate::marker::{Marker, MarkerArray};
use crate::token::TokenKind;

/// Result of the prelude pass (spec.md §4.1.1): everything before the
/// activation pragma (plus trailing blank lines) becomes one inert `NONE`
/// marker.
pub struct Prelude {
    pub prelude_end: usize,
    /// The text of the `#pragma Cedro ...` line itself, if one was found.
    pub pragma_line: Option<String>,
}

/// Find the first `#pragma Cedro <major>.<minor>...` line. A file without
/// the pragma reports `prelude_end == buffer.len()` and `pragma_line: None`;
/// the caller should then emit the whole file as one `NONE` marker and run
/// no transform passes (spec.md §8 "No pragma = passthrough").
pub fn find_prelude(buffer: &Buffer) -> Prelude {
    let src = buffer.as_slice();
    let mut offset = 0usize;
    while offset < src.len() {
        let line_end = src[offset..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|p| offset + p)
            .unwrap_or(src.len());
        let line = &src[offset..line_end];
        let trimmed_start = line
            .iter()
            .position(|&b| b != b' ' && b != b'\t')
            .unwrap_or(line.len());
        let trimmed = &line[trimmed_start..];
        if trimmed.starts_with(b"#pragma") {
            if let Ok(text) = std::str::from_utf8(trimmed) {
                let rest = text["#pragma".len()..].trim_start();
                if rest.starts_with("Cedro") {
                    let mut end = (line_end + 1).min(src.len());
                    loop {
                        let next_line_end = src[end..]
                            .iter()
                            .position(|&b| b == b'\n')
                            .map(|p| end + p)
                            .unwrap_or(src.len());
                        let is_blank = src[end..next_line_end]
                            .iter()
                            .all(|&b| b == b' ' || b == b'\t' || b == b'\r');
                        if is_blank && next_line_end < src.len() {
                            end = next_line_end + 1;
                        } else {
                            break;
                        }
                    }
                    return Prelude {
                        prelude_end: end,
                        pragma_line: Some(text.trim_end_matches('\r').to_string()),
                    };
                }
            }
        }
        if line_end >= src.len() {
            break;
        }
        offset = line_end + 1;
    }
    Prelude {
        prelude_end: src.len(),
        pragma_line: None,
    }
}

/// Lexical categories that do not yet carry context-sensitive meaning;
/// reclassified into [`TokenKind`] by [`lex`] while sweeping, the way the
/// teacher's `Lexer` wraps a generated token stream and layers statement
/// bookkeeping on top of it.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum RawToken {
    #[token("int")]
    #[token("char")]
    #[token("float")]
    #[token("double")]
    #[token("void")]
    #[token("short")]
    #[token("long")]
    #[token("unsigned")]
    #[token("signed")]
    #[token("_Bool")]
    #[token("_Complex")]
    Type,

    #[token("struct")]
    #[token("union")]
    #[token("enum")]
    TypeStruct,

    #[token("const")]
    #[token("volatile")]
    #[token("restrict")]
    #[token("_Atomic")]
    #[token("static")]
    #[token("extern")]
    #[token("register")]
    #[token("inline")]
    TypeQualifier,

    #[token("auto")]
    Auto,

    #[token("typedef")]
    Typedef,

    #[token("if")]
    #[token("else")]
    If,

    #[token("for")]
    #[token("while")]
    #[token("do")]
    Loop,

    #[token("switch")]
    Switch,

    #[token("case")]
    #[token("default")]
    Case,

    #[token("break")]
    Break,

    #[token("continue")]
    Continue,

    #[token("return")]
    Return,

    #[token("goto")]
    Goto,

    #[token("_Generic")]
    GenericMacro,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", priority = 1, callback = lex_identifier_tail)]
    Ident,

    #[regex(r"(\.)?[0-9]", callback = lex_number)]
    Number,

    #[token("\"", callback = lex_string)]
    StringLit,

    #[token("'", callback = lex_char)]
    CharLit,

    #[token("//", callback = lex_line_comment)]
    LineComment,

    #[token("/*", callback = lex_block_comment)]
    BlockComment,

    #[regex(r"[ \t\r\n\x0c]+", callback = lex_space_tail)]
    Space,

    #[token("#", callback = lex_preprocessor)]
    Preprocessor,

    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token("@")]
    At,
    #[token("...")]
    Ellipsis3,
    #[token("..")]
    Ellipsis2,
    #[token(".")]
    Dot,
    #[token("->")]
    Arrow,

    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("!")]
    Not,
    #[token("~")]
    BitNot,
    #[token("?")]
    Question,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("&")]
    Amp,

    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("^")]
    Caret,
    #[token("|")]
    Pipe,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,

    #[token("=")]
    Assign,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,
    #[token("&=")]
    AmpEq,
    #[token("|=")]
    PipeEq,
    #[token("^=")]
    CaretEq,
    #[token("<<=")]
    ShlEq,
    #[token(">>=")]
    ShrEq,

    #[error]
    Error,
}

fn lex_identifier_tail(lex: &mut logos::Lexer<RawToken>) {
    let rem = lex.remainder().as_bytes();
    let mut i = 0;
    while i < rem.len() {
        let b = rem[i];
        if b.is_ascii_alphanumeric() || b == b'_' {
            i += 1;
        } else if b == b'\\' && rem.get(i + 1).map_or(false, |&n| n == b'u' || n == b'U') {
            // universal-character-name continuation; accepted verbatim, the
            // unparser's UCN escaper is the inverse of this.
            let digits = if rem[i + 1] == b'u' { 4 } else { 8 };
            let end = i + 2 + digits;
            if end <= rem.len() && rem[i + 2..end].iter().all(u8::is_ascii_hexdigit) {
                i = end;
            } else {
                break;
            }
        } else if b >= 0x80 {
            // non-ASCII byte: decode the code point and accept it only if
            // `unicode-xid`'s `XID_Continue` table admits it (the fixed
            // Unicode subset SPEC_FULL.md §4.0 substitutes for Annex D).
            let decoded = crate::utf8::decode_utf8_unchecked(&rem[i..]);
            let len = decoded.len.max(1);
            let is_continue = char::from_u32(decoded.code_point)
                .map(|c| c.is_xid_continue())
                .unwrap_or(false);
            if is_continue {
                i += len;
            } else {
                break;
            }
        } else {
            break;
        }
    }
    lex.bump(i);
}

fn lex_number(lex: &mut logos::Lexer<RawToken>) {
    let rem = lex.remainder().as_bytes();
    let mut i = 0;
    while i < rem.len() {
        let b = rem[i];
        if b.is_ascii_digit() || b == b'.' || b == b'_' || b.is_ascii_alphabetic() {
            if (b == b'e' || b == b'E' || b == b'p' || b == b'P')
                && rem.get(i + 1).map_or(false, |&n| n == b'+' || n == b'-')
            {
                i += 2;
                continue;
            }
            i += 1;
        } else {
            break;
        }
    }
    lex.bump(i);
}

fn lex_string(lex: &mut logos::Lexer<RawToken>) {
    scan_quoted(lex, b'"');
}

fn lex_char(lex: &mut logos::Lexer<RawToken>) {
    scan_quoted(lex, b'\'');
}

fn scan_quoted(lex: &mut logos::Lexer<RawToken>, quote: u8) {
    let rem = lex.remainder().as_bytes();
    let mut i = 0;
    while i < rem.len() {
        match rem[i] {
            b'\\' if i + 1 < rem.len() => i += 2,
            b if b == quote => {
                i += 1;
                lex.bump(i);
                return;
            }
            b'\n' => break,
            _ => i += 1,
        }
    }
    // Unterminated: bump to EOF/newline; `lex` flags the error afterward by
    // checking that the consumed slice does not end with `quote`.
    lex.bump(i);
}

fn lex_line_comment(lex: &mut logos::Lexer<RawToken>) {
    let rem = lex.remainder().as_bytes();
    let len = rem.iter().position(|&b| b == b'\n').unwrap_or(rem.len());
    lex.bump(len);
}

fn lex_block_comment(lex: &mut logos::Lexer<RawToken>) {
    let rem = lex.remainder().as_bytes();
    let mut i = 0;
    while i + 1 < rem.len() {
        if rem[i] == b'*' && rem[i + 1] == b'/' {
            lex.bump(i + 2);
            return;
        }
        i += 1;
    }
    lex.bump(rem.len());
}

fn lex_space_tail(lex: &mut logos::Lexer<RawToken>) {
    let rem = lex.remainder().as_bytes();
    let mut i = 0;
    loop {
        while i < rem.len() && matches!(rem[i], b' ' | b'\t' | b'\r' | b'\n' | 0x0c) {
            i += 1;
        }
        // ISO/IEC 9899 line-splicing: `\` immediately followed by a newline
        // is absorbed into the surrounding space run rather than ending it.
        if rem.get(i) == Some(&b'\\') && matches!(rem.get(i + 1), Some(b'\n')) {
            i += 2;
            continue;
        }
        if rem.get(i) == Some(&b'\\') && rem.get(i + 1) == Some(&b'\r') && rem.get(i + 2) == Some(&b'\n') {
            i += 3;
            continue;
        }
        break;
    }
    lex.bump(i);
}

/// `#` only introduces a directive line when it is the first non-space
/// byte of its physical line (spec.md §4.1: "consumes a line starting
/// with `#`"). A `#`/`##` appearing elsewhere, e.g. inside a `#foreach
/// {}`/`#define {}` body's templating syntax, stays a tiny 1- or
/// 2-byte token so the unparser's directive expansion can recognize
/// `#IDENT`/`##`/`#OP` token-by-token (spec.md §4.6).
fn lex_preprocessor(lex: &mut logos::Lexer<RawToken>) {
    let before = &lex.source().as_bytes()[..lex.span().start];
    let at_line_start = before
        .iter()
        .rev()
        .find(|&&b| b != b' ' && b != b'\t' && b != b'\r')
        .map_or(true, |&b| b == b'\n');

    if !at_line_start {
        if lex.remainder().as_bytes().first() == Some(&b'#') {
            lex.bump(1);
        }
        return;
    }

    let rem = lex.remainder().as_bytes();
    let mut i = 0;
    loop {
        while i < rem.len() && rem[i] != b'\n' {
            if rem[i] == b'\\' && rem.get(i + 1) == Some(&b'\n') {
                i += 2;
                continue;
            }
            i += 1;
        }
        break;
    }
    lex.bump(i);
}

/// Tracks the minimum context the lexer needs to disambiguate operators and
/// label colons while sweeping left to right (spec.md §4.1).
struct Context {
    /// Kind of the most recent non-trivia marker, and its index.
    prev: Option<(usize, TokenKind)>,
    /// Kind of the non-trivia marker before that one.
    prev_prev_kind: Option<TokenKind>,
}

impl Context {
    fn new() -> Self {
        Self {
            prev: None,
            prev_prev_kind: None,
        }
    }

    fn previous_token_is_value(&self) -> bool {
        self.prev.map_or(false, |(_, k)| k.is_value_like())
    }

    fn note_pushed(&mut self, index: usize, kind: TokenKind) {
        if kind.is_trivia() {
            return;
        }
        self.prev_prev_kind = self.prev.map(|(_, k)| k);
        self.prev = Some((index, kind));
    }
}

/// Run the lexer over `buffer`, honoring the prelude pass and the operator/
/// colon disambiguation rules. `defer_keyword_enabled` comes from parsing
/// the `#pragma Cedro ...` line's feature words before calling this
/// function (see `cedro::pragma`).
pub fn lex(buffer: &Buffer, defer_keyword_enabled: bool) -> Result<MarkerArray, LexError> {
    let prelude = find_prelude(buffer);
    let mut markers = MarkerArray::with_capacity(buffer.len() / 4 + 16);

    if prelude.pragma_line.is_none() {
        tracing::trace!("no activation pragma found, emitting single NONE marker");
        markers.push(Marker::new(0, buffer.len(), TokenKind::None));
        return Ok(markers);
    }

    tracing::trace!(
        prelude_end = prelude.prelude_end,
        pragma_line = prelude.pragma_line.as_deref().unwrap_or(""),
        "prelude pass found activation pragma"
    );
    markers.push(Marker::new(0, prelude.prelude_end, TokenKind::None));

    let remainder_bytes = &buffer.as_slice()[prelude.prelude_end..];
    let text = std::str::from_utf8(remainder_bytes).map_err(|e| {
        let position = prelude.prelude_end + e.valid_up_to();
        tracing::warn!(position, "malformed UTF-8 in remainder after prelude");
        LexError::MalformedUtf8 { position }
    })?;

    lex_tokens(text, prelude.prelude_end, defer_keyword_enabled, &mut markers)?;
    Ok(markers)
}

/// Lex a standalone fragment of C-like text (no prelude, no pragma) and
/// return its markers with offsets relative to the owning buffer.
///
/// Used by `cedro-unparse` to re-tokenize the remainder of a `#foreach {`
/// directive line (its variable spec and inline value list), which the
/// main sweep already folded into one `PREPROCESSOR` marker (spec.md
/// §4.6), re-lexing just that marker's trailing bytes in isolation.
pub fn lex_fragment(text: &str, base_offset: usize) -> Result<MarkerArray, LexError> {
    let mut markers = MarkerArray::with_capacity(text.len() / 4 + 4);
    lex_tokens(text, base_offset, false, &mut markers)?;
    Ok(markers)
}

fn lex_tokens(
    text: &str,
    base_offset: usize,
    defer_keyword_enabled: bool,
    markers: &mut MarkerArray,
) -> Result<(), LexError> {
    let mut raw_lexer = RawToken::lexer(text);
    let mut ctx = Context::new();

    while let Some(raw) = raw_lexer.next() {
        let span = raw_lexer.span();
        let slice = raw_lexer.slice();
        let abs_start = base_offset + span.start;
        let len = span.end - span.start;

        let kind = match raw {
            RawToken::Type => TokenKind::Type,
            RawToken::TypeStruct => TokenKind::TypeStruct,
            RawToken::TypeQualifier => TokenKind::TypeQualifier,
            RawToken::Auto => TokenKind::TypeQualifierAuto,
            RawToken::Typedef => TokenKind::Typedef,
            RawToken::If => TokenKind::ControlFlowIf,
            RawToken::Loop => TokenKind::ControlFlowLoop,
            RawToken::Switch => TokenKind::ControlFlowSwitch,
            RawToken::Case => TokenKind::ControlFlowCase,
            RawToken::Break => TokenKind::ControlFlowBreak,
            RawToken::Continue => TokenKind::ControlFlowContinue,
            RawToken::Return => TokenKind::ControlFlowReturn,
            RawToken::Goto => TokenKind::ControlFlowGoto,
            RawToken::GenericMacro => TokenKind::GenericMacro,
            RawToken::Ident => {
                if defer_keyword_enabled && slice == "defer" {
                    TokenKind::ControlFlowDefer
                } else {
                    TokenKind::Identifier
                }
            }
            RawToken::Number => TokenKind::Number,
            RawToken::StringLit => {
                if !slice.ends_with('"') || slice.len() < 2 {
                    tracing::warn!(position = abs_start, "unterminated string literal");
                    return Err(LexError::UnterminatedString { position: abs_start });
                }
                TokenKind::String
            }
            RawToken::CharLit => {
                if !slice.ends_with('\'') || slice.len() < 2 {
                    tracing::warn!(position = abs_start, "unterminated character literal");
                    return Err(LexError::UnterminatedCharacter { position: abs_start });
                }
                TokenKind::Character
            }
            RawToken::LineComment | RawToken::BlockComment => TokenKind::Comment,
            RawToken::Space => TokenKind::Space,
            RawToken::Preprocessor => {
                let directive = slice.trim_start_matches('#').trim_start();
                if directive.starts_with("assert") {
                    tracing::warn!(position = abs_start, "incompatible directive #assert");
                    return Err(LexError::IncompatibleDirective {
                        position: abs_start,
                        directive: "#assert".to_string(),
                    });
                }
                TokenKind::Preprocessor
            }
            RawToken::LBrace => TokenKind::BlockStart,
            RawToken::RBrace => TokenKind::BlockEnd,
            RawToken::LParen => TokenKind::TupleStart,
            RawToken::RParen => TokenKind::TupleEnd,
            RawToken::LBracket => TokenKind::IndexStart,
            RawToken::RBracket => TokenKind::IndexEnd,
            RawToken::Comma => TokenKind::Comma,
            RawToken::Semicolon => TokenKind::Semicolon,
            RawToken::At => TokenKind::Backstitch,
            RawToken::Ellipsis3 | RawToken::Ellipsis2 => TokenKind::Ellipsis,
            RawToken::Dot => TokenKind::Op1,
            RawToken::Arrow => TokenKind::Op1,
            RawToken::PlusPlus | RawToken::MinusMinus | RawToken::Not | RawToken::BitNot => {
                TokenKind::Op2
            }
            RawToken::Question => TokenKind::Op13,
            RawToken::Colon => {
                let is_label = match (ctx.prev, ctx.prev_prev_kind) {
                    (Some((_, TokenKind::Identifier)), Some(before)) => matches!(
                        before,
                        TokenKind::Semicolon
                            | TokenKind::LabelColon
                            | TokenKind::BlockStart
                            | TokenKind::BlockEnd
                    ),
                    (Some((_, TokenKind::ControlFlowCase)), _) => true,
                    _ => false,
                };
                if is_label {
                    if let Some((idx, TokenKind::Identifier)) = ctx.prev {
                        tracing::trace!(index = idx, "retyping identifier as label before `:`");
                        markers.get_mut(idx).kind = TokenKind::ControlFlowLabel;
                    }
                    TokenKind::LabelColon
                } else {
                    TokenKind::Op13
                }
            }
            RawToken::Plus | RawToken::Minus => {
                if ctx.previous_token_is_value() {
                    TokenKind::Op4
                } else {
                    TokenKind::Op2
                }
            }
            RawToken::Star => {
                if ctx.previous_token_is_value() {
                    TokenKind::Op3
                } else {
                    TokenKind::Op2
                }
            }
            RawToken::Amp => {
                if ctx.previous_token_is_value() {
                    TokenKind::Op8
                } else {
                    TokenKind::Op2
                }
            }
            RawToken::Slash | RawToken::Percent => TokenKind::Op3,
            RawToken::Shl | RawToken::Shr => TokenKind::Op5,
            RawToken::Le | RawToken::Ge | RawToken::Lt | RawToken::Gt => TokenKind::Op6,
            RawToken::EqEq | RawToken::NotEq => TokenKind::Op7,
            RawToken::Caret => TokenKind::Op9,
            RawToken::Pipe => TokenKind::Op10,
            RawToken::AndAnd => TokenKind::Op11,
            RawToken::OrOr => TokenKind::Op12,
            RawToken::Assign
            | RawToken::PlusEq
            | RawToken::MinusEq
            | RawToken::StarEq
            | RawToken::SlashEq
            | RawToken::PercentEq
            | RawToken::AmpEq
            | RawToken::PipeEq
            | RawToken::CaretEq
            | RawToken::ShlEq
            | RawToken::ShrEq => TokenKind::Op14,
            RawToken::Error => {
                tracing::trace!(position = abs_start, byte = slice, "unrecognized byte, emitting OTHER");
                TokenKind::Other
            }
        };

        let index = markers.len();
        markers.push(Marker::new(abs_start, len, kind));
        ctx.note_pushed(index, kind);
    }

    Ok(())
}
