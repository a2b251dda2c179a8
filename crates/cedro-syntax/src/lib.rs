//! Byte buffer, token kinds, marker array, and the streaming lexer
//! (spec.md §2 items 1-4, §3, §4.1).

pub mod buffer;
pub mod error;
pub mod lexer;
pub mod marker;
pub mod token;
pub mod utf8;

pub use buffer::{Buffer, PADDING};
pub use error::LexError;
pub use lexer::{find_prelude, lex, lex_fragment, Prelude};
pub use marker::{Marker, MarkerArray};
pub use token::TokenKind;
