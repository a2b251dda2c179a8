//! Aggregate pipeline error (spec.md §2.3, §7 "Lexical"/"Structural").
//!
//! Lexical and structural errors abort the pipeline and surface here;
//! directive-class errors (spec.md §7 "Directive") never reach this
//! type — `cedro_unparse::unparse` always returns a `String`, writing
//! those inline as `#error` text instead.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("lex error: {0}")]
    Lex(#[from] cedro_syntax::LexError),

    #[error("transform error: {0}")]
    Transform(#[from] cedro_transform::TransformError),

    #[error("malformed pragma: {0}")]
    Pragma(String),

    #[error("include depth exceeded ({0} levels) in {1}")]
    IncludeDepthExceeded(u32, String),

    #[error("{0}: {1}")]
    Io(String, String),
}
