//! Directive-class errors (spec.md §7 "Directive").
//!
//! These never abort the pipeline: `#error` text per spec.md §7's
//! propagation policy, not a returned `Result` — see
//! `crate::directive_error` for where the conversion happens.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnparseError {
    #[error("syntax error")]
    Syntax,
    #[error("missing value list")]
    MissingValueList,
    #[error("syntax error in value list")]
    SyntaxErrorInValueList,
    #[error("braces are not allowed with a single variable")]
    BracesWithSingleVariable,
    #[error("duplicated argument")]
    DuplicatedArgument,
    #[error("syntax error, expected a comma")]
    ExpectedComma,
    #[error("unbalanced group in #foreach value")]
    UnbalancedGroupInForeachValue,
    #[error("invalid content after value list")]
    InvalidContentAfterValueList,
    #[error("unfinished value list")]
    UnfinishedValueList,
    #[error("empty value")]
    EmptyValue,
    #[error("more values than variables")]
    MoreValuesThanVariables,
    #[error("fewer values than variables")]
    FewerValuesThanVariables,
    #[error("block directive closing without previous opening")]
    UnmatchedBlockClose,
    #[error("invalid content after `#define }}`")]
    InvalidContentAfterDefineClose,
    #[error("missing closing brace after `#include {{...`")]
    MissingIncludeClosingBrace,
    #[error("invalid content after `#include {{...}}`")]
    InvalidContentAfterIncludeEmbed,
    #[error("invalid content after `#foreach }}`")]
    InvalidContentAfterForeachClose,
    #[error("missing the identifier after `#`")]
    MissingIdentifierAfterHash,
    #[error("missing value for variable {name}")]
    MissingValueForVariable { name: String },
    #[error("preprocessor directives are not allowed inside `#foreach`")]
    DirectiveInsideForeach,
    #[error("unclosed `#foreach {{`")]
    UnclosedForeach,
    #[error("{0}")]
    Io(String),
}
