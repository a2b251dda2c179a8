//! The `#include "..."` / `#include <...>` callback hook (spec.md §4.6,
//! §6 "Directive surface").
//!
//! The unparser never reads standard-include search paths itself — that
//! is a driver-layer concern (spec.md §1 "out of scope"). It only calls
//! back into whatever resolver the caller installs, matching the
//! `IncludeCallback` function-pointer field in
//! `examples/original_source/src/cedro.c`.

/// Outcome of resolving one `#include "path"` / `#include <path>` line,
/// mirroring the original's three-way `IncludeCallbackFunction_p` return
/// (`-1`/`0`/other).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludeOutcome {
    /// Not a Cedro file (no activation pragma, or resolution declined):
    /// leave the `#include` line in the output untouched.
    NotCedro,
    /// The target was resolved, run through Cedro, and should replace the
    /// `#include` line with this already-unparsed text.
    Expanded(String),
    /// Resolution failed; `message` becomes inline `#error` text.
    Error(String),
}

/// Installed by the caller (the `cedro` orchestrating crate) to resolve
/// standard `#include` targets against its own search-path and
/// include-depth bookkeeping (spec.md §5 "include-depth cap of 10").
pub trait IncludeResolver {
    /// `directive_text` is the full source text of the `#include ...` line
    /// (including the `#include` keyword), so the resolver can parse the
    /// quote/angle-bracket form and the path itself.
    fn resolve(&mut self, directive_text: &str) -> IncludeOutcome;
}

/// Declines every `#include`, leaving the line untouched. Used when no
/// resolver is installed.
pub struct NullIncludeResolver;

impl IncludeResolver for NullIncludeResolver {
    fn resolve(&mut self, _directive_text: &str) -> IncludeOutcome {
        IncludeOutcome::NotCedro
    }
}
