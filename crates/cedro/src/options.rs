//! `Options` (spec.md §2.4, §6): the whole of Cedro's configuration
//! surface, sourced entirely from the activation pragma line.

/// Mirrors `examples/rhaiscript-lsp/crates/rhai-fmt/src/options.rs`'s
/// plain-struct shape, without the serde/schemars/`OptionsIncomplete`
/// merge machinery that crate builds for a JSON-schema/LSP settings
/// surface Cedro doesn't have — see `DESIGN.md`'s "Dropped teacher
/// dependencies".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    pub version_major: u32,
    pub version_minor: u32,
    /// The `defer` feature word: recognizes `defer` as a second
    /// defer-action introducer alongside `auto` (spec.md §4.4).
    pub defer_keyword_enabled: bool,
    /// The `self` feature word: runs the self pass rewriting
    /// `obj.m(...)` / `obj->m(...)` (spec.md §4.5).
    pub pass_self_to_member_functions: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            version_major: 0,
            version_minor: 0,
            defer_keyword_enabled: false,
            pass_self_to_member_functions: false,
        }
    }
}
