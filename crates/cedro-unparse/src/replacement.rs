//! `#foreach` variable-to-value bindings (spec.md §3 "Replacement entry").
//!
//! The original keeps `(variable_marker, value_slice)` pairs pointing into
//! the live marker array. Here the value is copied into an owned
//! `Vec<Marker>` instead: a `#foreach` value list is parsed from a
//! separate, transient fragment array (see `cedro_syntax::lex_fragment`),
//! so a borrowed slice would not outlive the lookup. Markers are `Copy`
//! and only carry byte offsets into the shared buffer, so the copy is
//! cheap and keeps every lifetime local to one `#foreach` expansion.

use cedro_syntax::Marker;

#[derive(Debug, Clone)]
pub struct Replacement {
    pub name: String,
    pub value: Vec<Marker>,
}

pub fn lookup<'a>(replacements: &'a [Replacement], name: &str) -> Option<&'a [Marker]> {
    replacements
        .iter()
        .find(|r| r.name == name)
        .map(|r| r.value.as_slice())
}
