//! Unparser options (spec.md §2.4, §6 "Escape-to-C contract").

/// Mirrors `Options` from `examples/original_source/src/cedro.c`: every
/// field is a plain emission toggle, not a parsed-pragma setting (those
/// live in `cedro::Options` one layer up).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Expand `#define {}` / `#include {}` / `#foreach {}` at emission time.
    pub apply_macros: bool,
    /// Escape non-ASCII identifier code points as `\uXXXX` / `\UXXXXXXXX`.
    pub escape_ucn: bool,
    /// Collapse each run of space markers to a single space.
    pub discard_space: bool,
    /// Skip comment markers entirely.
    pub discard_comments: bool,
    /// Insert `#line N "file"` directives wherever markers were reordered.
    pub insert_line_directives: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            apply_macros: true,
            escape_ucn: false,
            discard_space: false,
            discard_comments: false,
            insert_line_directives: false,
        }
    }
}
