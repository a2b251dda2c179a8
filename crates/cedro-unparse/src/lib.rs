//! Marker array to C source unparsing, including the `#define{}` /
//! `#include{}` / `#foreach{}` directive family (spec.md §2 item 6, §4.6).

mod error;
mod fragment;
mod include;
mod options;
mod replacement;
mod ucn;

pub use error::UnparseError;
pub use include::{IncludeOutcome, IncludeResolver, NullIncludeResolver};
pub use options::Options;
pub use replacement::Replacement;
pub use ucn::escape_identifier;

use std::path::Path;

use cedro_syntax::{Buffer, MarkerArray};

/// Render `markers` back to C source text.
///
/// `src_file_name`/`source_dir` feed `#line` directives and resolve
/// `#include {path}` / `#include "path"` targets relative to the file
/// being unparsed. `include` is consulted only for the latter; pass
/// [`NullIncludeResolver`] to leave every `#include` line untouched.
pub fn unparse(
    markers: &MarkerArray,
    buffer: &Buffer,
    src_file_name: &str,
    source_dir: &Path,
    options: Options,
    include: &mut dyn IncludeResolver,
) -> String {
    let mut out = String::with_capacity(buffer.len() + buffer.len() / 8);
    let mut em = fragment::Emitter {
        buffer,
        src_file_name,
        source_dir,
        options,
        include,
    };

    if options.insert_line_directives && markers.len() > 0 {
        let first = markers.get(0);
        if first.start != 0 {
            let line = 1 + buffer.as_slice()[..first.start]
                .iter()
                .filter(|&&b| b == b'\n')
                .count();
            out.push_str(&format!("#line {line} \"{src_file_name}\"\n"));
        }
    }

    fragment::emit_fragment(markers, 0, markers.len(), 0, &[], false, false, &mut em, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cedro_syntax::lex;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn run(source: &str) -> String {
        let buffer = Buffer::from_bytes(source.as_bytes());
        let markers = lex(&buffer, true).expect("lex");
        unparse(
            &markers,
            &buffer,
            "test.c",
            &PathBuf::from("."),
            Options::default(),
            &mut NullIncludeResolver,
        )
    }

    #[test]
    fn passthrough_without_pragma() {
        let source = "int main(void) { return 0; }\n";
        assert_eq!(run(source), source);
    }

    #[test]
    fn foreach_expands_each_tuple_row() {
        // The value list's own closing brace doubles as the close for the
        // `#foreach {` header line: `{T, N}` (var-spec) then
        // `{{int, a}, {char, b}}` (two rows), each row itself a `{T, N}`
        // shaped tuple.
        let source = "#pragma Cedro 1.0\n#foreach { {T, N} {{int, a}, {char, b}}\nT x_##N;\n#foreach }\n";
        let out = run(source);
        assert!(out.contains("int x_a;"), "{out}");
        assert!(out.contains("char x_b;"), "{out}");
        assert!(!out.contains("#foreach"), "{out}");
    }

    #[test]
    fn foreach_single_variable_list() {
        let source = "#pragma Cedro 1.0\n#foreach { N {1, 2, 3}\nf(N);\n#foreach }\n";
        let out = run(source);
        assert!(out.contains("f(1);"), "{out}");
        assert!(out.contains("f(2);"), "{out}");
        assert!(out.contains("f(3);"), "{out}");
    }

    #[test]
    fn ucn_escaping_round_trips_ascii() {
        let mut opts = Options::default();
        opts.escape_ucn = true;
        let source = "int café;\n";
        let buffer = Buffer::from_bytes(source.as_bytes());
        let markers = lex(&buffer, true).expect("lex");
        let out = unparse(
            &markers,
            &buffer,
            "test.c",
            &PathBuf::from("."),
            opts,
            &mut NullIncludeResolver,
        );
        assert!(out.contains("caf\\u00E9"), "{out}");
    }
}
