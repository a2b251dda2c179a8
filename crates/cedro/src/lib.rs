//! Pipeline orchestration: bytes → lexer → passes → unparser → bytes
//! (spec.md §2 item 7, §5).

mod error;
mod include;
mod options;
mod pragma;

pub use error::Error;
pub use include::FileIncludeResolver;
pub use options::Options;

use std::path::Path;

use cedro_syntax::Buffer;
use cedro_unparse::IncludeResolver;

/// Default cap on nested `#include` resolution depth (spec.md §5
/// "Resource limits").
pub const MAX_INCLUDE_DEPTH: u32 = 10;

/// Run the full pipeline over `source`, writing diagnostics through
/// `tracing` and resolving `#include "..."` targets through `include`.
///
/// Files without the `#pragma Cedro ...` activation line run no passes
/// and are returned byte-identical (spec.md §8 scenario 6).
pub fn process(
    source: &[u8],
    src_file_name: &str,
    source_dir: &Path,
    include: &mut dyn IncludeResolver,
) -> Result<String, Error> {
    let mut buffer = Buffer::from_bytes(source);
    let prelude = cedro_syntax::find_prelude(&buffer);

    let Some(pragma_line) = prelude.pragma_line.clone() else {
        tracing::trace!(file = src_file_name, "no activation pragma, passthrough");
        return Ok(String::from_utf8_lossy(source).into_owned());
    };

    let options = pragma::parse(&pragma_line)?;
    tracing::trace!(?options, file = src_file_name, "parsed activation pragma");

    let mut markers = cedro_syntax::lex(&buffer, options.defer_keyword_enabled)?;

    cedro_transform::backstitch::run(&mut markers, &mut buffer)?;
    cedro_transform::defer::run(&mut markers, &mut buffer)?;
    cedro_transform::slice::run(&mut markers, &mut buffer)?;
    if options.pass_self_to_member_functions {
        cedro_transform::self_pass::run(&mut markers, &mut buffer)?;
    }

    let unparse_options = cedro_unparse::Options {
        apply_macros: true,
        escape_ucn: false,
        discard_space: false,
        discard_comments: false,
        insert_line_directives: true,
    };

    Ok(cedro_unparse::unparse(
        &markers,
        &buffer,
        src_file_name,
        source_dir,
        unparse_options,
        include,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cedro_unparse::NullIncludeResolver;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn run_str(source: &str) -> String {
        process(
            source.as_bytes(),
            "test.c",
            &PathBuf::from("."),
            &mut NullIncludeResolver,
        )
        .expect("pipeline")
    }

    #[test]
    fn no_pragma_is_passthrough() {
        let source = "int main(void) { return 0; }\n";
        assert_eq!(run_str(source), source);
    }

    #[test]
    fn backstitch_threads_calls() {
        let source = "#pragma Cedro 1.0\nvg @ nvgBeginPath(), nvgFill();\n";
        let out = run_str(source);
        assert!(out.contains("nvgBeginPath(vg)"), "{out}");
        assert!(out.contains("nvgFill(vg)"), "{out}");
    }
}
