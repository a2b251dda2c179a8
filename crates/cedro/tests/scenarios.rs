//! Pipeline-level tests for the six concrete end-to-end scenarios in
//! spec.md §8, one `#[test]` per scenario (SPEC_FULL.md §2.5).

use std::path::PathBuf;

use cedro_unparse::NullIncludeResolver;
use pretty_assertions::assert_eq;

fn run(source: &str) -> String {
    cedro::process(source.as_bytes(), "test.c", &PathBuf::from("."), &mut NullIncludeResolver)
        .expect("pipeline")
}

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Scenario 1: backstitch with a prefix call (spec.md §8 "Backstitch
/// with prefix call").
#[test]
fn scenario_1_backstitch_prefix_call() {
    let out = run("#pragma Cedro 1.0\nvg @ nvgBeginPath(), nvgFill();\n");
    assert!(out.contains("nvgBeginPath(vg), nvgFill(vg);"), "{out}");
}

/// Scenario 2: defer with early return (spec.md §8 "Defer with early
/// return").
#[test]
fn scenario_2_defer_with_early_return() {
    let out = run(
        "#pragma Cedro 1.0\nint f(int n) {\n  char* p = malloc(n); auto free(p); if (!p) return -1; return 0;\n}\n",
    );
    assert_eq!(out.matches("free(p);").count(), 2, "{out}");
    assert!(out.contains("if (!p) { free(p); return -1; }"), "{out}");
    assert!(out.contains("free(p); return 0;"), "{out}");
}

/// Scenario 3: slice (spec.md §8 "Slice").
#[test]
fn scenario_3_slice() {
    let out = run("#pragma Cedro 1.0\nfn(a[10..+5]);\n");
    assert!(out.contains("fn(&a[10], &a[10+5]);"), "{out}");
}

/// Scenario 4: binary include, `#include {small-file.txt}` against the
/// fixture bytes `C2 A1 48 6F 6C 61 20 6D 75 6E 64 6F 21 0A` (spec.md
/// §8 "Binary include").
#[test]
fn scenario_4_binary_include() {
    let source = "#pragma Cedro 1.0\nconst char m[] = \n#include {small-file.txt}\n;\n";
    let out = cedro::process(source.as_bytes(), "test.c", &fixtures_dir(), &mut NullIncludeResolver)
        .expect("pipeline");
    assert!(out.contains("[14] ="), "{out}");
    assert!(out.contains("/* small-file.txt */"), "{out}");
    for byte_literal in ["0xC2", "0xA1", "0x48", "0x6F", "0x6C", "0x61", "0x20", "0x6D", "0x75", "0x6E", "0x64", "0x6F", "0x21", "0x0A"] {
        assert!(out.contains(byte_literal), "missing {byte_literal} in {out}");
    }
}

/// Scenario 5: `#foreach` with tuple values (spec.md §8 "Foreach with
/// tuple values").
#[test]
fn scenario_5_foreach_with_tuple_values() {
    let source =
        "#pragma Cedro 1.0\n#foreach { {T,N} {{int,I},{float,F}}\ntypedef T N##_t;\n#foreach }\n";
    let out = run(source);
    let int_pos = out.find("typedef int I_t;").expect(&out);
    let float_pos = out.find("typedef float F_t;").expect(&out);
    assert!(int_pos < float_pos, "{out}");
    assert!(!out.contains("#foreach"), "{out}");
}

/// Scenario 6: no pragma means byte-identical passthrough (spec.md §8
/// "No pragma = passthrough").
#[test]
fn scenario_6_no_pragma_is_passthrough() {
    let source = "int add(int a, int b) {\n  return a + b;\n}\n";
    assert_eq!(run(source), source);
}
