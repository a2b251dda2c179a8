//! Command-line surface, scoped down from `examples/rhaiscript-lsp/
//! crates/rhai-cli/src/args.rs`'s `RhaiArgs` derive shape to the single
//! positional input path spec.md §1 leaves in scope ("out of scope:
//! command-line parsing, option dispatch" beyond what this binary
//! needs to drive one pipeline run).

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[clap(name = "cedro", about = "Cedro source-to-source C preprocessor")]
pub struct CedroArgs {
    /// C source file to process. Reads stdin ("-") if omitted.
    pub input: Option<PathBuf>,

    /// Write output here instead of stdout.
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// Additional `#include "..."` search directories, checked in order
    /// after the including file's own directory.
    #[clap(short = 'I', long = "include-dir")]
    pub include_dirs: Vec<PathBuf>,

    /// Emit `tracing` span open/close events.
    #[clap(long)]
    pub log_spans: bool,

    /// Raise the default log level from `info` to `debug`.
    #[clap(short, long)]
    pub verbose: bool,
}
