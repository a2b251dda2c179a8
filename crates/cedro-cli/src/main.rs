//! Thin binary: read one input, run `cedro::process`, write one output
//! (spec.md §1 "out of scope" — option dispatch, the compiler-piping
//! driver, and the template generator all live outside this crate;
//! this binary only drives the pipeline itself). Shaped after
//! `examples/rhaiscript-lsp/crates/rhai-cli/src/bin/rhai.rs`'s
//! parse → setup-logging → execute → exit-code flow, with the
//! `#[tokio::main]`/subcommand dispatch dropped since Cedro's pipeline
//! is synchronous (spec.md §5) and this binary takes one positional
//! path.

mod args;
mod log;

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::exit;

use anyhow::Context;
use clap::Parser;
use cedro::FileIncludeResolver;

use args::CedroArgs;

/// Exit codes named in spec.md §6; only the ones reachable by this
/// thin binary are defined (the template generator's EEXIST and the
/// validate mode's out-of-band code belong to the out-of-scope driver
/// layer, per `DESIGN.md`).
mod exit_code {
    pub const EDOM_EINVAL: i32 = 1;
    pub const ENOENT: i32 = 2;
    pub const EIO: i32 = 3;
}

fn main() {
    let cli = CedroArgs::parse();
    log::setup_stderr_logging(cli.log_spans, cli.verbose);

    match run(cli) {
        Ok(()) => exit(0),
        Err(error) => {
            tracing::error!(error = %format!("{error:#}"), "cedro failed");
            eprintln!("cedro: {error:#}");
            exit(error.downcast_ref::<CliError>().map_or(exit_code::EIO, CliError::exit_code));
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}: no such file")]
    NotFound(PathBuf),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::NotFound(_) => exit_code::ENOENT,
            CliError::InvalidArgument(_) => exit_code::EDOM_EINVAL,
        }
    }
}

fn run(cli: CedroArgs) -> anyhow::Result<()> {
    let (source, src_file_name, source_dir): (Vec<u8>, String, PathBuf) = match &cli.input {
        Some(path) if path.as_os_str() != "-" => {
            if !path.is_file() {
                return Err(CliError::NotFound(path.clone()).into());
            }
            let bytes = std::fs::read(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let dir = path.parent().map(PathBuf::from).unwrap_or_default();
            (bytes, name, dir)
        }
        _ => {
            let mut bytes = Vec::new();
            std::io::stdin()
                .read_to_end(&mut bytes)
                .context("reading stdin")?;
            (bytes, "<stdin>".to_string(), PathBuf::from("."))
        }
    };

    let mut resolver = FileIncludeResolver::new(source_dir.clone(), &cli.include_dirs);
    let output = cedro::process(&source, &src_file_name, &source_dir, &mut resolver)
        .with_context(|| format!("processing {src_file_name}"))?;

    match &cli.output {
        Some(path) => {
            std::fs::write(path, output.as_bytes())
                .with_context(|| format!("writing {}", path.display()))?;
        }
        None => {
            std::io::stdout()
                .write_all(output.as_bytes())
                .context("writing stdout")?;
        }
    }

    Ok(())
}
