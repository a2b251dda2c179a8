//! Stderr logging setup (spec.md §2.2), ported from `examples/
//! rhaiscript-lsp/crates/lsp/bin/rhai/main.rs`'s `setup_stderr_logging`:
//! `RUST_LOG` wins when set, otherwise `info` (or `debug` with
//! `--verbose`); `--log-spans` adds span open/close events.

use tracing_subscriber::{filter::EnvFilter, fmt::format::FmtSpan, prelude::*};

pub fn setup_stderr_logging(spans: bool, verbose: bool) {
    let span_events = if spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let default_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    let env_filter = match std::env::var("RUST_LOG").ok() {
        Some(log) => EnvFilter::new(log),
        None => EnvFilter::default().add_directive(default_level.into()),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_span_events(span_events)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .ok();
}
