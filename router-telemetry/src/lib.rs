//! Global tracing subscriber for the `router` binary. `ai-llm-service` built
//! a library-scoped layer filtered to its own crate's target prefix; this
//! binary has no single owning crate, so the same formatter is installed as
//! the *only* subscriber, filtered by `RUST_LOG`/the configured default
//! level instead of a target prefix.

use std::io::{self, IsTerminal};

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{EnvFilter, fmt};

/// RFC3339 UTC timer implemented via `chrono`. Example: `2026-07-27T10:20:30Z`.
#[derive(Clone, Debug, Default)]
struct ChronoRfc3339Utc;

impl FormatTime for ChronoRfc3339Utc {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let s = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        w.write_str(&s)
    }
}

/// Installs the process-wide subscriber. `default_filter` is used when
/// `RUST_LOG` is unset (e.g. `"info"`, `"router=debug,tower_http=info"`).
///
/// Panics if a subscriber has already been installed — this is meant to be
/// called exactly once, at the top of `main`.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let use_ansi = io::stdout().is_terminal();

    fmt()
        .with_env_filter(filter)
        .with_timer(ChronoRfc3339Utc::default())
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(use_ansi)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .compact()
        .init();
}
