//! Tracing subscriber setup.
//!
//! All diagnostics go to stderr so stdout stays reserved for command output
//! (and JSON documents in robot mode).

use std::io::{self, IsTerminal};

use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStyle {
    /// JSON lines, for scripts and agents.
    Json,
    /// Colored, for interactive terminals.
    Pretty,
    /// Plain single lines, for pipes and files.
    Compact,
}

impl LogStyle {
    /// Pick a style from the robot flag and whether stderr is a terminal.
    #[must_use]
    pub const fn detect(json: bool, stderr_is_tty: bool) -> Self {
        if json {
            Self::Json
        } else if stderr_is_tty {
            Self::Pretty
        } else {
            Self::Compact
        }
    }
}

/// Filter directive for the crate when `RUST_LOG` is unset.
///
/// `quiet` wins over `verbose`: 0 = info, 1 = debug, 2+ = trace.
#[must_use]
pub const fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "pilot_bridge=error";
    }
    match verbose {
        0 => "pilot_bridge=info",
        1 => "pilot_bridge=debug",
        _ => "pilot_bridge=trace",
    }
}

fn fmt_layer(style: LogStyle) -> Box<dyn Layer<Registry> + Send + Sync> {
    let base = fmt::layer()
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(io::stderr);

    match style {
        LogStyle::Json => base.json().with_target(true).boxed(),
        LogStyle::Pretty => base.with_target(false).boxed(),
        LogStyle::Compact => base.with_ansi(false).with_target(false).compact().boxed(),
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` (e.g. `pilot_bridge=trace`) overrides the verbosity flags.
/// Calling this twice is harmless; the second call is ignored.
pub fn init_logging(json: bool, verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));
    let style = LogStyle::detect(json, io::stderr().is_terminal());

    let _ = tracing_subscriber::registry()
        .with(fmt_layer(style))
        .with(filter)
        .try_init();
}
