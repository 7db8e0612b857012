//! Logging and output control
//!
//! This module provides the [`Logger`] used for user-visible progress lines and
//! [`init_tracing`] which installs the `tracing` subscriber for the binary.
//! Every line the [`Logger`] prints goes through `tracing`, so `RUST_LOG`
//! and the chosen output format apply to it as well.

use std::io;
use std::time::{Duration, Instant};
use tracing::Level;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Tracing output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Pretty-printed human-readable format
    Pretty,
    /// Compact single-line format
    Compact,
    /// Structured JSON format
    Json,
}

/// Parse a level name as used by the `LOG_LEVEL` environment variable
pub fn parse_level(value: &str) -> Option<Level> {
    match value.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" | "critical" => Some(Level::ERROR),
        _ => None,
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `level` when set.
pub fn init_tracing(level: Level, format: LogFormat) -> crate::error::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            let level_str = match level {
                Level::TRACE => "trace",
                Level::DEBUG => "debug",
                Level::INFO => "info",
                Level::WARN => "warn",
                Level::ERROR => "error",
            };
            EnvFilter::try_new(format!("image_mirror={level_str},image_mirror::report=info"))
        })
        .map_err(|e| crate::error::MirrorError::Config(format!("Failed to create tracing filter: {e}")))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = match format {
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(false),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(io::stderr)
                    .with_target(false),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(io::stderr)
                    .with_current_span(true),
            )
            .try_init(),
    };

    installed.map_err(|e| crate::error::MirrorError::Config(format!("Tracing already initialized: {e}")))
}

/// Progress lines for a mirror pass, routed through the `image_mirror::report` target
#[derive(Debug, Clone)]
pub struct Logger {
    verbose: bool,
    quiet: bool,
    started: Instant,
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            quiet: false,
            started: Instant::now(),
        }
    }

    /// Only errors surface; the pass summary is suppressed too
    pub fn new_quiet() -> Self {
        Self {
            quiet: true,
            ..Self::new(false)
        }
    }

    /// Main section heading
    pub fn section(&self, title: &str) {
        if !self.quiet {
            tracing::info!(target: "image_mirror::report", "=== {} ===", title);
        }
    }

    /// Information message
    pub fn info(&self, message: &str) {
        if !self.quiet {
            tracing::info!(target: "image_mirror::report", "{}", message);
        }
    }

    /// Warning message
    pub fn warning(&self, message: &str) {
        if !self.quiet {
            tracing::warn!(target: "image_mirror::report", "{}", message);
        }
    }

    /// Step information
    pub fn step(&self, message: &str) {
        if !self.quiet {
            tracing::info!(target: "image_mirror::report", "▶ {}", message);
        }
    }

    /// Detailed information (only shown in verbose mode)
    pub fn detail(&self, message: &str) {
        if self.verbose && !self.quiet {
            tracing::info!(target: "image_mirror::report", "   {}", message);
        }
    }

    /// Key-value pair summary display
    pub fn summary_kv(&self, title: &str, items: &[(&str, String)]) {
        if self.quiet {
            return;
        }
        tracing::info!(target: "image_mirror::report", "--- {} ---", title);
        for (key, value) in items {
            tracing::info!(target: "image_mirror::report", "  {}: {}", key, value);
        }
    }

    /// Render as `42s`, `2m5s` or `1h2m5s`
    pub fn format_duration(&self, duration: Duration) -> String {
        let total = duration.as_secs();
        let (hours, minutes, seconds) = (total / 3600, total % 3600 / 60, total % 60);
        match (hours, minutes) {
            (0, 0) => format!("{seconds}s"),
            (0, _) => format!("{minutes}m{seconds}s"),
            _ => format!("{hours}h{minutes}m{seconds}s"),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
