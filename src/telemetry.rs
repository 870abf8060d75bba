//! Structured logging setup.
//!
//! Everything in the crate logs through `tracing`; this module installs a subscriber
//! for binaries that do not bring their own. Settings come from the environment:
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `EMBER_LOG_LEVEL` | `info` | base level (`RUST_LOG` overrides) |
//! | `EMBER_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `EMBER_LOG_SAMPLING_MODE` | `all` | `all`, `error-only` or `sampled` |
//! | `EMBER_LOG_SAMPLING_RATE` | `0.1` | share of non-error events kept when sampled |
//! | `EMBER_LOG_ASYNC` | `false` | write through a background thread |
//! | `EMBER_LOG_TARGET_FILTER` | | extra comma-separated filter directives |
//! | `EMBER_LOG_INCLUDE_LOCATION` | `false` | add file and line to each event |

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context as _;
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_SAMPLING_RATE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(format!("unknown log format {other:?}")),
        }
    }
}

/// Which events reach the output. WARN and ERROR events are never sampled out.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Sampling {
    #[default]
    All,
    ErrorOnly,
    /// Keep about `rate` (0.0 to 1.0) of the INFO and below events.
    Rate(f64),
}

impl Sampling {
    fn from_parts(mode: &str, rate: Option<f64>) -> Result<Self, String> {
        match mode.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "error-only" | "error_only" => Ok(Self::ErrorOnly),
            "sampled" => Ok(Self::Rate(rate.unwrap_or(DEFAULT_SAMPLING_RATE))),
            other => Err(format!("unknown sampling mode {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    pub sampling: Sampling,
    pub non_blocking: bool,
    /// Extra `EnvFilter` directives such as `ember::app=debug`.
    pub directives: Vec<String>,
    pub source_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            sampling: Sampling::All,
            non_blocking: false,
            directives: Vec::new(),
            source_location: false,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`. Unparsable values keep their default and
    /// are reported on stderr, since no subscriber exists yet.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let mut config = Self::default();
        let flag = |name: &str| lookup(name).map(|v| matches!(v.trim(), "1" | "true" | "yes" | "on"));

        if let Some(level) = lookup("EMBER_LOG_LEVEL").filter(|l| !l.trim().is_empty()) {
            config.level = level.trim().to_string();
        }
        if let Some(format) = lookup("EMBER_LOG_FORMAT") {
            match format.parse() {
                Ok(format) => config.format = format,
                Err(e) => eprintln!("EMBER_LOG_FORMAT: {e}"),
            }
        }
        if let Some(mode) = lookup("EMBER_LOG_SAMPLING_MODE") {
            let rate = lookup("EMBER_LOG_SAMPLING_RATE").and_then(|r| r.trim().parse().ok());
            match Sampling::from_parts(&mode, rate) {
                Ok(sampling) => config.sampling = sampling,
                Err(e) => eprintln!("EMBER_LOG_SAMPLING_MODE: {e}"),
            }
        }
        config.non_blocking = flag("EMBER_LOG_ASYNC").unwrap_or(false);
        config.source_location = flag("EMBER_LOG_INCLUDE_LOCATION").unwrap_or(false);
        config.directives = lookup("EMBER_LOG_TARGET_FILTER")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        config
    }

    /// Verbose human-readable output for local runs.
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
            source_location: true,
            ..Self::default()
        }
    }
}

/// Thins out low-severity events according to [`Sampling`].
pub struct SamplingLayer {
    sampling: Sampling,
    every: u64,
    seen: AtomicU64,
}

impl SamplingLayer {
    pub fn new(sampling: Sampling) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let every = match sampling {
            Sampling::Rate(rate) if rate > 0.0 => (1.0 / rate.min(1.0)).round() as u64,
            _ => 0,
        };
        Self {
            sampling,
            every,
            seen: AtomicU64::new(0),
        }
    }

    fn keep(&self, level: Level) -> bool {
        if level <= Level::WARN {
            return true;
        }
        match self.sampling {
            Sampling::All => true,
            Sampling::ErrorOnly => false,
            Sampling::Rate(_) => self.every > 0 && self.seen.fetch_add(1, Ordering::Relaxed) % self.every == 0,
        }
    }
}

impl<S> Layer<S> for SamplingLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn event_enabled(&self, event: &Event<'_>, _ctx: Context<'_, S>) -> bool {
        self.keep(*event.metadata().level())
    }
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let base = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    std::iter::once("may_minihttp=warn")
        .chain(config.directives.iter().map(String::as_str))
        .fold(base, |filter, raw| match raw.parse() {
            Ok(directive) => filter.add_directive(directive),
            Err(e) => {
                eprintln!("ignoring log filter directive {raw:?}: {e}");
                filter
            }
        })
}

fn output_layer<S>(config: &LogConfig, writer: BoxMakeWriter) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_writer(writer);
    match config.format {
        LogFormat::Json => layer.json().with_current_span(true).with_span_list(true).boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
    }
}

/// Install the global subscriber.
///
/// With `non_blocking` the returned guard flushes pending events when dropped, so
/// keep it alive for the life of the process.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let (writer, guard) = if config.non_blocking {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        (BoxMakeWriter::new(writer), Some(guard))
    } else {
        (BoxMakeWriter::new(std::io::stdout), None)
    };

    tracing_subscriber::registry()
        .with(build_filter(config))
        .with(SamplingLayer::new(config.sampling))
        .with(output_layer(config, writer))
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(guard)
}
