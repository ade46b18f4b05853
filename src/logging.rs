//! Logging setup for linecoder.
//!
//! Diagnostics always go to stderr (and optionally a log file) so that stdout
//! carries only the coded lines and supervisor messages.
//!
//! # Environment Variables
//!
//! - `LINECODER_LOG` - Log filter (overrides RUST_LOG)
//! - `LINECODER_LOG_LEVEL` - Log level: error, warn, info, debug, trace
//! - `LINECODER_LOG_FORMAT` - Output format: pretty, compact, json (read by clap)
//! - `LINECODER_LOG_FILE` - Path to log file (in addition to stderr)
//! - `LINECODER_LOG_ROTATION` - Log file rotation: hourly, daily, never
//! - `LINECODER_LOG_SPANS` - Log span timings when set to 1/true
//! - `RUST_LOG` - Standard Rust log filter (fallback)

use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::ValueEnum;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, MakeWriter, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable multi-field format
    Pretty,
    /// Compact single-line format (default)
    #[default]
    Compact,
    /// JSON format for log aggregation systems
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "full" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "Unknown log format: '{}'. Valid options: pretty, compact, json",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Compact => write!(f, "compact"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Log rotation configuration for file output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    Daily,
    /// Never rotate (single file, default)
    #[default]
    Never,
}

impl FromStr for LogRotation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "never" => Ok(Self::Never),
            _ => Err(format!(
                "Unknown log rotation: '{}'. Valid options: hourly, daily, never",
                s
            )),
        }
    }
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

/// Logging configuration.
///
/// Use the builder methods to customize, then pass to [`init`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level (default: WARN)
    pub level: Level,
    /// Log format (default: Compact)
    pub format: LogFormat,
    /// Path to log file (None = stderr only)
    pub file_path: Option<PathBuf>,
    /// Log rotation for file output (default: Never)
    pub rotation: LogRotation,
    /// Log span timing on close (default: false)
    pub span_events: bool,
    /// Custom filter string (overrides level if set)
    pub filter: Option<String>,
    /// Show target module in logs (default: true)
    pub show_target: bool,
    /// ANSI colors on stderr (default: true)
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            format: LogFormat::Compact,
            file_path: None,
            rotation: LogRotation::Never,
            span_events: false,
            filter: None,
            show_target: true,
            ansi: true,
        }
    }
}

impl LogConfig {
    /// Map `-v`/`-q` counts to a level: quiet → ERROR, 0 → WARN, 1 → INFO,
    /// 2 → DEBUG, 3+ → TRACE.
    pub fn from_verbosity(verbose: u8, quiet: bool) -> Self {
        let level = if quiet {
            Level::ERROR
        } else {
            match verbose {
                0 => Level::WARN,
                1 => Level::INFO,
                2 => Level::DEBUG,
                _ => Level::TRACE,
            }
        };
        Self::default().with_level(level)
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_file(mut self, path: PathBuf) -> Self {
        self.file_path = Some(path);
        self
    }

    pub fn with_rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_filter(mut self, filter: String) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    /// Apply environment variable overrides.
    ///
    /// A filter is taken from `LINECODER_LOG`, then `RUST_LOG`, and the level
    /// from `LINECODER_LOG_LEVEL`, only when no explicit filter is set. A
    /// verbosity of zero does not count as explicit, so env vars win over the
    /// default level but `-v` still beats `LINECODER_LOG_LEVEL`. The format is
    /// bound to `--log-format` by clap and is not read here.
    pub fn with_env_overrides(self) -> Self {
        self.apply_env(|key| std::env::var(key).ok())
    }

    fn apply_env(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if self.filter.is_none()
            && let Some(filter) = var("LINECODER_LOG").or_else(|| var("RUST_LOG"))
        {
            self = self.with_filter(filter);
        }

        if self.filter.is_none()
            && self.level == Level::WARN
            && let Some(level) = var("LINECODER_LOG_LEVEL").as_deref().and_then(parse_level)
        {
            self = self.with_level(level);
        }

        if let Some(path) = var("LINECODER_LOG_FILE") {
            self = self.with_file(PathBuf::from(path));
        }

        if let Some(rotation) = var("LINECODER_LOG_ROTATION") {
            match rotation.parse() {
                Ok(rotation) => self = self.with_rotation(rotation),
                Err(e) => eprintln!("Warning: {}", e),
            }
        }

        if let Some(flag) = var("LINECODER_LOG_SPANS") {
            self = self.with_span_events(matches!(
                flag.to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            ));
        }

        self
    }

    /// Build the EnvFilter for this configuration.
    fn build_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.level.as_str().to_lowercase());
        match &self.filter {
            Some(filter) => EnvFilter::try_new(filter).unwrap_or_else(|_| {
                eprintln!("Warning: Invalid log filter '{}', using default", filter);
                fallback()
            }),
            None => fallback(),
        }
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    /// One formatting layer writing to `writer`.
    fn fmt_layer<W>(&self, writer: W, ansi: bool) -> Box<dyn Layer<Registry> + Send + Sync>
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(self.show_target)
            .with_span_events(self.span_events());

        match self.format {
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
        }
    }
}

/// Parse a log level string.
fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

/// Initialize the global tracing subscriber.
///
/// Logs to stderr, plus the configured file when `config.file_path` is set.
/// Subsequent calls are silently ignored.
pub fn init(config: LogConfig) {
    let mut layers = vec![config.fmt_layer(std::io::stderr, config.ansi)];

    if let Some(path) = &config.file_path {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("linecoder.log");
        let appender = RollingFileAppender::new(config.rotation.into(), parent, file_name);
        layers.push(config.fmt_layer(appender, false));
    }

    // Already initialized is fine
    let _ = tracing_subscriber::registry()
        .with(layers)
        .with(config.build_filter())
        .try_init();
}
