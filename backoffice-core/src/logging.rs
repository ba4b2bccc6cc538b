use crate::rotation::{DayWatch, RotatingFileWriter, RotationConfig};
use crate::{BackofficeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self as tracing_fmt, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Where log records are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogChannel {
    /// Standard output only
    Stdout,
    /// Rotating file only
    File,
    /// Standard output and rotating file
    Stack,
}

impl LogChannel {
    fn writes_stdout(self) -> bool {
        matches!(self, Self::Stdout | Self::Stack)
    }

    fn writes_file(self) -> bool {
        matches!(self, Self::File | Self::Stack)
    }
}

impl fmt::Display for LogChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::File => write!(f, "file"),
            Self::Stack => write!(f, "stack"),
        }
    }
}

impl FromStr for LogChannel {
    type Err = BackofficeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "stdout" => Ok(Self::Stdout),
            "file" => Ok(Self::File),
            "stack" => Ok(Self::Stack),
            _ => Err(BackofficeError::validation(format!(
                "Invalid log channel: {}. Valid channels are: stdout, file, stack",
                s
            ))),
        }
    }
}

/// Log output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact text format
    Compact,
}

impl FromStr for LogFormat {
    type Err = BackofficeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(BackofficeError::validation(format!(
                "Invalid log format: {}. Valid formats are: text, json, compact",
                s
            ))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Output channel
    pub channel: LogChannel,
    /// Log level (trace, debug, info, warn, error, fatal)
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// Whether to include file and line numbers
    pub include_location: bool,
    /// Whether to include thread information
    pub include_thread_id: bool,
    /// Rotating file settings, used by the file and stack channels
    pub file: RotationConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            channel: LogChannel::Stdout,
            level: "debug".to_string(),
            format: LogFormat::Text,
            include_location: true,
            include_thread_id: false,
            file: RotationConfig::default(),
        }
    }
}

/// Keeps the file channel alive.
///
/// Dropping the guard stops the day-boundary watcher and drains queued
/// records into the file.
#[derive(Debug, Default)]
pub struct LogGuard {
    watcher: Option<tokio::task::JoinHandle<()>>,
    worker: Option<WorkerGuard>,
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

/// The file side of the file and stack channels
struct FileOutput {
    path: PathBuf,
    day_watch: DayWatch,
    worker: WorkerGuard,
}

/// Initialize the global subscriber with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &LogConfig) -> Result<LogGuard> {
    let level = parse_log_level(&config.level)?;
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let (layers, file) = build_layers(config)?;

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|e| BackofficeError::config(format!("Failed to initialize logging: {}", e)))?;

    // The watcher needs a runtime; without one, rollover still happens on write.
    let watcher = match (&file, tokio::runtime::Handle::try_current()) {
        (Some(file), Ok(_)) => Some(file.day_watch.spawn()),
        _ => None,
    };

    tracing::info!(
        channel = %config.channel,
        level = %config.level,
        format = ?config.format,
        file = ?file.as_ref().map(|file| &file.path),
        "Logging initialized"
    );

    Ok(LogGuard {
        watcher,
        worker: file.map(|file| file.worker),
    })
}

/// Build one fmt layer per output of the channel.
///
/// File records go through a dedicated writer thread, so rotation and
/// compression never block the logging call.
fn build_layers(config: &LogConfig) -> Result<(Vec<BoxedLayer>, Option<FileOutput>)> {
    let mut layers = Vec::new();
    let mut file_output = None;

    if config.channel.writes_stdout() {
        layers.push(fmt_layer(config, std::io::stdout, true));
    }

    if config.channel.writes_file() {
        let writer = RotatingFileWriter::open(config.file.clone()).map_err(|e| {
            BackofficeError::config(format!(
                "Failed to open log file in {}: {}",
                config.file.directory.display(),
                e
            ))
        })?;
        let path = writer.current_path().to_path_buf();
        let day_watch = writer.day_watch();
        let (non_blocking, worker) = NonBlockingBuilder::default()
            .lossy(false)
            .thread_name("backoffice-log-writer")
            .finish(writer);

        layers.push(fmt_layer(config, non_blocking, false));
        file_output = Some(FileOutput {
            path,
            day_watch,
            worker,
        });
    }

    Ok((layers, file_output))
}

fn fmt_layer<W>(config: &LogConfig, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_fmt::layer()
        .with_ansi(ansi)
        .with_target(true)
        .with_thread_ids(config.include_thread_id)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_writer(writer);

    match config.format {
        LogFormat::Text => layer.boxed(),
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

/// Parse log level string to tracing Level. `fatal` logs at error.
pub fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" | "fatal" => Ok(Level::ERROR),
        _ => Err(BackofficeError::validation(format!(
            "Invalid log level: {}. Valid levels are: trace, debug, info, warn, error, fatal",
            level
        ))),
    }
}

/// Correlation ID for request tracing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a new correlation ID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Create from existing string
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Structured logging context for a single operation
#[derive(Debug, Clone)]
pub struct LogContext {
    correlation_id: CorrelationId,
    operation: String,
    component: String,
}

impl LogContext {
    pub fn new(operation: impl Into<String>, component: impl Into<String>) -> Self {
        Self::with_correlation_id(CorrelationId::new(), operation, component)
    }

    /// Create with existing correlation ID
    pub fn with_correlation_id(
        correlation_id: CorrelationId,
        operation: impl Into<String>,
        component: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id,
            operation: operation.into(),
            component: component.into(),
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Create a tracing span for this context
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "operation",
            correlation_id = %self.correlation_id,
            operation = %self.operation,
            component = %self.component
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("DEBUG").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("fatal").unwrap(), Level::ERROR);
        assert!(parse_log_level("invalid").is_err());
    }

    #[test]
    fn test_channel_and_format_parsing() {
        assert_eq!("stack".parse::<LogChannel>().unwrap(), LogChannel::Stack);
        assert_eq!("FILE".parse::<LogChannel>().unwrap(), LogChannel::File);
        assert!("syslog".parse::<LogChannel>().is_err());

        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_correlation_id() {
        let id1 = CorrelationId::new();
        let id2 = CorrelationId::new();
        assert_ne!(id1.as_str(), id2.as_str());

        let custom_id = CorrelationId::from_string("test-123".to_string());
        assert_eq!(custom_id.as_str(), "test-123");
    }

    #[test]
    fn test_log_context() {
        let context = LogContext::new("login", "auth_service");
        assert_eq!(context.operation(), "login");
        assert_eq!(context.component(), "auth_service");
    }

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.channel, LogChannel::Stdout);
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Text);
        assert!(config.file.daily);
    }

    #[test]
    fn test_stdout_channel_has_no_file_output() {
        let (layers, file) = build_layers(&LogConfig::default()).unwrap();
        assert_eq!(layers.len(), 1);
        assert!(file.is_none());
    }

    #[test]
    fn test_file_channel_writes_records() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            channel: LogChannel::File,
            format: LogFormat::Json,
            file: RotationConfig {
                directory: dir.path().join("logs"),
                ..RotationConfig::default()
            },
            ..LogConfig::default()
        };

        let (layers, file) = build_layers(&config).unwrap();
        let file = file.unwrap();
        let path = file.path.clone();
        assert!(path.starts_with(dir.path().join("logs")));
        let subscriber = tracing_subscriber::registry().with(layers);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(user_id = "u-1", "user logged in");
        });
        // dropping the worker guard drains the queue into the file
        drop(file);

        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("user logged in"));
        assert!(content.contains("u-1"));
    }

    #[test]
    fn test_stack_channel_builds_both_layers() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            channel: LogChannel::Stack,
            file: RotationConfig {
                directory: dir.path().to_path_buf(),
                ..RotationConfig::default()
            },
            ..LogConfig::default()
        };

        let (layers, file) = build_layers(&config).unwrap();
        assert_eq!(layers.len(), 2);
        assert!(file.is_some());
    }
}
