use crate::common::model::LoggerSettings;
use crate::errors::{Error, ErrorKind, Result};
use once_cell::sync::OnceCell;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::Rotation;
use tracing_log::LogTracer;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::Registry;
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

// Keeps the non-blocking file writer's background thread alive.
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

const DEFAULT_APP_LOG_LEVEL: &str = "info,liftgate=debug";

/// Logger configuration structure
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use liftgate::utils::logger::LoggerConfig;
///
/// let config = LoggerConfig::new()
///     .with_level("debug")
///     .with_file_path(PathBuf::from("./logs/liftgate.log"))
///     .with_console(true);
/// assert_eq!(config.level, "debug");
/// ```
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Log level filter (trace, debug, info, warn, error) or an `EnvFilter` directive
    pub level: String,
    /// Optional file path for daily-rolling log output
    pub file_path: Option<PathBuf>,
    /// Whether to enable console output
    pub enable_console: bool,
    /// Whether to use JSON format for logs
    pub json_format: bool,
}

impl LoggerConfig {
    pub async fn init(self) -> Result<()> {
        init_logger(self).await
    }

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: impl AsRef<str>) -> Self {
        self.level = level.as_ref().into();
        self
    }

    pub fn with_file_path(mut self, path: PathBuf) -> Self {
        self.file_path = Some(path);
        self
    }

    pub fn with_console(mut self, enable: bool) -> Self {
        self.enable_console = enable;
        self
    }

    pub fn with_json(mut self, enable: bool) -> Self {
        self.json_format = enable;
        self
    }

    /// Console logging at the app default level plus `logs/liftgate.<namespace>`.
    pub fn for_app(namespace: &str) -> Self {
        Self {
            level: DEFAULT_APP_LOG_LEVEL.to_string(),
            file_path: Some(PathBuf::from("logs").join(format!("liftgate.{namespace}"))),
            enable_console: true,
            json_format: false,
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
            enable_console: true,
            json_format: false,
        }
    }
}

impl From<&LoggerSettings> for LoggerConfig {
    fn from(settings: &LoggerSettings) -> Self {
        Self {
            level: settings.level.clone(),
            file_path: settings.file_path.clone(),
            enable_console: settings.console,
            json_format: settings.json,
        }
    }
}

pub fn is_logging_disabled() -> bool {
    let value = env::var("DISABLE_LOGS")
        .or_else(|_| env::var("LIFTGATE_DISABLE_LOGS"))
        .unwrap_or_default();
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

/// Initialize logger with app defaults. Returns Ok(false) if disabled by env.
pub async fn init_app_logger(namespace: &str) -> Result<bool> {
    if is_logging_disabled() {
        return Ok(false);
    }

    init_logger(LoggerConfig::for_app(namespace)).await?;
    Ok(true)
}

/// Initialize and configure the tracing subscriber. Safe to call more than once.
pub async fn init_logger(config: LoggerConfig) -> Result<()> {
    if is_logging_disabled() {
        let _ = LOGGER_INITIALIZED.swap(true, Ordering::SeqCst);
        return Ok(());
    }
    if LOGGER_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::warn!("Logger already initialized, skipping re-initialization");
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let local_offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let timer = OffsetTime::new(local_offset, Rfc3339);

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.enable_console {
        if config.json_format {
            layers.push(fmt::layer().json().with_timer(timer.clone()).boxed());
        } else {
            layers.push(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_thread_ids(true)
                    .with_timer(timer.clone())
                    .boxed(),
            );
        }
    }

    if let Some(file_path) = config.file_path {
        match file_layer(&file_path, config.json_format, timer) {
            Ok(layer) => layers.push(layer),
            Err(e) => {
                LOGGER_INITIALIZED.store(false, Ordering::SeqCst);
                return Err(e);
            }
        }
    }

    // bridge log crate
    let _ = LogTracer::builder()
        .with_max_level(log::LevelFilter::Trace)
        .init();

    let _ = tracing_subscriber::registry().with(layers).with(filter).try_init();
    Ok(())
}

/// Daily-rolling writer under `file_path`'s directory, named after its file name.
fn file_layer(
    file_path: &Path,
    json_format: bool,
    timer: OffsetTime<Rfc3339>,
) -> Result<Box<dyn Layer<Registry> + Send + Sync>> {
    let dir = file_path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| {
        Error::with_message(
            ErrorKind::Logger,
            format!("cannot create log directory {}", dir.display()),
            Some(e),
        )
    })?;
    let file_path_prefix = file_path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "liftgate".to_string());
    let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix(file_path_prefix)
        .filename_suffix("log")
        .build(dir)
        .map_err(|e| Error::with_message(ErrorKind::Logger, "cannot open log file", Some(e)))?;

    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let _ = FILE_GUARD.set(guard);

    let layer = if json_format {
        fmt::layer()
            .json()
            .with_writer(file_writer)
            .with_timer(timer)
            .boxed()
    } else {
        fmt::layer()
            .with_ansi(false)
            .with_writer(file_writer)
            .with_timer(timer)
            .boxed()
    };
    Ok(layer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, error, info, warn};

    #[test]
    fn test_logger_config_builder() {
        let config = LoggerConfig::new()
            .with_level("debug")
            .with_file_path(PathBuf::from("./test.log"))
            .with_console(false)
            .with_json(true);

        assert_eq!(config.level, "debug");
        assert_eq!(config.file_path, Some(PathBuf::from("./test.log")));
        assert!(!config.enable_console);
        assert!(config.json_format);
    }

    #[test]
    fn test_config_from_settings() {
        let settings = LoggerSettings {
            level: "warn".to_string(),
            console: false,
            json: true,
            file_path: Some(PathBuf::from("logs/lobby")),
        };
        let config = LoggerConfig::from(&settings);
        assert_eq!(config.level, "warn");
        assert!(!config.enable_console);
        assert!(config.json_format);
        assert_eq!(config.file_path, Some(PathBuf::from("logs/lobby")));
    }

    #[test]
    fn test_app_config_uses_namespace() {
        let config = LoggerConfig::for_app("lobby");
        assert_eq!(config.file_path, Some(PathBuf::from("logs").join("liftgate.lobby")));
        assert!(config.level.contains("liftgate=debug"));
    }

    #[test]
    fn test_unwritable_log_directory_is_logger_error() {
        let blocker = tempfile::NamedTempFile::new().unwrap();
        // a regular file cannot serve as a directory
        let path = blocker.path().join("liftgate.lobby");
        let err = file_layer(&path, false, OffsetTime::new(UtcOffset::UTC, Rfc3339))
            .err()
            .expect("log directory under a file");
        assert!(err.is_logger());
        assert!(err.to_string().starts_with("logger error: cannot create log directory"));
    }

    #[tokio::test]
    async fn test_log_levels_after_init() {
        let config = LoggerConfig::new().with_level("debug");
        // second call in the same process is a no-op
        let _ = init_logger(config.clone()).await;
        let _ = init_logger(config).await;

        debug!("Debug message");
        info!(call_id = "c-1", "Info message");
        warn!("Warning message");
        error!("Error message");
    }
}
