use crate::common::mapping::StreamMapping;
use crate::errors::{ConfigError, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Dispatch Configuration
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum number of landing calls executing against the lift API at once
    pub max_concurrency: usize,
    /// Buffered requests waiting for a free slot before producers are back-pressured
    pub queue_capacity: usize,
    /// Abandon a call if no position update arrives within this window (ms)
    pub soft_window_ms: u64,
    /// Absolute upper bound for waiting on a single call (ms)
    pub hard_deadline_ms: u64,
    /// Suppress repeated rider/destination calls within this window (ms)
    pub dedup_window_ms: u64,
    /// Maximum number of live dedup reservations
    pub dedup_max_entries: usize,
    /// Interval of the background purge of expired reservations (ms), 0 disables it
    pub dedup_sweep_interval_ms: u64,
    /// Time in-flight calls are given to finish on shutdown before they are cancelled (ms)
    pub shutdown_grace_ms: u64,
    /// Skip events for an area while a landing call to that area is still executing
    pub coalesce_area_calls: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            queue_capacity: 1024,
            soft_window_ms: 3_000,
            hard_deadline_ms: 15_000,
            dedup_window_ms: 8_000,
            dedup_max_entries: 100_000,
            dedup_sweep_interval_ms: 30_000,
            shutdown_grace_ms: 15_000,
            coalesce_area_calls: false,
        }
    }
}

impl DispatchConfig {
    pub fn soft_window(&self) -> Duration {
        Duration::from_millis(self.soft_window_ms)
    }

    pub fn hard_deadline(&self) -> Duration {
        Duration::from_millis(self.hard_deadline_ms)
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }

    pub fn dedup_sweep_interval(&self) -> Option<Duration> {
        (self.dedup_sweep_interval_ms > 0).then(|| Duration::from_millis(self.dedup_sweep_interval_ms))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::invalid_config("dispatch.max_concurrency must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(Error::invalid_config("dispatch.queue_capacity must be at least 1"));
        }
        if self.soft_window_ms == 0 {
            return Err(Error::invalid_config("dispatch.soft_window_ms must be positive"));
        }
        if self.soft_window_ms >= self.hard_deadline_ms {
            return Err(Error::invalid_config(format!(
                "dispatch.soft_window_ms ({}) must be shorter than dispatch.hard_deadline_ms ({})",
                self.soft_window_ms, self.hard_deadline_ms
            )));
        }
        if self.dedup_window_ms == 0 {
            return Err(Error::invalid_config("dispatch.dedup_window_ms must be positive"));
        }
        if self.dedup_max_entries == 0 {
            return Err(Error::invalid_config("dispatch.dedup_max_entries must be at least 1"));
        }
        Ok(())
    }
}

/// Logger Configuration
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LoggerSettings {
    /// Log level filter, e.g. `info` or `info,liftgate=debug`
    pub level: String,
    /// Write to stdout
    pub console: bool,
    /// Emit JSON lines instead of compact text
    pub json: bool,
    /// Optional daily-rolling log file
    pub file_path: Option<PathBuf>,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: true,
            json: false,
            file_path: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    /// Instance name, used for the log file prefix
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub logger: LoggerSettings,
    /// Stream to destination-area mappings
    #[serde(default)]
    pub mappings: Vec<StreamMapping>,
}

fn default_name() -> String {
    "liftgate".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_name(),
            dispatch: DispatchConfig::default(),
            logger: LoggerSettings::default(),
            mappings: Vec::new(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let config_str =
            std::fs::read_to_string(path).map_err(|e| Error::from(ConfigError::Read(Box::new(e))))?;
        Self::from_toml_str(&config_str)
    }

    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str)?;
        config.dispatch.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            name = "lobby-east"

            [dispatch]
            max_concurrency = 4
            soft_window_ms = 5000
            hard_deadline_ms = 15000
            dedup_window_ms = 8000
            coalesce_area_calls = true

            [logger]
            level = "debug"
            json = true

            [[mappings]]
            stream_id = "0b6f7b4e-52c5-4a0c-9f55-4a3b8c0e6d11"
            destination_area = 3000
            direction_up = true
            watchlist_external_ids = ["staff"]
        "#;

        let config = Config::from_toml_str(toml_str).unwrap();
        assert_eq!(config.name, "lobby-east");
        assert_eq!(config.dispatch.max_concurrency, 4);
        assert_eq!(config.dispatch.soft_window(), Duration::from_secs(5));
        assert_eq!(config.dispatch.queue_capacity, 1024);
        assert!(config.dispatch.coalesce_area_calls);
        assert_eq!(config.logger.level, "debug");
        assert!(config.logger.console);
        assert_eq!(config.mappings.len(), 1);
        assert_eq!(config.mappings[0].destination_area.0, 3000);
    }

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.name, "liftgate");
        assert_eq!(config.dispatch, DispatchConfig::default());
        assert_eq!(config.dispatch.hard_deadline(), Duration::from_secs(15));
        assert_eq!(config.dispatch.dedup_window(), Duration::from_secs(8));
        assert_eq!(config.dispatch.dedup_sweep_interval(), Some(Duration::from_secs(30)));
        assert!(config.mappings.is_empty());
    }

    #[test]
    fn test_rejects_soft_window_not_shorter_than_deadline() {
        let err = Config::from_toml_str(
            r#"
            [dispatch]
            soft_window_ms = 15000
            hard_deadline_ms = 15000
            "#,
        )
        .unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("soft_window_ms"));
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let config = DispatchConfig {
            max_concurrency: 0,
            ..DispatchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[dispatch]\nmax_concurrency = 2\ndedup_sweep_interval_ms = 0").unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.dispatch.max_concurrency, 2);
        assert_eq!(config.dispatch.dedup_sweep_interval(), None);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/liftgate.toml").unwrap_err();
        assert!(err.is_config());
    }
}
