//! Configuration loading
//!
//! Layering, lowest to highest priority:
//! 1. Built-in defaults
//! 2. Config file (`stagehand.toml` in the working directory, or an explicit path)
//! 3. Environment variables (`STAGEHAND_SCHEDULER__FRAMERATE=60`), after `.env` is loaded
//! 4. Builder overrides (CLI flags)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::ConfigError;

const ENV_PREFIX: &str = "STAGEHAND";
const CONFIG_PATH_VAR: &str = "STAGEHAND_CONFIG_PATH";
const DEFAULT_CONFIG_FILE: &str = "stagehand";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scheduler timing and limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Ticks per second when running in real time
    #[serde(default = "default_framerate")]
    pub framerate: u32,

    /// How long a warp-mode thread may run before it is forced to yield
    #[serde(default = "default_warp_time_ms")]
    pub warp_time_ms: u64,

    /// Maximum number of live clones across all sprites
    #[serde(default = "default_max_clones")]
    pub max_clones: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            framerate: default_framerate(),
            warp_time_ms: default_warp_time_ms(),
            max_clones: default_max_clones(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber` env-filter directive
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_framerate() -> u32 {
    30
}

fn default_warp_time_ms() -> u64 {
    500
}

fn default_max_clones() -> usize {
    300
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load configuration with no overrides
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.framerate == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.framerate must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`Config`] with explicit overrides
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    framerate: Option<u32>,
    warp_time_ms: Option<u64>,
    max_clones: Option<usize>,
    log_filter: Option<String>,
    skip_env: bool,
}

impl ConfigBuilder {
    /// Use this config file instead of searching for `stagehand.toml`
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn framerate(mut self, framerate: Option<u32>) -> Self {
        self.framerate = framerate;
        self
    }

    pub fn warp_time_ms(mut self, ms: Option<u64>) -> Self {
        self.warp_time_ms = ms;
        self
    }

    pub fn max_clones(mut self, max: Option<usize>) -> Self {
        self.max_clones = max;
        self
    }

    pub fn log_filter(mut self, filter: Option<String>) -> Self {
        self.log_filter = filter;
        self
    }

    /// Ignore `.env` and `STAGEHAND_*` variables (used by tests)
    pub fn skip_env(mut self, skip: bool) -> Self {
        self.skip_env = skip;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        if !self.skip_env {
            dotenvy::dotenv().ok();
        }

        let mut builder =
            ::config::Config::builder().add_source(::config::Config::try_from(&Config::default())?);

        let path = self.config_path.clone().or_else(|| {
            if self.skip_env {
                None
            } else {
                std::env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from)
            }
        });

        builder = match path {
            Some(path) => builder.add_source(::config::File::from(path).required(true)),
            None if self.skip_env => builder,
            None => builder.add_source(::config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        if !self.skip_env {
            builder = builder.add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );
        }

        if let Some(framerate) = self.framerate {
            builder = builder.set_override("scheduler.framerate", framerate as i64)?;
        }
        if let Some(ms) = self.warp_time_ms {
            builder = builder.set_override("scheduler.warp_time_ms", ms as i64)?;
        }
        if let Some(max) = self.max_clones {
            builder = builder.set_override("scheduler.max_clones", max as i64)?;
        }
        if let Some(filter) = self.log_filter {
            builder = builder.set_override("logging.filter", filter)?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::builder().skip_env(true).build().unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.scheduler.framerate, 30);
        assert_eq!(config.scheduler.warp_time_ms, 500);
        assert_eq!(config.scheduler.max_clones, 300);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_builder_overrides() {
        let config = Config::builder()
            .skip_env(true)
            .framerate(Some(60))
            .max_clones(Some(5))
            .log_filter(Some("debug".to_string()))
            .build()
            .unwrap();
        assert_eq!(config.scheduler.framerate, 60);
        assert_eq!(config.scheduler.max_clones, 5);
        assert_eq!(config.scheduler.warp_time_ms, 500);
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn test_zero_framerate_rejected() {
        let err = Config::builder()
            .skip_env(true)
            .framerate(Some(0))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_config_file() {
        let path = std::env::temp_dir().join(format!("stagehand-{}.toml", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[scheduler]\nframerate = 12\n\n[logging]\nfilter = \"trace\"").unwrap();

        let config = Config::builder()
            .skip_env(true)
            .config_path(Some(path.clone()))
            .build()
            .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.scheduler.framerate, 12);
        assert_eq!(config.scheduler.max_clones, 300);
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = Config::builder()
            .skip_env(true)
            .config_path(Some(PathBuf::from("/nonexistent/stagehand.toml")))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_to_toml() {
        let rendered = Config::default().to_toml().unwrap();
        assert!(rendered.contains("[scheduler]"));
        assert!(rendered.contains("framerate = 30"));
    }
}
