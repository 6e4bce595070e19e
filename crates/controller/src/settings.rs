//! Runtime Configuration

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use trigger_scheduler::SchedulerConfig;

/// Environment variable prefix, e.g. `GARAGE_LOG_CAPACITY=200`
const ENV_PREFIX: &str = "GARAGE";

/// Host-side runtime configuration.
///
/// Sources, later ones winning: built-in defaults, the optional config
/// file, `GARAGE_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Directory standing in for the flash file system
    pub data_dir: PathBuf,
    /// Option file name inside `data_dir`
    pub config_file: String,
    /// Event log file name inside `data_dir`
    pub log_file: String,
    /// Event log slots
    pub log_capacity: u32,
    /// Trigger period in milliseconds
    pub trigger_period_ms: u64,
    /// Tracing level name
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            config_file: "config.dat".to_string(),
            log_file: "log2.dat".to_string(),
            log_capacity: event_log::DEFAULT_CAPACITY,
            trigger_period_ms: 250,
            log_level: "info".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Load from defaults, an optional file and the environment
    pub fn load(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("data_dir", defaults.data_dir.to_string_lossy().into_owned())?
            .set_default("config_file", defaults.config_file)?
            .set_default("log_file", defaults.log_file)?
            .set_default("log_capacity", i64::from(defaults.log_capacity))?
            .set_default("trigger_period_ms", defaults.trigger_period_ms as i64)?
            .set_default("log_level", defaults.log_level)?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }

        builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Full path of the option file
    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(&self.config_file)
    }

    /// Full path of the event log
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(&self.log_file)
    }

    /// Trigger scheduler settings with the configured period
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            period_ms: self.trigger_period_ms,
            ..Default::default()
        }
    }
}
