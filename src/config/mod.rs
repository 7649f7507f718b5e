//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

use std::time::Duration;

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "chord.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "CHORD_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "CHORD";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "CHORD_LOG";

/// Default delay between unlock attempts.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
/// Default ceiling on fetching values from a ready group.
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 3000;
/// Default capacity of in-process transport channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
/// Default age after which stored results expire (one day).
pub const DEFAULT_RESULT_EXPIRES_SECS: u64 = 86_400;

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chord unlock defaults.
    pub chord: ChordConfig,
    /// In-process worker configuration.
    pub worker: WorkerConfig,
}

/// Process-wide chord defaults.
///
/// Read when a chord is applied; unlock attempts carry the resolved values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChordConfig {
    /// Whether a failed member fails the callback (true) or is passed to it
    /// in the result list (false).
    pub propagate: bool,
    /// Delay between unlock attempts, in milliseconds.
    pub poll_interval_ms: u64,
    /// Ceiling on fetching values from an already-ready group, in milliseconds.
    pub join_timeout_ms: u64,
    /// Retry budget. None = retry until the group is ready.
    pub max_retries: Option<u32>,
}

impl Default for ChordConfig {
    fn default() -> Self {
        Self {
            propagate: true,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
            max_retries: None,
        }
    }
}

impl ChordConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// In-process worker configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Capacity of the unlock and task channels.
    pub channel_capacity: usize,
    /// Age after which `backend_cleanup` removes stored results.
    pub result_expires_secs: u64,
}

impl WorkerConfig {
    pub fn result_expires(&self) -> Duration {
        Duration::from_secs(self.result_expires_secs)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            result_expires_secs: DEFAULT_RESULT_EXPIRES_SECS,
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `chord.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        // Add config file from path argument if provided
        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        // Add config file from CONFIG_ENV_VAR env var if set
        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            // Environment variables with CONFIG_ENV_PREFIX prefix
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        Ok(config)
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self {
            chord: ChordConfig {
                poll_interval_ms: 10,
                ..ChordConfig::default()
            },
            ..Self::default()
        }
    }
}
