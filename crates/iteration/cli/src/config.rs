//! Configuration for the iterate CLI

use serde::{Deserialize, Serialize};

/// Main CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IterateConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level, used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Parameters for `iterate simulate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of concurrent workflow runs
    #[serde(default = "default_runs")]
    pub runs: usize,

    /// Elements per collection level on every port
    #[serde(default = "default_width")]
    pub width: usize,

    /// Worker threads delivering events
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Seed for arrival-order shuffling
    #[serde(default)]
    pub seed: u64,

    /// Levels supplied beyond each port's declared depth
    #[serde(default = "default_extra_depth")]
    pub extra_depth: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            runs: default_runs(),
            width: default_width(),
            threads: default_threads(),
            seed: 0,
            extra_depth: default_extra_depth(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_runs() -> usize {
    16
}

fn default_width() -> usize {
    3
}

fn default_threads() -> usize {
    4
}

fn default_extra_depth() -> usize {
    1
}

impl IterateConfig {
    /// Load configuration: defaults, then an optional file, then
    /// `ITERATE_`-prefixed environment variables
    /// (e.g. `ITERATE_SIMULATION__RUNS=64`)
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&IterateConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("ITERATE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
