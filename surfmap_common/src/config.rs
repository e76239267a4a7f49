//! Configuration loading traits and types.
//!
//! Every section of the engine config has defaults, so an absent file or an
//! empty one yields a runnable configuration. Command-line flags override
//! individual fields after loading.
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! log_level = "debug"
//! service_name = "surfmap-mill-01"
//!
//! [engine]
//! tick_period_ms = 50
//! default_resolution = 1.0
//! max_map_bytes = 8388608
//!
//! [bus]
//! segment = "surfmap"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::consts::{
    DEFAULT_MAX_MAP_BYTES, DEFAULT_RESOLUTION, DEFAULT_SEGMENT, DEFAULT_TICK_PERIOD_MS,
    SERVICE_NAME,
};

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Common configuration fields shared across surfmap processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_service_name() -> String {
    SERVICE_NAME.to_string()
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: default_service_name(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Tick loop and map loading parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    /// Fixed tick period [ms].
    pub tick_period_ms: u64,
    /// Value preset on the `resolution` pin at startup.
    pub default_resolution: f64,
    /// Largest probe-sample file accepted by the loader [bytes].
    pub max_map_bytes: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            tick_period_ms: DEFAULT_TICK_PERIOD_MS,
            default_resolution: DEFAULT_RESOLUTION,
            max_map_bytes: DEFAULT_MAX_MAP_BYTES,
        }
    }
}

impl EngineSection {
    /// Tick period as a `Duration`.
    #[inline]
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }
}

/// Signal bus connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BusSection {
    /// Shared-memory segment name (without the `surfmap_` prefix).
    pub segment: String,
}

impl Default for BusSection {
    fn default() -> Self {
        Self {
            segment: DEFAULT_SEGMENT.to_string(),
        }
    }
}

/// Complete engine configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub shared: SharedConfig,
    pub engine: EngineSection,
    pub bus: BusSection,
}

impl EngineConfig {
    /// Parse from a TOML string and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all sections.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `service_name` is empty
    /// - `tick_period_ms` is zero
    /// - `default_resolution` is not a finite positive number
    /// - `max_map_bytes` is zero
    /// - `segment` is empty or contains a `/`
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.engine.tick_period_ms == 0 {
            return Err(ConfigError::ValidationError(
                "engine.tick_period_ms must be > 0".to_string(),
            ));
        }
        let res = self.engine.default_resolution;
        if !res.is_finite() || res <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "engine.default_resolution must be > 0, got {res}"
            )));
        }
        if self.engine.max_map_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "engine.max_map_bytes must be > 0".to_string(),
            ));
        }
        if self.bus.segment.is_empty() || self.bus.segment.contains('/') {
            return Err(ConfigError::ValidationError(format!(
                "bus.segment '{}' is not a valid segment name",
                self.bus.segment
            )));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

/// Load and validate the engine configuration, or return defaults when no
/// path is given.
pub fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let config = EngineConfig::load(path)?;
    config.validate()?;
    tracing::debug!("Loaded engine config from {}", path.display());
    Ok(config)
}
