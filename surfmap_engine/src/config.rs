//! Effective run settings: config file values with CLI overrides applied.

use std::path::PathBuf;
use std::time::Duration;
use surfmap_common::config::{ConfigError, EngineConfig};
use surfmap_common::method::InterpolationMethod;
use tracing::warn;

/// Everything the binary needs to start the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub map_path: PathBuf,
    /// Startup value of the `method` pin.
    pub method: InterpolationMethod,
    /// Startup value of the `resolution` pin.
    pub resolution: f64,
    pub period: Duration,
    pub segment: String,
    pub max_map_bytes: u64,
}

impl RunSettings {
    /// Merge the loaded config with command-line overrides.
    pub fn resolve(
        config: &EngineConfig,
        map_path: PathBuf,
        method_arg: Option<&str>,
        segment: Option<String>,
        period_ms: Option<u64>,
    ) -> Result<Self, ConfigError> {
        let period_ms = period_ms.unwrap_or(config.engine.tick_period_ms);
        if period_ms == 0 {
            return Err(ConfigError::ValidationError(
                "tick period must be > 0".to_string(),
            ));
        }
        let segment = segment.unwrap_or_else(|| config.bus.segment.clone());
        if segment.is_empty() || segment.contains('/') {
            return Err(ConfigError::ValidationError(format!(
                "'{segment}' is not a valid segment name"
            )));
        }

        Ok(Self {
            map_path,
            method: resolve_method(method_arg),
            resolution: config.engine.default_resolution,
            period: Duration::from_millis(period_ms),
            segment,
            max_map_bytes: config.engine.max_map_bytes,
        })
    }
}

/// Default method from the optional CLI argument. Unknown names fall back
/// to cubic with a warning.
pub fn resolve_method(arg: Option<&str>) -> InterpolationMethod {
    match arg {
        None => InterpolationMethod::default(),
        Some(name) => InterpolationMethod::from_name(name).unwrap_or_else(|| {
            warn!("Unknown interpolation method '{name}', using cubic");
            InterpolationMethod::Cubic
        }),
    }
}
