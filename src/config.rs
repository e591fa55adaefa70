//! Configuration loader for the `envmon-sensors` backend service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Nothing is required; every value has a default
//! suitable for a single dashboard instance.
//!
use std::{env, net::SocketAddr};

use anyhow::{anyhow, Result};
use chrono::Duration;

use crate::formulas::{Calibration, EarthquakeScale, DEFAULT_MAX_DEPTH_CM};
use crate::store::DEFAULT_STALE_AFTER_MS;

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse an optional environment variable through `FromStr` with a default value.
macro_rules! parse_env_or {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,

    /// Age after which submitted telemetry is considered stale (ms).
    pub stale_after_ms: u32,

    /// Depth of the flood well used for the water level percentage (cm).
    pub max_depth_cm: u32,

    /// Magnitude formula and thresholds for the earthquake sensor.
    pub earthquake_scale: EarthquakeScale,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            stale_after_ms: DEFAULT_STALE_AFTER_MS as u32,
            max_depth_cm: DEFAULT_MAX_DEPTH_CM as u32,
            earthquake_scale: EarthquakeScale::default(),
        }
    }
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `BIND_ADDR` – listen address (default: `0.0.0.0:8080`)
/// - `STALE_AFTER_MS` – staleness window in milliseconds (default: 10000)
/// - `MAX_DEPTH_CM` – flood well depth in centimetres (default: 50)
/// - `EARTHQUAKE_SCALE` – `logarithmic` or `linear` (default: `logarithmic`)
///
/// Returns an error if any variable is set but invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let defaults = Config::default();

    let bind_addr = parse_env_or!("BIND_ADDR", SocketAddr, defaults.bind_addr);
    let stale_after_ms = parse_env_u32!("STALE_AFTER_MS", defaults.stale_after_ms);
    let max_depth_cm = parse_env_u32!("MAX_DEPTH_CM", defaults.max_depth_cm);
    let earthquake_scale =
        parse_env_or!("EARTHQUAKE_SCALE", EarthquakeScale, defaults.earthquake_scale);

    if max_depth_cm == 0 {
        return Err(anyhow!("Invalid MAX_DEPTH_CM: must be greater than zero"));
    }

    Ok(Config {
        bind_addr,
        stale_after_ms,
        max_depth_cm,
        earthquake_scale,
    })
}

impl Config {
    // ---
    /// Formula tunables derived from this configuration.
    pub fn calibration(&self) -> Calibration {
        Calibration {
            scale: self.earthquake_scale,
            max_depth_cm: f64::from(self.max_depth_cm),
        }
    }

    /// Staleness window as a duration.
    pub fn stale_after(&self) -> Duration {
        Duration::milliseconds(i64::from(self.stale_after_ms))
    }

    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  BIND_ADDR        : {}", self.bind_addr);
        tracing::info!("  STALE_AFTER_MS   : {}", self.stale_after_ms);
        tracing::info!("  MAX_DEPTH_CM     : {}", self.max_depth_cm);
        tracing::info!("  EARTHQUAKE_SCALE : {}", self.earthquake_scale);
    }
}
