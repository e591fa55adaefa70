//! Data models for the environmental monitor.
//!
//! A [`Reading`] is always a triple of sub-readings (earthquake, irrigation,
//! flood). Field names on the wire follow the dashboard's JSON contract, so
//! the Rust names are mapped with `serde(rename)` where they differ.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

// ---

/// Three-tier severity classification, ordered `Safe < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Safe,
    Warning,
    Critical,
}

/// Seismic sub-reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarthquakeReading {
    // ---
    #[serde(serialize_with = "round_2dp")]
    pub magnitude: f64,
    #[serde(rename = "vibrationValue")]
    pub vibration_raw: u16,
    pub is_vibrating: bool,
    pub status: Status,
    #[serde(rename = "timestamp")]
    pub observed_at: DateTime<Utc>,
}

/// Soil irrigation sub-reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrrigationReading {
    // ---
    #[serde(rename = "soilMoisture", serialize_with = "round_1dp")]
    pub soil_moisture_pct: f64,
    pub soil_moisture_raw: u16,
    #[serde(rename = "temperature", serialize_with = "round_1dp")]
    pub temperature_c: f64,
    #[serde(rename = "pumpStatus")]
    pub pump_on: bool,
    pub status: Status,
    #[serde(rename = "timestamp")]
    pub observed_at: DateTime<Utc>,
}

/// Flood sub-reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloodReading {
    // ---
    #[serde(rename = "waterLevel", serialize_with = "round_1dp")]
    pub water_level_pct: f64,
    #[serde(rename = "distance", serialize_with = "round_1dp")]
    pub distance_cm: f64,
    pub status: Status,
    #[serde(rename = "timestamp")]
    pub observed_at: DateTime<Utc>,
}

/// Normalized, classified sensor triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    // ---
    pub earthquake: EarthquakeReading,
    pub irrigation: IrrigationReading,
    pub flood: FloodReading,
}

impl Reading {
    // ---
    /// Most severe status across the three sub-readings.
    pub fn overall_status(&self) -> Status {
        // ---
        self.earthquake
            .status
            .max(self.irrigation.status)
            .max(self.flood.status)
    }

    /// Time the triple was observed. All three sub-readings share it.
    pub fn observed_at(&self) -> DateTime<Utc> {
        self.earthquake.observed_at
    }
}

/// Where a served reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Telemetry submitted by the field hardware within the staleness window.
    #[serde(rename = "arduino")]
    Live,
    Simulated,
    Error,
}

// Derived values keep full precision for classification; the dashboard
// only sees them rounded.
fn round_1dp<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_to(*value, 1))
}

fn round_2dp<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_to(*value, 2))
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
