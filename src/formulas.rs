//! Formula library: raw sensor values to physical quantities and statuses.
//!
//! Everything here is pure. Both the ingestion path and the simulation
//! generator build readings through [`Calibration::derive`], so a given set
//! of raw values classifies the same way regardless of where it came from.

use std::{fmt, str::FromStr};

use anyhow::{anyhow, Error};
use chrono::{DateTime, Utc};

use crate::{EarthquakeReading, FloodReading, IrrigationReading, Reading, Status};

// ---

/// Full-scale value of the soil moisture ADC.
pub const SOIL_RAW_MAX: u16 = 1023;

/// Full-scale value of the vibration sensor.
pub const VIBRATION_RAW_MAX: u16 = 1024;

/// Vibration counts above this value mean the ground is shaking.
pub const VIBRATING_ABOVE_RAW: u16 = 300;

/// The irrigation pump runs while soil moisture is below this percentage.
pub const PUMP_ON_BELOW_PCT: f64 = 30.0;

/// Default depth of the flood well, in centimetres.
pub const DEFAULT_MAX_DEPTH_CM: f64 = 50.0;

/// Convert a soil moisture ADC count into a moisture percentage.
///
/// `100 * (1 - raw / 1023)`, clamped to `[0, 100]`.
pub fn moisture_percent(raw: u16) -> f64 {
    // ---
    clamp_pct(100.0 * (1.0 - f64::from(raw) / f64::from(SOIL_RAW_MAX)))
}

/// Logarithmic magnitude estimate from a vibration count.
///
/// Zero below 10 counts, otherwise `2 + 3.5 * log10(9v/1023 + 1)`.
pub fn magnitude(vibration_raw: u16) -> f64 {
    // ---
    if vibration_raw < 10 {
        return 0.0;
    }
    let v = f64::from(vibration_raw);
    2.0 + 3.5 * (9.0 * v / 1023.0 + 1.0).log10()
}

/// Linear magnitude estimate: `(v / 1024) * 6` once the sensor is vibrating.
pub fn linear_magnitude(vibration_raw: u16) -> f64 {
    // ---
    if vibration_raw > VIBRATING_ABOVE_RAW {
        f64::from(vibration_raw) / f64::from(VIBRATION_RAW_MAX) * 6.0
    } else {
        0.0
    }
}

/// Water level as a percentage of the well depth, from the ultrasonic distance
/// between the sensor and the water surface.
pub fn water_level_percent(distance_cm: f64, max_depth_cm: f64) -> f64 {
    // ---
    clamp_pct((max_depth_cm - distance_cm) / max_depth_cm * 100.0)
}

/// Classify a logarithmic-scale magnitude: critical above 4, warning above 2.
pub fn classify_earthquake(magnitude: f64) -> Status {
    // ---
    classify_above(magnitude, 2.0, 4.0)
}

/// Classify a linear-scale magnitude: critical above 3, warning above 1.
pub fn classify_linear_earthquake(magnitude: f64) -> Status {
    // ---
    classify_above(magnitude, 1.0, 3.0)
}

/// Exclusive upper-tier cascade: a value equal to a threshold stays in the
/// lower tier.
fn classify_above(value: f64, warning: f64, critical: f64) -> Status {
    if value > critical {
        Status::Critical
    } else if value > warning {
        Status::Warning
    } else {
        Status::Safe
    }
}

/// Classify soil moisture: critical below 15%, warning below 30%.
pub fn classify_irrigation(moisture_pct: f64) -> Status {
    // ---
    if moisture_pct < 15.0 {
        Status::Critical
    } else if moisture_pct < 30.0 {
        Status::Warning
    } else {
        Status::Safe
    }
}

/// Classify flood risk from the sensor distance: critical below 10 cm,
/// warning below 20 cm.
pub fn classify_flood(distance_cm: f64) -> Status {
    // ---
    if distance_cm < 10.0 {
        Status::Critical
    } else if distance_cm < 20.0 {
        Status::Warning
    } else {
        Status::Safe
    }
}

/// Clamp a percentage into `[0, 100]`. NaN maps to 0.
pub fn clamp_pct(pct: f64) -> f64 {
    // ---
    if pct.is_nan() {
        return 0.0;
    }
    pct.clamp(0.0, 100.0)
}

/// Truncate a numeric raw count toward zero and clamp it into `[0, max]`.
pub fn clamp_raw(value: f64, max: u16) -> u16 {
    // ---
    if value.is_nan() {
        return 0;
    }
    value.trunc().clamp(0.0, f64::from(max)) as u16
}

// ---

/// Magnitude formula and earthquake thresholds in effect.
///
/// The two schemes are never mixed: each pairs its own formula with its own
/// thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EarthquakeScale {
    /// `2 + 3.5 * log10(...)`, warning above 2, critical above 4.
    #[default]
    Logarithmic,
    /// `(v / 1024) * 6`, warning above 1, critical above 3.
    Linear,
}

impl EarthquakeScale {
    // ---
    pub fn magnitude(self, vibration_raw: u16) -> f64 {
        // ---
        match self {
            Self::Logarithmic => magnitude(vibration_raw),
            Self::Linear => linear_magnitude(vibration_raw),
        }
    }

    pub fn classify(self, magnitude: f64) -> Status {
        // ---
        match self {
            Self::Logarithmic => classify_earthquake(magnitude),
            Self::Linear => classify_linear_earthquake(magnitude),
        }
    }
}

impl FromStr for EarthquakeScale {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s.trim().to_ascii_lowercase().as_str() {
            "logarithmic" | "log" => Ok(Self::Logarithmic),
            "linear" => Ok(Self::Linear),
            other => Err(anyhow!(
                "unknown earthquake scale '{}', expected 'logarithmic' or 'linear'",
                other
            )),
        }
    }
}

impl fmt::Display for EarthquakeScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Logarithmic => write!(f, "logarithmic"),
            Self::Linear => write!(f, "linear"),
        }
    }
}

// ---

/// Raw, already range-checked inputs for one reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawInputs {
    // ---
    pub vibration_raw: u16,
    pub soil_moisture_raw: u16,
    /// Moisture percentage reported by the device, used in place of the
    /// raw-count formula when present.
    pub moisture_pct_override: Option<f64>,
    /// Pump state reported by the device; derived from moisture otherwise.
    pub pump_override: Option<bool>,
    pub distance_cm: f64,
    pub temperature_c: f64,
}

/// Tunables applied when deriving readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    // ---
    pub scale: EarthquakeScale,
    pub max_depth_cm: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            scale: EarthquakeScale::default(),
            max_depth_cm: DEFAULT_MAX_DEPTH_CM,
        }
    }
}

impl Calibration {
    // ---
    /// Build a fully classified reading triple from raw inputs.
    pub fn derive(&self, inputs: RawInputs, observed_at: DateTime<Utc>) -> Reading {
        // ---
        let vibration_raw = inputs.vibration_raw.min(VIBRATION_RAW_MAX);
        let soil_moisture_raw = inputs.soil_moisture_raw.min(SOIL_RAW_MAX);
        let distance_cm = if inputs.distance_cm.is_nan() {
            0.0
        } else {
            inputs.distance_cm.max(0.0)
        };

        let magnitude = self.scale.magnitude(vibration_raw);
        let soil_moisture_pct = match inputs.moisture_pct_override {
            Some(pct) => clamp_pct(pct),
            None => moisture_percent(soil_moisture_raw),
        };
        let pump_on = inputs
            .pump_override
            .unwrap_or(soil_moisture_pct < PUMP_ON_BELOW_PCT);

        Reading {
            earthquake: EarthquakeReading {
                magnitude,
                vibration_raw,
                is_vibrating: vibration_raw > VIBRATING_ABOVE_RAW,
                status: self.scale.classify(magnitude),
                observed_at,
            },
            irrigation: IrrigationReading {
                soil_moisture_pct,
                soil_moisture_raw,
                temperature_c: inputs.temperature_c,
                pump_on,
                status: classify_irrigation(soil_moisture_pct),
                observed_at,
            },
            flood: FloodReading {
                water_level_pct: water_level_percent(distance_cm, self.max_depth_cm),
                distance_cm,
                status: classify_flood(distance_cm),
                observed_at,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn inputs(vibration_raw: u16, soil_moisture_raw: u16, distance_cm: f64) -> RawInputs {
        // ---
        RawInputs {
            vibration_raw,
            soil_moisture_raw,
            moisture_pct_override: None,
            pump_override: None,
            distance_cm,
            temperature_c: 25.0,
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_moisture_percent_range_and_monotonic() {
        // ---
        let mut prev = f64::INFINITY;
        for raw in 0..=SOIL_RAW_MAX {
            let pct = moisture_percent(raw);
            assert!((0.0..=100.0).contains(&pct), "raw {} gave {}", raw, pct);
            assert!(pct < prev, "not strictly decreasing at raw {}", raw);
            prev = pct;
        }
        assert_eq!(moisture_percent(0), 100.0);
        assert_eq!(moisture_percent(1023), 0.0);
    }

    #[test]
    fn test_magnitude_floor_and_range() {
        // ---
        for v in 0..10 {
            assert_eq!(magnitude(v), 0.0);
        }
        for v in 0..=VIBRATION_RAW_MAX {
            assert!(magnitude(v) >= 0.0);
        }
        // 9 * 1023 / 1023 + 1 = 10 -> 2 + 3.5
        assert!((magnitude(1023) - 5.5).abs() < 1e-9);
        assert!(magnitude(10) > 2.0);
    }

    #[test]
    fn test_linear_magnitude() {
        // ---
        assert_eq!(linear_magnitude(300), 0.0);
        assert!((linear_magnitude(512) - 3.0).abs() < 1e-9);
        assert!((linear_magnitude(1024) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_water_level_clamped() {
        // ---
        assert_eq!(water_level_percent(0.0, 50.0), 100.0);
        assert_eq!(water_level_percent(25.0, 50.0), 50.0);
        assert_eq!(water_level_percent(50.0, 50.0), 0.0);
        assert_eq!(water_level_percent(80.0, 50.0), 0.0);
        assert_eq!(water_level_percent(-10.0, 50.0), 100.0);
    }

    #[test]
    fn test_irrigation_boundaries() {
        // ---
        assert_eq!(classify_irrigation(14.9), Status::Critical);
        assert_eq!(classify_irrigation(15.0), Status::Warning);
        assert_eq!(classify_irrigation(29.9), Status::Warning);
        assert_eq!(classify_irrigation(30.0), Status::Safe);
    }

    #[test]
    fn test_flood_boundaries() {
        // ---
        assert_eq!(classify_flood(9.9), Status::Critical);
        assert_eq!(classify_flood(10.0), Status::Warning);
        assert_eq!(classify_flood(19.9), Status::Warning);
        assert_eq!(classify_flood(20.0), Status::Safe);
    }

    #[test]
    fn test_earthquake_boundaries() {
        // ---
        assert_eq!(classify_earthquake(2.0), Status::Safe);
        assert_eq!(classify_earthquake(2.01), Status::Warning);
        assert_eq!(classify_earthquake(4.0), Status::Warning);
        assert_eq!(classify_earthquake(4.01), Status::Critical);

        assert_eq!(EarthquakeScale::Logarithmic.classify(4.01), Status::Critical);
        assert_eq!(classify_linear_earthquake(3.0), Status::Warning);
        assert_eq!(EarthquakeScale::Linear.classify(1.0), Status::Safe);
        assert_eq!(EarthquakeScale::Linear.classify(1.5), Status::Warning);
        assert_eq!(EarthquakeScale::Linear.classify(3.5), Status::Critical);
    }

    #[test]
    fn test_scale_from_str() {
        // ---
        assert_eq!(
            "logarithmic".parse::<EarthquakeScale>().unwrap(),
            EarthquakeScale::Logarithmic
        );
        assert_eq!(
            " Linear ".parse::<EarthquakeScale>().unwrap(),
            EarthquakeScale::Linear
        );
        assert!("richter".parse::<EarthquakeScale>().is_err());
    }

    #[test]
    fn test_clamp_raw() {
        // ---
        assert_eq!(clamp_raw(512.9, SOIL_RAW_MAX), 512);
        assert_eq!(clamp_raw(-4.0, SOIL_RAW_MAX), 0);
        assert_eq!(clamp_raw(5000.0, SOIL_RAW_MAX), 1023);
        assert_eq!(clamp_raw(f64::NAN, SOIL_RAW_MAX), 0);
    }

    #[test]
    fn test_derive_dry_soil_high_water() {
        // ---
        let r = Calibration::default().derive(inputs(0, 1023, 5.0), at());

        assert!(r.irrigation.soil_moisture_pct.abs() < 1e-9);
        assert!(r.irrigation.pump_on);
        assert_eq!(r.irrigation.status, Status::Critical);
        assert_eq!(r.flood.status, Status::Critical);
        assert_eq!(r.flood.water_level_pct, 90.0);
        assert_eq!(r.earthquake.status, Status::Safe);
        assert!(!r.earthquake.is_vibrating);
        assert_eq!(r.observed_at(), at());
    }

    #[test]
    fn test_derive_invariants() {
        // ---
        let cal = Calibration::default();
        for &(v, s) in &[(0, 0), (300, 700), (301, 720), (1024, 1023), (800, 100)] {
            let r = cal.derive(inputs(v, s, 30.0), at());
            assert_eq!(r.earthquake.is_vibrating, v > 300);
            assert_eq!(r.irrigation.pump_on, r.irrigation.soil_moisture_pct < 30.0);
            assert_eq!(
                r.irrigation.status,
                classify_irrigation(r.irrigation.soil_moisture_pct)
            );
        }
    }

    #[test]
    fn test_derive_overrides() {
        // ---
        let mut raw = inputs(0, 0, 30.0);
        raw.moisture_pct_override = Some(140.0);
        raw.pump_override = Some(true);

        let r = Calibration::default().derive(raw, at());
        assert_eq!(r.irrigation.soil_moisture_pct, 100.0);
        assert!(r.irrigation.pump_on);
        assert_eq!(r.irrigation.status, Status::Safe);
    }

    #[test]
    fn test_derive_uses_configured_scale() {
        // ---
        let cal = Calibration {
            scale: EarthquakeScale::Linear,
            max_depth_cm: 100.0,
        };
        let r = cal.derive(inputs(600, 0, 50.0), at());

        assert!((r.earthquake.magnitude - 600.0 / 1024.0 * 6.0).abs() < 1e-9);
        assert_eq!(r.earthquake.status, Status::Critical);
        assert_eq!(r.flood.water_level_pct, 50.0);
    }
}
