//! Synthetic sensor readings for when no hardware is reporting.
//!
//! Values follow slow sine oscillators with uniform jitter on top, so a
//! dashboard polling every few seconds sees plausible drift plus noise.
//! Raw values go through [`Calibration::derive`] like ingested telemetry.

use std::f64::consts::TAU;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::formulas::{clamp_raw, Calibration, RawInputs, SOIL_RAW_MAX};
use crate::Reading;

// ---

/// Soil moisture oscillator period (seconds).
const SOIL_PERIOD_S: f64 = 120.0;
/// Water distance oscillator period (seconds).
const DISTANCE_PERIOD_S: f64 = 240.0;
/// Temperature oscillator period (seconds).
const TEMPERATURE_PERIOD_S: f64 = 360.0;

/// Chance per sample that vibration lands in the spike band.
const VIBRATION_SPIKE_PROBABILITY: f64 = 0.1;

/// Lowest simulated sensor-to-water distance (cm).
const MIN_DISTANCE_CM: f64 = 5.0;

/// Source of readings that does not depend on submitted telemetry.
pub trait ReadingProvider: Send + Sync {
    fn generate(&self, now: DateTime<Utc>) -> Reading;
}

/// Default provider: oscillators plus thread-local randomness.
#[derive(Debug, Clone, Default)]
pub struct SimulationGenerator {
    calibration: Calibration,
}

impl SimulationGenerator {
    // ---
    pub fn new(calibration: Calibration) -> Self {
        Self { calibration }
    }

    /// Draw raw sensor values for `now` using `rng` for jitter.
    pub fn sample<R: Rng + ?Sized>(&self, now: DateTime<Utc>, rng: &mut R) -> RawInputs {
        // ---
        let t = now.timestamp_millis() as f64 / 1000.0;

        let soil = 300.0 + oscillate(t, SOIL_PERIOD_S) * 200.0 + rng.gen_range(0.0..100.0);

        let vibration = if rng.gen_bool(VIBRATION_SPIKE_PROBABILITY) {
            rng.gen_range(400..800)
        } else {
            rng.gen_range(50..250)
        };

        let distance = (25.0 + oscillate(t, DISTANCE_PERIOD_S) * 15.0 + rng.gen_range(-5.0..5.0))
            .max(MIN_DISTANCE_CM);

        let temperature =
            22.0 + oscillate(t, TEMPERATURE_PERIOD_S) * 8.0 + rng.gen_range(-2.0..2.0);

        RawInputs {
            vibration_raw: vibration,
            soil_moisture_raw: clamp_raw(soil, SOIL_RAW_MAX),
            moisture_pct_override: None,
            pump_override: None,
            distance_cm: distance,
            temperature_c: temperature,
        }
    }

    /// Generate a reading using the supplied random source.
    pub fn generate_with<R: Rng + ?Sized>(&self, now: DateTime<Utc>, rng: &mut R) -> Reading {
        // ---
        self.calibration.derive(self.sample(now, rng), now)
    }
}

impl ReadingProvider for SimulationGenerator {
    fn generate(&self, now: DateTime<Utc>) -> Reading {
        self.generate_with(now, &mut rand::thread_rng())
    }
}

/// Unit sine wave with the given period, evaluated at `t` seconds.
fn oscillate(t: f64, period_s: f64) -> f64 {
    (TAU * t / period_s).sin()
}
