//! Ingestion of telemetry submitted by the field hardware.
//!
//! Parsing is deliberately lenient: a payload is never rejected because of a
//! bad field. Each numeric field goes through a parse-with-fallback step that
//! records whether the default was used, so logs can tell a sensor that
//! really reads zero from one that sent garbage.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use crate::formulas::{clamp_raw, Calibration, RawInputs, SOIL_RAW_MAX, VIBRATION_RAW_MAX};
use crate::Reading;

// ---

/// Temperature used when the payload has none (°C).
pub const DEFAULT_TEMPERATURE_C: f64 = 25.0;

/// How a lenient value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Parsed from the payload.
    Parsed,
    /// Field absent (or `null`); default used.
    Missing,
    /// Field present but not numeric; default used.
    Invalid,
}

/// A value parsed with fallback to a default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lenient<T> {
    // ---
    pub value: T,
    pub origin: Origin,
}

impl<T> Lenient<T> {
    // ---
    pub fn used_default(&self) -> bool {
        self.origin != Origin::Parsed
    }
}

/// Telemetry fields as understood after lenient parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryPayload {
    // ---
    pub distance: Lenient<f64>,
    pub soil_moisture_raw: Lenient<f64>,
    pub vibration_value: Lenient<f64>,
    pub temperature: Lenient<f64>,
    /// `None` when the device did not report a percentage.
    pub moisture_percent: Option<Lenient<f64>>,
    /// `None` when absent or `null`.
    pub pump_status: Option<bool>,
}

impl TelemetryPayload {
    // ---
    /// Interpret an arbitrary JSON value as a telemetry payload.
    ///
    /// Never fails. Anything other than an object is treated as an empty
    /// payload.
    pub fn from_value(value: &Value) -> Self {
        // ---
        let empty = Map::new();
        let fields = match value {
            Value::Object(map) => map,
            other => {
                warn!("Telemetry payload is not an object ({}), using defaults", kind(other));
                &empty
            }
        };
        let field = |name: &str| fields.get(name).filter(|v| !v.is_null());

        Self {
            distance: lenient_number(field("distance"), 0.0),
            soil_moisture_raw: lenient_number(field("soilMoistureRaw"), 0.0),
            vibration_value: lenient_number(field("vibrationValue"), 0.0),
            temperature: lenient_number(field("temperature"), DEFAULT_TEMPERATURE_C),
            moisture_percent: field("moisturePercent").map(|v| lenient_number(Some(v), 0.0)),
            pump_status: field("pumpStatus").map(truthy),
        }
    }

    /// Range-checked raw inputs for the formula library.
    pub fn raw_inputs(&self) -> RawInputs {
        // ---
        RawInputs {
            vibration_raw: clamp_raw(self.vibration_value.value, VIBRATION_RAW_MAX),
            soil_moisture_raw: clamp_raw(self.soil_moisture_raw.value, SOIL_RAW_MAX),
            moisture_pct_override: self
                .moisture_percent
                .filter(|p| !p.used_default())
                .map(|p| p.value),
            pump_override: self.pump_status,
            distance_cm: self.distance.value,
            temperature_c: self.temperature.value,
        }
    }

    fn fields(&self) -> [(&'static str, Option<Origin>); 5] {
        // ---
        [
            ("distance", Some(self.distance.origin)),
            ("soilMoistureRaw", Some(self.soil_moisture_raw.origin)),
            ("vibrationValue", Some(self.vibration_value.origin)),
            ("temperature", Some(self.temperature.origin)),
            ("moisturePercent", self.moisture_percent.map(|p| p.origin)),
        ]
    }

    /// Names of fields that were absent and defaulted.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.fields()
            .into_iter()
            .filter(|(_, o)| *o == Some(Origin::Missing))
            .map(|(n, _)| n)
            .collect()
    }

    /// Names of fields that were present but unparseable.
    pub fn invalid_fields(&self) -> Vec<&'static str> {
        self.fields()
            .into_iter()
            .filter(|(_, o)| *o == Some(Origin::Invalid))
            .map(|(n, _)| n)
            .collect()
    }
}

/// Result of normalizing one payload.
#[derive(Debug, Clone)]
pub struct Normalized {
    // ---
    pub reading: Reading,
    pub missing: Vec<&'static str>,
    pub invalid: Vec<&'static str>,
}

/// Normalize a JSON payload into a classified reading observed at `at`.
pub fn normalize(value: &Value, calibration: &Calibration, at: DateTime<Utc>) -> Normalized {
    // ---
    let payload = TelemetryPayload::from_value(value);
    Normalized {
        reading: calibration.derive(payload.raw_inputs(), at),
        missing: payload.missing_fields(),
        invalid: payload.invalid_fields(),
    }
}

// ---

/// Parse a JSON number or numeric string, falling back to `default`.
fn lenient_number(value: Option<&Value>, default: f64) -> Lenient<f64> {
    // ---
    let parsed = match value {
        None => {
            return Lenient {
                value: default,
                origin: Origin::Missing,
            }
        }
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => parse_numeric_prefix(s),
        Some(_) => None,
    };

    match parsed.filter(|v| v.is_finite()) {
        Some(value) => Lenient {
            value,
            origin: Origin::Parsed,
        },
        None => Lenient {
            value: default,
            origin: Origin::Invalid,
        },
    }
}

/// Longest leading numeric prefix of `s`, e.g. `"512abc"` -> 512.
///
/// Scans once for `[+-]digits[.digits][(e|E)[+-]digits]` and parses only that
/// slice. Values that overflow to infinity are rejected.
fn parse_numeric_prefix(s: &str) -> Option<f64> {
    // ---
    let s = s.trim_start();
    let len = numeric_prefix_len(s.as_bytes());
    if len == 0 {
        return None;
    }
    s[..len].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Byte length of the leading decimal number in `b`, or 0 if there is none.
fn numeric_prefix_len(b: &[u8]) -> usize {
    // ---
    let digits_from = |mut i: usize| {
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut i = 0;
    if matches!(b.first(), Some(b'+' | b'-')) {
        i += 1;
    }

    let int_end = digits_from(i);
    let mut mantissa_digits = int_end - i;
    let mut end = int_end;

    if b.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        mantissa_digits += frac_end - (end + 1);
        end = frac_end;
    }
    if mantissa_digits == 0 {
        return 0;
    }

    // Exponent only counts when it has at least one digit: "1e" parses as 1.
    if matches!(b.get(end), Some(b'e' | b'E')) {
        let mut j = end + 1;
        if matches!(b.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp_end = digits_from(j);
        if exp_end > j {
            end = exp_end;
        }
    }
    end
}

/// Truthiness as a JSON client would see it.
fn truthy(value: &Value) -> bool {
    // ---
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |v| v != 0.0 && !v.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::Status;
    use chrono::TimeZone;
    use serde_json::json;
    use std::time::{Duration, Instant};

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn ingest(value: Value) -> Normalized {
        normalize(&value, &Calibration::default(), at())
    }

    #[test]
    fn test_dry_soil_flooding_quiet_ground() {
        // ---
        let n = ingest(json!({"soilMoistureRaw": 1023, "distance": 5, "vibrationValue": 0}));
        let r = n.reading;

        assert!(r.irrigation.soil_moisture_pct.abs() < 1e-9);
        assert!(r.irrigation.pump_on);
        assert_eq!(r.flood.status, Status::Critical);
        assert_eq!(r.earthquake.status, Status::Safe);
        assert_eq!(r.irrigation.temperature_c, 25.0);
        assert_eq!(n.missing, vec!["temperature"]);
        assert!(n.invalid.is_empty());
    }

    #[test]
    fn test_empty_payload_uses_defaults() {
        // ---
        let r = ingest(json!({})).reading;

        assert_eq!(r.irrigation.temperature_c, 25.0);
        assert_eq!(r.irrigation.soil_moisture_raw, 0);
        assert_eq!(r.earthquake.vibration_raw, 0);
        assert_eq!(r.flood.distance_cm, 0.0);
        assert_eq!(r.irrigation.soil_moisture_pct, 100.0);
        assert_eq!(r.flood.status, Status::Critical);
        assert_eq!(r.observed_at(), at());
    }

    #[test]
    fn test_non_object_payload_uses_defaults() {
        // ---
        for garbage in [json!("garbage"), json!(42), json!([1, 2, 3]), Value::Null] {
            let r = ingest(garbage).reading;
            assert_eq!(r.irrigation.temperature_c, 25.0);
            assert_eq!(r.earthquake.vibration_raw, 0);
        }
    }

    #[test]
    fn test_garbage_fields_marked_invalid() {
        // ---
        let n = ingest(json!({
            "distance": "far",
            "soilMoistureRaw": {"x": 1},
            "vibrationValue": true,
            "temperature": "hot",
        }));

        assert_eq!(n.reading.irrigation.temperature_c, 25.0);
        assert_eq!(n.reading.flood.distance_cm, 0.0);
        assert_eq!(
            n.invalid,
            vec!["distance", "soilMoistureRaw", "vibrationValue", "temperature"]
        );
        assert!(n.missing.is_empty());
    }

    #[test]
    fn test_genuine_zero_is_not_defaulted() {
        // ---
        let p = TelemetryPayload::from_value(&json!({"temperature": 0, "distance": 0}));

        assert_eq!(p.temperature.value, 0.0);
        assert!(!p.temperature.used_default());
        assert!(!p.distance.used_default());
        assert!(p.vibration_value.used_default());
    }

    #[test]
    fn test_numeric_strings() {
        // ---
        let n = ingest(json!({
            "vibrationValue": "512abc",
            "soilMoistureRaw": " 600.8 ",
            "distance": "12.5cm",
            "temperature": "19.5",
        }));
        let r = n.reading;

        assert_eq!(r.earthquake.vibration_raw, 512);
        assert_eq!(r.irrigation.soil_moisture_raw, 600);
        assert_eq!(r.flood.distance_cm, 12.5);
        assert_eq!(r.flood.status, Status::Warning);
        assert_eq!(r.irrigation.temperature_c, 19.5);
        assert!(n.invalid.is_empty());
    }

    #[test]
    fn test_raw_counters_clamped() {
        // ---
        let n = ingest(json!({"vibrationValue": 99999, "soilMoistureRaw": -40, "distance": -3}));
        let r = n.reading;

        assert_eq!(r.earthquake.vibration_raw, 1024);
        assert!(r.earthquake.is_vibrating);
        assert_eq!(r.irrigation.soil_moisture_raw, 0);
        assert_eq!(r.flood.distance_cm, 0.0);
        assert_eq!(r.flood.water_level_pct, 100.0);
    }

    #[test]
    fn test_moisture_percent_override() {
        // ---
        let r = ingest(json!({"soilMoistureRaw": 1023, "moisturePercent": 55.5})).reading;
        assert_eq!(r.irrigation.soil_moisture_pct, 55.5);
        assert!(!r.irrigation.pump_on);
        assert_eq!(r.irrigation.status, Status::Safe);

        let r = ingest(json!({"moisturePercent": 180})).reading;
        assert_eq!(r.irrigation.soil_moisture_pct, 100.0);

        let r = ingest(json!({"moisturePercent": -5})).reading;
        assert_eq!(r.irrigation.soil_moisture_pct, 0.0);
    }

    #[test]
    fn test_bad_moisture_percent_falls_back_to_raw() {
        // ---
        let n = ingest(json!({"soilMoistureRaw": 1023, "moisturePercent": "wet"}));

        assert!(n.reading.irrigation.soil_moisture_pct.abs() < 1e-9);
        assert_eq!(n.invalid, vec!["moisturePercent"]);
    }

    #[test]
    fn test_pump_status_truthiness() {
        // ---
        let pump = |v: Value| {
            ingest(json!({"soilMoistureRaw": 0, "pumpStatus": v}))
                .reading
                .irrigation
                .pump_on
        };

        assert!(pump(json!(true)));
        assert!(pump(json!(1)));
        assert!(pump(json!("on")));
        assert!(pump(json!({})));
        assert!(!pump(json!(false)));
        assert!(!pump(json!(0)));
        assert!(!pump(json!("")));

        // null counts as absent: derived from 100% moisture -> off
        assert!(!pump(Value::Null));
        let dry = ingest(json!({"soilMoistureRaw": 1023, "pumpStatus": null})).reading;
        assert!(dry.irrigation.pump_on);
    }

    #[test]
    fn test_parse_numeric_prefix() {
        // ---
        assert_eq!(parse_numeric_prefix("42"), Some(42.0));
        assert_eq!(parse_numeric_prefix("  -7.25xyz"), Some(-7.25));
        assert_eq!(parse_numeric_prefix("1e2"), Some(100.0));
        assert_eq!(parse_numeric_prefix("abc"), None);
        assert_eq!(parse_numeric_prefix(""), None);
        assert_eq!(parse_numeric_prefix("inf"), None);
        assert_eq!(parse_numeric_prefix("NaN"), None);
        assert_eq!(parse_numeric_prefix("1e"), Some(1.0));
        assert_eq!(parse_numeric_prefix("2E-1x"), Some(0.2));
        assert_eq!(parse_numeric_prefix(".5"), Some(0.5));
        assert_eq!(parse_numeric_prefix("5."), Some(5.0));
        assert_eq!(parse_numeric_prefix("+3"), Some(3.0));
        assert_eq!(parse_numeric_prefix("-"), None);
        assert_eq!(parse_numeric_prefix("."), None);
        assert_eq!(parse_numeric_prefix("1e999"), None);
    }

    #[test]
    fn test_huge_numeric_string_is_linear() {
        // ---
        let digits = "1".repeat(1 << 20);
        let started = Instant::now();

        let p = TelemetryPayload::from_value(&json!({ "distance": digits }));

        assert_eq!(p.distance.origin, Origin::Invalid);
        assert_eq!(p.distance.value, 0.0);
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "1 MiB field took {:?}",
            started.elapsed()
        );

        let mut tail = "7".to_string();
        tail.push_str(&"x".repeat(1 << 20));
        let started = Instant::now();
        let p = TelemetryPayload::from_value(&json!({ "distance": tail }));
        assert_eq!(p.distance.value, 7.0);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
