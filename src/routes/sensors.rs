// src/routes/sensors.rs
//! Current sensor status and single telemetry submission.
//!
//! - `GET  /api/sensors` returns the live reading while it is fresh, otherwise
//!   a simulated one, labelled with its source.
//! - `POST /api/sensors` accepts one telemetry payload from the field hardware
//!   and makes it the live reading.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::{parse_json_body, ErrorResponse};
use crate::store::{Snapshot, StoreError};
use crate::{ingest, Config, DataSource, Reading, SharedStore};

// ---

pub fn router() -> Router<(SharedStore, Config)> {
    // ---
    Router::new().route("/api/sensors", get(get_status).post(submit))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    success: bool,
    data: Reading,
    timestamp: DateTime<Utc>,
    data_source: DataSource,
    arduino_connected: bool,
    last_arduino_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    success: bool,
    message: &'static str,
    data: Reading,
    timestamp: DateTime<Utc>,
    data_source: DataSource,
}

async fn get_status(State((store, _config)): State<(SharedStore, Config)>) -> Response {
    // ---
    let now = Utc::now();
    status_response(store.read(now), now)
}

/// Map the store's answer onto the status response body.
fn status_response(result: Result<Snapshot, StoreError>, now: DateTime<Utc>) -> Response {
    // ---
    match result {
        Ok(snapshot) => {
            debug!(
                "GET /api/sensors - source={:?} overall={:?}",
                snapshot.source,
                snapshot.reading.overall_status()
            );
            let body = StatusResponse {
                success: true,
                arduino_connected: snapshot.is_live(),
                data: snapshot.reading,
                timestamp: now,
                data_source: snapshot.source,
                last_arduino_update: snapshot.last_update,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            error!("GET /api/sensors - failed to read sensor state: {}", e);
            let body = ErrorResponse {
                data_source: Some(DataSource::Error),
                ..ErrorResponse::new("Failed to fetch sensor data")
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

async fn submit(State((store, config)): State<(SharedStore, Config)>, body: Bytes) -> Response {
    // ---
    let payload = match parse_json_body(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!("POST /api/sensors - body is not JSON: {}", e);
            let body = ErrorResponse {
                message: Some("Failed to process sensor data"),
                ..ErrorResponse::new("Invalid sensor data format")
            };
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    let at = Utc::now();
    let normalized = ingest::normalize(&payload, &config.calibration(), at);

    if !normalized.invalid.is_empty() {
        warn!(
            "POST /api/sensors - unparseable fields defaulted: {:?}",
            normalized.invalid
        );
    }
    if !normalized.missing.is_empty() {
        debug!(
            "POST /api/sensors - missing fields defaulted: {:?}",
            normalized.missing
        );
    }

    let reading = normalized.reading;
    store.write(reading.clone(), at);

    info!(
        "Telemetry received: magnitude={:.2} moisture={:.1}% distance={:.1}cm overall={:?}",
        reading.earthquake.magnitude,
        reading.irrigation.soil_moisture_pct,
        reading.flood.distance_cm,
        reading.overall_status()
    );

    let body = SubmitResponse {
        success: true,
        message: "Sensor data received and processed successfully",
        data: reading,
        timestamp: at,
        data_source: DataSource::Live,
    };
    (StatusCode::OK, Json(body)).into_response()
}
