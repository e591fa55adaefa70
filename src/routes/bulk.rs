// src/routes/bulk.rs
//! Bulk telemetry submission.
//!
//! `POST /api/sensors/bulk` takes an array of telemetry payloads (or a single
//! payload) buffered by the field hardware. Each element is normalized and
//! written to the store in order, so the last element becomes the live
//! reading.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{parse_json_body, ErrorResponse};
use crate::{ingest, Config, SharedStore};

// ---

pub fn router() -> Router<(SharedStore, Config)> {
    // ---
    Router::new().route("/api/sensors/bulk", post(handler))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BulkResponse {
    success: bool,
    message: &'static str,
    records_processed: usize,
    timestamp: DateTime<Utc>,
}

async fn handler(State((store, config)): State<(SharedStore, Config)>, body: Bytes) -> Response {
    // ---
    let payload = match parse_json_body(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!("POST /api/sensors/bulk - body is not JSON: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Failed to process bulk sensor data")),
            )
                .into_response();
        }
    };

    let records = match payload {
        Value::Array(items) => items,
        single => vec![single],
    };

    let at = Utc::now();
    let calibration = config.calibration();

    for (i, record) in records.iter().enumerate() {
        let normalized = ingest::normalize(record, &calibration, at);
        if !normalized.invalid.is_empty() {
            debug!(
                "POST /api/sensors/bulk - record {} unparseable fields defaulted: {:?}",
                i, normalized.invalid
            );
        }

        store.write(normalized.reading, at);
    }

    info!("Bulk telemetry received: {} records", records.len());

    let body = BulkResponse {
        success: true,
        message: "Bulk data received successfully",
        records_processed: records.len(),
        timestamp: at,
    };
    (StatusCode::OK, Json(body)).into_response()
}
