use axum::{body::Bytes, Router};
use serde::Serialize;
use serde_json::Value;

use crate::{Config, DataSource, SharedStore};

mod bulk;
mod health;
mod sensors;

// ---

pub fn router(store: SharedStore, config: Config) -> Router {
    // ---
    Router::new()
        .merge(sensors::router())
        .merge(bulk::router())
        .merge(health::router())
        .with_state((store, config))
}

/// JSON body for any failed request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    success: bool,
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_source: Option<DataSource>,
}

impl ErrorResponse {
    fn new(error: &'static str) -> Self {
        Self {
            success: false,
            error,
            message: None,
            data_source: None,
        }
    }
}

/// Parse a request body as JSON, treating an empty body as `{}`.
///
/// Only text that is not JSON at all is an error; the shape of the value is
/// left to the lenient telemetry parser.
fn parse_json_body(body: &Bytes) -> Result<Value, serde_json::Error> {
    // ---
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(body)
}
