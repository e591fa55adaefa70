// src/routes/health.rs
//! Liveness endpoint for the sensor backend.
//!
//! `/health` lets a process supervisor or the dashboard's host check that
//! the service answers HTTP. It is a sibling module in the `routes`
//! directory; the gateway (`mod.rs`) merges its subrouter so `main.rs` never
//! sees individual endpoints.

use axum::{routing::get, Json, Router};
use serde::Serialize;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Handle `GET /health`.
///
/// Does not touch the reconciliation store.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Create a subrouter containing the `/health` route.
///
/// Generic over the application state so it merges with the gateway router
/// whatever the state type is (here `(SharedStore, Config)`).
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health))
}
