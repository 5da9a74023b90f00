//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;
use crate::config;
use crate::db;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    /// `"ok"` or `"ng: <reason>"`.
    pub db: String,
    /// Which completion source is serving streams.
    pub provider: &'static str,
}

/// `GET /api/health`: liveness plus a storage round-trip.
///
/// Always 200: a failing database is reported in the body.
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    let db = match ctx.core.open_db().map_err(|e| e.to_string()).and_then(|conn| {
        db::ping(&conn).map_err(|e| e.to_string())
    }) {
        Ok(()) => "ok".to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "Health check: database unavailable");
            format!("ng: {e}")
        }
    };

    Json(HealthResponse {
        status: "ok",
        service: config::APP_NAME,
        version: config::APP_VERSION,
        db,
        provider: ctx.core.completion().kind().as_str(),
    })
}
