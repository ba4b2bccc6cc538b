//! Liveness and readiness probes

use super::AppState;
use crate::database::PRIMARY;
use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Map, Value, json};

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let app = &state.config.app;
    Json(json!({
        "status": "healthy",
        "service": app.name,
        "version": app.version,
        "environment": app.environment,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

/// GET /ready
///
/// Ready only when the primary database is registered and every registered
/// database answers.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let report = state.db.health().await;

    let ready = report.contains_key(PRIMARY) && report.values().all(Result::is_ok);
    let databases: Map<String, Value> = report
        .into_iter()
        .map(|(name, result)| {
            let status = match result {
                Ok(()) => "ok".to_string(),
                Err(e) => e.to_string(),
            };
            (name, Value::String(status))
        })
        .collect();

    let (status, label) = if ready {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    };

    (
        status,
        Json(json!({
            "status": label,
            "databases": databases,
        })),
    )
}
