//! Health check endpoints for liveness and readiness probes.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::errors::ApiResponse;
use crate::AppState;

/// Readiness probe detail.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub database: String,
    pub storage: String,
}

/// Liveness probe: OK while the process is running.
pub async fn live() -> &'static str {
    "OK"
}

/// Readiness probe: checks database connectivity and the asset root.
pub async fn ready(State(state): State<AppState>) -> Json<ApiResponse<HealthStatus>> {
    let db_status = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "connected".to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            format!("error: {e}")
        }
    };

    let storage_status = if state.storage.root().is_dir() {
        "available".to_string()
    } else {
        tracing::warn!(root = %state.storage.root().display(), "Storage root missing");
        "missing".to_string()
    };

    ApiResponse::success(HealthStatus {
        status: "ok".to_string(),
        database: db_status,
        storage: storage_status,
    })
}
