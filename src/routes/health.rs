// src/routes/health.rs

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResp {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
}

/// Liveness plus a non-fatal database probe.
pub async fn health(State(state): State<AppState>) -> Json<HealthResp> {
    let database = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => "up",
        Err(e) => {
            tracing::warn!(error = %e, "health probe could not reach the database");
            "down"
        }
    };
    Json(HealthResp { status: "ok", version: env!("CARGO_PKG_VERSION"), database })
}
