//! Liveness and readiness probes.
//!
//! Readiness means the SQLite file answers queries and carries every embedded
//! migration. The live connection count is reported but never fails the probe.

use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use diesel::prelude::*;
use diesel_migrations::MigrationHarness;
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::{AppState, MIGRATIONS};

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    #[schema(example = "healthy")]
    pub status: String,
    #[schema(example = "projecthub")]
    pub service: &'static str,
    #[schema(example = "0.1.0")]
    pub version: &'static str,
    #[schema(example = "2025-01-15T10:30:00Z")]
    pub checked_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadinessResponse {
    #[schema(example = "ready")]
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadinessChecks {
    pub database: DatabaseProbe,
    /// WebSocket clients currently registered for pushes.
    #[schema(example = 3)]
    pub live_connections: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProbeState {
    Up,
    Down,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DatabaseProbe {
    pub status: ProbeState,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = 2)]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "2 migrations pending")]
    pub error: Option<String>,
}

impl DatabaseProbe {
    fn from_result(result: Result<u64, String>) -> Self {
        match result {
            Ok(latency_ms) => Self {
                status: ProbeState::Up,
                latency_ms: Some(latency_ms),
                error: None,
            },
            Err(error) => Self {
                status: ProbeState::Down,
                latency_ms: None,
                error: Some(error),
            },
        }
    }

    fn is_up(&self) -> bool {
        self.status == ProbeState::Up
    }
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Process is serving requests", content_type = "text/plain")
    )
)]
pub async fn health_check_simple() -> &'static str {
    "OK"
}

#[utoipa::path(
    get,
    path = "/health/status",
    tag = "Health",
    responses(
        (status = 200, description = "Service identity and version", body = StatusResponse)
    )
)]
pub async fn health_check() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "healthy".to_string(),
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        checked_at: chrono::Utc::now().to_rfc3339(),
    })
}

#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Database reachable and migrated", body = ReadinessResponse),
        (status = 503, description = "Database unreachable or behind", body = ReadinessResponse)
    )
)]
pub async fn ready_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let pool = state.db_pool.clone();
    let probe = tokio::task::spawn_blocking(move || probe_database(&pool))
        .await
        .unwrap_or_else(|e| Err(format!("Probe task failed: {}", e)));

    let database = DatabaseProbe::from_result(probe);
    if let Some(error) = &database.error {
        warn!(error = %error, "Readiness probe failed");
    }

    let ready = database.is_up();
    let body = ReadinessResponse {
        status: if ready { "ready" } else { "not_ready" }.to_string(),
        checks: ReadinessChecks {
            database,
            live_connections: state.registry.len(),
        },
    };

    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body))
}

fn probe_database(pool: &crate::DbPool) -> Result<u64, String> {
    let start = Instant::now();
    let mut conn = pool
        .get()
        .map_err(|e| format!("No connection available: {}", e))?;

    diesel::sql_query("SELECT 1")
        .execute(&mut conn)
        .map_err(|e| format!("Query failed: {}", e))?;

    let pending = conn
        .pending_migrations(MIGRATIONS)
        .map_err(|e| format!("Cannot read migration state: {}", e))?
        .len();
    if pending > 0 {
        return Err(format!("{} migrations pending", pending));
    }

    Ok(start.elapsed().as_millis() as u64)
}

#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Process is alive")
    )
)]
pub async fn live_check() -> StatusCode {
    StatusCode::OK
}
