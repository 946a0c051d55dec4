//! Liveness and readiness checks.

use std::time::{Duration, Instant};

use axum::{extract::State, http::StatusCode, Json};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::AppState;

const CHECK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    #[schema(example = "pawtrack")]
    pub service: String,
    #[schema(example = "0.1.0")]
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    NotReady,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub status: Readiness,
    pub checks: ReadinessChecks,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadinessChecks {
    pub database: ComponentStatus,
    /// Absent when no Redis cache is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<ComponentStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Up,
    Down,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ComponentStatus {
    pub status: CheckState,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = 3)]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentStatus {
    fn from_check(started: Instant, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self {
                status: CheckState::Up,
                latency_ms: Some(started.elapsed().as_millis() as u64),
                error: None,
            },
            Err(error) => Self {
                status: CheckState::Down,
                latency_ms: None,
                error: Some(error),
            },
        }
    }

    fn is_up(&self) -> bool {
        self.status == CheckState::Up
    }
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Process is alive", body = HealthResponse))
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (
            status = 200,
            description = "Database (and Redis, if configured) reachable",
            body = ReadinessResponse
        ),
        (status = 503, description = "A dependency is down", body = ReadinessResponse)
    )
)]
pub async fn ready_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let database = check_database(&state).await;
    let redis = check_redis(&state).await;

    let ready = database.is_up() && redis.as_ref().map_or(true, ComponentStatus::is_up);
    let (code, status) = if ready {
        (StatusCode::OK, Readiness::Ready)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Readiness::NotReady)
    };

    (
        code,
        Json(ReadinessResponse {
            status,
            checks: ReadinessChecks { database, redis },
        }),
    )
}

async fn check_database(state: &AppState) -> ComponentStatus {
    let pool = state.db_pool.clone();
    let started = Instant::now();

    let check = tokio::task::spawn_blocking(move || -> Result<(), String> {
        let mut conn = pool.get().map_err(|e| format!("pool: {e}"))?;
        diesel::sql_query("SELECT 1")
            .execute(&mut conn)
            .map(|_| ())
            .map_err(|e| format!("query: {e}"))
    });

    let result = match tokio::time::timeout(CHECK_TIMEOUT, check).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(format!("check task failed: {e}")),
        Err(_) => Err("timed out".to_string()),
    };
    ComponentStatus::from_check(started, result)
}

async fn check_redis(state: &AppState) -> Option<ComponentStatus> {
    let pool = state.cache.redis_pool.as_ref()?;
    let started = Instant::now();

    let ping = async {
        let mut conn = pool.get().await.map_err(|e| format!("pool: {e}"))?;
        redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .map(|_| ())
            .map_err(|e| format!("ping: {e}"))
    };

    let result = tokio::time::timeout(CHECK_TIMEOUT, ping)
        .await
        .unwrap_or_else(|_| Err("timed out".to_string()));
    Some(ComponentStatus::from_check(started, result))
}
