use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::db;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: ServiceHealth,
}

#[derive(Serialize)]
pub struct ServiceHealth {
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_latency_ms: Option<u64>,
    pub redis: String,
    pub realtime: String,
}

/// Collapse service checks into an overall status. The database is the only
/// hard dependency.
fn overall(database: bool, redis: Option<bool>, realtime: bool) -> &'static str {
    if !database {
        "unhealthy"
    } else if redis == Some(false) || !realtime {
        "degraded"
    } else {
        "healthy"
    }
}

/// Health check endpoint - public
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let redis_check = async {
        match state.cache.as_ref() {
            Some(cache) => Some(cache.health_check().await.is_ok()),
            None => None,
        }
    };

    let (db_ping, redis_ok) = tokio::join!(db::ping(&state.db), redis_check);
    let db_ok = db_ping.is_some();
    let listening = state.hub.is_listening();

    let status = overall(db_ok, redis_ok, listening);
    let status_code = if status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let label = |ok: bool| (if ok { "ok" } else { "error" }).to_string();

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            services: ServiceHealth {
                database: label(db_ok),
                database_latency_ms: db_ping.map(|d| d.as_millis() as u64),
                redis: redis_ok.map_or_else(|| "disabled".to_string(), label),
                realtime: label(listening),
            },
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_outage_is_unhealthy() {
        assert_eq!(overall(false, Some(true), true), "unhealthy");
        assert_eq!(overall(false, None, false), "unhealthy");
    }

    #[test]
    fn optional_services_only_degrade() {
        assert_eq!(overall(true, Some(false), true), "degraded");
        assert_eq!(overall(true, None, false), "degraded");
        assert_eq!(overall(true, None, true), "healthy");
        assert_eq!(overall(true, Some(true), true), "healthy");
    }
}
