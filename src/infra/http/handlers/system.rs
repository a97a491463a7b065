//! Platform config, stats, cache operations, and health handlers.

use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::repos::UpdatePlatformConfigParams;
use crate::cache::CacheHealthStatus;
use crate::infra::auth::AuthClaims;
use crate::infra::http::error::{ApiError, repo_to_api};
use crate::infra::http::models::{HealthResponse, PatchPlatformConfigRequest, WarmupResponse};
use crate::infra::http::state::AppState;

pub async fn get_platform_config(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let config = state.platform.get().await.map_err(repo_to_api)?;
    Ok(Json(config))
}

pub async fn patch_platform_config(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    Json(payload): Json<PatchPlatformConfigRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !claims.is_admin() {
        return Err(ApiError::forbidden());
    }

    let config = state
        .platform
        .update(UpdatePlatformConfigParams {
            default_cpu_cores: payload.default_cpu_cores,
            default_memory_mb: payload.default_memory_mb,
            default_disk_gb: payload.default_disk_gb,
            default_region: payload.default_region,
            max_cloudpcs_per_user: payload.max_cloudpcs_per_user,
            maintenance_mode: payload.maintenance_mode,
        })
        .await
        .map_err(repo_to_api)?;

    Ok(Json(config))
}

pub async fn dashboard_stats(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state.stats.dashboard().await.map_err(repo_to_api)?;
    Ok(Json(stats))
}

pub async fn cache_metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.cache.metrics().await)
}

pub async fn cache_warmup(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
) -> Result<impl IntoResponse, ApiError> {
    if !claims.is_admin() {
        return Err(ApiError::forbidden());
    }
    let written = state.cache.warmup().await;
    Ok(Json(WarmupResponse { written }))
}

/// Liveness endpoint: database ping plus cache health, no auth required.
pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let database_ok = state.db.ping().await.is_ok();
    let cache = state.cache.health_check().await;

    let healthy = database_ok && cache.status == CacheHealthStatus::Healthy;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" },
        database: if database_ok { "reachable" } else { "unreachable" },
        cache,
    };

    (status, Json(body))
}
