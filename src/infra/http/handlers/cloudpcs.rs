//! Cloud-PC CRUD and lifecycle handlers.

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::cloudpcs::CreateCloudPcCommand;
use crate::application::repos::{CloudPcListFilter, UpdateCloudPcParams};
use crate::domain::types::LifecycleOp;
use crate::infra::auth::AuthClaims;
use crate::infra::http::error::{ApiError, cloudpc_to_api, repo_to_api};
use crate::infra::http::models::{CloudPcListQuery, CreateCloudPcRequest, UpdateCloudPcRequest};
use crate::infra::http::state::AppState;

pub async fn list_cloudpcs(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    Query(query): Query<CloudPcListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    // Members only see their own records; admins may filter freely.
    let owner_id = if claims.is_admin() {
        query.owner_id
    } else {
        Some(claims.user_id)
    };

    let page = state
        .cloudpcs
        .list(CloudPcListFilter {
            owner_id,
            status: query.status,
            limit: query.limit.unwrap_or(20),
            offset: query.offset.unwrap_or(0),
        })
        .await
        .map_err(repo_to_api)?;

    Ok(Json(page))
}

pub async fn create_cloudpc(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    Json(payload): Json<CreateCloudPcRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let owner_id = match payload.owner_id {
        Some(owner_id) if owner_id != claims.user_id => {
            if !claims.is_admin() {
                return Err(ApiError::forbidden());
            }
            owner_id
        }
        _ => claims.user_id,
    };

    let record = state
        .cloudpcs
        .create(CreateCloudPcCommand {
            owner_id,
            name: payload.name,
            cpu_cores: payload.cpu_cores,
            memory_mb: payload.memory_mb,
            disk_gb: payload.disk_gb,
            region: payload.region,
        })
        .await
        .map_err(cloudpc_to_api)?;

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_cloudpc(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.cloudpcs.get(id).await.map_err(repo_to_api)?;
    match record {
        Some(record) => {
            if !claims.is_admin() && record.owner_id != claims.user_id {
                return Err(ApiError::forbidden());
            }
            Ok(Json(record))
        }
        None => Err(ApiError::not_found("cloud-pc not found")),
    }
}

pub async fn update_cloudpc(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCloudPcRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize_owner(&state, &claims, id).await?;

    let record = state
        .cloudpcs
        .update(
            id,
            UpdateCloudPcParams {
                name: payload.name,
                cpu_cores: payload.cpu_cores,
                memory_mb: payload.memory_mb,
                disk_gb: payload.disk_gb,
                region: payload.region,
            },
        )
        .await
        .map_err(repo_to_api)?;

    Ok(Json(record))
}

pub async fn delete_cloudpc(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    authorize_owner(&state, &claims, id).await?;
    state.cloudpcs.delete(id).await.map_err(repo_to_api)?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn start_cloudpc(
    state: State<AppState>,
    claims: Extension<AuthClaims>,
    id: Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    lifecycle(state, claims, id, LifecycleOp::Start).await
}

pub async fn stop_cloudpc(
    state: State<AppState>,
    claims: Extension<AuthClaims>,
    id: Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    lifecycle(state, claims, id, LifecycleOp::Stop).await
}

pub async fn restart_cloudpc(
    state: State<AppState>,
    claims: Extension<AuthClaims>,
    id: Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    lifecycle(state, claims, id, LifecycleOp::Restart).await
}

async fn lifecycle(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    Path(id): Path<Uuid>,
    op: LifecycleOp,
) -> Result<impl IntoResponse, ApiError> {
    authorize_owner(&state, &claims, id).await?;

    let record = state
        .cloudpcs
        .lifecycle(id, op)
        .await
        .map_err(cloudpc_to_api)?;

    Ok((StatusCode::ACCEPTED, Json(record)))
}

/// Admins may touch any record; members only their own.
async fn authorize_owner(state: &AppState, claims: &AuthClaims, id: Uuid) -> Result<(), ApiError> {
    if claims.is_admin() {
        return Ok(());
    }
    let record = state
        .cloudpcs
        .get(id)
        .await
        .map_err(repo_to_api)?
        .ok_or_else(|| ApiError::not_found("cloud-pc not found"))?;
    if record.owner_id != claims.user_id {
        return Err(ApiError::forbidden());
    }
    Ok(())
}
