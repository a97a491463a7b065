//! User CRUD handlers. Mutations require the admin role, except a user
//! updating their own account.

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::users::{CreateUserCommand, UpdateUserCommand};
use crate::domain::types::UserRole;
use crate::infra::auth::AuthClaims;
use crate::infra::http::error::{ApiError, repo_to_api};
use crate::infra::http::models::{CreateUserRequest, PageQuery, UpdateUserRequest, UserDto};
use crate::infra::http::state::AppState;

pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if !claims.is_admin() {
        return Err(ApiError::forbidden());
    }

    let users = state
        .users
        .list_users(query.limit.unwrap_or(50), query.offset.unwrap_or(0))
        .await
        .map_err(repo_to_api)?;

    Ok(Json(users.into_iter().map(UserDto::from).collect::<Vec<_>>()))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !claims.is_admin() {
        return Err(ApiError::forbidden());
    }

    let user = state
        .users
        .create_user(CreateUserCommand {
            username: payload.username,
            email: payload.email,
            password: payload.password,
            role: payload.role.unwrap_or(UserRole::Member),
        })
        .await
        .map_err(repo_to_api)?;

    Ok((StatusCode::CREATED, Json(UserDto::from(user))))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if !claims.is_admin() && claims.user_id != id {
        return Err(ApiError::forbidden());
    }

    let user = state.users.get_user(id).await.map_err(repo_to_api)?;
    match user {
        Some(user) => Ok(Json(UserDto::from(user))),
        None => Err(ApiError::not_found("user not found")),
    }
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !claims.is_admin() && claims.user_id != id {
        return Err(ApiError::forbidden());
    }
    // Only admins may change roles.
    if payload.role.is_some() && !claims.is_admin() {
        return Err(ApiError::forbidden());
    }

    let user = state
        .users
        .update_user(
            id,
            UpdateUserCommand {
                email: payload.email,
                password: payload.password,
                role: payload.role,
            },
        )
        .await
        .map_err(repo_to_api)?;

    Ok(Json(UserDto::from(user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if !claims.is_admin() {
        return Err(ApiError::forbidden());
    }

    state.users.delete_user(id).await.map_err(repo_to_api)?;
    Ok(StatusCode::NO_CONTENT)
}
