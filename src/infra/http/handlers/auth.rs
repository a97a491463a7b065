//! Login and logout handlers.

use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::infra::auth::AuthClaims;
use crate::infra::http::error::{ApiError, login_to_api};
use crate::infra::http::models::{LoginRequest, LoginResponse};
use crate::infra::http::state::AppState;

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.username.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request(
            "username and password are required",
            None,
        ));
    }

    let (token, user) = state
        .auth
        .login(&payload.username, &payload.password)
        .await
        .map_err(login_to_api)?;

    Ok(Json(LoginResponse {
        token,
        user: user.into(),
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
) -> impl IntoResponse {
    state.auth.logout(claims.user_id).await;
    StatusCode::NO_CONTENT
}
