use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::infra::auth::extract_bearer;

use super::error::ApiError;
use super::state::AppState;

/// Require a valid bearer token; verified claims land in the request
/// extensions for handlers to read.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer);

    let Some(token) = token else {
        return ApiError::unauthorized().into_response();
    };

    let claims = match state.verifier.verify(token) {
        Ok(claims) => claims,
        Err(err) => {
            debug!(error = %err, "token rejected");
            return ApiError::unauthorized().into_response();
        }
    };

    request.extensions_mut().insert(claims);
    next.run(request).await
}
