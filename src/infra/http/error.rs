use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::auth::LoginError;
use crate::application::cloudpcs::CloudPcError;
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "not_found";
    pub const DUPLICATE: &str = "duplicate";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const INVALID_TRANSITION: &str = "invalid_transition";
    pub const QUOTA_EXCEEDED: &str = "quota_exceeded";
    pub const PERSISTENCE: &str = "persistence_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            hint,
        }
    }

    pub fn bad_request(message: impl Into<String>, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Bearer token required",
            None,
        )
    }

    pub fn forbidden() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            codes::FORBIDDEN,
            "Admin role required",
            None,
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message,
                hint: self.hint,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Map a repository error to a consistent HTTP error response.
pub fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::NotFound => ApiError::not_found("resource not found"),
        RepoError::Duplicate { constraint } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE,
            "Duplicate record",
            Some(constraint),
        ),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        RepoError::Persistence(message) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::PERSISTENCE,
            "Persistence error",
            Some(message),
        ),
    }
}

pub fn cloudpc_to_api(err: CloudPcError) -> ApiError {
    match err {
        CloudPcError::Repo(err) => repo_to_api(err),
        CloudPcError::Domain(DomainError::InvalidTransition { op, status }) => ApiError::new(
            StatusCode::CONFLICT,
            codes::INVALID_TRANSITION,
            "Lifecycle operation not allowed",
            Some(format!("cannot {op} while status is {status}")),
        ),
        CloudPcError::Domain(err) => {
            ApiError::bad_request("Invalid request", Some(err.to_string()))
        }
        CloudPcError::QuotaExceeded { limit } => ApiError::new(
            StatusCode::CONFLICT,
            codes::QUOTA_EXCEEDED,
            "Cloud-PC quota exceeded",
            Some(format!("limit is {limit} per user")),
        ),
    }
}

pub fn login_to_api(err: LoginError) -> ApiError {
    match err {
        LoginError::InvalidCredentials => ApiError::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Invalid username or password",
            None,
        ),
        LoginError::Repo(err) => repo_to_api(err),
        LoginError::Token(err) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::PERSISTENCE,
            "Token issuance failed",
            Some(err.to_string()),
        ),
    }
}
