//! Request and response DTOs for the HTTP API.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::UserRecord;
use crate::domain::types::UserRole;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserDto,
}

/// User representation without the password digest.
#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<UserRecord> for UserDto {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCloudPcRequest {
    pub name: String,
    /// Defaults to the authenticated user when omitted (admin only).
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    #[serde(default)]
    pub cpu_cores: Option<i32>,
    #[serde(default)]
    pub memory_mb: Option<i32>,
    #[serde(default)]
    pub disk_gb: Option<i32>,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct UpdateCloudPcRequest {
    pub name: Option<String>,
    pub cpu_cores: Option<i32>,
    pub memory_mb: Option<i32>,
    pub disk_gb: Option<i32>,
    pub region: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct CloudPcListQuery {
    pub owner_id: Option<Uuid>,
    pub status: Option<crate::domain::types::CloudPcStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct PatchPlatformConfigRequest {
    pub default_cpu_cores: Option<i32>,
    pub default_memory_mb: Option<i32>,
    pub default_disk_gb: Option<i32>,
    pub default_region: Option<String>,
    pub max_cloudpcs_per_user: Option<i32>,
    pub maintenance_mode: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct WarmupResponse {
    pub written: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub cache: crate::cache::CacheHealth,
}
