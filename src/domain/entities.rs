//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{CloudPcStatus, UserRole};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Hex-encoded sha-256 digest of the password. Never serialized to API
    /// responses; the HTTP layer maps records into DTOs without this field.
    pub password_digest: String,
    pub role: UserRole,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudPcRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub status: CloudPcStatus,
    pub cpu_cores: i32,
    pub memory_mb: i32,
    pub disk_gb: i32,
    pub region: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Singleton platform configuration row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformConfigRecord {
    pub default_cpu_cores: i32,
    pub default_memory_mb: i32,
    pub default_disk_gb: i32,
    pub default_region: String,
    pub max_cloudpcs_per_user: i32,
    pub maintenance_mode: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Cached login session, stored in the cache under the `session` category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
}
