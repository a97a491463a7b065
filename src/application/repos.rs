//! Repository ports for the record store.
//!
//! The application layer depends on these traits; `infra::db` provides the
//! Postgres implementation. Errors are normalized into `RepoError` so
//! handlers can map them onto stable HTTP codes.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{CloudPcRecord, PlatformConfigRecord, UserRecord};
use crate::domain::types::{CloudPcStatus, UserRole};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("record not found")]
    NotFound,
    #[error("duplicate record (constraint `{constraint}`)")]
    Duplicate { constraint: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl RepoError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub username: String,
    pub email: String,
    pub password_digest: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateUserParams {
    pub email: Option<String>,
    pub password_digest: Option<String>,
    pub role: Option<UserRole>,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;
    async fn find_user_by_username(&self, username: &str)
    -> Result<Option<UserRecord>, RepoError>;
    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<UserRecord>, RepoError>;
    async fn count_users(&self) -> Result<i64, RepoError>;
    async fn update_user(&self, id: Uuid, params: UpdateUserParams)
    -> Result<UserRecord, RepoError>;
    async fn delete_user(&self, id: Uuid) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateCloudPcParams {
    pub owner_id: Uuid,
    pub name: String,
    pub status: CloudPcStatus,
    pub cpu_cores: i32,
    pub memory_mb: i32,
    pub disk_gb: i32,
    pub region: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateCloudPcParams {
    pub name: Option<String>,
    pub cpu_cores: Option<i32>,
    pub memory_mb: Option<i32>,
    pub disk_gb: Option<i32>,
    pub region: Option<String>,
}

/// List filter; also the serialized input for the list cache key.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CloudPcListFilter {
    pub owner_id: Option<Uuid>,
    pub status: Option<CloudPcStatus>,
    pub limit: i64,
    pub offset: i64,
}

#[async_trait]
pub trait CloudPcsRepo: Send + Sync {
    async fn create_cloudpc(&self, params: CreateCloudPcParams)
    -> Result<CloudPcRecord, RepoError>;
    async fn find_cloudpc_by_id(&self, id: Uuid) -> Result<Option<CloudPcRecord>, RepoError>;
    async fn list_cloudpcs(
        &self,
        filter: &CloudPcListFilter,
    ) -> Result<Vec<CloudPcRecord>, RepoError>;
    async fn count_cloudpcs(&self, filter: &CloudPcListFilter) -> Result<i64, RepoError>;
    async fn count_cloudpcs_for_owner(&self, owner_id: Uuid) -> Result<i64, RepoError>;
    async fn count_cloudpcs_by_status(&self) -> Result<Vec<(String, i64)>, RepoError>;
    async fn update_cloudpc(
        &self,
        id: Uuid,
        params: UpdateCloudPcParams,
    ) -> Result<CloudPcRecord, RepoError>;
    async fn update_cloudpc_status(
        &self,
        id: Uuid,
        status: CloudPcStatus,
    ) -> Result<CloudPcRecord, RepoError>;
    async fn delete_cloudpc(&self, id: Uuid) -> Result<(), RepoError>;
}

#[derive(Debug, Clone, Default)]
pub struct UpdatePlatformConfigParams {
    pub default_cpu_cores: Option<i32>,
    pub default_memory_mb: Option<i32>,
    pub default_disk_gb: Option<i32>,
    pub default_region: Option<String>,
    pub max_cloudpcs_per_user: Option<i32>,
    pub maintenance_mode: Option<bool>,
}

#[async_trait]
pub trait PlatformConfigRepo: Send + Sync {
    async fn load_platform_config(&self) -> Result<PlatformConfigRecord, RepoError>;
    async fn update_platform_config(
        &self,
        params: UpdatePlatformConfigParams,
    ) -> Result<PlatformConfigRecord, RepoError>;
}
