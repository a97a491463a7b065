//! Cloud-PC record service: CRUD plus simulated lifecycle transitions.
//!
//! Lifecycle operations persist a transitional status and hand the settle
//! step to the [`TransitionScheduler`]; a superseding operation or a delete
//! cancels the pending timer before scheduling its own.

use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::{CacheService, InvalidationEvent};
use crate::domain::entities::CloudPcRecord;
use crate::domain::error::DomainError;
use crate::domain::types::{CloudPcStatus, LifecycleOp};

use super::lifecycle::TransitionScheduler;
use super::repos::{
    CloudPcListFilter, CloudPcsRepo, CreateCloudPcParams, PlatformConfigRepo, RepoError,
    UpdateCloudPcParams,
};

pub const METRIC_LIFECYCLE_TRANSITIONS_TOTAL: &str = "nimbus_lifecycle_transitions_total";

#[derive(Debug, Error)]
pub enum CloudPcError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("cloud-pc quota exceeded (limit {limit})")]
    QuotaExceeded { limit: i32 },
}

pub struct CreateCloudPcCommand {
    pub owner_id: Uuid,
    pub name: String,
    pub cpu_cores: Option<i32>,
    pub memory_mb: Option<i32>,
    pub disk_gb: Option<i32>,
    pub region: Option<String>,
}

/// One page of cloud-PC records, cached keyed by the serialized filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudPcPage {
    pub items: Vec<CloudPcRecord>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

pub struct CloudPcService {
    repo: Arc<dyn CloudPcsRepo>,
    platform: Arc<dyn PlatformConfigRepo>,
    cache: Arc<CacheService>,
    scheduler: Arc<TransitionScheduler>,
}

impl CloudPcService {
    pub fn new(
        repo: Arc<dyn CloudPcsRepo>,
        platform: Arc<dyn PlatformConfigRepo>,
        cache: Arc<CacheService>,
        scheduler: Arc<TransitionScheduler>,
    ) -> Self {
        Self {
            repo,
            platform,
            cache,
            scheduler,
        }
    }

    pub async fn create(&self, command: CreateCloudPcCommand) -> Result<CloudPcRecord, CloudPcError> {
        if command.name.trim().is_empty() {
            return Err(RepoError::invalid_input("name must not be empty").into());
        }

        let config = match self.cache.get_config().await {
            Some(config) => config,
            None => {
                let config = self.platform.load_platform_config().await?;
                self.cache.cache_config(&config).await;
                config
            }
        };

        let owned = self.repo.count_cloudpcs_for_owner(command.owner_id).await?;
        if owned >= i64::from(config.max_cloudpcs_per_user) {
            return Err(CloudPcError::QuotaExceeded {
                limit: config.max_cloudpcs_per_user,
            });
        }

        let record = self
            .repo
            .create_cloudpc(CreateCloudPcParams {
                owner_id: command.owner_id,
                name: command.name.trim().to_string(),
                status: CloudPcStatus::Creating,
                cpu_cores: command.cpu_cores.unwrap_or(config.default_cpu_cores),
                memory_mb: command.memory_mb.unwrap_or(config.default_memory_mb),
                disk_gb: command.disk_gb.unwrap_or(config.default_disk_gb),
                region: command.region.unwrap_or(config.default_region),
            })
            .await?;

        self.schedule_settle(record.id, CloudPcStatus::Creating.settled());
        self.invalidate(record.id).await;
        info!(cloudpc_id = %record.id, name = %record.name, "cloud-pc created");
        Ok(record)
    }

    /// Read-through lookup: cache first, record store on miss.
    pub async fn get(&self, id: Uuid) -> Result<Option<CloudPcRecord>, RepoError> {
        if let Some(record) = self.cache.get(crate::cache::CacheCategory::CloudPc, &id.to_string()).await {
            return Ok(Some(record));
        }
        let record = self.repo.find_cloudpc_by_id(id).await?;
        if let Some(record) = &record {
            self.cache
                .set(
                    crate::cache::CacheCategory::CloudPc,
                    &id.to_string(),
                    record,
                    None,
                )
                .await;
        }
        Ok(record)
    }

    /// List with the page cached under the serialized filter.
    pub async fn list(&self, filter: CloudPcListFilter) -> Result<CloudPcPage, RepoError> {
        let filter = CloudPcListFilter {
            limit: filter.limit.clamp(1, 100),
            offset: filter.offset.max(0),
            ..filter
        };

        if let Some(page) = self.cache.get_cloudpc_list(&filter).await {
            return Ok(page);
        }

        let items = self.repo.list_cloudpcs(&filter).await?;
        let total = self.repo.count_cloudpcs(&filter).await?;
        let page = CloudPcPage {
            items,
            total,
            limit: filter.limit,
            offset: filter.offset,
        };
        self.cache.cache_cloudpc_list(&filter, &page).await;
        Ok(page)
    }

    pub async fn update(
        &self,
        id: Uuid,
        params: UpdateCloudPcParams,
    ) -> Result<CloudPcRecord, RepoError> {
        let record = self.repo.update_cloudpc(id, params).await?;
        self.invalidate(id).await;
        info!(cloudpc_id = %id, "cloud-pc updated");
        Ok(record)
    }

    /// Start/stop/restart: persist the transitional status and schedule the
    /// settle step, replacing any pending transition for this record.
    pub async fn lifecycle(
        &self,
        id: Uuid,
        op: LifecycleOp,
    ) -> Result<CloudPcRecord, CloudPcError> {
        let record = self
            .repo
            .find_cloudpc_by_id(id)
            .await?
            .ok_or(RepoError::NotFound)?;

        let transitional = record.status.begin_transition(op)?;

        self.scheduler.cancel(id);
        let record = self.repo.update_cloudpc_status(id, transitional).await?;
        self.schedule_settle(id, transitional.settled());
        self.invalidate(id).await;

        info!(
            cloudpc_id = %id,
            op = op.as_str(),
            status = %record.status,
            "lifecycle transition started"
        );
        Ok(record)
    }

    /// Mark the record `Deleting` and schedule the actual row removal; a
    /// pending transition is cancelled first so it cannot fire against the
    /// vanishing record.
    pub async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        self.scheduler.cancel(id);
        self.repo
            .update_cloudpc_status(id, CloudPcStatus::Deleting)
            .await?;

        let repo = Arc::clone(&self.repo);
        let cache = Arc::clone(&self.cache);
        self.scheduler.schedule(id, move || async move {
            if let Err(err) = repo.delete_cloudpc(id).await {
                warn!(cloudpc_id = %id, error = %err, "scheduled delete failed");
            }
            cache
                .invalidate(&InvalidationEvent::CloudPcChanged { cloudpc_id: id })
                .await;
        });

        self.invalidate(id).await;
        info!(cloudpc_id = %id, "cloud-pc deletion scheduled");
        Ok(())
    }

    fn schedule_settle(&self, id: Uuid, target: CloudPcStatus) {
        let repo = Arc::clone(&self.repo);
        let cache = Arc::clone(&self.cache);
        self.scheduler.schedule(id, move || async move {
            match repo.update_cloudpc_status(id, target).await {
                Ok(_) => {
                    counter!(METRIC_LIFECYCLE_TRANSITIONS_TOTAL, "target" => target.as_str())
                        .increment(1);
                    cache
                        .invalidate(&InvalidationEvent::CloudPcChanged { cloudpc_id: id })
                        .await;
                    info!(cloudpc_id = %id, status = %target, "lifecycle transition settled");
                }
                Err(err) => {
                    warn!(cloudpc_id = %id, error = %err, "lifecycle settle failed");
                }
            }
        });
    }

    async fn invalidate(&self, cloudpc_id: Uuid) {
        self.cache
            .invalidate(&InvalidationEvent::CloudPcChanged { cloudpc_id })
            .await;
    }
}
