//! Platform configuration service (singleton record, cached).

use std::sync::Arc;

use tracing::info;

use crate::cache::CacheService;
use crate::domain::entities::PlatformConfigRecord;

use super::repos::{PlatformConfigRepo, RepoError, UpdatePlatformConfigParams};

pub struct PlatformService {
    repo: Arc<dyn PlatformConfigRepo>,
    cache: Arc<CacheService>,
}

impl PlatformService {
    pub fn new(repo: Arc<dyn PlatformConfigRepo>, cache: Arc<CacheService>) -> Self {
        Self { repo, cache }
    }

    pub async fn get(&self) -> Result<PlatformConfigRecord, RepoError> {
        if let Some(config) = self.cache.get_config().await {
            return Ok(config);
        }
        let config = self.repo.load_platform_config().await?;
        self.cache.cache_config(&config).await;
        Ok(config)
    }

    pub async fn update(
        &self,
        params: UpdatePlatformConfigParams,
    ) -> Result<PlatformConfigRecord, RepoError> {
        let config = self.repo.update_platform_config(params).await?;
        self.cache.invalidate_config().await;
        self.cache.cache_config(&config).await;
        info!("platform config updated");
        Ok(config)
    }
}
