//! Aggregate dashboard statistics, cached under the stats category.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::CacheService;

use super::repos::{CloudPcsRepo, RepoError, UsersRepo};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_cloudpcs: i64,
    pub cloudpcs_by_status: BTreeMap<String, i64>,
}

pub struct StatsService {
    users: Arc<dyn UsersRepo>,
    cloudpcs: Arc<dyn CloudPcsRepo>,
    cache: Arc<CacheService>,
}

impl StatsService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        cloudpcs: Arc<dyn CloudPcsRepo>,
        cache: Arc<CacheService>,
    ) -> Self {
        Self {
            users,
            cloudpcs,
            cache,
        }
    }

    pub async fn dashboard(&self) -> Result<DashboardStats, RepoError> {
        if let Some(stats) = self.cache.get_stats().await {
            return Ok(stats);
        }

        let total_users = self.users.count_users().await?;
        let by_status = self.cloudpcs.count_cloudpcs_by_status().await?;
        let total_cloudpcs = by_status.iter().map(|(_, count)| count).sum();
        let stats = DashboardStats {
            total_users,
            total_cloudpcs,
            cloudpcs_by_status: by_status.into_iter().collect(),
        };

        self.cache.cache_stats(&stats).await;
        Ok(stats)
    }
}
