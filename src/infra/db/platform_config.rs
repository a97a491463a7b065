use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{PlatformConfigRepo, RepoError, UpdatePlatformConfigParams};
use crate::domain::entities::PlatformConfigRecord;

use super::{PgRepositories, map_db_err};

const SELECT_COLUMNS: &str = "default_cpu_cores, default_memory_mb, default_disk_gb, \
                              default_region, max_cloudpcs_per_user, maintenance_mode, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct PlatformConfigRow {
    default_cpu_cores: i32,
    default_memory_mb: i32,
    default_disk_gb: i32,
    default_region: String,
    max_cloudpcs_per_user: i32,
    maintenance_mode: bool,
    updated_at: OffsetDateTime,
}

impl From<PlatformConfigRow> for PlatformConfigRecord {
    fn from(row: PlatformConfigRow) -> Self {
        PlatformConfigRecord {
            default_cpu_cores: row.default_cpu_cores,
            default_memory_mb: row.default_memory_mb,
            default_disk_gb: row.default_disk_gb,
            default_region: row.default_region,
            max_cloudpcs_per_user: row.max_cloudpcs_per_user,
            maintenance_mode: row.maintenance_mode,
            updated_at: row.updated_at,
        }
    }
}

// The `platform_config` table holds exactly one row, seeded by the initial
// migration and addressed by its fixed singleton id.
#[async_trait]
impl PlatformConfigRepo for PgRepositories {
    async fn load_platform_config(&self) -> Result<PlatformConfigRecord, RepoError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM platform_config WHERE singleton = TRUE");
        let row = sqlx::query_as::<_, PlatformConfigRow>(&sql)
            .fetch_one(self.pool())
            .await
            .map_err(map_db_err)?;
        Ok(row.into())
    }

    async fn update_platform_config(
        &self,
        params: UpdatePlatformConfigParams,
    ) -> Result<PlatformConfigRecord, RepoError> {
        let sql = format!(
            "UPDATE platform_config
             SET default_cpu_cores = COALESCE($1, default_cpu_cores),
                 default_memory_mb = COALESCE($2, default_memory_mb),
                 default_disk_gb = COALESCE($3, default_disk_gb),
                 default_region = COALESCE($4, default_region),
                 max_cloudpcs_per_user = COALESCE($5, max_cloudpcs_per_user),
                 maintenance_mode = COALESCE($6, maintenance_mode),
                 updated_at = $7
             WHERE singleton = TRUE
             RETURNING {SELECT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PlatformConfigRow>(&sql)
            .bind(params.default_cpu_cores)
            .bind(params.default_memory_mb)
            .bind(params.default_disk_gb)
            .bind(params.default_region)
            .bind(params.max_cloudpcs_per_user)
            .bind(params.maintenance_mode)
            .bind(OffsetDateTime::now_utc())
            .fetch_one(self.pool())
            .await
            .map_err(map_db_err)?;
        Ok(row.into())
    }
}
