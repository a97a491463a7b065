use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CloudPcListFilter, CloudPcsRepo, CreateCloudPcParams, RepoError, UpdateCloudPcParams,
};
use crate::domain::entities::CloudPcRecord;
use crate::domain::types::CloudPcStatus;

use super::{PgRepositories, map_db_err};

const SELECT_COLUMNS: &str =
    "id, owner_id, name, status, cpu_cores, memory_mb, disk_gb, region, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct CloudPcRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    status: String,
    cpu_cores: i32,
    memory_mb: i32,
    disk_gb: i32,
    region: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<CloudPcRow> for CloudPcRecord {
    type Error = RepoError;

    fn try_from(row: CloudPcRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<CloudPcStatus>()
            .map_err(RepoError::from_persistence)?;
        Ok(CloudPcRecord {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            status,
            cpu_cores: row.cpu_cores,
            memory_mb: row.memory_mb,
            disk_gb: row.disk_gb,
            region: row.region,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl CloudPcsRepo for PgRepositories {
    async fn create_cloudpc(
        &self,
        params: CreateCloudPcParams,
    ) -> Result<CloudPcRecord, RepoError> {
        let sql = format!(
            "INSERT INTO cloudpcs (id, owner_id, name, status, cpu_cores, memory_mb, disk_gb, region, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
             RETURNING {SELECT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CloudPcRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(params.owner_id)
            .bind(&params.name)
            .bind(params.status.as_str())
            .bind(params.cpu_cores)
            .bind(params.memory_mb)
            .bind(params.disk_gb)
            .bind(&params.region)
            .bind(OffsetDateTime::now_utc())
            .fetch_one(self.pool())
            .await
            .map_err(map_db_err)?;

        CloudPcRecord::try_from(row)
    }

    async fn find_cloudpc_by_id(&self, id: Uuid) -> Result<Option<CloudPcRecord>, RepoError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM cloudpcs WHERE id = $1");
        let row = sqlx::query_as::<_, CloudPcRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_db_err)?;

        row.map(CloudPcRecord::try_from).transpose()
    }

    async fn list_cloudpcs(
        &self,
        filter: &CloudPcListFilter,
    ) -> Result<Vec<CloudPcRecord>, RepoError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM cloudpcs
             WHERE ($1::uuid IS NULL OR owner_id = $1)
               AND ($2::text IS NULL OR status = $2)
             ORDER BY created_at DESC
             LIMIT $3 OFFSET $4"
        );
        let rows = sqlx::query_as::<_, CloudPcRow>(&sql)
            .bind(filter.owner_id)
            .bind(filter.status.map(CloudPcStatus::as_str))
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(self.pool())
            .await
            .map_err(map_db_err)?;

        rows.into_iter().map(CloudPcRecord::try_from).collect()
    }

    async fn count_cloudpcs(&self, filter: &CloudPcListFilter) -> Result<i64, RepoError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM cloudpcs
             WHERE ($1::uuid IS NULL OR owner_id = $1)
               AND ($2::text IS NULL OR status = $2)",
        )
        .bind(filter.owner_id)
        .bind(filter.status.map(CloudPcStatus::as_str))
        .fetch_one(self.pool())
        .await
        .map_err(map_db_err)?;
        Ok(count)
    }

    async fn count_cloudpcs_for_owner(&self, owner_id: Uuid) -> Result<i64, RepoError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM cloudpcs WHERE owner_id = $1")
                .bind(owner_id)
                .fetch_one(self.pool())
                .await
                .map_err(map_db_err)?;
        Ok(count)
    }

    async fn count_cloudpcs_by_status(&self) -> Result<Vec<(String, i64)>, RepoError> {
        sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM cloudpcs GROUP BY status ORDER BY status",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_db_err)
    }

    async fn update_cloudpc(
        &self,
        id: Uuid,
        params: UpdateCloudPcParams,
    ) -> Result<CloudPcRecord, RepoError> {
        let sql = format!(
            "UPDATE cloudpcs
             SET name = COALESCE($2, name),
                 cpu_cores = COALESCE($3, cpu_cores),
                 memory_mb = COALESCE($4, memory_mb),
                 disk_gb = COALESCE($5, disk_gb),
                 region = COALESCE($6, region),
                 updated_at = $7
             WHERE id = $1
             RETURNING {SELECT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CloudPcRow>(&sql)
            .bind(id)
            .bind(params.name)
            .bind(params.cpu_cores)
            .bind(params.memory_mb)
            .bind(params.disk_gb)
            .bind(params.region)
            .bind(OffsetDateTime::now_utc())
            .fetch_optional(self.pool())
            .await
            .map_err(map_db_err)?;

        row.map(CloudPcRecord::try_from)
            .transpose()?
            .ok_or(RepoError::NotFound)
    }

    async fn update_cloudpc_status(
        &self,
        id: Uuid,
        status: CloudPcStatus,
    ) -> Result<CloudPcRecord, RepoError> {
        let sql = format!(
            "UPDATE cloudpcs SET status = $2, updated_at = $3 WHERE id = $1
             RETURNING {SELECT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CloudPcRow>(&sql)
            .bind(id)
            .bind(status.as_str())
            .bind(OffsetDateTime::now_utc())
            .fetch_optional(self.pool())
            .await
            .map_err(map_db_err)?;

        row.map(CloudPcRecord::try_from)
            .transpose()?
            .ok_or(RepoError::NotFound)
    }

    async fn delete_cloudpc(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM cloudpcs WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
