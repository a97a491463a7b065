use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CreateUserParams, RepoError, UpdateUserParams, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::domain::types::UserRole;

use super::{PgRepositories, map_db_err};

const SELECT_COLUMNS: &str = "id, username, email, password_digest, role, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_digest: String,
    role: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = RepoError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<UserRole>()
            .map_err(RepoError::from_persistence)?;
        Ok(UserRecord {
            id: row.id,
            username: row.username,
            email: row.email,
            password_digest: row.password_digest,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl UsersRepo for PgRepositories {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let sql = format!(
            "INSERT INTO users (id, username, email, password_digest, role, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $6)
             RETURNING {SELECT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&params.username)
            .bind(&params.email)
            .bind(&params.password_digest)
            .bind(params.role.as_str())
            .bind(OffsetDateTime::now_utc())
            .fetch_one(self.pool())
            .await
            .map_err(map_db_err)?;

        UserRecord::try_from(row)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_db_err)?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM users WHERE username = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(self.pool())
            .await
            .map_err(map_db_err)?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<UserRecord>, RepoError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool())
            .await
            .map_err(map_db_err)?;

        rows.into_iter().map(UserRecord::try_from).collect()
    }

    async fn count_users(&self) -> Result<i64, RepoError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool())
            .await
            .map_err(map_db_err)?;
        Ok(count)
    }

    async fn update_user(
        &self,
        id: Uuid,
        params: UpdateUserParams,
    ) -> Result<UserRecord, RepoError> {
        let sql = format!(
            "UPDATE users
             SET email = COALESCE($2, email),
                 password_digest = COALESCE($3, password_digest),
                 role = COALESCE($4, role),
                 updated_at = $5
             WHERE id = $1
             RETURNING {SELECT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(params.email)
            .bind(params.password_digest)
            .bind(params.role.map(UserRole::as_str))
            .bind(OffsetDateTime::now_utc())
            .fetch_optional(self.pool())
            .await
            .map_err(map_db_err)?;

        row.map(UserRecord::try_from)
            .transpose()?
            .ok_or(RepoError::NotFound)
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
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
