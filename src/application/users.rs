//! User account service.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::cache::{CacheService, InvalidationEvent};
use crate::domain::entities::UserRecord;
use crate::domain::types::UserRole;
use crate::infra::auth::password_digest;

use super::repos::{CreateUserParams, RepoError, UpdateUserParams, UsersRepo};

pub struct CreateUserCommand {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
}

#[derive(Default)]
pub struct UpdateUserCommand {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<UserRole>,
}

pub struct UserService {
    repo: Arc<dyn UsersRepo>,
    cache: Arc<CacheService>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UsersRepo>, cache: Arc<CacheService>) -> Self {
        Self { repo, cache }
    }

    pub async fn create_user(&self, command: CreateUserCommand) -> Result<UserRecord, RepoError> {
        if command.username.trim().is_empty() {
            return Err(RepoError::invalid_input("username must not be empty"));
        }
        if !command.email.contains('@') {
            return Err(RepoError::invalid_input("email must contain `@`"));
        }
        if command.password.len() < 8 {
            return Err(RepoError::invalid_input(
                "password must be at least 8 characters",
            ));
        }

        let user = self
            .repo
            .create_user(CreateUserParams {
                username: command.username.trim().to_string(),
                email: command.email.trim().to_string(),
                password_digest: password_digest(&command.password),
                role: command.role,
            })
            .await?;

        self.cache.cache_user(&user).await;
        info!(user_id = %user.id, username = %user.username, "user created");
        Ok(user)
    }

    /// Read-through lookup: cache first, record store on miss.
    pub async fn get_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        if let Some(user) = self.cache.get_user(id).await {
            return Ok(Some(user));
        }
        let user = self.repo.find_user_by_id(id).await?;
        if let Some(user) = &user {
            self.cache.cache_user(user).await;
        }
        Ok(user)
    }

    pub async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<UserRecord>, RepoError> {
        self.repo.list_users(limit.clamp(1, 100), offset.max(0)).await
    }

    pub async fn update_user(
        &self,
        id: Uuid,
        command: UpdateUserCommand,
    ) -> Result<UserRecord, RepoError> {
        if let Some(password) = &command.password {
            if password.len() < 8 {
                return Err(RepoError::invalid_input(
                    "password must be at least 8 characters",
                ));
            }
        }

        let user = self
            .repo
            .update_user(
                id,
                UpdateUserParams {
                    email: command.email,
                    password_digest: command.password.as_deref().map(password_digest),
                    role: command.role,
                },
            )
            .await?;

        self.cache
            .invalidate(&InvalidationEvent::UserUpdated { user_id: id })
            .await;
        self.cache.cache_user(&user).await;
        info!(user_id = %id, "user updated");
        Ok(user)
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<(), RepoError> {
        self.repo.delete_user(id).await?;
        self.cache
            .invalidate(&InvalidationEvent::UserUpdated { user_id: id })
            .await;
        info!(user_id = %id, "user deleted");
        Ok(())
    }
}
