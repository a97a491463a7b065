//! Login sessions: credential verification, token issuance, session cache.

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::cache::{CacheService, InvalidationEvent};
use crate::domain::entities::{SessionRecord, UserRecord};
use crate::infra::auth::{AuthError, JwtVerifier, verify_password};

use super::repos::{RepoError, UsersRepo};

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Token(#[from] AuthError),
}

pub struct AuthService {
    users: Arc<dyn UsersRepo>,
    cache: Arc<CacheService>,
    verifier: Arc<JwtVerifier>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        cache: Arc<CacheService>,
        verifier: Arc<JwtVerifier>,
    ) -> Self {
        Self {
            users,
            cache,
            verifier,
        }
    }

    /// Verify credentials and issue a bearer token.
    ///
    /// Purges any stale session cache for the user first, then caches the
    /// fresh session record.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(String, UserRecord), LoginError> {
        let user = self
            .users
            .find_user_by_username(username)
            .await?
            .ok_or(LoginError::InvalidCredentials)?;

        if !verify_password(password, &user.password_digest) {
            return Err(LoginError::InvalidCredentials);
        }

        let token = self.verifier.issue(user.id, user.role)?;

        self.cache
            .invalidate(&InvalidationEvent::UserLogin { user_id: user.id })
            .await;
        self.cache
            .cache_user_session(&SessionRecord {
                user_id: user.id,
                username: user.username.clone(),
                role: user.role,
                issued_at: OffsetDateTime::now_utc(),
            })
            .await;

        info!(user_id = %user.id, username = %user.username, "login succeeded");
        Ok((token, user))
    }

    /// Drop the cached session for the user.
    pub async fn logout(&self, user_id: Uuid) {
        self.cache
            .invalidate(&InvalidationEvent::UserLogout { user_id })
            .await;
        info!(%user_id, "logout");
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use crate::application::repos::{CreateUserParams, UpdateUserParams};
    use crate::cache::{KvStore, MemoryStore};
    use crate::domain::types::UserRole;
    use crate::infra::auth::password_digest;

    use super::*;

    /// Fixed-content stand-in for the record store; only the lookup paths
    /// the login flow uses are live.
    struct FixedUsers {
        user: UserRecord,
    }

    impl FixedUsers {
        fn with_password(password: &str) -> Self {
            let now = OffsetDateTime::now_utc();
            Self {
                user: UserRecord {
                    id: Uuid::new_v4(),
                    username: "ada".to_string(),
                    email: "ada@example.com".to_string(),
                    password_digest: password_digest(password),
                    role: UserRole::Member,
                    created_at: now,
                    updated_at: now,
                },
            }
        }
    }

    #[async_trait]
    impl UsersRepo for FixedUsers {
        async fn create_user(&self, _: CreateUserParams) -> Result<UserRecord, RepoError> {
            Err(RepoError::from_persistence("not supported in this stub"))
        }

        async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
            Ok((self.user.id == id).then(|| self.user.clone()))
        }

        async fn find_user_by_username(
            &self,
            username: &str,
        ) -> Result<Option<UserRecord>, RepoError> {
            Ok((self.user.username == username).then(|| self.user.clone()))
        }

        async fn list_users(&self, _: i64, _: i64) -> Result<Vec<UserRecord>, RepoError> {
            Ok(vec![self.user.clone()])
        }

        async fn count_users(&self) -> Result<i64, RepoError> {
            Ok(1)
        }

        async fn update_user(
            &self,
            _: Uuid,
            _: UpdateUserParams,
        ) -> Result<UserRecord, RepoError> {
            Err(RepoError::from_persistence("not supported in this stub"))
        }

        async fn delete_user(&self, _: Uuid) -> Result<(), RepoError> {
            Err(RepoError::from_persistence("not supported in this stub"))
        }
    }

    fn service(password: &str) -> (AuthService, Arc<CacheService>, Arc<JwtVerifier>, Uuid) {
        let users = Arc::new(FixedUsers::with_password(password));
        let user_id = users.user.id;
        let cache = Arc::new(CacheService::new(KvStore::Memory(MemoryStore::new())));
        let verifier = Arc::new(JwtVerifier::new(
            "auth-test-secret",
            time::Duration::minutes(10),
        ));
        (
            AuthService::new(users, cache.clone(), verifier.clone()),
            cache,
            verifier,
            user_id,
        )
    }

    #[tokio::test]
    async fn login_issues_a_verifiable_token_and_caches_the_session() {
        let (auth, cache, verifier, user_id) = service("correct horse");

        let (token, user) = auth.login("ada", "correct horse").await.unwrap();
        assert_eq!(user.id, user_id);

        let claims = verifier.verify(&token).unwrap();
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.role, UserRole::Member);

        let session = cache.get_user_session(user_id).await.unwrap();
        assert_eq!(session.username, "ada");
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_are_indistinguishable() {
        let (auth, cache, _, user_id) = service("correct horse");

        assert!(matches!(
            auth.login("ada", "wrong").await,
            Err(LoginError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody", "correct horse").await,
            Err(LoginError::InvalidCredentials)
        ));
        assert!(cache.get_user_session(user_id).await.is_none());
    }

    #[tokio::test]
    async fn logout_purges_the_cached_session() {
        let (auth, cache, _, user_id) = service("correct horse");

        auth.login("ada", "correct horse").await.unwrap();
        assert!(cache.get_user_session(user_id).await.is_some());

        auth.logout(user_id).await;
        assert!(cache.get_user_session(user_id).await.is_none());
    }
}
