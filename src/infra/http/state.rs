use std::sync::Arc;

use crate::application::auth::AuthService;
use crate::application::cloudpcs::CloudPcService;
use crate::application::platform::PlatformService;
use crate::application::stats::StatsService;
use crate::application::users::UserService;
use crate::cache::CacheService;
use crate::infra::auth::JwtVerifier;
use crate::infra::db::PgRepositories;
use crate::ws::ConnectionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub cloudpcs: Arc<CloudPcService>,
    pub platform: Arc<PlatformService>,
    pub stats: Arc<StatsService>,
    pub cache: Arc<CacheService>,
    pub registry: Arc<ConnectionRegistry>,
    pub verifier: Arc<JwtVerifier>,
    pub db: Arc<PgRepositories>,
}
