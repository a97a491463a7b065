use std::{process, sync::Arc};

use clap::Parser;
use nimbus::{
    application::{
        AppError, auth::AuthService, cloudpcs::CloudPcService, lifecycle::TransitionScheduler,
        platform::PlatformService, repos::{CloudPcsRepo, PlatformConfigRepo, UsersRepo},
        stats::StatsService, users::UserService,
    },
    cache::{CacheService, KvStore},
    config::{self, CliArgs},
    infra::{
        auth::JwtVerifier,
        db::PgRepositories,
        error::InfraError,
        http::{AppState, build_router},
        telemetry,
    },
    ws::ConnectionRegistry,
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let cli = CliArgs::parse();
    let settings = config::load(&cli)
        .map_err(|err| AppError::configuration(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;
    run_serve(settings).await
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repos = init_repositories(&settings).await?;

    let store = KvStore::from_config_graceful(&settings.cache).await;
    let cache = Arc::new(CacheService::new(store));
    info!(backend = cache.backend_name(), "cache service ready");

    if settings.cache.warmup_on_startup {
        cache.warmup().await;
    }

    let signing_secret = settings
        .auth
        .signing_secret
        .as_deref()
        .ok_or_else(|| InfraError::configuration("auth signing secret is not configured"))
        .map_err(AppError::from)?;
    let verifier = Arc::new(JwtVerifier::new(
        signing_secret,
        time::Duration::try_from(settings.auth.token_ttl)
            .map_err(|err| AppError::configuration(err.to_string()))?,
    ));

    let registry = Arc::new(ConnectionRegistry::new());
    let scheduler = Arc::new(TransitionScheduler::new(settings.lifecycle.transition_delay));

    let users_repo: Arc<dyn UsersRepo> = repos.clone();
    let cloudpcs_repo: Arc<dyn CloudPcsRepo> = repos.clone();
    let platform_repo: Arc<dyn PlatformConfigRepo> = repos.clone();

    let state = AppState {
        auth: Arc::new(AuthService::new(
            users_repo.clone(),
            cache.clone(),
            verifier.clone(),
        )),
        users: Arc::new(UserService::new(users_repo.clone(), cache.clone())),
        cloudpcs: Arc::new(CloudPcService::new(
            cloudpcs_repo.clone(),
            platform_repo.clone(),
            cache.clone(),
            scheduler.clone(),
        )),
        platform: Arc::new(PlatformService::new(platform_repo, cache.clone())),
        stats: Arc::new(StatsService::new(users_repo, cloudpcs_repo, cache.clone())),
        cache: cache.clone(),
        registry: registry.clone(),
        verifier,
        db: repos,
    };

    // Liveness sweep: ping every connection, terminate the unresponsive.
    let liveness_registry = registry.clone();
    let liveness_interval = settings.websocket.liveness_interval;
    let liveness_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(liveness_interval);
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            liveness_registry.liveness_sweep();
        }
    });

    // Retention sweep: prune stale inactive terminal sessions.
    let retention_registry = registry.clone();
    let retention_window = settings.websocket.session_retention;
    let retention_interval = settings.websocket.retention_sweep_interval;
    let retention_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(retention_interval);
        interval.tick().await;
        loop {
            interval.tick().await;
            retention_registry.session_retention_sweep(retention_window);
        }
    });

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "listening");

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")));

    liveness_handle.abort();
    retention_handle.abort();

    result
}

async fn init_repositories(settings: &config::Settings) -> Result<Arc<PgRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PgRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PgRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PgRepositories::new(pool)))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to install shutdown signal handler");
    }
    info!("shutdown signal received");
}
