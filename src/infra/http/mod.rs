//! HTTP API surface: router assembly, auth middleware, handlers.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod state;

pub use state::AppState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::ws::handler::terminal_ws;

/// Build the full router. Everything under `/api/v1` except login sits
/// behind the bearer-token middleware; `/healthz` and the WebSocket
/// endpoint (which verifies its token in the handshake) are open.
pub fn build_router(state: AppState) -> Router {
    let auth_state = state.clone();

    let protected = Router::new()
        .route("/api/v1/auth/logout", post(handlers::auth::logout))
        .route(
            "/api/v1/users",
            get(handlers::users::list_users).post(handlers::users::create_user),
        )
        .route(
            "/api/v1/users/{id}",
            get(handlers::users::get_user)
                .patch(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .route(
            "/api/v1/cloudpcs",
            get(handlers::cloudpcs::list_cloudpcs).post(handlers::cloudpcs::create_cloudpc),
        )
        .route(
            "/api/v1/cloudpcs/{id}",
            get(handlers::cloudpcs::get_cloudpc)
                .patch(handlers::cloudpcs::update_cloudpc)
                .delete(handlers::cloudpcs::delete_cloudpc),
        )
        .route(
            "/api/v1/cloudpcs/{id}/start",
            post(handlers::cloudpcs::start_cloudpc),
        )
        .route(
            "/api/v1/cloudpcs/{id}/stop",
            post(handlers::cloudpcs::stop_cloudpc),
        )
        .route(
            "/api/v1/cloudpcs/{id}/restart",
            post(handlers::cloudpcs::restart_cloudpc),
        )
        .route(
            "/api/v1/system/config",
            get(handlers::system::get_platform_config)
                .patch(handlers::system::patch_platform_config),
        )
        .route("/api/v1/system/stats", get(handlers::system::dashboard_stats))
        .route(
            "/api/v1/system/cache/metrics",
            get(handlers::system::cache_metrics),
        )
        .route(
            "/api/v1/system/cache/warmup",
            post(handlers::system::cache_warmup),
        )
        .layer(axum_middleware::from_fn_with_state(
            auth_state,
            middleware::require_auth,
        ));

    let public = Router::new()
        .route("/healthz", get(handlers::system::healthz))
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .route("/ws/terminal", get(terminal_ws));

    Router::new().merge(public).merge(protected).with_state(state)
}
