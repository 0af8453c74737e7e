use axum::Router;
use axum::extract::State;
use std::sync::Arc;

pub mod api;
pub mod app_env;
pub mod credentials;
pub mod db;
pub mod domain;
pub mod dto;
pub mod external_connections;
pub mod logging;
pub mod persistence;
pub mod routing_utils;

/// Data shared by every request handler
pub struct SharedData {
    pub ext_cxn: persistence::ExternalConnectivity,
    pub session: app_env::SessionConfig,
}

pub type AppState = State<Arc<SharedData>>;

/// Assembles every route the service exposes
pub fn build_router(shared_data: Arc<SharedData>) -> Router {
    let api_routes = Router::new()
        .nest("/auth", api::auth::auth_routes())
        .merge(api::task::task_routes())
        .merge(api::timeline::timeline_routes());

    Router::new()
        .nest("/api", api_routes)
        .merge(api::swagger_main::build_documentation())
        .with_state(shared_data)
}
