use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::http::{handlers, paths};
use crate::state::ApiState;

pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route(paths::HEALTH, get(handlers::health))
        .route(paths::RESTART, post(handlers::restart))
        .route(
            paths::CONFIG,
            get(handlers::get_config).post(handlers::update_config),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
