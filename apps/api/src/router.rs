use std::sync::Arc;

use axum::{routing::get, Router};

use dentist_cell::router::dentist_routes;
use scheduling_cell::router::scheduling_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Pearl Dental API is running!" }))
        .nest("/appointments", scheduling_routes(state.clone()))
        .nest("/dentists", dentist_routes(state.clone()))
}
