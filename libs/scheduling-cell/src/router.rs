// libs/scheduling-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn scheduling_routes(state: Arc<AppConfig>) -> Router {
    // All scheduling operations require authentication
    let protected_routes = Router::new()
        // Slot generation and advisory conflict pre-check
        .route("/slots", get(handlers::get_slots))
        .route("/conflicts/check", get(handlers::check_conflicts))
        // Booking and lookups
        .route("/", post(handlers::book_appointment))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/patients/{patient_id}", get(handlers::get_patient_appointments))
        .route("/on/{date}", get(handlers::get_day_appointments))
        // State machine
        .route("/{appointment_id}/transition", post(handlers::transition_appointment))
        .route("/{appointment_id}/patient-status", patch(handlers::update_patient_status))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
