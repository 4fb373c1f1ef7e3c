use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_utils::extractor::{optional_auth_middleware, staff_only};
use shared_utils::AppState;

use crate::handlers;

/// Mounted under `/booking`. Signing in is optional.
pub fn booking_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handlers::create_public_booking))
        .route("/slots", get(handlers::public_slots))
        .route("/calendar", get(handlers::month_calendar))
        .layer(middleware::from_fn_with_state(state.clone(), optional_auth_middleware))
        .with_state(state)
}

/// Mounted under `/admin/booking`.
pub fn staff_booking_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/slots", get(handlers::staff_slots))
        .layer(middleware::from_fn_with_state(state.clone(), staff_only))
        .with_state(state)
}

/// Mounted under `/admin/appointments`.
pub fn appointment_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handlers::create_staff_booking))
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment).put(handlers::update_appointment),
        )
        .route("/{appointment_id}/status", patch(handlers::update_appointment_status))
        .layer(middleware::from_fn_with_state(state.clone(), staff_only))
        .with_state(state)
}
