use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch},
    Router,
};

use shared_utils::extractor::staff_only;
use shared_utils::AppState;

use crate::handlers;

/// Mounted under `/doctors`.
pub fn doctor_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .with_state(state)
}

/// Mounted under `/admin/doctors`.
pub fn admin_doctor_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/{doctor_id}/busy", get(handlers::doctor_busy))
        .route("/{doctor_id}/leave", patch(handlers::set_leave))
        .layer(middleware::from_fn_with_state(state.clone(), staff_only))
        .with_state(state)
}
