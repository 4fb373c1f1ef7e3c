use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put, delete},
    middleware,
};

use shared_utils::extractor::staff_only;
use shared_utils::AppState;

use crate::handlers;

/// Mounted under `/admin/settings`.
pub fn settings_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::get_settings))
        .route("/schedule", put(handlers::update_schedule))
        .route("/holidays", post(handlers::create_holiday))
        .route("/holidays/{holiday_id}", delete(handlers::delete_holiday))
        .layer(middleware::from_fn_with_state(state.clone(), staff_only))
        .with_state(state)
}
