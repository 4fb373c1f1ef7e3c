use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::staff_only;
use shared_utils::AppState;

use crate::handlers::*;

/// Mounted under `/admin/visits`.
pub fn visit_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(start_visit))
        .route("/availability", get(check_availability))
        .layer(middleware::from_fn_with_state(state.clone(), staff_only))
        .with_state(state)
}
