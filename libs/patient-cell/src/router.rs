use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_utils::extractor::staff_only;
use shared_utils::AppState;

use crate::handlers::*;

/// Mounted under `/admin/patients`.
pub fn patient_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/guests", get(list_guests))
        .route("/{patient_id}", get(get_patient))
        .layer(middleware::from_fn_with_state(state.clone(), staff_only))
        .with_state(state)
}
