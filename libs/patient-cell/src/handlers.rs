use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::GuestListQuery;
use crate::services::PatientDirectory;

#[axum::debug_handler]
pub async fn list_guests(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GuestListQuery>,
) -> Result<Json<Value>, AppError> {
    let guests = PatientDirectory::list_guests(state.store.as_ref(), query.search.as_deref()).await?;

    Ok(Json(json!({
        "guests": guests,
        "total": guests.len()
    })))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let record = PatientDirectory::get_record(state.store.as_ref(), patient_id).await?;

    Ok(Json(json!(record)))
}
