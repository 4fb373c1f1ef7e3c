use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use schedule_cell::SchedulingRules;
use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{BusyQuery, DoctorSearchQuery, SetLeaveRequest};
use crate::services::DoctorRoster;

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DoctorSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let doctors = DoctorRoster::list(state.store.as_ref(), &query).await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor = DoctorRoster::get(state.store.as_ref(), doctor_id).await?;

    Ok(Json(json!(doctor)))
}

// ==============================================================================
// STAFF HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn doctor_busy(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<BusyQuery>,
) -> Result<Json<Value>, AppError> {
    let rules = SchedulingRules::from_config(&state.config);
    let schedule = DoctorRoster::day_schedule(state.store.as_ref(), rules, doctor_id, query.date).await?;

    Ok(Json(json!(schedule)))
}

#[axum::debug_handler]
pub async fn set_leave(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<SetLeaveRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor = DoctorRoster::set_leave(state.store.as_ref(), doctor_id, request).await?;

    let message = if doctor.is_on_leave {
        "Doctor marked as on leave"
    } else {
        "Doctor is available again"
    };

    Ok(Json(json!({
        "doctor": doctor,
        "message": message
    })))
}
