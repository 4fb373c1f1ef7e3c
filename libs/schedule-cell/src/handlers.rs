use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{CreateHolidayRequest, UpdateScheduleRequest};
use crate::services::{ClinicClock, SettingsService};

#[axum::debug_handler]
pub async fn get_settings(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let today = ClinicClock::from_config(&state.config).today();
    let settings = SettingsService::get_settings(state.store.as_ref(), today).await?;

    Ok(Json(json!(settings)))
}

#[axum::debug_handler]
pub async fn update_schedule(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let schedules = SettingsService::update_schedule(state.store.as_ref(), request).await?;

    Ok(Json(json!({
        "schedules": schedules,
        "message": "Clinic schedule updated"
    })))
}

#[axum::debug_handler]
pub async fn create_holiday(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateHolidayRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let today = ClinicClock::from_config(&state.config).today();
    let holiday = SettingsService::create_holiday(state.store.as_ref(), request, today).await?;

    Ok((StatusCode::CREATED, Json(json!(holiday))))
}

#[axum::debug_handler]
pub async fn delete_holiday(
    State(state): State<Arc<AppState>>,
    Path(holiday_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    SettingsService::delete_holiday(state.store.as_ref(), holiday_id).await?;

    Ok(Json(json!({
        "message": "Holiday deleted"
    })))
}
