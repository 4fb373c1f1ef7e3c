use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{AvailabilityQuery, StartVisitRequest};
use crate::services::VisitIntake;

#[axum::debug_handler]
pub async fn start_visit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartVisitRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let intake = VisitIntake::from_config(&state.config);
    let outcome = intake.start_visit(state.store.as_ref(), request, Utc::now()).await?;

    Ok((StatusCode::CREATED, Json(json!(outcome))))
}

#[axum::debug_handler]
pub async fn check_availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let intake = VisitIntake::from_config(&state.config);
    let check = intake.check_availability(state.store.as_ref(), &query).await?;

    Ok(Json(json!(check)))
}
