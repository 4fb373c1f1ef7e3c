use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use schedule_cell::{BookingRole, SchedulingRules};
use shared_models::auth::{CurrentUser, User};
use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{
    MonthQuery, PublicBookingRequest, SlotQuery, StaffBooking, StaffBookingRequest,
    UpdateAppointmentRequest, UpdateStatusRequest,
};
use crate::services::{BookingService, MonthCalendar, SlotGrid};

// ==============================================================================
// PUBLIC BOOKING
// ==============================================================================

#[axum::debug_handler]
pub async fn public_slots(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let grid = SlotGrid::new(SchedulingRules::from_config(&state.config));
    let slots = grid
        .generate(state.store.as_ref(), query.date, query.duration, BookingRole::Public, Utc::now())
        .await?;

    Ok(Json(json!(slots)))
}

#[axum::debug_handler]
pub async fn month_calendar(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<Value>, AppError> {
    let days = MonthCalendar::view(state.store.as_ref(), query.year, query.month, query.doctor_id).await?;

    Ok(Json(json!({
        "year": query.year,
        "month": query.month,
        "doctor_id": query.doctor_id,
        "days": days
    })))
}

#[axum::debug_handler]
pub async fn create_public_booking(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<PublicBookingRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = BookingService::from_config(&state.config);
    let appointment = service
        .create_public(state.store.as_ref(), request, current.0.as_ref(), Utc::now())
        .await?;

    let message = if appointment.is_guest() {
        "Booking created successfully! We will contact you shortly."
    } else {
        "Booking created successfully!"
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "appointment": appointment,
            "message": message
        })),
    ))
}

// ==============================================================================
// STAFF BOOKING
// ==============================================================================

#[axum::debug_handler]
pub async fn staff_slots(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let grid = SlotGrid::new(SchedulingRules::from_config(&state.config));
    let slots = grid
        .generate(state.store.as_ref(), query.date, query.duration, BookingRole::Staff, Utc::now())
        .await?;

    Ok(Json(json!(slots)))
}

#[axum::debug_handler]
pub async fn create_staff_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<StaffBookingRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = BookingService::from_config(&state.config);
    let booking = service.create_staff(state.store.as_ref(), request, Utc::now()).await?;

    let message = match &booking {
        StaffBooking::Appointment { appointment } => {
            info!("Staff {} booked appointment {}", user.id, appointment.id);
            "Booking created successfully!"
        }
        StaffBooking::WalkInVisit(outcome) => {
            info!("Staff {} scheduled walk-in visit {}", user.id, outcome.visit.id);
            "Walk-in visit created (no booking generated)"
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "booking": booking,
            "message": message
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::from_config(&state.config);
    let appointment = service.get(state.store.as_ref(), appointment_id).await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::from_config(&state.config);
    let appointment = service
        .update(state.store.as_ref(), appointment_id, request, Utc::now())
        .await?;

    Ok(Json(json!({
        "appointment": appointment,
        "message": "Booking updated successfully!"
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::from_config(&state.config);
    let appointment = service
        .update_status(state.store.as_ref(), appointment_id, request.status)
        .await?;

    Ok(Json(json!(appointment)))
}
