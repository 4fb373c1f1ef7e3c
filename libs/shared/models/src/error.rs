use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::clinic::{BusyInterval, IntervalSource};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Database(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        if status.is_server_error() {
            tracing::error!("Error: {}: {}", status, message);
        } else {
            tracing::warn!("Request rejected: {}: {}", status, message);
        }

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

// ==============================================================================
// SCHEDULING OUTCOMES
// ==============================================================================

/// The interval that made a candidate slot unavailable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConflictDetail {
    pub doctor_id: Uuid,
    pub source_kind: IntervalSource,
    pub source_id: Uuid,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl From<&BusyInterval> for ConflictDetail {
    fn from(interval: &BusyInterval) -> Self {
        Self {
            doctor_id: interval.doctor_id,
            source_kind: interval.source_kind,
            source_id: interval.source_id,
            start: interval.start,
            end: interval.display_end,
        }
    }
}

impl fmt::Display for ConflictDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "doctor {} is not available ({} {}-{})",
            self.doctor_id,
            self.source_kind,
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulingError {
    #[error("Clinic is closed on {date}: {reason}")]
    ClosedDay { date: NaiveDate, reason: String },

    #[error("Scheduling conflict: {0}")]
    Conflict(ConflictDetail),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Transaction failed, please retry with fresh availability: {0}")]
    TransactionFailure(String),

    #[error("{0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Store(String),
}

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        let message = err.to_string();
        match err {
            SchedulingError::ClosedDay { .. } => AppError::Unprocessable(message),
            SchedulingError::Conflict(_) => AppError::Conflict(message),
            SchedulingError::NotFound(_) => AppError::NotFound(message),
            SchedulingError::TransactionFailure(_) => AppError::Conflict(message),
            SchedulingError::Validation(_) => AppError::ValidationError(message),
            SchedulingError::Store(_) => AppError::Database(message),
        }
    }
}
