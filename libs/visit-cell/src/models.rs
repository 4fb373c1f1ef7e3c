use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use schedule_cell::ConflictOutcome;
use shared_models::clinic::{Appointment, BusyInterval, Patient, PatientRef, Visit};

/// Walk-ins with no stated length block the doctor for this long.
pub const DEFAULT_WALK_IN_MINUTES: i32 = 90;

/// Upper bound for a single walk-in, in minutes.
pub const MAX_VISIT_MINUTES: i32 = 8 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VisitSource {
    /// Check-in for an existing booking.
    Appointment { appointment_id: Uuid },
    /// Unbooked visit; starts now unless `visit_date` is given.
    WalkIn {
        doctor_id: Uuid,
        visit_date: Option<DateTime<Utc>>,
        duration_minutes: Option<i32>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartVisitRequest {
    /// Optional for appointment check-ins; derived from the booking when absent.
    pub patient: Option<PatientRef>,
    pub source: VisitSource,
    pub symptoms: Option<String>,
    pub notes: Option<String>,
}

/// A future walk-in entered by staff for someone without a booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleWalkInRequest {
    pub patient: PatientRef,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub symptoms: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VisitOutcome {
    pub visit: Visit,
    pub patient: Patient,
    pub patient_created: bool,
    pub relinked_appointments: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_appointment: Option<Appointment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityCheck {
    pub doctor_id: Uuid,
    pub available: bool,
    pub on_leave: bool,
    #[serde(flatten)]
    pub outcome: ConflictOutcome,
    pub busy: Vec<BusyInterval>,
}
