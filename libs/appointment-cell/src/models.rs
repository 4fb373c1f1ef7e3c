use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::clinic::{Appointment, AppointmentStatus, PatientRef};
use visit_cell::VisitOutcome;

/// A day with this many active bookings for the chosen doctor shows as full.
pub const FULL_DAY_THRESHOLD: usize = 8;

pub const ON_LEAVE_REASON: &str = "On leave";

// ==============================================================================
// SLOT GRID
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
    pub duration: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorSlot {
    pub id: Uuid,
    pub name: String,
    pub specialty: Option<String>,
    pub status: SlotStatus,
    pub reason: Option<String>,
    /// Nominal `HH:MM-HH:MM` spans the doctor is booked for.
    pub busy_slots: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRow {
    /// `HH:MM`
    pub time: String,
    pub start: NaiveDateTime,
    pub doctors: Vec<DoctorSlot>,
}

impl SlotRow {
    pub fn doctor(&self, doctor_id: Uuid) -> Option<&DoctorSlot> {
        self.doctors.iter().find(|d| d.id == doctor_id)
    }
}

// ==============================================================================
// MONTH CALENDAR
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct MonthQuery {
    pub year: i32,
    pub month: u32,
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Closed,
    Available,
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub status: DayStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

// ==============================================================================
// BOOKING REQUESTS
// ==============================================================================

/// Booking from the public site. Guests supply name and phone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicBookingRequest {
    pub doctor_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub symptoms: String,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffBookingRequest {
    pub patient: PatientRef,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub symptoms: String,
    pub price: Option<f64>,
}

/// Staff bookings for unregistered contacts produce a visit, not an appointment.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StaffBooking {
    Appointment { appointment: Appointment },
    WalkInVisit(VisitOutcome),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub symptoms: String,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}
