use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Appointment lengths offered by the booking forms.
pub const ALLOWED_DURATIONS: [i32; 3] = [30, 60, 90];

pub fn is_allowed_duration(minutes: i32) -> bool {
    ALLOWED_DURATIONS.contains(&minutes)
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Pending and confirmed appointments hold their slot.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;

        match (self, next) {
            (current, target) if *current == target => true,
            (Pending, Confirmed) => true,
            (Pending, Completed) | (Confirmed, Completed) => true,
            (Pending, Cancelled) | (Confirmed, Cancelled) => true,
            _ => false,
        }
    }

    pub fn active() -> Vec<AppointmentStatus> {
        vec![AppointmentStatus::Pending, AppointmentStatus::Confirmed]
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A scheduled clinical slot. Date and start time are clinic-local wall clock values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub guest_name: Option<String>,
    pub guest_phone: Option<String>,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub symptoms: String,
    pub price: Option<f64>,
    pub is_staff_booked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn local_start(&self) -> NaiveDateTime {
        self.appointment_date.and_time(self.start_time)
    }

    pub fn local_end(&self) -> NaiveDateTime {
        self.local_start() + Duration::minutes(self.duration_minutes as i64)
    }

    pub fn is_guest(&self) -> bool {
        self.patient_id.is_none()
    }

    /// Guest identity carried on the appointment, if both parts are present.
    pub fn guest_contact(&self) -> Option<(&str, &str)> {
        match (self.guest_name.as_deref(), self.guest_phone.as_deref()) {
            (Some(name), Some(phone)) => Some((name, phone)),
            _ => None,
        }
    }
}

// ==============================================================================
// VISITS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    Pending,
    Ongoing,
    Completed,
    Cancelled,
}

impl VisitStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, VisitStatus::Pending | VisitStatus::Ongoing)
    }

    pub fn active() -> Vec<VisitStatus> {
        vec![VisitStatus::Ongoing, VisitStatus::Pending]
    }
}

impl fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisitStatus::Pending => write!(f, "pending"),
            VisitStatus::Ongoing => write!(f, "ongoing"),
            VisitStatus::Completed => write!(f, "completed"),
            VisitStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// An actual encounter. `visit_date` is an absolute instant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Visit {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub visit_date: DateTime<Utc>,
    pub time_in: Option<DateTime<Utc>>,
    pub duration_minutes: i32,
    pub status: VisitStatus,
    pub symptoms: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Visit {
    pub fn is_walk_in(&self) -> bool {
        self.appointment_id.is_none()
    }
}

// ==============================================================================
// CLINIC REFERENCE DATA
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClinicDaySchedule {
    /// 0 = Sunday .. 6 = Saturday
    pub day_of_week: u8,
    pub is_open: bool,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub staff_open_time: Option<NaiveTime>,
    pub staff_close_time: Option<NaiveTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClinicHoliday {
    pub id: Uuid,
    pub date: NaiveDate,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub specialty: Option<String>,
    pub user_id: Option<Uuid>,
    pub is_on_leave: bool,
    pub leave_reason: Option<String>,
}

/// A permanent patient identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: Uuid,
    /// Medical record number, `HN-ddMMyyyy-NNNN`.
    pub hn: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password_hash: String,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
}

/// Who a visit or staff booking is for.
///
/// `Guest` carries the id of an appointment booked without an account;
/// `Contact` is a person at the front desk with no prior booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PatientRef {
    Registered(Uuid),
    Guest(Uuid),
    Contact { name: String, phone: String },
}

// ==============================================================================
// BUSY INTERVALS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IntervalSource {
    Appointment,
    WalkIn,
}

impl fmt::Display for IntervalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntervalSource::Appointment => write!(f, "Booked"),
            IntervalSource::WalkIn => write!(f, "Walk-in"),
        }
    }
}

/// A span during which a doctor is blocked, in clinic-local wall clock.
///
/// `start..end` includes the turnover buffer and is what overlap tests use;
/// `display_end` is the nominal end shown to people.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusyInterval {
    pub doctor_id: Uuid,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub display_end: NaiveDateTime,
    pub source_kind: IntervalSource,
    pub source_id: Uuid,
}

impl BusyInterval {
    /// `HH:MM-HH:MM` of the nominal span.
    pub fn label(&self) -> String {
        format!(
            "{}-{}",
            self.start.format("%H:%M"),
            self.display_end.format("%H:%M")
        )
    }

    pub fn reason(&self) -> String {
        format!("{} {}", self.source_kind, self.label())
    }
}
