use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::clinic::{Appointment, Patient, Visit};

/// Outcome of turning a `PatientRef` into a permanent identity.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedPatient {
    pub patient: Patient,
    /// A new identity was registered during resolution.
    pub created: bool,
    /// Guest appointments that now point at this identity.
    pub relinked_appointments: usize,
}

/// One unregistered person as seen through their bookings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuestSummary {
    pub name: String,
    pub phone: String,
    /// Id of the latest appointment, usable as `PatientRef::Guest`.
    pub guest_token: Uuid,
    pub appointment_count: usize,
    pub last_appointment_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientRecord {
    pub patient: Patient,
    pub appointments: Vec<Appointment>,
    pub visits: Vec<Visit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GuestListQuery {
    pub search: Option<String>,
}
