use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use shared_models::clinic::{BusyInterval, Doctor};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorSearchQuery {
    pub specialty: Option<String>,
    /// Doctors on leave are listed unless this is `false`.
    pub include_on_leave: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusyQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetLeaveRequest {
    pub is_on_leave: bool,
    pub leave_reason: Option<String>,
}

/// One doctor's merged appointment and walk-in timeline for a day.
#[derive(Debug, Clone, Serialize)]
pub struct DoctorDaySchedule {
    pub doctor: Doctor,
    pub date: NaiveDate,
    pub intervals: Vec<BusyInterval>,
    /// `HH:MM-HH:MM`, nominal spans.
    pub busy_slots: Vec<String>,
}
