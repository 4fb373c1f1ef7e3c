use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use shared_config::AppConfig;
use shared_models::clinic::{ClinicDaySchedule, ClinicHoliday};

use crate::services::ClinicClock;

pub const WEEKLY_CLOSED_REASON: &str = "Clinic is closed on this day of the week";

/// Which booking window applies to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookingRole {
    #[default]
    Public,
    Staff,
}

/// Bookable span of one clinic day, clinic-local. `end` may fall on the next day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenStatus {
    pub date: NaiveDate,
    pub open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_start: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_end: Option<NaiveDateTime>,
}

impl OpenStatus {
    pub fn closed(date: NaiveDate, reason: impl Into<String>) -> Self {
        Self {
            date,
            open: false,
            reason: Some(reason.into()),
            window_start: None,
            window_end: None,
        }
    }

    pub fn open(date: NaiveDate, window: ClinicWindow) -> Self {
        Self {
            date,
            open: true,
            reason: None,
            window_start: Some(window.start),
            window_end: Some(window.end),
        }
    }

    pub fn window(&self) -> Option<ClinicWindow> {
        match (self.open, self.window_start, self.window_end) {
            (true, Some(start), Some(end)) => Some(ClinicWindow { start, end }),
            _ => None,
        }
    }
}

// ==============================================================================
// SETTINGS REQUESTS / RESPONSES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayScheduleInput {
    pub day_of_week: u8,
    pub is_open: bool,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub staff_open_time: Option<NaiveTime>,
    pub staff_close_time: Option<NaiveTime>,
}

impl From<DayScheduleInput> for ClinicDaySchedule {
    fn from(input: DayScheduleInput) -> Self {
        Self {
            day_of_week: input.day_of_week,
            is_open: input.is_open,
            open_time: input.open_time,
            close_time: input.close_time,
            staff_open_time: input.staff_open_time,
            staff_close_time: input.staff_close_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateScheduleRequest {
    pub days: Vec<DayScheduleInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateHolidayRequest {
    pub date: NaiveDate,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicSettings {
    pub schedules: Vec<ClinicDaySchedule>,
    pub holidays: Vec<ClinicHoliday>,
}

// ==============================================================================
// SCHEDULING RULES
// ==============================================================================

/// Tunables shared by every availability computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulingRules {
    /// Turnover time appended to every interval, blockers and candidates alike.
    pub buffer: Duration,
    pub slot_step: Duration,
    pub clock: ClinicClock,
}

impl SchedulingRules {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            buffer: Duration::minutes(config.booking_buffer_minutes),
            slot_step: Duration::minutes(config.slot_step_minutes.max(1)),
            clock: ClinicClock::from_config(config),
        }
    }
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}
