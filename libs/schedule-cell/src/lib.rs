pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{BookingRole, ClinicWindow, OpenStatus, SchedulingRules};
pub use services::{
    weekday_index, AvailabilityIndex, ClinicCalendar, ClinicClock, ConflictChecker,
    ConflictOutcome, SettingsService,
};
