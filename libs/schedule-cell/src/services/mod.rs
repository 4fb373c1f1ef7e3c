pub mod availability;
pub mod calendar;
pub mod clock;
pub mod conflict;
pub mod settings;

pub use availability::AvailabilityIndex;
pub use calendar::{weekday_index, ClinicCalendar};
pub use clock::ClinicClock;
pub use conflict::{ConflictChecker, ConflictOutcome};
pub use settings::SettingsService;
