pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use router::{appointment_routes, booking_routes, staff_booking_routes};
pub use services::{BookingService, MonthCalendar, SlotGrid};
