pub mod booking;
pub mod month;
pub mod slots;

pub use booking::BookingService;
pub use month::MonthCalendar;
pub use slots::SlotGrid;
