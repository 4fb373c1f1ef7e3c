use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

use shared_config::AppConfig;

/// Converts between stored UTC instants and the clinic's wall clock.
///
/// Appointments are recorded as local date + time, visits as UTC instants;
/// every comparison between the two goes through here first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClinicClock {
    offset: FixedOffset,
}

impl ClinicClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.clinic_utc_offset)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.offset).naive_local()
    }

    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        let utc = local - Duration::seconds(self.offset.local_minus_utc() as i64);
        Utc.from_utc_datetime(&utc)
    }

    pub fn now_local(&self) -> NaiveDateTime {
        self.to_local(Utc::now())
    }

    pub fn today(&self) -> NaiveDate {
        self.now_local().date()
    }

    /// `[start, end)` in UTC covering the local calendar day.
    pub fn day_bounds_utc(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = date.and_time(chrono::NaiveTime::MIN);
        (self.to_utc(start), self.to_utc(start + Duration::days(1)))
    }
}

impl Default for ClinicClock {
    fn default() -> Self {
        Self::new(shared_config::default_clinic_offset())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utc_evening_is_next_local_morning() {
        let clock = ClinicClock::default();
        let instant = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();

        let local = clock.to_local(instant);
        assert_eq!(local.date(), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(local.format("%H:%M").to_string(), "03:00");
        assert_eq!(clock.to_utc(local), instant);
    }

    #[test]
    fn day_bounds_are_shifted_by_the_offset() {
        let clock = ClinicClock::default();
        let (start, end) = clock.day_bounds_utc(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());

        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 1, 17, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 3, 2, 17, 0, 0).unwrap());
    }
}
