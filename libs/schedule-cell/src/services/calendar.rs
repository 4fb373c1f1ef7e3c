use chrono::{Datelike, Duration, NaiveDate};
use tracing::debug;

use shared_database::ClinicReader;
use shared_models::clinic::{ClinicDaySchedule, ClinicHoliday};
use shared_models::error::SchedulingError;

use crate::models::{BookingRole, ClinicWindow, OpenStatus, WEEKLY_CLOSED_REASON};

/// 0 = Sunday .. 6 = Saturday, matching `ClinicDaySchedule::day_of_week`.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

pub struct ClinicCalendar;

impl ClinicCalendar {
    /// Decides whether the clinic is open from already-loaded reference data.
    pub fn evaluate(
        date: NaiveDate,
        holiday: Option<&ClinicHoliday>,
        schedule: Option<&ClinicDaySchedule>,
        role: BookingRole,
    ) -> OpenStatus {
        if let Some(holiday) = holiday {
            return OpenStatus::closed(date, holiday.label.clone());
        }

        let schedule = match schedule {
            Some(schedule) if schedule.is_open => schedule,
            _ => return OpenStatus::closed(date, WEEKLY_CLOSED_REASON),
        };

        let (open, close) = match (role, schedule.staff_open_time, schedule.staff_close_time) {
            (BookingRole::Staff, Some(open), Some(close)) => (open, close),
            _ => (schedule.open_time, schedule.close_time),
        };

        let start = date.and_time(open);
        let mut end = date.and_time(close);
        if end <= start {
            end += Duration::days(1);
        }

        OpenStatus::open(date, ClinicWindow { start, end })
    }

    pub async fn is_open<R>(reader: &R, date: NaiveDate, role: BookingRole) -> Result<OpenStatus, SchedulingError>
    where
        R: ClinicReader + ?Sized,
    {
        let holiday = reader.find_holiday(date).await?;
        let schedule = if holiday.is_some() {
            None
        } else {
            reader.find_day_schedule(weekday_index(date)).await?
        };

        let status = Self::evaluate(date, holiday.as_ref(), schedule.as_ref(), role);
        debug!("Clinic on {} for {:?}: open={} reason={:?}", date, role, status.open, status.reason);
        Ok(status)
    }

    /// Like [`Self::is_open`] but a closed day becomes `SchedulingError::ClosedDay`.
    pub async fn require_open<R>(reader: &R, date: NaiveDate, role: BookingRole) -> Result<ClinicWindow, SchedulingError>
    where
        R: ClinicReader + ?Sized,
    {
        let status = Self::is_open(reader, date, role).await?;
        status.window().ok_or_else(|| SchedulingError::ClosedDay {
            date,
            reason: status
                .reason
                .unwrap_or_else(|| WEEKLY_CLOSED_REASON.to_string()),
        })
    }

    /// Open status for every day in `[from, to]`, reading reference data once.
    pub async fn month_view<R>(
        reader: &R,
        from: NaiveDate,
        to: NaiveDate,
        role: BookingRole,
    ) -> Result<Vec<OpenStatus>, SchedulingError>
    where
        R: ClinicReader + ?Sized,
    {
        let holidays = reader.list_holidays(from, to).await?;
        let schedules = reader.list_day_schedules().await?;

        let days = from
            .iter_days()
            .take_while(|day| *day <= to)
            .map(|day| {
                let holiday = holidays.iter().find(|h| h.date == day);
                let schedule = schedules.iter().find(|s| s.day_of_week == weekday_index(day));
                Self::evaluate(day, holiday, schedule, role)
            })
            .collect();

        Ok(days)
    }
}
