use std::collections::HashMap;

use chrono::{Months, NaiveDate};
use tracing::{debug, instrument};
use uuid::Uuid;

use schedule_cell::{BookingRole, ClinicCalendar};
use shared_database::{AppointmentFilter, ClinicReader};
use shared_models::error::SchedulingError;

use crate::models::{DayAvailability, DayStatus, FULL_DAY_THRESHOLD};

pub struct MonthCalendar;

impl MonthCalendar {
    /// Closed/available/full for each day of a month. Without a doctor no day is full.
    #[instrument(skip(reader))]
    pub async fn view<R>(
        reader: &R,
        year: i32,
        month: u32,
        doctor_id: Option<Uuid>,
    ) -> Result<Vec<DayAvailability>, SchedulingError>
    where
        R: ClinicReader + ?Sized,
    {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| SchedulingError::Validation(format!("Invalid month {}-{}", year, month)))?;
        let last = first
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .ok_or_else(|| SchedulingError::Validation(format!("Invalid month {}-{}", year, month)))?;

        let mut counts: HashMap<NaiveDate, usize> = HashMap::new();
        if let Some(doctor_id) = doctor_id {
            let filter = AppointmentFilter::new().doctor(doctor_id).between(first, last).active();
            for appointment in reader.find_appointments(&filter).await? {
                *counts.entry(appointment.appointment_date).or_default() += 1;
            }
        }

        let days = ClinicCalendar::month_view(reader, first, last, BookingRole::Public)
            .await?
            .into_iter()
            .map(|day| {
                if !day.open {
                    return DayAvailability {
                        date: day.date,
                        status: DayStatus::Closed,
                        reason: day.reason,
                        count: None,
                    };
                }

                let count = counts.get(&day.date).copied().unwrap_or(0);
                let status = if doctor_id.is_some() && count >= FULL_DAY_THRESHOLD {
                    DayStatus::Full
                } else {
                    DayStatus::Available
                };
                DayAvailability {
                    date: day.date,
                    status,
                    reason: None,
                    count: Some(count),
                }
            })
            .collect::<Vec<_>>();

        debug!("Month {}-{:02}: {} day(s)", year, month, days.len());
        Ok(days)
    }
}
