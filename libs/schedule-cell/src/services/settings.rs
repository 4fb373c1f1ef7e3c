use chrono::{Duration, NaiveDate};
use tracing::{info, instrument};
use uuid::Uuid;

use shared_database::{ClinicReader, ClinicStore};
use shared_models::clinic::{ClinicDaySchedule, ClinicHoliday};
use shared_models::error::SchedulingError;

use crate::models::{ClinicSettings, CreateHolidayRequest, UpdateScheduleRequest};

pub struct SettingsService;

impl SettingsService {
    /// Weekly schedule plus holidays from a year back to two years ahead.
    pub async fn get_settings<R>(reader: &R, today: NaiveDate) -> Result<ClinicSettings, SchedulingError>
    where
        R: ClinicReader + ?Sized,
    {
        let schedules = reader.list_day_schedules().await?;
        let holidays = reader
            .list_holidays(today - Duration::days(365), today + Duration::days(730))
            .await?;

        Ok(ClinicSettings { schedules, holidays })
    }

    #[instrument(skip(store, request), fields(days = request.days.len()))]
    pub async fn update_schedule(
        store: &dyn ClinicStore,
        request: UpdateScheduleRequest,
    ) -> Result<Vec<ClinicDaySchedule>, SchedulingError> {
        if request.days.is_empty() {
            return Err(SchedulingError::Validation("No schedule days supplied".to_string()));
        }

        for day in &request.days {
            if day.day_of_week > 6 {
                return Err(SchedulingError::Validation(format!(
                    "day_of_week must be between 0 (Sunday) and 6 (Saturday), got {}",
                    day.day_of_week
                )));
            }
            if day.staff_open_time.is_some() != day.staff_close_time.is_some() {
                return Err(SchedulingError::Validation(
                    "Staff booking window needs both a start and an end".to_string(),
                ));
            }
        }

        let mut tx = store.begin().await?;
        let mut saved = Vec::with_capacity(request.days.len());
        for day in request.days {
            saved.push(tx.upsert_day_schedule(ClinicDaySchedule::from(day)).await?);
        }
        tx.commit().await?;

        info!("Updated {} weekly schedule day(s)", saved.len());
        Ok(saved)
    }

    #[instrument(skip(store, request), fields(date = %request.date))]
    pub async fn create_holiday(
        store: &dyn ClinicStore,
        request: CreateHolidayRequest,
        today: NaiveDate,
    ) -> Result<ClinicHoliday, SchedulingError> {
        let label = request.label.trim();
        if label.is_empty() {
            return Err(SchedulingError::Validation("Holiday label is required".to_string()));
        }
        if request.date <= today {
            return Err(SchedulingError::Validation(
                "Holiday date must be after today".to_string(),
            ));
        }

        let mut tx = store.begin().await?;
        if tx.find_holiday(request.date).await?.is_some() {
            return Err(SchedulingError::Validation(format!(
                "A holiday on {} already exists",
                request.date
            )));
        }

        let holiday = tx
            .create_holiday(ClinicHoliday {
                id: Uuid::new_v4(),
                date: request.date,
                label: label.to_string(),
            })
            .await?;
        tx.commit().await?;

        info!("Holiday '{}' added on {}", holiday.label, holiday.date);
        Ok(holiday)
    }

    pub async fn delete_holiday(store: &dyn ClinicStore, holiday_id: Uuid) -> Result<(), SchedulingError> {
        let mut tx = store.begin().await?;
        tx.delete_holiday(holiday_id).await?;
        tx.commit().await?;

        info!("Holiday {} removed", holiday_id);
        Ok(())
    }
}
