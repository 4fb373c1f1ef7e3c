use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use schedule_cell::{AvailabilityIndex, SchedulingRules};
use shared_database::{ClinicReader, ClinicStore};
use shared_models::clinic::{BusyInterval, Doctor};
use shared_models::error::SchedulingError;

use crate::models::{DoctorDaySchedule, DoctorSearchQuery, SetLeaveRequest};

pub struct DoctorRoster;

impl DoctorRoster {
    pub async fn list<R>(reader: &R, query: &DoctorSearchQuery) -> Result<Vec<Doctor>, SchedulingError>
    where
        R: ClinicReader + ?Sized,
    {
        let specialty = query
            .specialty
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        let include_on_leave = query.include_on_leave.unwrap_or(true);

        let mut doctors: Vec<Doctor> = reader
            .list_doctors()
            .await?
            .into_iter()
            .filter(|doctor| include_on_leave || !doctor.is_on_leave)
            .filter(|doctor| match &specialty {
                Some(wanted) => doctor
                    .specialty
                    .as_deref()
                    .map(|s| s.to_lowercase().contains(wanted))
                    .unwrap_or(false),
                None => true,
            })
            .collect();
        doctors.sort_by(|a, b| a.name.cmp(&b.name));

        debug!("Listing {} doctor(s)", doctors.len());
        Ok(doctors)
    }

    pub async fn get<R>(reader: &R, doctor_id: Uuid) -> Result<Doctor, SchedulingError>
    where
        R: ClinicReader + ?Sized,
    {
        reader
            .find_doctor(doctor_id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound("Doctor".to_string()))
    }

    #[instrument(skip(reader, rules))]
    pub async fn day_schedule<R>(
        reader: &R,
        rules: SchedulingRules,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<DoctorDaySchedule, SchedulingError>
    where
        R: ClinicReader + ?Sized,
    {
        let doctor = Self::get(reader, doctor_id).await?;
        let next_midnight = date.and_time(NaiveTime::MIN) + Duration::days(1);
        let mut intervals = AvailabilityIndex::new(rules)
            .busy_intervals(reader, doctor_id, date, None)
            .await?;
        intervals.retain(|interval| interval.start < next_midnight);
        let busy_slots = intervals.iter().map(BusyInterval::label).collect();

        Ok(DoctorDaySchedule {
            doctor,
            date,
            intervals,
            busy_slots,
        })
    }

    /// Existing bookings are left alone; the doctor just stops being bookable.
    pub async fn set_leave(
        store: &dyn ClinicStore,
        doctor_id: Uuid,
        request: SetLeaveRequest,
    ) -> Result<Doctor, SchedulingError> {
        let reason = if request.is_on_leave {
            request
                .leave_reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
        } else {
            None
        };

        let mut tx = store.begin().await?;
        let doctor = tx.set_doctor_leave(doctor_id, request.is_on_leave, reason).await?;
        tx.commit().await?;

        info!(
            "Doctor {} leave set to {} ({:?})",
            doctor.name, doctor.is_on_leave, doctor.leave_reason
        );
        Ok(doctor)
    }
}
