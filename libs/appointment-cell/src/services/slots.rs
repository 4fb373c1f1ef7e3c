use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument};

use schedule_cell::{AvailabilityIndex, BookingRole, ClinicCalendar, ConflictChecker, SchedulingRules};
use shared_database::ClinicReader;
use shared_models::clinic::{is_allowed_duration, BusyInterval, Doctor, ALLOWED_DURATIONS};
use shared_models::error::SchedulingError;

use crate::models::{DoctorSlot, SlotRow, SlotStatus, ON_LEAVE_REASON};

/// Builds the per-slot, per-doctor availability grid shown to bookers.
#[derive(Debug, Clone, Copy)]
pub struct SlotGrid {
    rules: SchedulingRules,
}

impl SlotGrid {
    pub fn new(rules: SchedulingRules) -> Self {
        Self { rules }
    }

    #[instrument(skip(self, reader))]
    pub async fn generate<R>(
        &self,
        reader: &R,
        date: NaiveDate,
        duration_minutes: i32,
        role: BookingRole,
        now: DateTime<Utc>,
    ) -> Result<Vec<SlotRow>, SchedulingError>
    where
        R: ClinicReader + ?Sized,
    {
        validate_duration(duration_minutes)?;

        let now_local = self.rules.clock.to_local(now);
        let today = now_local.date();
        if role == BookingRole::Public && date < today {
            return Err(SchedulingError::Validation("Date must be today or later".to_string()));
        }

        let window = ClinicCalendar::require_open(reader, date, role).await?;

        let mut doctors = reader.list_doctors().await?;
        doctors.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        let (from, _) = AvailabilityIndex::neighbourhood(window.start.date());
        let mut busy = AvailabilityIndex::new(self.rules)
            .busy_by_doctor(reader, from, window.end.date())
            .await?;
        let checker = ConflictChecker::new(self.rules.buffer);

        let schedules: Vec<(Doctor, Vec<BusyInterval>)> = doctors
            .into_iter()
            .map(|doctor| {
                let mut intervals = busy.remove(&doctor.id).unwrap_or_default();
                intervals.retain(|interval| interval.end > window.start);
                (doctor, intervals)
            })
            .collect();

        let mut rows = Vec::new();
        let mut slot = window.start;
        while slot <= window.end {
            let start = slot;
            slot += self.rules.slot_step;

            if date == today && start < now_local {
                continue;
            }

            let doctors = schedules
                .iter()
                .map(|(doctor, intervals)| {
                    let busy_slots: Vec<String> = intervals.iter().map(BusyInterval::label).collect();
                    let reason = if doctor.is_on_leave {
                        Some(leave_reason(doctor))
                    } else {
                        checker
                            .first_blocking(start, duration_minutes, intervals)
                            .map(BusyInterval::reason)
                    };

                    DoctorSlot {
                        id: doctor.id,
                        name: doctor.name.clone(),
                        specialty: doctor.specialty.clone(),
                        status: if reason.is_some() { SlotStatus::Busy } else { SlotStatus::Available },
                        reason,
                        busy_slots,
                    }
                })
                .collect();

            rows.push(SlotRow {
                time: start.format("%H:%M").to_string(),
                start,
                doctors,
            });
        }

        debug!("Window {} - {} for {:?}", window.start, window.end, role);
        info!("Generated {} slot(s) for {} ({} min)", rows.len(), date, duration_minutes);
        Ok(rows)
    }
}

impl Default for SlotGrid {
    fn default() -> Self {
        Self::new(SchedulingRules::default())
    }
}

pub(crate) fn validate_duration(minutes: i32) -> Result<(), SchedulingError> {
    if !is_allowed_duration(minutes) {
        return Err(SchedulingError::Validation(format!(
            "Duration must be one of {:?} minutes",
            ALLOWED_DURATIONS
        )));
    }
    Ok(())
}

pub(crate) fn leave_reason(doctor: &Doctor) -> String {
    match doctor.leave_reason.as_deref() {
        Some(reason) if !reason.trim().is_empty() => format!("{}: {}", ON_LEAVE_REASON, reason),
        _ => ON_LEAVE_REASON.to_string(),
    }
}
