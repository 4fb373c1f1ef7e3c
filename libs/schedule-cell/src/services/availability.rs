use std::collections::HashMap;

use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::{debug, instrument};
use uuid::Uuid;

use shared_database::{AppointmentFilter, ClinicReader, VisitFilter};
use shared_models::clinic::{Appointment, BusyInterval, IntervalSource, Visit};
use shared_models::error::SchedulingError;

use crate::models::SchedulingRules;

/// Merges appointments and walk-in visits into per-doctor busy intervals.
#[derive(Debug, Clone, Copy)]
pub struct AvailabilityIndex {
    rules: SchedulingRules,
}

impl AvailabilityIndex {
    pub fn new(rules: SchedulingRules) -> Self {
        Self { rules }
    }

    pub fn appointment_interval(&self, appointment: &Appointment) -> Option<BusyInterval> {
        let doctor_id = appointment.doctor_id?;
        let start = appointment.local_start();
        let display_end = appointment.local_end();

        Some(BusyInterval {
            doctor_id,
            start,
            end: display_end + self.rules.buffer,
            display_end,
            source_kind: IntervalSource::Appointment,
            source_id: appointment.id,
        })
    }

    pub fn visit_interval(&self, visit: &Visit) -> BusyInterval {
        let start = self.rules.clock.to_local(visit.visit_date);
        let display_end = start + Duration::minutes(visit.duration_minutes as i64);

        BusyInterval {
            doctor_id: visit.doctor_id,
            start,
            end: display_end + self.rules.buffer,
            display_end,
            source_kind: IntervalSource::WalkIn,
            source_id: visit.id,
        }
    }

    /// Busy intervals of one doctor that a candidate starting on `date` can
    /// collide with: anything still blocking at the local midnight opening
    /// `date`, through the following day for candidates that run past midnight.
    pub async fn busy_intervals<R>(
        &self,
        reader: &R,
        doctor_id: Uuid,
        date: NaiveDate,
        exclude_appointment: Option<Uuid>,
    ) -> Result<Vec<BusyInterval>, SchedulingError>
    where
        R: ClinicReader + ?Sized,
    {
        let (from, to) = Self::neighbourhood(date);
        let mut by_doctor = self
            .collect(reader, Some(doctor_id), from, to, exclude_appointment)
            .await?;

        let midnight = date.and_time(NaiveTime::MIN);
        let mut intervals = by_doctor.remove(&doctor_id).unwrap_or_default();
        intervals.retain(|interval| interval.end > midnight);
        Ok(intervals)
    }

    /// `[date - 1, date + 1]`, the dates whose intervals can reach into `date`.
    pub fn neighbourhood(date: NaiveDate) -> (NaiveDate, NaiveDate) {
        (
            date.pred_opt().unwrap_or(date),
            date.succ_opt().unwrap_or(date),
        )
    }

    /// Busy intervals of every doctor over `[from, to]`, keyed by doctor.
    #[instrument(skip(self, reader))]
    pub async fn busy_by_doctor<R>(
        &self,
        reader: &R,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<HashMap<Uuid, Vec<BusyInterval>>, SchedulingError>
    where
        R: ClinicReader + ?Sized,
    {
        self.collect(reader, None, from, to, None).await
    }

    async fn collect<R>(
        &self,
        reader: &R,
        doctor_id: Option<Uuid>,
        from: NaiveDate,
        to: NaiveDate,
        exclude_appointment: Option<Uuid>,
    ) -> Result<HashMap<Uuid, Vec<BusyInterval>>, SchedulingError>
    where
        R: ClinicReader + ?Sized,
    {
        let mut appointment_filter = AppointmentFilter::new()
            .between(from, to)
            .active()
            .excluding(exclude_appointment);
        if let Some(doctor_id) = doctor_id {
            appointment_filter = appointment_filter.doctor(doctor_id);
        }

        let (window_from, _) = self.rules.clock.day_bounds_utc(from);
        let (_, window_until) = self.rules.clock.day_bounds_utc(to);
        let mut visit_filter = VisitFilter::new()
            .scheduled_within(window_from, window_until)
            .active()
            .walk_in();
        if let Some(doctor_id) = doctor_id {
            visit_filter = visit_filter.doctor(doctor_id);
        }

        let appointments = reader.find_appointments(&appointment_filter).await?;
        let visits = reader.find_visits(&visit_filter).await?;

        let mut intervals: Vec<BusyInterval> = appointments
            .iter()
            .filter_map(|apt| self.appointment_interval(apt))
            .collect();

        // Visits are bucketed by their local date, never by their UTC date.
        intervals.extend(
            visits
                .iter()
                .map(|visit| self.visit_interval(visit))
                .filter(|interval| {
                    let local_date = interval.start.date();
                    local_date >= from && local_date <= to
                }),
        );

        intervals.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| a.source_kind.cmp(&b.source_kind))
                .then_with(|| a.source_id.cmp(&b.source_id))
        });

        debug!(
            "{} busy interval(s) between {} and {} ({} appointments, {} walk-ins)",
            intervals.len(),
            from,
            to,
            appointments.len(),
            visits.len()
        );

        let mut by_doctor: HashMap<Uuid, Vec<BusyInterval>> = HashMap::new();
        for interval in intervals {
            by_doctor.entry(interval.doctor_id).or_default().push(interval);
        }
        Ok(by_doctor)
    }
}
