use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use patient_cell::{IdentityService, ResolvedPatient};
use schedule_cell::{AvailabilityIndex, BookingRole, ClinicCalendar, ConflictChecker, SchedulingRules};
use shared_config::AppConfig;
use shared_database::{ClinicReader, ClinicStore, ClinicTransaction};
use shared_models::clinic::{AppointmentStatus, Doctor, PatientRef, Visit, VisitStatus};
use shared_models::error::SchedulingError;

use crate::models::{
    AvailabilityCheck, AvailabilityQuery, ScheduleWalkInRequest, StartVisitRequest, VisitOutcome,
    VisitSource, DEFAULT_WALK_IN_MINUTES, MAX_VISIT_MINUTES,
};

struct WalkInPlan {
    doctor_id: Uuid,
    start: NaiveDateTime,
    duration_minutes: i32,
    status: VisitStatus,
    time_in: Option<DateTime<Utc>>,
    symptoms: Option<String>,
    notes: Option<String>,
}

/// Turns bookings and front-desk arrivals into visits.
///
/// Identity resolution, guest relinking, the conflict check and the visit
/// write all share one transaction; any failure leaves the store untouched.
#[derive(Debug, Clone)]
pub struct VisitIntake {
    rules: SchedulingRules,
    identity: IdentityService,
}

impl VisitIntake {
    pub fn new(rules: SchedulingRules, identity: IdentityService) -> Self {
        Self { rules, identity }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(SchedulingRules::from_config(config), IdentityService::from_config(config))
    }

    fn index(&self) -> AvailabilityIndex {
        AvailabilityIndex::new(self.rules)
    }

    fn checker(&self) -> ConflictChecker {
        ConflictChecker::new(self.rules.buffer)
    }

    #[instrument(skip(self, store, request), fields(source = ?request.source))]
    pub async fn start_visit(
        &self,
        store: &dyn ClinicStore,
        request: StartVisitRequest,
        now: DateTime<Utc>,
    ) -> Result<VisitOutcome, SchedulingError> {
        let mut tx = store.begin().await?;

        let outcome = match request.source {
            VisitSource::Appointment { appointment_id } => {
                self.check_in(
                    tx.as_mut(),
                    appointment_id,
                    request.patient,
                    request.symptoms,
                    request.notes,
                    now,
                )
                .await?
            }
            VisitSource::WalkIn {
                doctor_id,
                visit_date,
                duration_minutes,
            } => {
                let patient = request.patient.ok_or_else(|| {
                    SchedulingError::Validation("A patient is required for a walk-in visit".to_string())
                })?;
                let scheduled = visit_date.unwrap_or(now);
                let plan = WalkInPlan {
                    doctor_id,
                    start: self.rules.clock.to_local(scheduled),
                    duration_minutes: duration_minutes.unwrap_or(DEFAULT_WALK_IN_MINUTES),
                    status: VisitStatus::Ongoing,
                    time_in: Some(now),
                    symptoms: request.symptoms,
                    notes: request.notes,
                };
                self.book_walk_in(tx.as_mut(), &patient, plan, now).await?
            }
        };

        tx.commit().await?;

        info!(
            "Visit {} started for patient {} with doctor {}",
            outcome.visit.id, outcome.patient.hn, outcome.visit.doctor_id
        );
        Ok(outcome)
    }

    /// Records a pending walk-in on the staff calendar inside the caller's
    /// transaction. The caller commits.
    #[instrument(skip(self, tx, request), fields(doctor_id = %request.doctor_id, date = %request.date))]
    pub async fn schedule_walk_in(
        &self,
        tx: &mut dyn ClinicTransaction,
        request: ScheduleWalkInRequest,
        now: DateTime<Utc>,
    ) -> Result<VisitOutcome, SchedulingError> {
        ClinicCalendar::require_open(&*tx, request.date, BookingRole::Staff).await?;

        let plan = WalkInPlan {
            doctor_id: request.doctor_id,
            start: request.date.and_time(request.start_time),
            duration_minutes: request.duration_minutes,
            status: VisitStatus::Pending,
            time_in: None,
            symptoms: request.symptoms,
            notes: None,
        };
        self.book_walk_in(tx, &request.patient, plan, now).await
    }

    /// Read-only: would a walk-in fit right now?
    pub async fn check_availability<R>(
        &self,
        reader: &R,
        query: &AvailabilityQuery,
    ) -> Result<AvailabilityCheck, SchedulingError>
    where
        R: ClinicReader + ?Sized,
    {
        let duration = query.duration_minutes.unwrap_or(DEFAULT_WALK_IN_MINUTES);
        validate_duration(duration)?;

        let doctor = find_doctor(reader, query.doctor_id).await?;
        let busy = self
            .index()
            .busy_intervals(reader, doctor.id, query.date, None)
            .await?;
        let outcome = self.checker().check(query.date.and_time(query.time), duration, &busy);

        Ok(AvailabilityCheck {
            doctor_id: doctor.id,
            available: !outcome.conflict && !doctor.is_on_leave,
            on_leave: doctor.is_on_leave,
            outcome,
            busy,
        })
    }

    async fn check_in(
        &self,
        tx: &mut dyn ClinicTransaction,
        appointment_id: Uuid,
        patient: Option<PatientRef>,
        symptoms: Option<String>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<VisitOutcome, SchedulingError> {
        let appointment = tx
            .find_appointment(appointment_id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound("Appointment".to_string()))?;

        if !appointment.status.is_active() {
            return Err(SchedulingError::Validation(format!(
                "Appointment is {} and cannot be checked in",
                appointment.status
            )));
        }
        let doctor_id = appointment.doctor_id.ok_or_else(|| {
            SchedulingError::Validation("Appointment has no doctor assigned".to_string())
        })?;

        let patient_ref = patient.unwrap_or(match appointment.patient_id {
            Some(patient_id) => PatientRef::Registered(patient_id),
            None => PatientRef::Guest(appointment.id),
        });
        let ResolvedPatient {
            patient,
            created,
            relinked_appointments,
        } = self.identity.resolve(tx, &patient_ref, now).await?;

        let visit = tx
            .create_visit(Visit {
                id: Uuid::new_v4(),
                patient_id: patient.id,
                doctor_id,
                appointment_id: Some(appointment.id),
                visit_date: self.rules.clock.to_utc(appointment.local_start()),
                time_in: Some(now),
                duration_minutes: appointment.duration_minutes,
                status: VisitStatus::Ongoing,
                symptoms: symptoms.or_else(|| Some(appointment.symptoms.clone())),
                notes,
                created_at: now,
            })
            .await?;

        // Relinking may already have attached the patient; re-read before linking.
        let mut current = tx
            .find_appointment(appointment.id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound("Appointment".to_string()))?;
        if current.patient_id.is_none() {
            current.patient_id = Some(patient.id);
            current.updated_at = now;
            tx.update_appointment(current).await?;
        }
        let completed = tx
            .update_appointment_status(appointment.id, AppointmentStatus::Completed)
            .await?;

        Ok(VisitOutcome {
            visit,
            patient,
            patient_created: created,
            relinked_appointments,
            completed_appointment: Some(completed),
        })
    }

    async fn book_walk_in(
        &self,
        tx: &mut dyn ClinicTransaction,
        patient: &PatientRef,
        plan: WalkInPlan,
        now: DateTime<Utc>,
    ) -> Result<VisitOutcome, SchedulingError> {
        validate_duration(plan.duration_minutes)?;

        let doctor = find_doctor(&*tx, plan.doctor_id).await?;
        if doctor.is_on_leave {
            return Err(on_leave(&doctor));
        }

        let ResolvedPatient {
            patient,
            created,
            relinked_appointments,
        } = self.identity.resolve(tx, patient, now).await?;

        let busy = self
            .index()
            .busy_intervals(&*tx, doctor.id, plan.start.date(), None)
            .await?;
        self.checker()
            .ensure_free(plan.start, plan.duration_minutes, &busy)?;

        let visit = tx
            .create_visit(Visit {
                id: Uuid::new_v4(),
                patient_id: patient.id,
                doctor_id: doctor.id,
                appointment_id: None,
                visit_date: self.rules.clock.to_utc(plan.start),
                time_in: plan.time_in,
                duration_minutes: plan.duration_minutes,
                status: plan.status,
                symptoms: plan.symptoms,
                notes: plan.notes,
                created_at: now,
            })
            .await?;

        Ok(VisitOutcome {
            visit,
            patient,
            patient_created: created,
            relinked_appointments,
            completed_appointment: None,
        })
    }
}

impl Default for VisitIntake {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

fn validate_duration(minutes: i32) -> Result<(), SchedulingError> {
    if minutes <= 0 || minutes > MAX_VISIT_MINUTES {
        return Err(SchedulingError::Validation(format!(
            "Visit duration must be between 1 and {} minutes",
            MAX_VISIT_MINUTES
        )));
    }
    Ok(())
}

async fn find_doctor<R>(reader: &R, doctor_id: Uuid) -> Result<Doctor, SchedulingError>
where
    R: ClinicReader + ?Sized,
{
    reader
        .find_doctor(doctor_id)
        .await?
        .ok_or_else(|| SchedulingError::NotFound("Doctor".to_string()))
}

fn on_leave(doctor: &Doctor) -> SchedulingError {
    warn!("Doctor {} is on leave", doctor.id);
    SchedulingError::Validation(match &doctor.leave_reason {
        Some(reason) => format!("{} is on leave: {}", doctor.name, reason),
        None => format!("{} is on leave", doctor.name),
    })
}
