use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use patient_cell::IdentityService;
use schedule_cell::{AvailabilityIndex, BookingRole, ClinicCalendar, ConflictChecker, SchedulingRules};
use shared_config::AppConfig;
use shared_database::{ClinicReader, ClinicStore, ClinicTransaction};
use shared_models::auth::User;
use shared_models::clinic::{Appointment, AppointmentStatus, Doctor, PatientRef};
use shared_models::error::SchedulingError;
use visit_cell::{ScheduleWalkInRequest, VisitIntake};

use crate::models::{PublicBookingRequest, StaffBooking, StaffBookingRequest, UpdateAppointmentRequest};
use crate::services::slots::{leave_reason, validate_duration};

/// Creates and edits appointments. Every write runs the same conflict check
/// against the doctor's merged appointment/walk-in schedule inside the
/// transaction that performs it.
#[derive(Debug, Clone)]
pub struct BookingService {
    rules: SchedulingRules,
    identity: IdentityService,
    intake: VisitIntake,
}

impl BookingService {
    pub fn new(rules: SchedulingRules, identity: IdentityService, intake: VisitIntake) -> Self {
        Self { rules, identity, intake }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            SchedulingRules::from_config(config),
            IdentityService::from_config(config),
            VisitIntake::from_config(config),
        )
    }

    /// Public booking. Signed-in patients book under their identity; guests
    /// are linked to an existing patient with the same name and phone if any.
    #[instrument(skip(self, store, request, caller), fields(date = %request.appointment_date))]
    pub async fn create_public(
        &self,
        store: &dyn ClinicStore,
        request: PublicBookingRequest,
        caller: Option<&User>,
        now: DateTime<Utc>,
    ) -> Result<Appointment, SchedulingError> {
        validate_duration(request.duration_minutes)?;
        self.ensure_not_past(request.appointment_date, now)?;
        let symptoms = required_symptoms(&request.symptoms)?;

        let mut tx = store.begin().await?;

        ClinicCalendar::require_open(&*tx, request.appointment_date, BookingRole::Public).await?;

        if let Some(doctor_id) = request.doctor_id {
            let doctor = bookable_doctor(&*tx, doctor_id).await?;
            self.ensure_free(
                &*tx,
                &doctor,
                request.appointment_date,
                request.start_time,
                request.duration_minutes,
                None,
            )
            .await?;
        }

        let (patient_id, guest_name, guest_phone) = match caller {
            Some(user) => match registered_patient(&*tx, user).await? {
                Some(patient_id) => (Some(patient_id), None, None),
                None => guest_identity(&*tx, &request).await?,
            },
            None => guest_identity(&*tx, &request).await?,
        };

        let appointment = tx
            .create_appointment(Appointment {
                id: Uuid::new_v4(),
                doctor_id: request.doctor_id,
                patient_id,
                guest_name,
                guest_phone,
                appointment_date: request.appointment_date,
                start_time: request.start_time,
                duration_minutes: request.duration_minutes,
                status: AppointmentStatus::Pending,
                symptoms,
                price: None,
                is_staff_booked: false,
                created_at: now,
                updated_at: now,
            })
            .await?;

        tx.commit().await?;

        info!(
            "Public booking {} on {} at {} ({} min)",
            appointment.id, appointment.appointment_date, appointment.start_time, appointment.duration_minutes
        );
        Ok(appointment)
    }

    /// Front-desk booking. Known patients and guest bookings get a confirmed
    /// appointment; an unregistered contact gets a pending walk-in visit.
    #[instrument(skip(self, store, request), fields(doctor_id = %request.doctor_id, date = %request.appointment_date))]
    pub async fn create_staff(
        &self,
        store: &dyn ClinicStore,
        request: StaffBookingRequest,
        now: DateTime<Utc>,
    ) -> Result<StaffBooking, SchedulingError> {
        validate_duration(request.duration_minutes)?;
        self.ensure_not_past(request.appointment_date, now)?;
        let symptoms = required_symptoms(&request.symptoms)?;

        let mut tx = store.begin().await?;

        let booking = match request.patient {
            PatientRef::Contact { .. } => {
                let outcome = self
                    .intake
                    .schedule_walk_in(
                        tx.as_mut(),
                        ScheduleWalkInRequest {
                            patient: request.patient.clone(),
                            doctor_id: request.doctor_id,
                            date: request.appointment_date,
                            start_time: request.start_time,
                            duration_minutes: request.duration_minutes,
                            symptoms: Some(symptoms),
                        },
                        now,
                    )
                    .await?;
                StaffBooking::WalkInVisit(outcome)
            }
            PatientRef::Registered(_) | PatientRef::Guest(_) => {
                ClinicCalendar::require_open(&*tx, request.appointment_date, BookingRole::Staff).await?;
                let doctor = bookable_doctor(&*tx, request.doctor_id).await?;

                let resolved = self.identity.resolve(tx.as_mut(), &request.patient, now).await?;

                self.ensure_free(
                    &*tx,
                    &doctor,
                    request.appointment_date,
                    request.start_time,
                    request.duration_minutes,
                    None,
                )
                .await?;

                let appointment = tx
                    .create_appointment(Appointment {
                        id: Uuid::new_v4(),
                        doctor_id: Some(doctor.id),
                        patient_id: Some(resolved.patient.id),
                        guest_name: None,
                        guest_phone: None,
                        appointment_date: request.appointment_date,
                        start_time: request.start_time,
                        duration_minutes: request.duration_minutes,
                        status: AppointmentStatus::Confirmed,
                        symptoms,
                        price: request.price,
                        is_staff_booked: true,
                        created_at: now,
                        updated_at: now,
                    })
                    .await?;
                StaffBooking::Appointment { appointment }
            }
        };

        tx.commit().await?;
        Ok(booking)
    }

    /// Reschedule or reassign. The appointment never conflicts with itself.
    #[instrument(skip(self, store, request))]
    pub async fn update(
        &self,
        store: &dyn ClinicStore,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        now: DateTime<Utc>,
    ) -> Result<Appointment, SchedulingError> {
        validate_duration(request.duration_minutes)?;
        let symptoms = required_symptoms(&request.symptoms)?;
        if let Some(price) = request.price {
            if price < 0.0 {
                return Err(SchedulingError::Validation("Price cannot be negative".to_string()));
            }
        }

        let mut tx = store.begin().await?;

        let mut appointment = tx
            .find_appointment(appointment_id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound("Appointment".to_string()))?;
        if appointment.status.is_terminal() {
            return Err(SchedulingError::Validation(format!(
                "A {} appointment cannot be edited",
                appointment.status
            )));
        }

        ClinicCalendar::require_open(&*tx, request.appointment_date, BookingRole::Staff).await?;
        let doctor = bookable_doctor(&*tx, request.doctor_id).await?;
        self.ensure_free(
            &*tx,
            &doctor,
            request.appointment_date,
            request.start_time,
            request.duration_minutes,
            Some(appointment.id),
        )
        .await?;

        appointment.doctor_id = Some(doctor.id);
        appointment.appointment_date = request.appointment_date;
        appointment.start_time = request.start_time;
        appointment.duration_minutes = request.duration_minutes;
        appointment.symptoms = symptoms;
        appointment.price = request.price;
        appointment.updated_at = now;

        let updated = tx.update_appointment(appointment).await?;
        tx.commit().await?;

        info!("Appointment {} moved to {} {}", updated.id, updated.appointment_date, updated.start_time);
        Ok(updated)
    }

    pub async fn update_status(
        &self,
        store: &dyn ClinicStore,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError> {
        let mut tx = store.begin().await?;

        let appointment = tx
            .find_appointment(appointment_id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound("Appointment".to_string()))?;
        if !appointment.status.can_transition_to(status) {
            return Err(SchedulingError::Validation(format!(
                "Cannot change appointment from {} to {}",
                appointment.status, status
            )));
        }

        let updated = tx.update_appointment_status(appointment_id, status).await?;
        tx.commit().await?;

        info!("Appointment {} is now {}", updated.id, updated.status);
        Ok(updated)
    }

    pub async fn get<R>(&self, reader: &R, appointment_id: Uuid) -> Result<Appointment, SchedulingError>
    where
        R: ClinicReader + ?Sized,
    {
        reader
            .find_appointment(appointment_id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound("Appointment".to_string()))
    }

    fn ensure_not_past(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<(), SchedulingError> {
        let today = self.rules.clock.to_local(now).date();
        if date < today {
            return Err(SchedulingError::Validation("Appointment date must be today or later".to_string()));
        }
        Ok(())
    }

    async fn ensure_free<R>(
        &self,
        reader: &R,
        doctor: &Doctor,
        date: NaiveDate,
        start_time: NaiveTime,
        duration_minutes: i32,
        exclude_appointment: Option<Uuid>,
    ) -> Result<(), SchedulingError>
    where
        R: ClinicReader + ?Sized,
    {
        let busy = AvailabilityIndex::new(self.rules)
            .busy_intervals(reader, doctor.id, date, exclude_appointment)
            .await?;
        ConflictChecker::new(self.rules.buffer).ensure_free(date.and_time(start_time), duration_minutes, &busy)
    }
}

impl Default for BookingService {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

fn required_symptoms(symptoms: &str) -> Result<String, SchedulingError> {
    let symptoms = symptoms.trim();
    if symptoms.is_empty() {
        return Err(SchedulingError::Validation("Symptoms are required".to_string()));
    }
    Ok(symptoms.to_string())
}

async fn bookable_doctor<R>(reader: &R, doctor_id: Uuid) -> Result<Doctor, SchedulingError>
where
    R: ClinicReader + ?Sized,
{
    let doctor = reader
        .find_doctor(doctor_id)
        .await?
        .ok_or_else(|| SchedulingError::NotFound("Doctor".to_string()))?;
    if doctor.is_on_leave {
        warn!("Booking refused, doctor {} is on leave", doctor.id);
        return Err(SchedulingError::Validation(format!(
            "{} is unavailable ({})",
            doctor.name,
            leave_reason(&doctor)
        )));
    }
    Ok(doctor)
}

/// Patient row behind a signed-in caller, if the token subject is one.
async fn registered_patient<R>(reader: &R, user: &User) -> Result<Option<Uuid>, SchedulingError>
where
    R: ClinicReader + ?Sized,
{
    let Ok(patient_id) = Uuid::parse_str(&user.id) else {
        debug!("Token subject {} is not a patient id", user.id);
        return Ok(None);
    };
    Ok(reader.find_patient(patient_id).await?.map(|patient| patient.id))
}

async fn guest_identity<R>(
    reader: &R,
    request: &PublicBookingRequest,
) -> Result<(Option<Uuid>, Option<String>, Option<String>), SchedulingError>
where
    R: ClinicReader + ?Sized,
{
    let name = request.customer_name.as_deref().map(str::trim).unwrap_or_default();
    let phone = request.customer_phone.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() || phone.is_empty() {
        return Err(SchedulingError::Validation(
            "Name and phone are required when booking without an account".to_string(),
        ));
    }

    match reader.find_patient_by_name_and_phone(name, phone).await? {
        Some(patient) => {
            debug!("Guest booking matched patient {}", patient.hn);
            Ok((Some(patient.id), None, None))
        }
        None => Ok((None, Some(name.to_string()), Some(phone.to_string()))),
    }
}
