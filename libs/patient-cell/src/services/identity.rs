use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use schedule_cell::ClinicClock;
use shared_config::AppConfig;
use shared_database::{ClinicReader, ClinicTransaction};
use shared_models::clinic::{Patient, PatientRef};
use shared_models::error::SchedulingError;

use crate::models::ResolvedPatient;
use crate::services::password::PasswordService;

fn non_digits() -> &'static Regex {
    static NON_DIGITS: OnceLock<Regex> = OnceLock::new();
    NON_DIGITS.get_or_init(|| Regex::new(r"\D+").expect("static pattern compiles"))
}

/// Resolves who a visit or booking is for, promoting guests to permanent
/// identities. Every method works inside the caller's transaction.
#[derive(Debug, Clone)]
pub struct IdentityService {
    clock: ClinicClock,
    email_domain: String,
    default_password: String,
}

impl IdentityService {
    pub fn new(clock: ClinicClock, email_domain: impl Into<String>, default_password: impl Into<String>) -> Self {
        Self {
            clock,
            email_domain: email_domain.into(),
            default_password: default_password.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            ClinicClock::from_config(config),
            config.guest_email_domain.clone(),
            config.default_patient_password.clone(),
        )
    }

    #[instrument(skip(self, tx))]
    pub async fn resolve(
        &self,
        tx: &mut dyn ClinicTransaction,
        patient: &PatientRef,
        now: DateTime<Utc>,
    ) -> Result<ResolvedPatient, SchedulingError> {
        match patient {
            PatientRef::Registered(patient_id) => {
                let patient = tx
                    .find_patient(*patient_id)
                    .await?
                    .ok_or_else(|| SchedulingError::NotFound("Patient".to_string()))?;
                Ok(ResolvedPatient {
                    patient,
                    created: false,
                    relinked_appointments: 0,
                })
            }
            PatientRef::Guest(appointment_id) => {
                let appointment = tx
                    .find_appointment(*appointment_id)
                    .await?
                    .ok_or_else(|| SchedulingError::NotFound("Guest booking".to_string()))?;

                let (name, phone) = appointment.guest_contact().ok_or_else(|| {
                    SchedulingError::Validation("Guest booking has no name and phone".to_string())
                })?;
                let (name, phone) = (name.to_string(), phone.to_string());

                // Already promoted through another booking: reuse that identity.
                if let Some(linked_id) = appointment.patient_id {
                    let patient = tx
                        .find_patient(linked_id)
                        .await?
                        .ok_or_else(|| SchedulingError::NotFound("Patient".to_string()))?;
                    let relinked = tx.relink_guest_appointments(&name, &phone, patient.id).await?;
                    return Ok(ResolvedPatient {
                        patient,
                        created: false,
                        relinked_appointments: relinked,
                    });
                }

                self.resolve_contact(tx, &name, &phone, now).await
            }
            PatientRef::Contact { name, phone } => {
                let (name, phone) = (name.trim(), phone.trim());
                if name.is_empty() || phone.is_empty() {
                    return Err(SchedulingError::Validation(
                        "Name and phone are required for an unregistered patient".to_string(),
                    ));
                }
                self.resolve_contact(tx, name, phone, now).await
            }
        }
    }

    /// Phone match first, then name+phone, otherwise register stamped with
    /// `now`. Either way all unlinked bookings under this name+phone are
    /// pointed at the identity.
    async fn resolve_contact(
        &self,
        tx: &mut dyn ClinicTransaction,
        name: &str,
        phone: &str,
        now: DateTime<Utc>,
    ) -> Result<ResolvedPatient, SchedulingError> {
        let existing = match tx.find_patient_by_phone(phone).await? {
            Some(patient) => Some(patient),
            None => tx.find_patient_by_name_and_phone(name, phone).await?,
        };

        let (patient, created) = match existing {
            Some(patient) => {
                debug!("Guest {} matched existing patient {}", name, patient.hn);
                (patient, false)
            }
            None => (self.register(tx, name, phone, now).await?, true),
        };

        let relinked = tx.relink_guest_appointments(name, phone, patient.id).await?;
        if relinked > 0 {
            info!("Linked {} guest booking(s) to patient {}", relinked, patient.hn);
        }

        Ok(ResolvedPatient {
            patient,
            created,
            relinked_appointments: relinked,
        })
    }

    async fn register(
        &self,
        tx: &mut dyn ClinicTransaction,
        name: &str,
        phone: &str,
        now: DateTime<Utc>,
    ) -> Result<Patient, SchedulingError> {
        let hn = self.next_hn(&*tx, now).await?;
        let email = self.placeholder_email(&*tx, phone).await?;
        let password_hash = PasswordService::hash_password(&self.default_password)?;

        let patient = tx
            .create_patient(Patient {
                id: Uuid::new_v4(),
                hn,
                name: name.to_string(),
                phone: Some(phone.to_string()),
                email,
                password_hash,
                is_staff: false,
                created_at: now,
            })
            .await?;

        info!("Registered patient {} for guest {}", patient.hn, patient.name);
        Ok(patient)
    }

    /// `HN-ddMMyyyy-NNNN`, numbered by registrations on the clinic-local day.
    pub async fn next_hn<R>(&self, reader: &R, now: DateTime<Utc>) -> Result<String, SchedulingError>
    where
        R: ClinicReader + ?Sized,
    {
        let today = self.clock.to_local(now).date();
        let (from, until) = self.clock.day_bounds_utc(today);
        let registered = reader.count_patients_registered_between(from, until).await?;

        Ok(format!("HN-{}-{:04}", today.format("%d%m%Y"), registered + 1))
    }

    async fn placeholder_email<R>(&self, reader: &R, phone: &str) -> Result<String, SchedulingError>
    where
        R: ClinicReader + ?Sized,
    {
        let digits = non_digits().replace_all(phone, "");
        if !digits.is_empty() {
            let candidate = format!("guest_{}@{}", digits, self.email_domain);
            if reader.find_patient_by_email(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }

        Ok(format!("guest_{}@{}", Uuid::new_v4().simple(), self.email_domain))
    }
}

impl Default for IdentityService {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}
