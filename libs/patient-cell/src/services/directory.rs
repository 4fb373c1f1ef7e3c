use std::collections::HashMap;

use uuid::Uuid;

use shared_database::{AppointmentFilter, ClinicReader, VisitFilter};
use shared_models::error::SchedulingError;

use crate::models::{GuestSummary, PatientRecord};

pub struct PatientDirectory;

impl PatientDirectory {
    /// Distinct name+phone pairs that only exist on unlinked bookings, most recent first.
    pub async fn list_guests<R>(reader: &R, search: Option<&str>) -> Result<Vec<GuestSummary>, SchedulingError>
    where
        R: ClinicReader + ?Sized,
    {
        let appointments = reader
            .find_appointments(&AppointmentFilter::new().unlinked())
            .await?;

        let needle = search.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());
        let mut guests: HashMap<(String, String), GuestSummary> = HashMap::new();

        // Appointments arrive in start order, so the last one seen is the latest.
        for appointment in &appointments {
            let Some((name, phone)) = appointment.guest_contact() else {
                continue;
            };
            if let Some(needle) = &needle {
                if !name.to_lowercase().contains(needle) && !phone.contains(needle.as_str()) {
                    continue;
                }
            }

            guests
                .entry((name.to_string(), phone.to_string()))
                .and_modify(|guest| {
                    guest.guest_token = appointment.id;
                    guest.appointment_count += 1;
                    guest.last_appointment_date = appointment.appointment_date;
                })
                .or_insert_with(|| GuestSummary {
                    name: name.to_string(),
                    phone: phone.to_string(),
                    guest_token: appointment.id,
                    appointment_count: 1,
                    last_appointment_date: appointment.appointment_date,
                });
        }

        let mut list: Vec<GuestSummary> = guests.into_values().collect();
        list.sort_by(|a, b| {
            b.last_appointment_date
                .cmp(&a.last_appointment_date)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(list)
    }

    pub async fn get_record<R>(reader: &R, patient_id: Uuid) -> Result<PatientRecord, SchedulingError>
    where
        R: ClinicReader + ?Sized,
    {
        let patient = reader
            .find_patient(patient_id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound("Patient".to_string()))?;

        let appointments = reader
            .find_appointments(&AppointmentFilter::new().patient(patient_id))
            .await?;
        let visits = reader
            .find_visits(&VisitFilter::new().patient(patient_id))
            .await?;

        Ok(PatientRecord {
            patient,
            appointments,
            visits,
        })
    }
}
