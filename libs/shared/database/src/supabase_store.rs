use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use urlencoding::encode;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::clinic::{
    Appointment, AppointmentStatus, ClinicDaySchedule, ClinicHoliday, Doctor, Patient, Visit,
};

use crate::store::{
    AppointmentFilter, ClinicReader, ClinicStore, ClinicTransaction, StoreError, VisitFilter,
};
use crate::supabase::{SupabaseClient, SupabaseError};

/// Postgres function that applies a batch of changes in one transaction and
/// re-validates doctor overlaps under the `schedule_blocks` exclusion constraint.
pub const APPLY_CHANGES_RPC: &str = "apply_clinic_changes";

// SQLSTATEs that mean "somebody else got there first".
const RETRYABLE_SQLSTATES: [&str; 3] = ["23P01", "23505", "40001"];

impl From<SupabaseError> for StoreError {
    fn from(err: SupabaseError) -> Self {
        match err {
            SupabaseError::NotFound(msg) => StoreError::NotFound(msg),
            SupabaseError::Conflict(msg) => StoreError::Conflict(msg),
            SupabaseError::Api { status, message }
                if RETRYABLE_SQLSTATES.iter().any(|code| message.contains(code)) =>
            {
                StoreError::Conflict(format!("({}) {}", status, message))
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Patient row as written to the database, password hash included.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PatientRow {
    pub id: Uuid,
    pub hn: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: String,
    pub password_hash: String,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Patient> for PatientRow {
    fn from(patient: &Patient) -> Self {
        Self {
            id: patient.id,
            hn: patient.hn.clone(),
            name: patient.name.clone(),
            phone: patient.phone.clone(),
            email: patient.email.to_lowercase(),
            password_hash: patient.password_hash.clone(),
            is_staff: patient.is_staff,
            created_at: patient.created_at,
        }
    }
}

/// One buffered write, replayed in order by [`APPLY_CHANGES_RPC`].
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ClinicChange {
    InsertAppointment { row: Appointment },
    UpdateAppointment { row: Appointment },
    InsertVisit { row: Visit },
    InsertPatient { row: PatientRow },
    RelinkGuestAppointments {
        guest_name: String,
        guest_phone: String,
        patient_id: Uuid,
    },
    UpsertDaySchedule { row: ClinicDaySchedule },
    InsertHoliday { row: ClinicHoliday },
    DeleteHoliday { id: Uuid },
    SetDoctorLeave {
        id: Uuid,
        is_on_leave: bool,
        leave_reason: Option<String>,
    },
}

/// PostgREST-backed clinic store.
#[derive(Clone)]
pub struct SupabaseStore {
    client: Arc<SupabaseClient>,
    buffer_minutes: i64,
    utc_offset: FixedOffset,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Arc::new(SupabaseClient::new(config)),
            buffer_minutes: config.booking_buffer_minutes,
            utc_offset: config.clinic_utc_offset,
        }
    }
}

/// Read paths shared by the store and its transactions.
#[derive(Clone)]
struct Rest {
    client: Arc<SupabaseClient>,
}

impl Rest {
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, StoreError> {
        self.client
            .request::<Vec<T>>(Method::GET, path, None)
            .await
            .map_err(StoreError::from)
    }

    async fn first<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, StoreError> {
        Ok(self.get::<T>(path).await?.into_iter().next())
    }

    fn appointment_path(filter: &AppointmentFilter) -> String {
        let mut query = vec!["select=*".to_string()];

        if let Some(doctor_id) = filter.doctor_id {
            query.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(patient_id) = filter.patient_id {
            query.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(from) = filter.date_from {
            query.push(format!("appointment_date=gte.{}", from));
        }
        if let Some(to) = filter.date_to {
            query.push(format!("appointment_date=lte.{}", to));
        }
        if let Some(statuses) = &filter.statuses {
            let list: Vec<String> = statuses.iter().map(|s| s.to_string()).collect();
            query.push(format!("status=in.({})", list.join(",")));
        }
        if let Some(name) = &filter.guest_name {
            query.push(format!("guest_name=eq.{}", encode(name)));
        }
        if let Some(phone) = &filter.guest_phone {
            query.push(format!("guest_phone=eq.{}", encode(phone)));
        }
        if filter.unlinked_only {
            query.push("patient_id=is.null".to_string());
        }
        if let Some(id) = filter.exclude_id {
            query.push(format!("id=neq.{}", id));
        }
        query.push("order=appointment_date.asc,start_time.asc,id.asc".to_string());

        format!("/rest/v1/appointments?{}", query.join("&"))
    }

    fn visit_path(filter: &VisitFilter) -> String {
        let mut query = vec!["select=*".to_string()];

        if let Some(doctor_id) = filter.doctor_id {
            query.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(patient_id) = filter.patient_id {
            query.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(from) = filter.scheduled_from {
            query.push(format!("visit_date=gte.{}", encode(&from.to_rfc3339())));
        }
        if let Some(until) = filter.scheduled_until {
            query.push(format!("visit_date=lt.{}", encode(&until.to_rfc3339())));
        }
        if let Some(statuses) = &filter.statuses {
            let list: Vec<String> = statuses.iter().map(|s| s.to_string()).collect();
            query.push(format!("status=in.({})", list.join(",")));
        }
        if filter.walk_in_only {
            query.push("appointment_id=is.null".to_string());
        }
        query.push("order=visit_date.asc,id.asc".to_string());

        format!("/rest/v1/visits?{}", query.join("&"))
    }

    async fn find_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
        let path = Self::appointment_path(filter);
        debug!("Fetching appointments: {}", path);
        self.get(&path).await
    }

    async fn find_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        self.first(&format!("/rest/v1/appointments?id=eq.{}", id)).await
    }

    async fn find_visits(&self, filter: &VisitFilter) -> Result<Vec<Visit>, StoreError> {
        let path = Self::visit_path(filter);
        debug!("Fetching visits: {}", path);
        self.get(&path).await
    }

    async fn find_day_schedule(&self, day_of_week: u8) -> Result<Option<ClinicDaySchedule>, StoreError> {
        self.first(&format!("/rest/v1/clinic_schedules?day_of_week=eq.{}", day_of_week))
            .await
    }

    async fn list_day_schedules(&self) -> Result<Vec<ClinicDaySchedule>, StoreError> {
        self.get("/rest/v1/clinic_schedules?order=day_of_week.asc").await
    }

    async fn find_holiday(&self, date: NaiveDate) -> Result<Option<ClinicHoliday>, StoreError> {
        self.first(&format!("/rest/v1/clinic_holidays?date=eq.{}", date)).await
    }

    async fn list_holidays(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<ClinicHoliday>, StoreError> {
        self.get(&format!(
            "/rest/v1/clinic_holidays?date=gte.{}&date=lte.{}&order=date.asc",
            from, to
        ))
        .await
    }

    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError> {
        self.get("/rest/v1/doctors?order=name.asc").await
    }

    async fn find_doctor(&self, id: Uuid) -> Result<Option<Doctor>, StoreError> {
        self.first(&format!("/rest/v1/doctors?id=eq.{}", id)).await
    }

    async fn find_patient(&self, id: Uuid) -> Result<Option<Patient>, StoreError> {
        self.first(&format!("/rest/v1/patients?id=eq.{}", id)).await
    }

    async fn find_patient_by_phone(&self, phone: &str) -> Result<Option<Patient>, StoreError> {
        self.first(&format!(
            "/rest/v1/patients?phone=eq.{}&is_staff=eq.false&order=created_at.asc&limit=1",
            encode(phone)
        ))
        .await
    }

    async fn find_patient_by_name_and_phone(&self, name: &str, phone: &str) -> Result<Option<Patient>, StoreError> {
        // Candidates share the phone; the name comparison happens here so that
        // `ilike` wildcards in user input never reach the query.
        let wanted = name.trim().to_lowercase();
        let candidates: Vec<Patient> = self
            .get(&format!(
                "/rest/v1/patients?phone=eq.{}&is_staff=eq.false&order=created_at.asc",
                encode(phone)
            ))
            .await?;

        Ok(candidates
            .into_iter()
            .find(|p| p.name.trim().to_lowercase() == wanted))
    }

    async fn find_patient_by_email(&self, email: &str) -> Result<Option<Patient>, StoreError> {
        self.first(&format!(
            "/rest/v1/patients?email=eq.{}",
            encode(&email.to_lowercase())
        ))
        .await
    }

    async fn count_patients_registered_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<u32, StoreError> {
        let rows: Vec<Value> = self
            .get(&format!(
                "/rest/v1/patients?select=id&created_at=gte.{}&created_at=lt.{}",
                encode(&from.to_rfc3339()),
                encode(&until.to_rfc3339())
            ))
            .await?;
        Ok(rows.len() as u32)
    }
}

macro_rules! delegate_reader {
    ($ty:ty) => {
        #[async_trait]
        impl ClinicReader for $ty {
            async fn find_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
                self.rest().find_appointments(filter).await
            }

            async fn find_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
                self.rest().find_appointment(id).await
            }

            async fn find_visits(&self, filter: &VisitFilter) -> Result<Vec<Visit>, StoreError> {
                self.rest().find_visits(filter).await
            }

            async fn find_day_schedule(&self, day_of_week: u8) -> Result<Option<ClinicDaySchedule>, StoreError> {
                self.rest().find_day_schedule(day_of_week).await
            }

            async fn list_day_schedules(&self) -> Result<Vec<ClinicDaySchedule>, StoreError> {
                self.rest().list_day_schedules().await
            }

            async fn find_holiday(&self, date: NaiveDate) -> Result<Option<ClinicHoliday>, StoreError> {
                self.rest().find_holiday(date).await
            }

            async fn list_holidays(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<ClinicHoliday>, StoreError> {
                self.rest().list_holidays(from, to).await
            }

            async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError> {
                self.rest().list_doctors().await
            }

            async fn find_doctor(&self, id: Uuid) -> Result<Option<Doctor>, StoreError> {
                self.rest().find_doctor(id).await
            }

            async fn find_patient(&self, id: Uuid) -> Result<Option<Patient>, StoreError> {
                self.rest().find_patient(id).await
            }

            async fn find_patient_by_phone(&self, phone: &str) -> Result<Option<Patient>, StoreError> {
                self.rest().find_patient_by_phone(phone).await
            }

            async fn find_patient_by_name_and_phone(&self, name: &str, phone: &str) -> Result<Option<Patient>, StoreError> {
                self.rest().find_patient_by_name_and_phone(name, phone).await
            }

            async fn find_patient_by_email(&self, email: &str) -> Result<Option<Patient>, StoreError> {
                self.rest().find_patient_by_email(email).await
            }

            async fn count_patients_registered_between(
                &self,
                from: DateTime<Utc>,
                until: DateTime<Utc>,
            ) -> Result<u32, StoreError> {
                self.rest().count_patients_registered_between(from, until).await
            }
        }
    };
}

impl SupabaseStore {
    fn rest(&self) -> Rest {
        Rest {
            client: Arc::clone(&self.client),
        }
    }
}

delegate_reader!(SupabaseStore);
delegate_reader!(SupabaseTransaction);

#[async_trait]
impl ClinicStore for SupabaseStore {
    async fn begin(&self) -> Result<Box<dyn ClinicTransaction>, StoreError> {
        Ok(Box::new(SupabaseTransaction {
            client: Arc::clone(&self.client),
            buffer_minutes: self.buffer_minutes,
            utc_offset: self.utc_offset,
            changes: Vec::new(),
        }))
    }
}

/// Buffers writes and ships them to [`APPLY_CHANGES_RPC`] on commit.
///
/// Reads see committed rows only. Overlap rules are re-checked by the
/// database at commit time, so a stale read surfaces as `StoreError::Conflict`.
pub struct SupabaseTransaction {
    client: Arc<SupabaseClient>,
    buffer_minutes: i64,
    utc_offset: FixedOffset,
    changes: Vec<ClinicChange>,
}

impl SupabaseTransaction {
    fn rest(&self) -> Rest {
        Rest {
            client: Arc::clone(&self.client),
        }
    }

    async fn current_appointment(&self, id: Uuid) -> Result<Appointment, StoreError> {
        // A row written earlier in this transaction wins over the committed one.
        let buffered = self.changes.iter().rev().find_map(|change| match change {
            ClinicChange::InsertAppointment { row } | ClinicChange::UpdateAppointment { row }
                if row.id == id =>
            {
                Some(row.clone())
            }
            _ => None,
        });

        match buffered {
            Some(row) => Ok(row),
            None => self
                .rest()
                .find_appointment(id)
                .await?
                .ok_or_else(|| StoreError::NotFound("Appointment".to_string())),
        }
    }
}

#[async_trait]
impl ClinicTransaction for SupabaseTransaction {
    async fn create_appointment(&mut self, appointment: Appointment) -> Result<Appointment, StoreError> {
        self.changes.push(ClinicChange::InsertAppointment {
            row: appointment.clone(),
        });
        Ok(appointment)
    }

    async fn update_appointment(&mut self, appointment: Appointment) -> Result<Appointment, StoreError> {
        self.changes.push(ClinicChange::UpdateAppointment {
            row: appointment.clone(),
        });
        Ok(appointment)
    }

    async fn update_appointment_status(
        &mut self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, StoreError> {
        let mut row = self.current_appointment(id).await?;
        row.status = status;
        row.updated_at = Utc::now();
        self.changes
            .push(ClinicChange::UpdateAppointment { row: row.clone() });
        Ok(row)
    }

    async fn create_visit(&mut self, visit: Visit) -> Result<Visit, StoreError> {
        self.changes
            .push(ClinicChange::InsertVisit { row: visit.clone() });
        Ok(visit)
    }

    async fn create_patient(&mut self, patient: Patient) -> Result<Patient, StoreError> {
        self.changes.push(ClinicChange::InsertPatient {
            row: PatientRow::from(&patient),
        });
        Ok(patient)
    }

    async fn relink_guest_appointments(
        &mut self,
        name: &str,
        phone: &str,
        patient_id: Uuid,
    ) -> Result<usize, StoreError> {
        let filter = AppointmentFilter::new().guest(name, phone).unlinked();
        let matching = self.rest().find_appointments(&filter).await?;

        self.changes.push(ClinicChange::RelinkGuestAppointments {
            guest_name: name.to_string(),
            guest_phone: phone.to_string(),
            patient_id,
        });
        Ok(matching.len())
    }

    async fn upsert_day_schedule(&mut self, schedule: ClinicDaySchedule) -> Result<ClinicDaySchedule, StoreError> {
        self.changes.push(ClinicChange::UpsertDaySchedule {
            row: schedule.clone(),
        });
        Ok(schedule)
    }

    async fn create_holiday(&mut self, holiday: ClinicHoliday) -> Result<ClinicHoliday, StoreError> {
        if self.rest().find_holiday(holiday.date).await?.is_some() {
            return Err(StoreError::Conflict(format!(
                "a holiday on {} already exists",
                holiday.date
            )));
        }
        self.changes.push(ClinicChange::InsertHoliday {
            row: holiday.clone(),
        });
        Ok(holiday)
    }

    async fn delete_holiday(&mut self, id: Uuid) -> Result<(), StoreError> {
        let existing: Option<ClinicHoliday> = self
            .rest()
            .first(&format!("/rest/v1/clinic_holidays?id=eq.{}", id))
            .await?;
        if existing.is_none() {
            return Err(StoreError::NotFound("Holiday".to_string()));
        }
        self.changes.push(ClinicChange::DeleteHoliday { id });
        Ok(())
    }

    async fn set_doctor_leave(
        &mut self,
        id: Uuid,
        is_on_leave: bool,
        leave_reason: Option<String>,
    ) -> Result<Doctor, StoreError> {
        let mut doctor = self
            .rest()
            .find_doctor(id)
            .await?
            .ok_or_else(|| StoreError::NotFound("Doctor".to_string()))?;
        doctor.is_on_leave = is_on_leave;
        doctor.leave_reason = if is_on_leave { leave_reason } else { None };

        self.changes.push(ClinicChange::SetDoctorLeave {
            id,
            is_on_leave,
            leave_reason: doctor.leave_reason.clone(),
        });
        Ok(doctor)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if self.changes.is_empty() {
            return Ok(());
        }

        let count = self.changes.len();
        let args = json!({
            "changes": self.changes,
            "buffer_minutes": self.buffer_minutes,
            "utc_offset_seconds": self.utc_offset.local_minus_utc(),
        });

        match self.client.rpc::<Value>(APPLY_CHANGES_RPC, args).await {
            Ok(_) => {
                info!("Committed {} clinic change(s)", count);
                Ok(())
            }
            Err(e) => {
                warn!("Clinic transaction rolled back: {}", e);
                Err(StoreError::from(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appointment_query_encodes_every_filter() {
        let doctor_id = Uuid::new_v4();
        let excluded = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        let path = Rest::appointment_path(
            &AppointmentFilter::new()
                .doctor(doctor_id)
                .on(date)
                .active()
                .excluding(Some(excluded)),
        );

        assert!(path.starts_with("/rest/v1/appointments?select=*"));
        assert!(path.contains(&format!("doctor_id=eq.{}", doctor_id)));
        assert!(path.contains("appointment_date=gte.2026-03-02"));
        assert!(path.contains("appointment_date=lte.2026-03-02"));
        assert!(path.contains("status=in.(pending,confirmed)"));
        assert!(path.contains(&format!("id=neq.{}", excluded)));
    }

    #[test]
    fn guest_names_are_url_encoded() {
        let path = Rest::appointment_path(&AppointmentFilter::new().guest("Somchai J", "081 234"));
        assert!(path.contains("guest_name=eq.Somchai%20J"));
        assert!(path.contains("guest_phone=eq.081%20234"));
    }

    #[test]
    fn exclusion_violations_are_conflicts() {
        let err = SupabaseError::Api {
            status: 400,
            message: r#"{"code":"23P01","message":"conflicting key value violates exclusion constraint"}"#.to_string(),
        };
        assert!(matches!(StoreError::from(err), StoreError::Conflict(_)));

        let other = SupabaseError::Api { status: 500, message: "boom".to_string() };
        assert!(matches!(StoreError::from(other), StoreError::Backend(_)));
    }

    #[test]
    fn changes_serialize_with_an_op_tag() {
        let change = ClinicChange::DeleteHoliday { id: Uuid::nil() };
        let value = serde_json::to_value(&change).unwrap();
        assert_eq!(value["op"], "delete_holiday");
        assert_eq!(value["id"], Uuid::nil().to_string());
    }
}
