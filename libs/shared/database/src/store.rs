use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use shared_models::clinic::{
    Appointment, AppointmentStatus, ClinicDaySchedule, ClinicHoliday, Doctor, Patient, Visit,
    VisitStatus,
};
use shared_models::error::SchedulingError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    /// A write collided with a concurrent one (constraint or serialization failure).
    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for SchedulingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => SchedulingError::NotFound(what),
            StoreError::Conflict(msg) => SchedulingError::TransactionFailure(msg),
            StoreError::Backend(msg) => SchedulingError::Store(msg),
        }
    }
}

// ==============================================================================
// FILTERS
// ==============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentFilter {
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub statuses: Option<Vec<AppointmentStatus>>,
    pub guest_name: Option<String>,
    pub guest_phone: Option<String>,
    /// Only appointments with no patient reference.
    pub unlinked_only: bool,
    pub exclude_id: Option<Uuid>,
}

impl AppointmentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn doctor(mut self, doctor_id: Uuid) -> Self {
        self.doctor_id = Some(doctor_id);
        self
    }

    pub fn patient(mut self, patient_id: Uuid) -> Self {
        self.patient_id = Some(patient_id);
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date_from = Some(date);
        self.date_to = Some(date);
        self
    }

    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.date_from = Some(from);
        self.date_to = Some(to);
        self
    }

    pub fn statuses(mut self, statuses: Vec<AppointmentStatus>) -> Self {
        self.statuses = Some(statuses);
        self
    }

    pub fn active(self) -> Self {
        self.statuses(AppointmentStatus::active())
    }

    pub fn guest(mut self, name: &str, phone: &str) -> Self {
        self.guest_name = Some(name.to_string());
        self.guest_phone = Some(phone.to_string());
        self
    }

    pub fn unlinked(mut self) -> Self {
        self.unlinked_only = true;
        self
    }

    pub fn excluding(mut self, appointment_id: Option<Uuid>) -> Self {
        self.exclude_id = appointment_id;
        self
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        if let Some(doctor_id) = self.doctor_id {
            if appointment.doctor_id != Some(doctor_id) {
                return false;
            }
        }
        if let Some(patient_id) = self.patient_id {
            if appointment.patient_id != Some(patient_id) {
                return false;
            }
        }
        if let Some(from) = self.date_from {
            if appointment.appointment_date < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if appointment.appointment_date > to {
                return false;
            }
        }
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&appointment.status) {
                return false;
            }
        }
        if let Some(name) = &self.guest_name {
            if appointment.guest_name.as_deref() != Some(name.as_str()) {
                return false;
            }
        }
        if let Some(phone) = &self.guest_phone {
            if appointment.guest_phone.as_deref() != Some(phone.as_str()) {
                return false;
            }
        }
        if self.unlinked_only && appointment.patient_id.is_some() {
            return false;
        }
        if self.exclude_id == Some(appointment.id) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitFilter {
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    /// Inclusive lower bound on `visit_date`.
    pub scheduled_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `visit_date`.
    pub scheduled_until: Option<DateTime<Utc>>,
    pub statuses: Option<Vec<VisitStatus>>,
    pub walk_in_only: bool,
}

impl VisitFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn doctor(mut self, doctor_id: Uuid) -> Self {
        self.doctor_id = Some(doctor_id);
        self
    }

    pub fn patient(mut self, patient_id: Uuid) -> Self {
        self.patient_id = Some(patient_id);
        self
    }

    pub fn scheduled_within(mut self, from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.scheduled_from = Some(from);
        self.scheduled_until = Some(until);
        self
    }

    pub fn statuses(mut self, statuses: Vec<VisitStatus>) -> Self {
        self.statuses = Some(statuses);
        self
    }

    pub fn active(self) -> Self {
        self.statuses(VisitStatus::active())
    }

    pub fn walk_in(mut self) -> Self {
        self.walk_in_only = true;
        self
    }

    pub fn matches(&self, visit: &Visit) -> bool {
        if let Some(doctor_id) = self.doctor_id {
            if visit.doctor_id != doctor_id {
                return false;
            }
        }
        if let Some(patient_id) = self.patient_id {
            if visit.patient_id != patient_id {
                return false;
            }
        }
        if let Some(from) = self.scheduled_from {
            if visit.visit_date < from {
                return false;
            }
        }
        if let Some(until) = self.scheduled_until {
            if visit.visit_date >= until {
                return false;
            }
        }
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&visit.status) {
                return false;
            }
        }
        if self.walk_in_only && visit.appointment_id.is_some() {
            return false;
        }
        true
    }
}

// ==============================================================================
// STORE CONTRACTS
// ==============================================================================

/// Read side of the clinic aggregate.
#[async_trait]
pub trait ClinicReader: Send + Sync {
    async fn find_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError>;

    async fn find_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    async fn find_visits(&self, filter: &VisitFilter) -> Result<Vec<Visit>, StoreError>;

    async fn find_day_schedule(&self, day_of_week: u8) -> Result<Option<ClinicDaySchedule>, StoreError>;

    async fn list_day_schedules(&self) -> Result<Vec<ClinicDaySchedule>, StoreError>;

    async fn find_holiday(&self, date: NaiveDate) -> Result<Option<ClinicHoliday>, StoreError>;

    async fn list_holidays(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<ClinicHoliday>, StoreError>;

    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError>;

    async fn find_doctor(&self, id: Uuid) -> Result<Option<Doctor>, StoreError>;

    async fn find_patient(&self, id: Uuid) -> Result<Option<Patient>, StoreError>;

    /// Non-staff identity registered with exactly this phone number.
    async fn find_patient_by_phone(&self, phone: &str) -> Result<Option<Patient>, StoreError>;

    /// Non-staff identity with this name (case-insensitive, trimmed) and phone.
    async fn find_patient_by_name_and_phone(&self, name: &str, phone: &str) -> Result<Option<Patient>, StoreError>;

    async fn find_patient_by_email(&self, email: &str) -> Result<Option<Patient>, StoreError>;

    /// Number of identities created in `[from, until)`.
    async fn count_patients_registered_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<u32, StoreError>;
}

/// A unit of work. Dropping it without `commit` discards every write.
#[async_trait]
pub trait ClinicTransaction: ClinicReader {
    async fn create_appointment(&mut self, appointment: Appointment) -> Result<Appointment, StoreError>;

    async fn update_appointment(&mut self, appointment: Appointment) -> Result<Appointment, StoreError>;

    async fn update_appointment_status(
        &mut self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, StoreError>;

    async fn create_visit(&mut self, visit: Visit) -> Result<Visit, StoreError>;

    async fn create_patient(&mut self, patient: Patient) -> Result<Patient, StoreError>;

    /// Points every unlinked appointment booked under `name`/`phone` at `patient_id`.
    async fn relink_guest_appointments(
        &mut self,
        name: &str,
        phone: &str,
        patient_id: Uuid,
    ) -> Result<usize, StoreError>;

    async fn upsert_day_schedule(&mut self, schedule: ClinicDaySchedule) -> Result<ClinicDaySchedule, StoreError>;

    async fn create_holiday(&mut self, holiday: ClinicHoliday) -> Result<ClinicHoliday, StoreError>;

    async fn delete_holiday(&mut self, id: Uuid) -> Result<(), StoreError>;

    async fn set_doctor_leave(
        &mut self,
        id: Uuid,
        is_on_leave: bool,
        leave_reason: Option<String>,
    ) -> Result<Doctor, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ClinicStore: ClinicReader {
    async fn begin(&self) -> Result<Box<dyn ClinicTransaction>, StoreError>;
}
