use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use shared_models::clinic::{
    Appointment, AppointmentStatus, ClinicDaySchedule, ClinicHoliday, Doctor, Patient, Visit,
};

use crate::store::{
    AppointmentFilter, ClinicReader, ClinicStore, ClinicTransaction, StoreError, VisitFilter,
};

/// Every table of the clinic aggregate, held in memory.
#[derive(Debug, Clone, Default)]
pub struct ClinicTables {
    pub appointments: HashMap<Uuid, Appointment>,
    pub visits: HashMap<Uuid, Visit>,
    pub schedules: BTreeMap<u8, ClinicDaySchedule>,
    pub holidays: HashMap<Uuid, ClinicHoliday>,
    pub doctors: HashMap<Uuid, Doctor>,
    pub patients: HashMap<Uuid, Patient>,
}

impl ClinicTables {
    /// Open every day 09:00-20:00, staff window 07:00-20:00.
    pub fn with_default_schedule() -> Self {
        let mut tables = Self::default();
        let open = NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN);
        let close = NaiveTime::from_hms_opt(20, 0, 0).unwrap_or(NaiveTime::MIN);
        let staff_open = NaiveTime::from_hms_opt(7, 0, 0).unwrap_or(NaiveTime::MIN);

        for day_of_week in 0..7u8 {
            tables.schedules.insert(
                day_of_week,
                ClinicDaySchedule {
                    day_of_week,
                    is_open: true,
                    open_time: open,
                    close_time: close,
                    staff_open_time: Some(staff_open),
                    staff_close_time: Some(close),
                },
            );
        }

        tables
    }

    fn appointments_matching(&self, filter: &AppointmentFilter) -> Vec<Appointment> {
        let mut rows: Vec<Appointment> = self
            .appointments
            .values()
            .filter(|apt| filter.matches(apt))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.local_start()
                .cmp(&b.local_start())
                .then_with(|| a.id.cmp(&b.id))
        });
        rows
    }

    fn visits_matching(&self, filter: &VisitFilter) -> Vec<Visit> {
        let mut rows: Vec<Visit> = self
            .visits
            .values()
            .filter(|visit| filter.matches(visit))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.visit_date.cmp(&b.visit_date).then_with(|| a.id.cmp(&b.id)));
        rows
    }

    fn holiday_on(&self, date: NaiveDate) -> Option<ClinicHoliday> {
        self.holidays.values().find(|h| h.date == date).cloned()
    }

    fn holidays_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<ClinicHoliday> {
        let mut rows: Vec<ClinicHoliday> = self
            .holidays
            .values()
            .filter(|h| h.date >= from && h.date <= to)
            .cloned()
            .collect();
        rows.sort_by_key(|h| h.date);
        rows
    }

    fn sorted_doctors(&self) -> Vec<Doctor> {
        let mut rows: Vec<Doctor> = self.doctors.values().cloned().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        rows
    }

    fn patient_by_phone(&self, phone: &str) -> Option<Patient> {
        self.patients
            .values()
            .filter(|p| !p.is_staff && p.phone.as_deref() == Some(phone))
            .min_by_key(|p| p.created_at)
            .cloned()
    }

    fn patient_by_name_and_phone(&self, name: &str, phone: &str) -> Option<Patient> {
        let wanted = name.trim().to_lowercase();
        self.patients
            .values()
            .filter(|p| {
                !p.is_staff
                    && p.phone.as_deref() == Some(phone)
                    && p.name.trim().to_lowercase() == wanted
            })
            .min_by_key(|p| p.created_at)
            .cloned()
    }

    fn patient_by_email(&self, email: &str) -> Option<Patient> {
        self.patients
            .values()
            .find(|p| p.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    fn patients_registered_between(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> u32 {
        self.patients
            .values()
            .filter(|p| p.created_at >= from && p.created_at < until)
            .count() as u32
    }
}

/// In-process store used when Supabase is not configured and by the test suites.
///
/// A transaction holds the table lock for its whole life and works on a copy,
/// so concurrent transactions run one after another and an abandoned one
/// leaves nothing behind.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<ClinicTables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_schedule() -> Self {
        Self::from_tables(ClinicTables::with_default_schedule())
    }

    pub fn from_tables(tables: ClinicTables) -> Self {
        Self {
            tables: Arc::new(Mutex::new(tables)),
        }
    }

    pub async fn snapshot(&self) -> ClinicTables {
        self.tables.lock().await.clone()
    }

    pub async fn insert_doctor(&self, doctor: Doctor) {
        self.tables.lock().await.doctors.insert(doctor.id, doctor);
    }

    pub async fn insert_patient(&self, patient: Patient) {
        self.tables.lock().await.patients.insert(patient.id, patient);
    }

    pub async fn insert_appointment(&self, appointment: Appointment) {
        self.tables
            .lock()
            .await
            .appointments
            .insert(appointment.id, appointment);
    }

    pub async fn insert_visit(&self, visit: Visit) {
        self.tables.lock().await.visits.insert(visit.id, visit);
    }

    pub async fn insert_holiday(&self, holiday: ClinicHoliday) {
        self.tables.lock().await.holidays.insert(holiday.id, holiday);
    }

    pub async fn insert_schedule(&self, schedule: ClinicDaySchedule) {
        self.tables
            .lock()
            .await
            .schedules
            .insert(schedule.day_of_week, schedule);
    }
}

macro_rules! impl_reader {
    ($ty:ty, |$this:ident| $tables:expr) => {
        #[async_trait]
        impl ClinicReader for $ty {
            async fn find_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
                let $this = self;
                Ok($tables.appointments_matching(filter))
            }

            async fn find_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
                let $this = self;
                Ok($tables.appointments.get(&id).cloned())
            }

            async fn find_visits(&self, filter: &VisitFilter) -> Result<Vec<Visit>, StoreError> {
                let $this = self;
                Ok($tables.visits_matching(filter))
            }

            async fn find_day_schedule(&self, day_of_week: u8) -> Result<Option<ClinicDaySchedule>, StoreError> {
                let $this = self;
                Ok($tables.schedules.get(&day_of_week).cloned())
            }

            async fn list_day_schedules(&self) -> Result<Vec<ClinicDaySchedule>, StoreError> {
                let $this = self;
                Ok($tables.schedules.values().cloned().collect())
            }

            async fn find_holiday(&self, date: NaiveDate) -> Result<Option<ClinicHoliday>, StoreError> {
                let $this = self;
                Ok($tables.holiday_on(date))
            }

            async fn list_holidays(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<ClinicHoliday>, StoreError> {
                let $this = self;
                Ok($tables.holidays_between(from, to))
            }

            async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError> {
                let $this = self;
                Ok($tables.sorted_doctors())
            }

            async fn find_doctor(&self, id: Uuid) -> Result<Option<Doctor>, StoreError> {
                let $this = self;
                Ok($tables.doctors.get(&id).cloned())
            }

            async fn find_patient(&self, id: Uuid) -> Result<Option<Patient>, StoreError> {
                let $this = self;
                Ok($tables.patients.get(&id).cloned())
            }

            async fn find_patient_by_phone(&self, phone: &str) -> Result<Option<Patient>, StoreError> {
                let $this = self;
                Ok($tables.patient_by_phone(phone))
            }

            async fn find_patient_by_name_and_phone(&self, name: &str, phone: &str) -> Result<Option<Patient>, StoreError> {
                let $this = self;
                Ok($tables.patient_by_name_and_phone(name, phone))
            }

            async fn find_patient_by_email(&self, email: &str) -> Result<Option<Patient>, StoreError> {
                let $this = self;
                Ok($tables.patient_by_email(email))
            }

            async fn count_patients_registered_between(
                &self,
                from: DateTime<Utc>,
                until: DateTime<Utc>,
            ) -> Result<u32, StoreError> {
                let $this = self;
                Ok($tables.patients_registered_between(from, until))
            }
        }
    };
}

impl_reader!(MemoryStore, |store| store.tables.lock().await);
impl_reader!(MemoryTransaction, |tx| tx.working);

#[async_trait]
impl ClinicStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn ClinicTransaction>, StoreError> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        debug!("Memory transaction started");
        Ok(Box::new(MemoryTransaction { guard, working }))
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<ClinicTables>,
    working: ClinicTables,
}

#[async_trait]
impl ClinicTransaction for MemoryTransaction {
    async fn create_appointment(&mut self, appointment: Appointment) -> Result<Appointment, StoreError> {
        if self.working.appointments.contains_key(&appointment.id) {
            return Err(StoreError::Conflict(format!(
                "appointment {} already exists",
                appointment.id
            )));
        }
        self.working
            .appointments
            .insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn update_appointment(&mut self, appointment: Appointment) -> Result<Appointment, StoreError> {
        match self.working.appointments.get_mut(&appointment.id) {
            Some(row) => {
                *row = appointment.clone();
                Ok(appointment)
            }
            None => Err(StoreError::NotFound("Appointment".to_string())),
        }
    }

    async fn update_appointment_status(
        &mut self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, StoreError> {
        let row = self
            .working
            .appointments
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("Appointment".to_string()))?;
        row.status = status;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn create_visit(&mut self, visit: Visit) -> Result<Visit, StoreError> {
        if !self.working.patients.contains_key(&visit.patient_id) {
            return Err(StoreError::NotFound("Patient".to_string()));
        }
        self.working.visits.insert(visit.id, visit.clone());
        Ok(visit)
    }

    async fn create_patient(&mut self, patient: Patient) -> Result<Patient, StoreError> {
        if self.working.patient_by_email(&patient.email).is_some() {
            return Err(StoreError::Conflict(format!(
                "email {} is already registered",
                patient.email
            )));
        }
        self.working.patients.insert(patient.id, patient.clone());
        Ok(patient)
    }

    async fn relink_guest_appointments(
        &mut self,
        name: &str,
        phone: &str,
        patient_id: Uuid,
    ) -> Result<usize, StoreError> {
        let filter = AppointmentFilter::new().guest(name, phone).unlinked();
        let now = Utc::now();
        let mut relinked = 0;

        for appointment in self.working.appointments.values_mut() {
            if filter.matches(appointment) {
                appointment.patient_id = Some(patient_id);
                appointment.updated_at = now;
                relinked += 1;
            }
        }

        Ok(relinked)
    }

    async fn upsert_day_schedule(&mut self, schedule: ClinicDaySchedule) -> Result<ClinicDaySchedule, StoreError> {
        self.working
            .schedules
            .insert(schedule.day_of_week, schedule.clone());
        Ok(schedule)
    }

    async fn create_holiday(&mut self, holiday: ClinicHoliday) -> Result<ClinicHoliday, StoreError> {
        if self.working.holiday_on(holiday.date).is_some() {
            return Err(StoreError::Conflict(format!(
                "a holiday on {} already exists",
                holiday.date
            )));
        }
        self.working.holidays.insert(holiday.id, holiday.clone());
        Ok(holiday)
    }

    async fn delete_holiday(&mut self, id: Uuid) -> Result<(), StoreError> {
        self.working
            .holidays
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound("Holiday".to_string()))
    }

    async fn set_doctor_leave(
        &mut self,
        id: Uuid,
        is_on_leave: bool,
        leave_reason: Option<String>,
    ) -> Result<Doctor, StoreError> {
        let doctor = self
            .working
            .doctors
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("Doctor".to_string()))?;
        doctor.is_on_leave = is_on_leave;
        doctor.leave_reason = if is_on_leave { leave_reason } else { None };
        Ok(doctor.clone())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        debug!("Memory transaction committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn holiday(date: NaiveDate) -> ClinicHoliday {
        ClinicHoliday {
            id: Uuid::new_v4(),
            date,
            label: "Songkran".to_string(),
        }
    }

    #[tokio::test]
    async fn dropped_transaction_leaves_no_trace() {
        let store = MemoryStore::with_default_schedule();
        let date = NaiveDate::from_ymd_opt(2026, 4, 13).unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            tx.create_holiday(holiday(date)).await.unwrap();
            assert!(tx.find_holiday(date).await.unwrap().is_some());
        }

        assert!(store.find_holiday(date).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn committed_writes_become_visible() {
        let store = MemoryStore::with_default_schedule();
        let date = NaiveDate::from_ymd_opt(2026, 4, 13).unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.create_holiday(holiday(date)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.find_holiday(date).await.unwrap().unwrap().label, "Songkran");
    }

    #[tokio::test]
    async fn duplicate_holiday_date_is_a_conflict() {
        let store = MemoryStore::new();
        let date = NaiveDate::from_ymd_opt(2026, 4, 13).unwrap();
        store.insert_holiday(holiday(date)).await;

        let mut tx = store.begin().await.unwrap();
        assert_matches!(tx.create_holiday(holiday(date)).await, Err(StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn default_schedule_covers_the_whole_week() {
        let store = MemoryStore::with_default_schedule();
        let schedules = store.list_day_schedules().await.unwrap();

        assert_eq!(schedules.len(), 7);
        assert!(schedules.iter().all(|s| s.is_open));
        assert_eq!(schedules[0].staff_open_time, NaiveTime::from_hms_opt(7, 0, 0));
    }
}
