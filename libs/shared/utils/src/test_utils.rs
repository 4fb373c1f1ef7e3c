use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{ClinicStore, MemoryStore};
use shared_models::auth::User;
use shared_models::clinic::{
    Appointment, AppointmentStatus, Doctor, Patient, Visit, VisitStatus,
};

use crate::state::AppState;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            supabase_service_role_key: "test-service-role-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: self.supabase_service_role_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            ..AppConfig::default()
        }
    }

    /// Router state over an in-memory store.
    pub fn state_with(&self, store: MemoryStore) -> Arc<AppState> {
        let store: Arc<dyn ClinicStore> = Arc::new(store);
        AppState::new(self.to_app_config(), store).into_arc()
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn staff(email: &str) -> Self {
        Self::new(email, "staff")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    fn sign(payload: serde_json::Value, secret: &str) -> String {
        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        Self::sign(
            json!({
                "sub": user.id,
                "email": user.email,
                "role": user.role,
                "iat": now.timestamp(),
                "exp": exp.timestamp()
            }),
            secret,
        )
    }

    /// Token shaped the way Supabase Auth issues them: generic top-level role,
    /// clinic role under `app_metadata`.
    pub fn create_supabase_token(user: &TestUser, clinic_role: &str, secret: &str) -> String {
        let now = Utc::now();
        Self::sign(
            json!({
                "sub": user.id,
                "email": user.email,
                "role": "authenticated",
                "app_metadata": { "role": clinic_role },
                "iat": now.timestamp(),
                "exp": (now + Duration::hours(1)).timestamp()
            }),
            secret,
        )
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }

    pub fn bearer(user: &TestUser, config: &TestConfig) -> String {
        format!("Bearer {}", Self::create_test_token(user, &config.jwt_secret, Some(1)))
    }
}

/// Row builders for seeding a `MemoryStore`.
pub struct ClinicFixtures;

impl ClinicFixtures {
    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid fixture date")
    }

    pub fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("valid fixture time")
    }

    pub fn doctor(name: &str) -> Doctor {
        Doctor {
            id: Uuid::new_v4(),
            name: name.to_string(),
            specialty: Some("Physical therapy".to_string()),
            user_id: None,
            is_on_leave: false,
            leave_reason: None,
        }
    }

    pub fn patient(name: &str, phone: &str) -> Patient {
        Patient {
            id: Uuid::new_v4(),
            hn: format!("HN-{}", &Uuid::new_v4().simple().to_string()[..8]),
            name: name.to_string(),
            phone: Some(phone.to_string()),
            email: format!("{}@patients.test", Uuid::new_v4().simple()),
            password_hash: String::new(),
            is_staff: false,
            created_at: Utc::now() - Duration::days(30),
        }
    }

    pub fn appointment(
        doctor_id: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        duration_minutes: i32,
        status: AppointmentStatus,
    ) -> Appointment {
        let now = Utc::now();
        Appointment {
            id: Uuid::new_v4(),
            doctor_id: Some(doctor_id),
            patient_id: None,
            guest_name: Some("Guest".to_string()),
            guest_phone: Some("0800000000".to_string()),
            appointment_date: date,
            start_time: start,
            duration_minutes,
            status,
            symptoms: "check-up".to_string(),
            price: None,
            is_staff_booked: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn guest_appointment(
        doctor_id: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        name: &str,
        phone: &str,
    ) -> Appointment {
        let mut appointment = Self::appointment(doctor_id, date, start, 60, AppointmentStatus::Pending);
        appointment.guest_name = Some(name.to_string());
        appointment.guest_phone = Some(phone.to_string());
        appointment
    }

    pub fn walk_in(
        doctor_id: Uuid,
        patient_id: Uuid,
        visit_date: DateTime<Utc>,
        duration_minutes: i32,
        status: VisitStatus,
    ) -> Visit {
        Visit {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id,
            appointment_id: None,
            visit_date,
            time_in: Some(visit_date),
            duration_minutes,
            status,
            symptoms: None,
            notes: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(app_config.is_configured());
        assert!(app_config.is_auth_configured());
        assert_eq!(app_config.booking_buffer_minutes, 30);
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::staff("desk@example.com");
        assert_eq!(user.role, "staff");

        let user_model = user.to_user();
        assert_eq!(user_model.email, Some(user.email.clone()));
        assert!(user_model.is_staff());
        assert!(!TestUser::patient("p@example.com").to_user().is_staff());
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::default();
        let token = JwtTestUtils::create_test_token(&user, "test-secret", Some(1));

        assert_eq!(token.split('.').count(), 3);
    }
}
