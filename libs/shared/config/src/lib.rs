use std::env;
use std::str::FromStr;

use chrono::{FixedOffset, Offset, Utc};
use tracing::warn;

const BANGKOK_OFFSET_SECONDS: i32 = 7 * 3600;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    /// Offset of the clinic's wall clock. Appointment dates and times are stored in this frame.
    pub clinic_utc_offset: FixedOffset,
    pub booking_buffer_minutes: i64,
    pub slot_step_minutes: i64,
    pub guest_email_domain: String,
    pub default_patient_password: String,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            clinic_utc_offset: env::var("CLINIC_UTC_OFFSET")
                .ok()
                .and_then(|raw| match FixedOffset::from_str(&raw) {
                    Ok(offset) => Some(offset),
                    Err(_) => {
                        warn!("CLINIC_UTC_OFFSET '{}' is not a valid offset, using +07:00", raw);
                        None
                    }
                })
                .unwrap_or_else(default_clinic_offset),
            booking_buffer_minutes: parse_or("BOOKING_BUFFER_MINUTES", 30),
            slot_step_minutes: parse_or("SLOT_STEP_MINUTES", 30),
            guest_email_domain: env::var("GUEST_EMAIL_DOMAIN")
                .unwrap_or_else(|_| "navaclinic.com".to_string()),
            default_patient_password: env::var("DEFAULT_PATIENT_PASSWORD")
                .unwrap_or_else(|_| {
                    warn!("DEFAULT_PATIENT_PASSWORD not set, using built-in default");
                    "12345678".to_string()
                }),
            server_port: parse_or("SERVER_PORT", 3000),
        };

        if !config.is_configured() {
            warn!("Supabase not fully configured - falling back to the in-memory clinic store");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_service_role_key.is_empty()
    }

    pub fn is_auth_configured(&self) -> bool {
        !self.supabase_jwt_secret.is_empty()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_service_role_key: String::new(),
            supabase_jwt_secret: String::new(),
            clinic_utc_offset: default_clinic_offset(),
            booking_buffer_minutes: 30,
            slot_step_minutes: 30,
            guest_email_domain: "navaclinic.com".to_string(),
            default_patient_password: "12345678".to_string(),
            server_port: 3000,
        }
    }
}

/// Asia/Bangkok has no daylight saving, so a fixed offset is exact.
pub fn default_clinic_offset() -> FixedOffset {
    FixedOffset::east_opt(BANGKOK_OFFSET_SECONDS).unwrap_or_else(|| Utc.fix())
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}
