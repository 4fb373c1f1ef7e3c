use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Roles allowed through the staff surface.
pub const STAFF_ROLES: [&str; 3] = ["admin", "staff", "doctor"];

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_staff(&self) -> bool {
        self.role
            .as_deref()
            .map(|role| STAFF_ROLES.contains(&role))
            .unwrap_or(false)
    }
}

/// Inserted by the optional auth middleware on public routes.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<User>);
