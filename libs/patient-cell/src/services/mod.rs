pub mod directory;
pub mod identity;
pub mod password;

pub use directory::PatientDirectory;
pub use identity::IdentityService;
pub use password::PasswordService;
