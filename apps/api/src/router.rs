use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::{appointment_routes, booking_routes, staff_booking_routes};
use doctor_cell::{admin_doctor_routes, doctor_routes};
use patient_cell::patient_routes;
use schedule_cell::router::settings_routes;
use shared_utils::AppState;
use visit_cell::visit_routes;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Nava Clinic API is running!" }))
        // Public
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/booking", booking_routes(state.clone()))
        // Staff
        .nest("/admin/booking", staff_booking_routes(state.clone()))
        .nest("/admin/appointments", appointment_routes(state.clone()))
        .nest("/admin/doctors", admin_doctor_routes(state.clone()))
        .nest("/admin/visits", visit_routes(state.clone()))
        .nest("/admin/patients", patient_routes(state.clone()))
        .nest("/admin/settings", settings_routes(state))
}
