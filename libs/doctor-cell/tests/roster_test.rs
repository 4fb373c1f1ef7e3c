use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use doctor_cell::{admin_doctor_routes, doctor_routes, DoctorRoster, DoctorSearchQuery, SetLeaveRequest};
use schedule_cell::{ClinicClock, SchedulingRules};
use shared_database::MemoryStore;
use shared_models::clinic::{AppointmentStatus, VisitStatus};
use shared_models::error::SchedulingError;
use shared_utils::test_utils::{ClinicFixtures, JwtTestUtils, TestConfig, TestUser};

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn day_schedule_merges_bookings_and_walk_ins() {
    let store = MemoryStore::with_default_schedule();
    let doctor = ClinicFixtures::doctor("Dr. Chai");
    let patient = ClinicFixtures::patient("Walker", "0800000001");
    let date = ClinicFixtures::date(2026, 3, 2);
    store.insert_doctor(doctor.clone()).await;
    store.insert_patient(patient.clone()).await;
    store
        .insert_appointment(ClinicFixtures::appointment(
            doctor.id,
            date,
            ClinicFixtures::time(10, 0),
            60,
            AppointmentStatus::Confirmed,
        ))
        .await;
    store
        .insert_appointment(ClinicFixtures::appointment(
            doctor.id,
            date,
            ClinicFixtures::time(15, 0),
            60,
            AppointmentStatus::Cancelled,
        ))
        .await;
    let walk_in_at = ClinicClock::default().to_utc(date.and_time(ClinicFixtures::time(13, 0)));
    store
        .insert_visit(ClinicFixtures::walk_in(doctor.id, patient.id, walk_in_at, 30, VisitStatus::Ongoing))
        .await;

    let schedule = DoctorRoster::day_schedule(&store, SchedulingRules::default(), doctor.id, date)
        .await
        .unwrap();

    assert_eq!(schedule.busy_slots, vec!["10:00-11:00".to_string(), "13:00-13:30".to_string()]);
    assert_eq!(schedule.intervals[1].reason(), "Walk-in 13:00-13:30");
    assert_eq!(schedule.intervals[0].end.format("%H:%M").to_string(), "11:30");
}

#[tokio::test]
async fn leave_toggle_clears_reason_when_returning() {
    let store = MemoryStore::with_default_schedule();
    let doctor = ClinicFixtures::doctor("Dr. Fah");
    store.insert_doctor(doctor.clone()).await;

    let away = DoctorRoster::set_leave(
        &store,
        doctor.id,
        SetLeaveRequest { is_on_leave: true, leave_reason: Some("  Sick  ".to_string()) },
    )
    .await
    .unwrap();
    assert!(away.is_on_leave);
    assert_eq!(away.leave_reason.as_deref(), Some("Sick"));

    let listed = DoctorRoster::list(
        &store,
        &DoctorSearchQuery { specialty: None, include_on_leave: Some(false) },
    )
    .await
    .unwrap();
    assert!(listed.is_empty());

    let back = DoctorRoster::set_leave(
        &store,
        doctor.id,
        SetLeaveRequest { is_on_leave: false, leave_reason: Some("ignored".to_string()) },
    )
    .await
    .unwrap();
    assert!(!back.is_on_leave);
    assert_eq!(back.leave_reason, None);

    assert_matches!(
        DoctorRoster::set_leave(&store, Uuid::new_v4(), SetLeaveRequest { is_on_leave: true, leave_reason: None }).await,
        Err(SchedulingError::NotFound(_))
    );
}

#[tokio::test]
async fn public_list_and_staff_leave_routes() {
    let config = TestConfig::default();
    let store = MemoryStore::with_default_schedule();
    let doctor = ClinicFixtures::doctor("Dr. Route");
    store.insert_doctor(doctor.clone()).await;
    let state = config.state_with(store);
    let app = Router::new()
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/admin/doctors", admin_doctor_routes(state));

    let listed = app
        .clone()
        .oneshot(Request::builder().uri("/doctors?specialty=physical").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(listed.status(), StatusCode::OK);
    assert_eq!(body_json(listed).await["total"], 1);

    let leave_body = json!({ "is_on_leave": true, "leave_reason": "Training" }).to_string();
    let denied = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(format!("/admin/doctors/{}/leave", doctor.id))
                .header("Authorization", JwtTestUtils::bearer(&TestUser::patient("p@example.com"), &config))
                .header("Content-Type", "application/json")
                .body(Body::from(leave_body.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let updated = app
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(format!("/admin/doctors/{}/leave", doctor.id))
                .header("Authorization", JwtTestUtils::bearer(&TestUser::admin("a@example.com"), &config))
                .header("Content-Type", "application/json")
                .body(Body::from(leave_body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(updated.status(), StatusCode::OK);
    let json = body_json(updated).await;
    assert_eq!(json["doctor"]["is_on_leave"], true);
    assert_eq!(json["doctor"]["leave_reason"], "Training");
}
