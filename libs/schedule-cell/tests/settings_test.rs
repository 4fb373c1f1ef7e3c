use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, NaiveDate};
use serde_json::json;
use tower::ServiceExt;
use assert_matches::assert_matches;

use schedule_cell::models::{CreateHolidayRequest, DayScheduleInput, UpdateScheduleRequest};
use schedule_cell::router::settings_routes;
use schedule_cell::{BookingRole, ClinicCalendar, ClinicClock, SettingsService};
use shared_database::{ClinicReader, MemoryStore};
use shared_models::error::SchedulingError;
use shared_utils::test_utils::{ClinicFixtures, JwtTestUtils, TestConfig, TestUser};

fn future_date(days: i64) -> NaiveDate {
    ClinicClock::default().today() + Duration::days(days)
}

#[tokio::test]
async fn holiday_closes_an_otherwise_open_day() {
    let store = MemoryStore::with_default_schedule();
    let date = future_date(10);

    let holiday = SettingsService::create_holiday(
        &store,
        CreateHolidayRequest { date, label: "Songkran".to_string() },
        ClinicClock::default().today(),
    )
    .await
    .unwrap();
    assert_eq!(holiday.label, "Songkran");

    let status = ClinicCalendar::is_open(&store, date, BookingRole::Staff).await.unwrap();
    assert!(!status.open);
    assert_eq!(status.reason.as_deref(), Some("Songkran"));

    assert_matches!(
        ClinicCalendar::require_open(&store, date, BookingRole::Public).await,
        Err(SchedulingError::ClosedDay { reason, .. }) if reason == "Songkran"
    );
}

#[tokio::test]
async fn holidays_must_be_future_and_unique() {
    let store = MemoryStore::with_default_schedule();
    let today = ClinicClock::default().today();

    let past = SettingsService::create_holiday(
        &store,
        CreateHolidayRequest { date: today, label: "Too late".to_string() },
        today,
    )
    .await;
    assert_matches!(past, Err(SchedulingError::Validation(_)));

    let date = future_date(3);
    SettingsService::create_holiday(&store, CreateHolidayRequest { date, label: "A".to_string() }, today)
        .await
        .unwrap();
    let duplicate =
        SettingsService::create_holiday(&store, CreateHolidayRequest { date, label: "B".to_string() }, today).await;
    assert_matches!(duplicate, Err(SchedulingError::Validation(msg)) if msg.contains("already exists"));
}

#[tokio::test]
async fn schedule_update_can_close_sunday() {
    let store = MemoryStore::with_default_schedule();

    SettingsService::update_schedule(
        &store,
        UpdateScheduleRequest {
            days: vec![DayScheduleInput {
                day_of_week: 0,
                is_open: false,
                open_time: ClinicFixtures::time(9, 0),
                close_time: ClinicFixtures::time(20, 0),
                staff_open_time: None,
                staff_close_time: None,
            }],
        },
    )
    .await
    .unwrap();

    let sunday = ClinicFixtures::date(2026, 3, 1);
    assert!(!ClinicCalendar::is_open(&store, sunday, BookingRole::Public).await.unwrap().open);
    assert!(store.find_day_schedule(1).await.unwrap().unwrap().is_open);
}

#[tokio::test]
async fn schedule_update_rejects_unknown_weekday() {
    let store = MemoryStore::with_default_schedule();
    let result = SettingsService::update_schedule(
        &store,
        UpdateScheduleRequest {
            days: vec![DayScheduleInput {
                day_of_week: 7,
                is_open: true,
                open_time: ClinicFixtures::time(9, 0),
                close_time: ClinicFixtures::time(20, 0),
                staff_open_time: None,
                staff_close_time: None,
            }],
        },
    )
    .await;

    assert_matches!(result, Err(SchedulingError::Validation(_)));
}

#[tokio::test]
async fn settings_routes_require_staff() {
    let config = TestConfig::default();
    let app = settings_routes(config.state_with(MemoryStore::with_default_schedule()));

    let anonymous = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let patient = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/")
                .header("Authorization", JwtTestUtils::bearer(&TestUser::patient("p@clinic.test"), &config))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(patient.status(), StatusCode::FORBIDDEN);

    let staff = app
        .oneshot(
            Request::builder()
                .uri("/")
                .header("Authorization", JwtTestUtils::bearer(&TestUser::staff("desk@clinic.test"), &config))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(staff.status(), StatusCode::OK);

    let body = axum::body::to_bytes(staff.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["schedules"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn holiday_can_be_created_and_deleted_over_http() {
    let config = TestConfig::default();
    let app = settings_routes(config.state_with(MemoryStore::with_default_schedule()));
    let auth = JwtTestUtils::bearer(&TestUser::admin("admin@clinic.test"), &config);

    let created = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/holidays")
                .header("Authorization", &auth)
                .header("Content-Type", "application/json")
                .body(Body::from(json!({ "date": future_date(5), "label": "Chakri Day" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);

    let body = axum::body::to_bytes(created.into_body(), usize::MAX).await.unwrap();
    let holiday: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let id = holiday["id"].as_str().unwrap();

    let deleted = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/holidays/{}", id))
                .header("Authorization", &auth)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::OK);

    let again = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/holidays/{}", id))
                .header("Authorization", &auth)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}
