use chrono::{TimeZone, Utc};
use uuid::Uuid;

use schedule_cell::{AvailabilityIndex, ConflictChecker, SchedulingRules};
use shared_database::MemoryStore;
use shared_models::clinic::{AppointmentStatus, IntervalSource, VisitStatus};
use shared_utils::test_utils::ClinicFixtures;

async fn seeded() -> (MemoryStore, Uuid, Uuid) {
    let store = MemoryStore::with_default_schedule();
    let doctor = ClinicFixtures::doctor("Dr. Anan");
    let patient = ClinicFixtures::patient("Walk In", "0899999999");
    let (doctor_id, patient_id) = (doctor.id, patient.id);
    store.insert_doctor(doctor).await;
    store.insert_patient(patient).await;
    (store, doctor_id, patient_id)
}

#[tokio::test]
async fn merges_both_sources_in_start_order() {
    let (store, doctor_id, patient_id) = seeded().await;
    let date = ClinicFixtures::date(2026, 3, 2);

    store
        .insert_appointment(ClinicFixtures::appointment(
            doctor_id,
            date,
            ClinicFixtures::time(14, 0),
            60,
            AppointmentStatus::Confirmed,
        ))
        .await;
    // 06:00 UTC is 13:00 in Bangkok.
    store
        .insert_visit(ClinicFixtures::walk_in(
            doctor_id,
            patient_id,
            Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap(),
            30,
            VisitStatus::Ongoing,
        ))
        .await;

    let index = AvailabilityIndex::new(SchedulingRules::default());
    let busy = index.busy_intervals(&store, doctor_id, date, None).await.unwrap();

    assert_eq!(busy.len(), 2);
    assert_eq!(busy[0].source_kind, IntervalSource::WalkIn);
    assert_eq!(busy[0].label(), "13:00-13:30");
    assert_eq!(busy[0].end.format("%H:%M").to_string(), "14:00");
    assert_eq!(busy[1].reason(), "Booked 14:00-15:00");
}

#[tokio::test]
async fn inactive_and_appointment_linked_records_do_not_block() {
    let (store, doctor_id, patient_id) = seeded().await;
    let date = ClinicFixtures::date(2026, 3, 2);

    let cancelled = ClinicFixtures::appointment(
        doctor_id,
        date,
        ClinicFixtures::time(10, 0),
        60,
        AppointmentStatus::Cancelled,
    );
    let completed = ClinicFixtures::appointment(
        doctor_id,
        date,
        ClinicFixtures::time(11, 0),
        60,
        AppointmentStatus::Completed,
    );
    let mut from_booking = ClinicFixtures::walk_in(
        doctor_id,
        patient_id,
        Utc.with_ymd_and_hms(2026, 3, 2, 4, 0, 0).unwrap(),
        60,
        VisitStatus::Ongoing,
    );
    from_booking.appointment_id = Some(completed.id);
    let finished_walk_in = ClinicFixtures::walk_in(
        doctor_id,
        patient_id,
        Utc.with_ymd_and_hms(2026, 3, 2, 7, 0, 0).unwrap(),
        30,
        VisitStatus::Completed,
    );

    store.insert_appointment(cancelled).await;
    store.insert_appointment(completed).await;
    store.insert_visit(from_booking).await;
    store.insert_visit(finished_walk_in).await;

    let index = AvailabilityIndex::new(SchedulingRules::default());
    assert!(index.busy_intervals(&store, doctor_id, date, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn visit_near_utc_midnight_lands_on_its_local_date() {
    let (store, doctor_id, patient_id) = seeded().await;

    // 2026-03-01 23:30 UTC is 2026-03-02 06:30 in Bangkok.
    store
        .insert_visit(ClinicFixtures::walk_in(
            doctor_id,
            patient_id,
            Utc.with_ymd_and_hms(2026, 3, 1, 23, 30, 0).unwrap(),
            60,
            VisitStatus::Pending,
        ))
        .await;

    let index = AvailabilityIndex::new(SchedulingRules::default());
    let monday = index
        .busy_intervals(&store, doctor_id, ClinicFixtures::date(2026, 3, 2), None)
        .await
        .unwrap();
    let sunday = ClinicFixtures::date(2026, 3, 1);
    let sunday_only = index.busy_by_doctor(&store, sunday, sunday).await.unwrap();

    assert_eq!(monday.len(), 1);
    assert_eq!(monday[0].label(), "06:30-07:30");
    assert!(!sunday_only.contains_key(&doctor_id));

    let checker = ConflictChecker::new(SchedulingRules::default().buffer);
    let seven = ClinicFixtures::date(2026, 3, 2).and_time(ClinicFixtures::time(7, 0));
    assert!(checker.check(seven, 30, &monday).conflict);
}

#[tokio::test]
async fn excluded_appointment_is_ignored() {
    let (store, doctor_id, _) = seeded().await;
    let date = ClinicFixtures::date(2026, 3, 2);
    let apt = ClinicFixtures::appointment(
        doctor_id,
        date,
        ClinicFixtures::time(10, 0),
        60,
        AppointmentStatus::Pending,
    );
    let id = apt.id;
    store.insert_appointment(apt).await;

    let index = AvailabilityIndex::new(SchedulingRules::default());
    assert_eq!(index.busy_intervals(&store, doctor_id, date, None).await.unwrap().len(), 1);
    assert!(index.busy_intervals(&store, doctor_id, date, Some(id)).await.unwrap().is_empty());
}

#[tokio::test]
async fn late_evening_booking_blocks_the_next_morning() {
    let (store, doctor_id, _) = seeded().await;
    let sunday = ClinicFixtures::date(2026, 3, 1);
    let monday = ClinicFixtures::date(2026, 3, 2);

    store
        .insert_appointment(ClinicFixtures::appointment(
            doctor_id,
            sunday,
            ClinicFixtures::time(23, 30),
            90,
            AppointmentStatus::Confirmed,
        ))
        .await;
    store
        .insert_appointment(ClinicFixtures::appointment(
            doctor_id,
            sunday,
            ClinicFixtures::time(18, 0),
            60,
            AppointmentStatus::Confirmed,
        ))
        .await;

    let index = AvailabilityIndex::new(SchedulingRules::default());
    let busy = index.busy_intervals(&store, doctor_id, monday, None).await.unwrap();

    // The 18:00 booking is over long before midnight.
    assert_eq!(busy.len(), 1);
    assert_eq!(busy[0].label(), "23:30-01:00");

    let checker = ConflictChecker::new(SchedulingRules::default().buffer);
    let half_past_midnight = monday.and_time(ClinicFixtures::time(0, 30));
    let blocked = checker.check(half_past_midnight, 30, &busy);
    assert!(blocked.conflict);
    assert!(!checker.check(monday.and_time(ClinicFixtures::time(1, 30)), 30, &busy).conflict);
}
