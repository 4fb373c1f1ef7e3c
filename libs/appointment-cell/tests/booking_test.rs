use assert_matches::assert_matches;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use futures::future::join_all;

use appointment_cell::{
    BookingService, DayStatus, MonthCalendar, PublicBookingRequest, SlotGrid, SlotStatus,
    StaffBooking, StaffBookingRequest, UpdateAppointmentRequest, FULL_DAY_THRESHOLD,
};
use schedule_cell::{BookingRole, ClinicClock};
use shared_database::{AppointmentFilter, ClinicReader, MemoryStore};
use shared_models::auth::User;
use shared_models::clinic::{
    AppointmentStatus, ClinicDaySchedule, ClinicHoliday, Doctor, IntervalSource, PatientRef,
    VisitStatus,
};
use shared_models::error::SchedulingError;
use shared_utils::test_utils::ClinicFixtures;
use uuid::Uuid;

fn clinic_instant(date: NaiveDate, h: u32, m: u32) -> DateTime<Utc> {
    ClinicClock::default().to_utc(date.and_time(ClinicFixtures::time(h, m)))
}

fn next_week() -> NaiveDate {
    ClinicClock::default().today() + Duration::days(7)
}

async fn clinic_with_doctor() -> (MemoryStore, Doctor) {
    let store = MemoryStore::with_default_schedule();
    let doctor = ClinicFixtures::doctor("Dr. Pim");
    store.insert_doctor(doctor.clone()).await;
    (store, doctor)
}

fn guest_booking(doctor_id: Option<Uuid>, date: NaiveDate, h: u32, m: u32, duration: i32) -> PublicBookingRequest {
    PublicBookingRequest {
        doctor_id,
        appointment_date: date,
        start_time: ClinicFixtures::time(h, m),
        duration_minutes: duration,
        symptoms: "lower back pain".to_string(),
        customer_name: Some("Guest Booker".to_string()),
        customer_phone: Some("0811119999".to_string()),
    }
}

#[tokio::test]
async fn grid_reflects_a_confirmed_booking_with_buffers() {
    let (store, doctor) = clinic_with_doctor().await;
    store
        .insert_schedule(ClinicDaySchedule {
            day_of_week: 0,
            is_open: false,
            open_time: ClinicFixtures::time(9, 0),
            close_time: ClinicFixtures::time(20, 0),
            staff_open_time: None,
            staff_close_time: None,
        })
        .await;
    let monday = ClinicFixtures::date(2026, 3, 2);
    store
        .insert_appointment(ClinicFixtures::appointment(
            doctor.id,
            monday,
            ClinicFixtures::time(10, 0),
            60,
            AppointmentStatus::Confirmed,
        ))
        .await;
    let now = clinic_instant(ClinicFixtures::date(2026, 3, 1), 12, 0);
    let grid = SlotGrid::default();

    let rows = grid.generate(&store, monday, 90, BookingRole::Public, now).await.unwrap();
    assert_eq!(rows.first().map(|r| r.time.as_str()), Some("09:00"));
    assert_eq!(rows.last().map(|r| r.time.as_str()), Some("20:00"));
    assert_eq!(rows.len(), 23);

    let at = |time: &str| {
        rows.iter()
            .find(|r| r.time == time)
            .and_then(|r| r.doctor(doctor.id))
            .cloned()
            .unwrap()
    };

    let ten = at("10:00");
    assert_eq!(ten.status, SlotStatus::Busy);
    assert_eq!(ten.reason.as_deref(), Some("Booked 10:00-11:00"));
    assert_eq!(ten.busy_slots, vec!["10:00-11:00".to_string()]);
    assert_eq!(at("11:00").status, SlotStatus::Busy);
    assert_eq!(at("11:30").status, SlotStatus::Available);
    assert_eq!(at("11:30").reason, None);
    // 09:00 + 90 + 30 runs into 10:00.
    assert_eq!(at("09:00").status, SlotStatus::Busy);

    let short = grid.generate(&store, monday, 30, BookingRole::Public, now).await.unwrap();
    let nine = short.iter().find(|r| r.time == "09:00").and_then(|r| r.doctor(doctor.id)).unwrap();
    assert_eq!(nine.status, SlotStatus::Available);

    let sunday = grid
        .generate(&store, ClinicFixtures::date(2026, 3, 1), 60, BookingRole::Public, now)
        .await;
    assert_matches!(sunday, Err(SchedulingError::ClosedDay { .. }));
}

#[tokio::test]
async fn grid_skips_past_slots_today_and_shows_staff_hours() {
    let (store, doctor) = clinic_with_doctor().await;
    let monday = ClinicFixtures::date(2026, 3, 2);
    let grid = SlotGrid::default();

    let midday = clinic_instant(monday, 13, 10);
    let rows = grid.generate(&store, monday, 30, BookingRole::Public, midday).await.unwrap();
    assert_eq!(rows.first().map(|r| r.time.as_str()), Some("13:30"));

    let staff = grid
        .generate(&store, monday, 30, BookingRole::Staff, clinic_instant(monday, 6, 0))
        .await
        .unwrap();
    assert_eq!(staff.first().map(|r| r.time.as_str()), Some("07:00"));
    assert!(staff.iter().all(|r| r.doctor(doctor.id).is_some()));

    let past = grid
        .generate(&store, monday, 30, BookingRole::Public, clinic_instant(monday + Duration::days(1), 9, 0))
        .await;
    assert_matches!(past, Err(SchedulingError::Validation(_)));
    assert_matches!(
        grid.generate(&store, monday, 45, BookingRole::Public, midday).await,
        Err(SchedulingError::Validation(_))
    );
}

#[tokio::test]
async fn doctor_on_leave_is_busy_in_every_slot() {
    let (store, mut doctor) = clinic_with_doctor().await;
    doctor.is_on_leave = true;
    doctor.leave_reason = Some("Conference".to_string());
    store.insert_doctor(doctor.clone()).await;
    let monday = ClinicFixtures::date(2026, 3, 2);

    let rows = SlotGrid::default()
        .generate(&store, monday, 60, BookingRole::Public, clinic_instant(monday, 0, 0))
        .await
        .unwrap();
    assert!(rows.iter().all(|row| {
        let slot = row.doctor(doctor.id).unwrap();
        slot.status == SlotStatus::Busy && slot.reason.as_deref() == Some("On leave: Conference")
    }));

    let refused = BookingService::default()
        .create_public(&store, guest_booking(Some(doctor.id), next_week(), 10, 0, 60), None, Utc::now())
        .await;
    assert_matches!(refused, Err(SchedulingError::Validation(msg)) if msg.contains("On leave"));
}

#[tokio::test]
async fn buffer_applies_on_both_sides_of_a_booking() {
    let (store, doctor) = clinic_with_doctor().await;
    let patient = ClinicFixtures::patient("Regular", "0899990000");
    let patient_id = patient.id;
    store.insert_patient(patient).await;
    let service = BookingService::default();
    let day = next_week();

    let booked = service
        .create_staff(
            &store,
            StaffBookingRequest {
                patient: PatientRef::Registered(patient_id),
                doctor_id: doctor.id,
                appointment_date: day,
                start_time: ClinicFixtures::time(10, 0),
                duration_minutes: 60,
                symptoms: "shoulder".to_string(),
                price: Some(800.0),
            },
            Utc::now(),
        )
        .await
        .unwrap();
    let StaffBooking::Appointment { appointment } = booked else {
        panic!("expected an appointment");
    };
    assert_eq!(appointment.status, AppointmentStatus::Confirmed);
    assert!(appointment.is_staff_booked);
    assert_eq!(appointment.patient_id, Some(patient_id));

    let too_soon = service
        .create_public(&store, guest_booking(Some(doctor.id), day, 11, 0, 30), None, Utc::now())
        .await;
    assert_matches!(
        too_soon,
        Err(SchedulingError::Conflict(detail))
            if detail.source_id == appointment.id && detail.source_kind == IntervalSource::Appointment
    );

    let too_early = service
        .create_public(&store, guest_booking(Some(doctor.id), day, 9, 0, 60), None, Utc::now())
        .await;
    assert_matches!(too_early, Err(SchedulingError::Conflict(_)));

    let after_buffer = service
        .create_public(&store, guest_booking(Some(doctor.id), day, 11, 30, 30), None, Utc::now())
        .await
        .unwrap();
    assert_eq!(after_buffer.status, AppointmentStatus::Pending);
    assert_eq!(after_buffer.guest_name.as_deref(), Some("Guest Booker"));
    assert!(after_buffer.is_guest());
}

#[tokio::test]
async fn late_evening_booking_blocks_the_following_morning() {
    let (store, doctor) = clinic_with_doctor().await;
    let service = BookingService::default();
    let day = next_week();
    let next_day = day + Duration::days(1);

    let late = service
        .create_public(&store, guest_booking(Some(doctor.id), day, 23, 30, 90), None, Utc::now())
        .await
        .unwrap();

    let overlapping = service
        .create_public(&store, guest_booking(Some(doctor.id), next_day, 0, 30, 30), None, Utc::now())
        .await;
    assert_matches!(
        overlapping,
        Err(SchedulingError::Conflict(detail)) if detail.source_id == late.id
    );

    let doctor_bookings = store
        .find_appointments(&AppointmentFilter::new().doctor(doctor.id).active())
        .await
        .unwrap();
    assert_eq!(doctor_bookings.len(), 1);

    let clear = service
        .create_public(&store, guest_booking(Some(doctor.id), next_day, 1, 30, 30), None, Utc::now())
        .await
        .unwrap();
    assert_eq!(clear.appointment_date, next_day);
}

#[tokio::test]
async fn concurrent_bookings_for_one_slot_admit_exactly_one() {
    let (store, doctor) = clinic_with_doctor().await;
    let service = BookingService::default();
    let day = next_week();

    let attempts = (0..5).map(|_| {
        let service = service.clone();
        let store = &store;
        async move {
            service
                .create_public(store, guest_booking(Some(doctor.id), day, 14, 0, 60), None, Utc::now())
                .await
        }
    });
    let results = join_all(attempts).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, SchedulingError::Conflict(_))));

    let active = store
        .find_appointments(&AppointmentFilter::new().doctor(doctor.id).on(day).active())
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn cancelling_frees_the_slot_and_terminal_states_stick() {
    let (store, doctor) = clinic_with_doctor().await;
    let service = BookingService::default();
    let day = next_week();

    let first = service
        .create_public(&store, guest_booking(Some(doctor.id), day, 15, 0, 60), None, Utc::now())
        .await
        .unwrap();
    let cancelled = service
        .update_status(&store, first.id, AppointmentStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

    service
        .create_public(&store, guest_booking(Some(doctor.id), day, 15, 0, 60), None, Utc::now())
        .await
        .unwrap();

    assert_matches!(
        service.update_status(&store, first.id, AppointmentStatus::Confirmed).await,
        Err(SchedulingError::Validation(_))
    );
    assert_matches!(
        service.update_status(&store, Uuid::new_v4(), AppointmentStatus::Confirmed).await,
        Err(SchedulingError::NotFound(_))
    );
}

#[tokio::test]
async fn rescheduling_never_conflicts_with_itself() {
    let (store, doctor) = clinic_with_doctor().await;
    let other = ClinicFixtures::doctor("Dr. Korn");
    store.insert_doctor(other.clone()).await;
    let service = BookingService::default();
    let day = next_week();

    let booking = service
        .create_public(&store, guest_booking(Some(doctor.id), day, 10, 0, 60), None, Utc::now())
        .await
        .unwrap();
    let blocker = service
        .create_public(&store, guest_booking(Some(other.id), day, 13, 0, 60), None, Utc::now())
        .await
        .unwrap();

    let edit = |doctor_id: Uuid, h: u32, m: u32| UpdateAppointmentRequest {
        doctor_id,
        appointment_date: day,
        start_time: ClinicFixtures::time(h, m),
        duration_minutes: 60,
        symptoms: "lower back pain".to_string(),
        price: Some(1200.0),
    };

    let moved = service
        .update(&store, booking.id, edit(doctor.id, 10, 30), Utc::now())
        .await
        .unwrap();
    assert_eq!(moved.start_time, ClinicFixtures::time(10, 30));
    assert_eq!(moved.price, Some(1200.0));

    let clash = service.update(&store, booking.id, edit(other.id, 13, 30), Utc::now()).await;
    assert_matches!(clash, Err(SchedulingError::Conflict(detail)) if detail.source_id == blocker.id);
}

#[tokio::test]
async fn guests_are_linked_to_a_matching_patient() {
    let (store, doctor) = clinic_with_doctor().await;
    let known = ClinicFixtures::patient("Guest Booker", "0811119999");
    let known_id = known.id;
    store.insert_patient(known).await;
    let service = BookingService::default();

    let linked = service
        .create_public(&store, guest_booking(Some(doctor.id), next_week(), 9, 0, 30), None, Utc::now())
        .await
        .unwrap();
    assert_eq!(linked.patient_id, Some(known_id));
    assert_eq!(linked.guest_name, None);

    let caller = User {
        id: known_id.to_string(),
        email: None,
        role: Some("patient".to_string()),
        metadata: None,
        created_at: None,
    };
    let mut signed_in = guest_booking(None, next_week(), 16, 0, 30);
    signed_in.customer_name = None;
    signed_in.customer_phone = None;
    let own = service
        .create_public(&store, signed_in.clone(), Some(&caller), Utc::now())
        .await
        .unwrap();
    assert_eq!(own.patient_id, Some(known_id));
    assert_eq!(own.doctor_id, None);

    assert_matches!(
        service.create_public(&store, signed_in, None, Utc::now()).await,
        Err(SchedulingError::Validation(_))
    );
}

#[tokio::test]
async fn staff_booking_for_an_unregistered_contact_creates_a_visit() {
    let (store, doctor) = clinic_with_doctor().await;
    let day = next_week();

    let booking = BookingService::default()
        .create_staff(
            &store,
            StaffBookingRequest {
                patient: PatientRef::Contact {
                    name: "Phone In".to_string(),
                    phone: "0823334444".to_string(),
                },
                doctor_id: doctor.id,
                appointment_date: day,
                start_time: ClinicFixtures::time(7, 30),
                duration_minutes: 90,
                symptoms: "knee".to_string(),
                price: None,
            },
            Utc::now(),
        )
        .await
        .unwrap();

    let StaffBooking::WalkInVisit(outcome) = booking else {
        panic!("expected a walk-in visit");
    };
    assert!(outcome.patient_created);
    assert_eq!(outcome.visit.status, VisitStatus::Pending);
    assert_eq!(outcome.visit.symptoms.as_deref(), Some("knee"));

    let tables = store.snapshot().await;
    assert!(tables.appointments.is_empty());
    assert_eq!(tables.visits.len(), 1);

    // The visit now blocks the grid.
    let rows = SlotGrid::default()
        .generate(&store, day, 30, BookingRole::Staff, Utc::now())
        .await
        .unwrap();
    let slot = rows.iter().find(|r| r.time == "08:00").and_then(|r| r.doctor(doctor.id)).unwrap();
    assert_eq!(slot.status, SlotStatus::Busy);
    assert_eq!(slot.reason.as_deref(), Some("Walk-in 07:30-09:00"));
}

#[tokio::test]
async fn month_calendar_marks_closed_and_full_days() {
    let (store, doctor) = clinic_with_doctor().await;
    store
        .insert_holiday(ClinicHoliday {
            id: Uuid::new_v4(),
            date: ClinicFixtures::date(2026, 4, 13),
            label: "Songkran".to_string(),
        })
        .await;
    let busy_day = ClinicFixtures::date(2026, 4, 20);
    for i in 0..FULL_DAY_THRESHOLD as u32 {
        store
            .insert_appointment(ClinicFixtures::appointment(
                doctor.id,
                busy_day,
                ClinicFixtures::time(9 + i, 0),
                30,
                AppointmentStatus::Pending,
            ))
            .await;
    }
    store
        .insert_appointment(ClinicFixtures::appointment(
            doctor.id,
            ClinicFixtures::date(2026, 4, 21),
            ClinicFixtures::time(9, 0),
            30,
            AppointmentStatus::Cancelled,
        ))
        .await;

    let days = MonthCalendar::view(&store, 2026, 4, Some(doctor.id)).await.unwrap();
    assert_eq!(days.len(), 30);

    let day = |d: u32| days.iter().find(|x| x.date == ClinicFixtures::date(2026, 4, d)).unwrap();
    assert_eq!(day(13).status, DayStatus::Closed);
    assert_eq!(day(13).reason.as_deref(), Some("Songkran"));
    assert_eq!(day(20).status, DayStatus::Full);
    assert_eq!(day(20).count, Some(FULL_DAY_THRESHOLD));
    assert_eq!(day(21).status, DayStatus::Available);
    assert_eq!(day(21).count, Some(0));

    let anyone = MonthCalendar::view(&store, 2026, 4, None).await.unwrap();
    assert!(anyone.iter().all(|d| d.status != DayStatus::Full));

    assert_matches!(
        MonthCalendar::view(&store, 2026, 13, None).await,
        Err(SchedulingError::Validation(_))
    );
}
