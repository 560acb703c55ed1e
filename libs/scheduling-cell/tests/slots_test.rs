use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use scheduling_cell::models::SchedulingError;
use scheduling_cell::services::slots::TimeSlotService;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn time(h: u32, min: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, min, 0).unwrap()
}

fn at(d: NaiveDate, h: u32, min: u32) -> NaiveDateTime {
    d.and_time(time(h, min))
}

#[test]
fn thirty_minute_service_yields_twenty_slots() {
    let service = TimeSlotService::new();
    let target = date(2026, 9, 14);
    let now = at(date(2026, 9, 1), 9, 0);

    let slots = service.generate_slots(target, 30, now).unwrap();

    assert_eq!(slots.len(), 20);
    assert_eq!(slots.first().unwrap().value, time(10, 0));
    assert_eq!(slots.first().unwrap().display_label, "10:00 AM");
    assert_eq!(slots.last().unwrap().value, time(19, 30));
    assert_eq!(slots.last().unwrap().display_label, "7:30 PM");
}

#[test]
fn slots_stay_inside_clinic_hours() {
    let service = TimeSlotService::new();
    let target = date(2026, 9, 14);
    let now = at(date(2026, 9, 1), 9, 0);

    for duration in [15, 20, 30, 45, 60, 90] {
        let slots = service.generate_slots(target, duration, now).unwrap();
        assert!(!slots.is_empty());

        for slot in &slots {
            assert!(slot.value >= time(10, 0));
            // The slot must end at or before closing.
            let end_minutes =
                slot.value.signed_duration_since(time(0, 0)).num_minutes() + duration as i64;
            assert!(end_minutes <= 20 * 60, "slot {} overruns closing", slot.value);
        }
    }
}

#[test]
fn forty_five_minute_service_ends_before_closing() {
    let service = TimeSlotService::new();
    let target = date(2026, 9, 14);
    let now = at(date(2026, 9, 1), 9, 0);

    let slots = service.generate_slots(target, 45, now).unwrap();

    // 10:00, 10:45, ... last start that still fits is 19:00.
    assert_eq!(slots.len(), 13);
    assert_eq!(slots.last().unwrap().value, time(19, 0));
}

#[test]
fn todays_elapsed_slots_are_excluded() {
    let service = TimeSlotService::new();
    let today = date(2026, 9, 14);
    let now = at(today, 14, 0);

    let slots = service.generate_slots(today, 30, now).unwrap();

    // 14:00 itself already started; the first offered slot is 14:30.
    assert_eq!(slots.first().unwrap().value, time(14, 30));
    assert!(slots.iter().all(|slot| slot.value > time(14, 0)));
}

#[test]
fn future_dates_keep_the_full_grid() {
    let service = TimeSlotService::new();
    let today = date(2026, 9, 14);
    let now = at(today, 14, 0);

    let slots = service.generate_slots(date(2026, 9, 15), 30, now).unwrap();

    assert_eq!(slots.len(), 20);
    assert_eq!(slots.first().unwrap().value, time(10, 0));
}

#[test]
fn non_positive_duration_is_rejected() {
    let service = TimeSlotService::new();
    let now = at(date(2026, 9, 1), 9, 0);

    assert_matches!(
        service.generate_slots(date(2026, 9, 14), 0, now),
        Err(SchedulingError::InvalidDuration)
    );
    assert_matches!(
        service.generate_slots(date(2026, 9, 14), -15, now),
        Err(SchedulingError::InvalidDuration)
    );
}

#[test]
fn oversized_duration_yields_no_slots() {
    let service = TimeSlotService::new();
    let now = at(date(2026, 9, 1), 9, 0);

    let slots = service.generate_slots(date(2026, 9, 14), 601, now).unwrap();
    assert!(slots.is_empty());
}

#[test]
fn bookable_slot_check_follows_the_grid() {
    let service = TimeSlotService::new();
    let target = date(2026, 9, 14);
    let now = at(date(2026, 9, 1), 9, 0);

    assert!(service.is_bookable_slot(target, time(10, 0), 30, now).unwrap());
    assert!(service.is_bookable_slot(target, time(19, 30), 30, now).unwrap());
    // Off-grid and out-of-hours times are not bookable.
    assert!(!service.is_bookable_slot(target, time(10, 15), 30, now).unwrap());
    assert!(!service.is_bookable_slot(target, time(9, 30), 30, now).unwrap());
    assert!(!service.is_bookable_slot(target, time(19, 45), 30, now).unwrap());
}

#[test]
fn past_dates_have_no_bookable_slots() {
    let service = TimeSlotService::new();
    let now = at(date(2026, 9, 14), 9, 0);

    assert!(!service
        .is_bookable_slot(date(2026, 9, 13), time(10, 0), 30, now)
        .unwrap());
}
