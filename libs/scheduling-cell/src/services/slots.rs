// libs/scheduling-cell/src/services/slots.rs
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

use crate::models::{minutes_since_midnight, SchedulingRules, SchedulingError, TimeSlot};

/// Generates the bookable start times for a date.
///
/// Slots start at `duration` increments from opening time and must fit
/// entirely before closing time. Pure function of (date, duration, now): the
/// only side input is the current wall-clock, used to drop already-past slots
/// when generating for today.
pub struct TimeSlotService {
    rules: SchedulingRules,
}

impl TimeSlotService {
    pub fn new() -> Self {
        Self {
            rules: SchedulingRules::default(),
        }
    }

    pub fn generate_slots(
        &self,
        date: NaiveDate,
        duration_minutes: i32,
        now: NaiveDateTime,
    ) -> Result<Vec<TimeSlot>, SchedulingError> {
        if duration_minutes <= 0 {
            return Err(SchedulingError::InvalidDuration);
        }

        let open = minutes_since_midnight(self.rules.opening_time);
        let close = minutes_since_midnight(self.rules.closing_time);

        let mut slots = Vec::new();
        let mut start = open;
        while start + duration_minutes <= close {
            let time = NaiveTime::from_hms_opt((start / 60) as u32, (start % 60) as u32, 0)
                .expect("slot minutes stay within a single day");

            // No retroactive same-day booking of slots that already started.
            if date != now.date() || time > now.time() {
                slots.push(TimeSlot {
                    value: time,
                    display_label: time.format("%-I:%M %p").to_string(),
                });
            }

            start += duration_minutes;
        }

        debug!(
            "Generated {} slots for {} at {} minute granularity",
            slots.len(),
            date,
            duration_minutes
        );

        Ok(slots)
    }

    /// Whether (date, time) lands on the bookable grid for this duration.
    /// Dates already in the past have no bookable slots.
    pub fn is_bookable_slot(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        duration_minutes: i32,
        now: NaiveDateTime,
    ) -> Result<bool, SchedulingError> {
        if date < now.date() {
            return Ok(false);
        }

        let slots = self.generate_slots(date, duration_minutes, now)?;
        Ok(slots.iter().any(|slot| slot.value == time))
    }
}

impl Default for TimeSlotService {
    fn default() -> Self {
        Self::new()
    }
}
