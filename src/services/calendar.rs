//! Temporal projection of week-numbered slots onto the calendar
//!
//! Time slots only store `(week_number, time_slot_number)`; the absolute start
//! is re-derived from the planned day every time it is needed. All times are
//! naive local clock values.

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

use crate::models::enums::DayOfWeek;

/// Fixed duration of every slot
pub const SLOT_DURATION_MINUTES: i64 = 105;

pub const MAX_WEEK_NUMBER: i32 = 53;

/// Calendar year used to resolve week numbers
pub fn current_year() -> i32 {
    Local::now().year()
}

/// Monday of ISO week `week_number` of `year`.
///
/// Week 53 of a 52-week year resolves to the Monday that follows week 52.
pub fn iso_week_monday(year: i32, week_number: i32) -> Option<NaiveDate> {
    if !(1..=MAX_WEEK_NUMBER).contains(&week_number) {
        return None;
    }
    let first_monday = NaiveDate::from_isoywd_opt(year, 1, Weekday::Mon)?;
    first_monday.checked_add_signed(Duration::weeks(i64::from(week_number - 1)))
}

/// Calendar date of `day_of_week` in ISO week `week_number`
pub fn project_date(year: i32, week_number: i32, day_of_week: DayOfWeek) -> Option<NaiveDate> {
    iso_week_monday(year, week_number)?
        .checked_add_signed(Duration::days(day_of_week.days_from_monday()))
}

/// Absolute start of slot `time_slot_number` on `day_of_week` of ISO week
/// `week_number`. Returns `None` when the day has no start time.
pub fn project_date_time(
    year: i32,
    week_number: i32,
    time_slot_number: i32,
    day_start_time: Option<NaiveTime>,
    day_of_week: DayOfWeek,
) -> Option<NaiveDateTime> {
    let start = day_start_time?;
    if time_slot_number < 1 {
        return None;
    }

    let day = project_date(year, week_number, day_of_week)?;
    let offset = Duration::minutes(i64::from(time_slot_number - 1) * SLOT_DURATION_MINUTES);

    day.and_time(start).checked_add_signed(offset)
}
