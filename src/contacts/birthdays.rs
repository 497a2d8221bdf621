/// Upcoming-birthday window math
use chrono::{Datelike, Duration, NaiveDate};

/// Days after `today` still inside the window
pub const WINDOW_DAYS: i64 = 7;

/// The birthday's occurrence in `year`; Feb 29 falls back to Feb 28 in
/// common years.
fn occurrence_in(birthday: NaiveDate, year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, birthday.month(), birthday.day()).or_else(|| {
        if birthday.month() == 2 && birthday.day() == 29 {
            NaiveDate::from_ymd_opt(year, 2, 28)
        } else {
            None
        }
    })
}

/// Next occurrence of `birthday` on or after `today`, if it lands inside
/// `[today, today + WINDOW_DAYS]`. Handles the year wrap.
pub fn next_occurrence_within(birthday: NaiveDate, today: NaiveDate) -> Option<NaiveDate> {
    let end = today + Duration::days(WINDOW_DAYS);

    [today.year(), today.year() + 1]
        .into_iter()
        .filter_map(|year| occurrence_in(birthday, year))
        .find(|date| *date >= today && *date <= end)
}
