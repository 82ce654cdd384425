//! Calendar-aware age helpers. Ages are always derived from the date of birth.

use chrono::{Datelike, NaiveDate};

/// Whole months between `date_of_birth` and `today`; zero for future dates.
pub fn age_in_months(date_of_birth: NaiveDate, today: NaiveDate) -> u32 {
    if date_of_birth > today {
        return 0;
    }

    let mut years = today.year() - date_of_birth.year();
    let mut months = today.month() as i32 - date_of_birth.month() as i32;

    if today.day() < date_of_birth.day() {
        months -= 1;
    }
    if months < 0 {
        years -= 1;
        months += 12;
    }

    (years * 12 + months).max(0) as u32
}

/// Human readable "N years M months" form used by the child listing.
pub fn age_readable(date_of_birth: NaiveDate, today: NaiveDate) -> String {
    if date_of_birth > today {
        return "DOB is in the future".to_string();
    }

    let mut years = today.year() - date_of_birth.year();
    let mut months = today.month() as i32 - date_of_birth.month() as i32;
    let days = today.day() as i32 - date_of_birth.day() as i32;

    if days < 0 {
        months -= 1;
    }
    if months < 0 {
        years -= 1;
        months += 12;
    }

    format!("{years} years {months} months")
}
