use chrono::{Datelike, Months, NaiveDate};

pub const LABEL_FORMAT: &str = "%Y-%m";

/// Parses a strict `YYYY-MM` value into the first day of that month.
pub fn parse_year_month(value: &str) -> Option<NaiveDate> {
    let (year, month) = value.split_once('-')?;
    if year.len() != 4 || month.len() != 2 {
        return None;
    }
    if !year.bytes().chain(month.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First day of the month following `date`'s month.
pub fn first_of_next_month(date: NaiveDate) -> NaiveDate {
    let start = first_of_month(date);
    start.checked_add_months(Months::new(1)).unwrap_or(start)
}

pub fn label(date: NaiveDate) -> String {
    date.format(LABEL_FORMAT).to_string()
}
