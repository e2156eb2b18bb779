use chrono::{Datelike, NaiveDate};
use thiserror::Error;

pub const MIN_BIRTH_YEAR: i32 = 1930;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("unrecognized date token: {0}")]
    Unrecognized(String),
    #[error("invalid calendar date: {0}")]
    Invalid(String),
    #[error("date {0} is before {MIN_BIRTH_YEAR}")]
    BeforeFloor(NaiveDate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateShape {
    DayMonthYear { day: u32, month: u32, year: i32 },
    MonthYear { month: u32, year: i32 },
}

pub fn parse_date(token: &str) -> Result<NaiveDate, DateError> {
    let (day, month, year) = match date_shape(token.trim()) {
        Some(DateShape::DayMonthYear { day, month, year }) => (day, month, year),
        Some(DateShape::MonthYear { month, year }) => (1, month, year),
        None => return Err(DateError::Unrecognized(token.to_string())),
    };

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| DateError::Invalid(token.to_string()))
}

pub fn parse_birth_date(token: &str) -> Result<NaiveDate, DateError> {
    let Some(DateShape::DayMonthYear { day, month, year }) = date_shape(token.trim()) else {
        return Err(DateError::Unrecognized(token.to_string()));
    };

    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| DateError::Invalid(token.to_string()))?;
    if date.year() < MIN_BIRTH_YEAR {
        return Err(DateError::BeforeFloor(date));
    }

    Ok(date)
}

pub fn starts_with_date(token: &str) -> bool {
    date_shape(token.trim()).is_some()
}

pub fn starts_with_full_date(token: &str) -> bool {
    matches!(
        date_shape(token.trim()),
        Some(DateShape::DayMonthYear { .. })
    )
}

fn date_shape(token: &str) -> Option<DateShape> {
    let bytes = token.as_bytes();

    if bytes.get(2) == Some(&b'/') && bytes.get(5) == Some(&b'/') && word_ends_at(bytes, 10) {
        if let (Some(day), Some(month), Some(year)) = (
            digits(bytes, 0, 2),
            digits(bytes, 3, 5),
            digits(bytes, 6, 10),
        ) {
            return Some(DateShape::DayMonthYear {
                day,
                month,
                year: year as i32,
            });
        }
    }

    if bytes.get(2) == Some(&b'/') && word_ends_at(bytes, 7) {
        if let (Some(month), Some(year)) = (digits(bytes, 0, 2), digits(bytes, 3, 7)) {
            return Some(DateShape::MonthYear {
                month,
                year: year as i32,
            });
        }
    }

    None
}

fn digits(bytes: &[u8], start: usize, end: usize) -> Option<u32> {
    let slice = bytes.get(start..end)?;
    if !slice.iter().all(u8::is_ascii_digit) {
        return None;
    }

    Some(
        slice
            .iter()
            .fold(0_u32, |acc, byte| acc * 10 + u32::from(byte - b'0')),
    )
}

fn word_ends_at(bytes: &[u8], index: usize) -> bool {
    if bytes.len() < index {
        return false;
    }

    bytes
        .get(index)
        .is_none_or(|byte| !(byte.is_ascii_alphanumeric() || *byte == b'_'))
}
