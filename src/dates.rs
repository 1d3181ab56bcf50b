use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Returned by the day-count helpers when there is no usable date.
pub const NO_DATE_DAYS: i64 = 999;

const SECONDS_PER_DAY: i64 = 86_400;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// A date column read from the table service. Keeps "never filled in" apart
/// from "filled in with something we could not read".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateField {
    Absent,
    Malformed(String),
    Valid(NaiveDate),
}

impl DateField {
    /// Surrounding whitespace makes a value malformed; it is not trimmed.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None | Some("") => DateField::Absent,
            Some(value) if value.trim() != value => DateField::Malformed(value.to_string()),
            Some(value) => match NaiveDate::parse_from_str(value, DATE_FORMAT) {
                Ok(date) => DateField::Valid(date),
                Err(_) => DateField::Malformed(value.to_string()),
            },
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            DateField::Valid(date) => Some(*date),
            _ => None,
        }
    }
}

pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub fn today() -> NaiveDate {
    now().date()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Whole days elapsed since `raw` (midnight), floored. Future dates are negative.
pub fn days_since_at(raw: &str, now: NaiveDateTime) -> i64 {
    match DateField::parse(Some(raw)).date() {
        Some(date) => floor_days(now - date.and_time(NaiveTime::MIN)),
        None => NO_DATE_DAYS,
    }
}

pub fn days_until_at(raw: &str, now: NaiveDateTime) -> i64 {
    match DateField::parse(Some(raw)).date() {
        Some(date) => floor_days(date.and_time(NaiveTime::MIN) - now),
        None => NO_DATE_DAYS,
    }
}

pub fn days_since(raw: &str) -> i64 {
    days_since_at(raw, now())
}

pub fn days_until(raw: &str) -> i64 {
    days_until_at(raw, now())
}

fn floor_days(delta: Duration) -> i64 {
    delta.num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// A calendar month, rendered as `Mar 2026`. This textual form is the join
/// key between the obligation calendar and status-report records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthYear {
    year: i32,
    month: u32,
}

impl MonthYear {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) && (1000..=9999).contains(&year) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next()
            .first_day()
            .pred_opt()
            .unwrap_or(NaiveDate::MIN)
    }

    /// Last instant a report for this month is still on time.
    pub fn due_at(&self) -> NaiveDateTime {
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        self.last_day().and_time(end_of_day)
    }

    /// Inclusive of both ends.
    pub fn through(self, end: MonthYear) -> Vec<MonthYear> {
        let mut months = Vec::new();
        let mut current = self;
        while current <= end {
            months.push(current);
            current = current.next();
        }
        months
    }
}

impl fmt::Display for MonthYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = MONTH_ABBREVIATIONS[(self.month - 1) as usize];
        write!(f, "{} {:04}", name, self.year)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMonthYearError(String);

impl fmt::Display for ParseMonthYearError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected a month like \"Mar 2026\", got {:?}", self.0)
    }
}

impl std::error::Error for ParseMonthYearError {}

impl FromStr for MonthYear {
    type Err = ParseMonthYearError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseMonthYearError(s.to_string());
        let (name, year) = s.trim().split_once(' ').ok_or_else(err)?;
        let month = MONTH_ABBREVIATIONS
            .iter()
            .position(|abbr| abbr.eq_ignore_ascii_case(name))
            .ok_or_else(err)? as u32
            + 1;
        let year = year.trim();
        if year.len() != 4 {
            return Err(err());
        }
        let year: i32 = year.parse().map_err(|_| err())?;
        MonthYear::new(year, month).ok_or_else(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str, hour: u32) -> NaiveDateTime {
        NaiveDate::parse_from_str(date, DATE_FORMAT)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn date_field_distinguishes_absent_from_malformed() {
        assert_eq!(DateField::parse(None), DateField::Absent);
        assert_eq!(DateField::parse(Some("")), DateField::Absent);
        assert_eq!(
            DateField::parse(Some("  ")),
            DateField::Malformed("  ".to_string())
        );
        assert_eq!(
            DateField::parse(Some("03/01/2026")),
            DateField::Malformed("03/01/2026".to_string())
        );
        assert_eq!(
            DateField::parse(Some("2026-03-01")).date(),
            NaiveDate::from_ymd_opt(2026, 3, 1)
        );
    }

    #[test]
    fn padded_dates_are_not_trimmed() {
        assert_eq!(
            DateField::parse(Some(" 2026-02-01")),
            DateField::Malformed(" 2026-02-01".to_string())
        );
        assert_eq!(
            DateField::parse(Some("2026-02-01\n")),
            DateField::Malformed("2026-02-01\n".to_string())
        );
        let now = at("2026-10-17", 9);
        assert_eq!(days_since_at(" 2026-02-01", now), NO_DATE_DAYS);
    }

    #[test]
    fn day_counts_are_floored() {
        let now = at("2026-10-17", 15);
        assert_eq!(days_since_at("2026-10-10", now), 7);
        assert_eq!(days_until_at("2026-10-10", now), -8);
        assert_eq!(days_until_at("2026-10-20", now), 2);
        assert_eq!(days_since_at("2026-10-20", now), -3);
    }

    #[test]
    fn day_counts_roughly_cancel_out() {
        let now = at("2026-10-17", 9);
        for raw in ["2026-01-01", "2026-10-17", "2027-02-28"] {
            let total = days_since_at(raw, now) + days_until_at(raw, now);
            assert!((-1..=0).contains(&total), "{raw}: {total}");
        }
    }

    #[test]
    fn day_counts_fall_back_to_sentinel() {
        let now = at("2026-10-17", 9);
        assert_eq!(days_since_at("", now), NO_DATE_DAYS);
        assert_eq!(days_until_at("", now), NO_DATE_DAYS);
        assert_eq!(days_since_at("next tuesday", now), NO_DATE_DAYS);
        assert_eq!(days_until_at("2026-13-01", now), NO_DATE_DAYS);
        assert_eq!(days_since("garbage"), NO_DATE_DAYS);
    }

    #[test]
    fn month_rolls_over_december() {
        let december = MonthYear::new(2026, 12).unwrap();
        assert_eq!(december.next(), MonthYear::new(2027, 1).unwrap());
        assert_eq!(december.last_day(), NaiveDate::from_ymd_opt(2026, 12, 31).unwrap());
    }

    #[test]
    fn last_day_handles_leap_years() {
        let feb = MonthYear::new(2028, 2).unwrap();
        assert_eq!(feb.last_day(), NaiveDate::from_ymd_opt(2028, 2, 29).unwrap());
        assert_eq!(
            feb.due_at(),
            NaiveDate::from_ymd_opt(2028, 2, 29)
                .unwrap()
                .and_hms_opt(23, 59, 59)
                .unwrap()
        );
    }

    #[test]
    fn month_text_form() {
        let month: MonthYear = "Mar 2026".parse().unwrap();
        assert_eq!(month, MonthYear::new(2026, 3).unwrap());
        assert_eq!(month.to_string(), "Mar 2026");
        assert_eq!("sep 2026".parse::<MonthYear>().unwrap().to_string(), "Sep 2026");
        assert!("March 2026".parse::<MonthYear>().is_err());
        assert!("Mar 26".parse::<MonthYear>().is_err());
        assert!("2026-03".parse::<MonthYear>().is_err());
    }

    #[test]
    fn through_is_inclusive_and_empty_when_reversed() {
        let start = MonthYear::new(2026, 11).unwrap();
        let end = MonthYear::new(2027, 2).unwrap();
        let labels: Vec<String> = start.through(end).iter().map(|m| m.to_string()).collect();
        assert_eq!(labels, ["Nov 2026", "Dec 2026", "Jan 2027", "Feb 2027"]);
        assert!(end.through(start).is_empty());
    }
}
