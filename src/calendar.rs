//! Validated calendar keys for monthly and daily metrics.
//!
//! Stored metric documents are keyed by `YYYY-MM` and `YYYY-MM-DD` strings.
//! These are parsed once at ingestion into [`MonthKey`] and [`DayKey`], which
//! order by calendar and support month/day arithmetic. All keys are UTC.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("malformed month key '{0}', expected YYYY-MM")]
    MalformedMonth(String),
    #[error("malformed day key '{0}', expected YYYY-MM-DD")]
    MalformedDay(String),
    #[error("range start {from} is after range end {to}")]
    InvertedRange { from: MonthKey, to: MonthKey },
}

/// A calendar month (`YYYY-MM`).
///
/// Field order makes the derived `Ord` match calendar order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) && (0..=9999).contains(&year) {
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

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.add_months(1).first_day().pred_opt().unwrap_or(NaiveDate::MAX)
    }

    /// Shifts by `n` calendar months; `n` may be negative.
    pub fn add_months(&self, n: i32) -> Self {
        let index = self.year * 12 + (self.month as i32 - 1) + n;
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    /// Chart label such as `Jan 2024`.
    pub fn label(&self) -> String {
        self.first_day().format("%b %Y").to_string()
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || CalendarError::MalformedMonth(s.to_string());
        let (year, month) = s.split_once('-').ok_or_else(malformed)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(malformed());
        }
        if !year.bytes().chain(month.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let year: i32 = year.parse().map_err(|_| malformed())?;
        let month: u32 = month.parse().map_err(|_| malformed())?;
        MonthKey::new(year, month).ok_or_else(malformed)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A UTC calendar day (`YYYY-MM-DD`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn month(&self) -> MonthKey {
        MonthKey::from_date(self.0)
    }

    pub fn add_days(&self, n: i64) -> Self {
        Self(self.0 + Duration::days(n))
    }

    /// `Mon`, `Tue`, ...
    pub fn weekday_label(&self) -> String {
        self.0.format("%a").to_string()
    }

    /// `Jan 5`
    pub fn short_label(&self) -> String {
        self.0.format("%b %-d").to_string()
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DayKey {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // chrono accepts unpadded fields, the stored keys never have them
        if s.len() != 10 {
            return Err(CalendarError::MalformedDay(s.to_string()));
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(DayKey)
            .map_err(|_| CalendarError::MalformedDay(s.to_string()))
    }
}

impl Serialize for DayKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// An inclusive span of months with `from <= to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthRange {
    from: MonthKey,
    to: MonthKey,
}

impl MonthRange {
    pub fn new(from: MonthKey, to: MonthKey) -> Result<Self, CalendarError> {
        if from > to {
            return Err(CalendarError::InvertedRange { from, to });
        }
        Ok(Self { from, to })
    }

    pub fn single(month: MonthKey) -> Self {
        Self {
            from: month,
            to: month,
        }
    }

    pub fn from(&self) -> MonthKey {
        self.from
    }

    pub fn to(&self) -> MonthKey {
        self.to
    }

    pub fn contains(&self, month: MonthKey) -> bool {
        self.from <= month && month <= self.to
    }

    /// Every month in the range, oldest first.
    pub fn months(&self) -> impl Iterator<Item = MonthKey> + use<> {
        let to = self.to;
        std::iter::successors(Some(self.from), move |m| {
            let next = m.add_months(1);
            (next <= to).then_some(next)
        })
    }

    /// Every day from the first of `from` through the last of `to`.
    pub fn days(&self) -> impl Iterator<Item = DayKey> + use<> {
        let last = self.to.last_day();
        std::iter::successors(Some(DayKey(self.from.first_day())), move |d| {
            let next = d.add_days(1);
            (next.0 <= last).then_some(next)
        })
    }
}

impl fmt::Display for MonthRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.from, self.to)
    }
}
