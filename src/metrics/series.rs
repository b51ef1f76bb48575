//! Month-by-month and day-by-day series for the dashboard charts.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::calendar::{DayKey, MonthKey, MonthRange};
use crate::metrics::impact::impact;
use crate::metrics::types::{DailyPoint, MonthlyPoint};
use crate::station::{MonthlyMetrics, Station};

/// Months shown by the trend chart when no range is given.
pub const TRAILING_MONTHS: i32 = 12;
/// Days shown by the activity chart when no range is given.
pub const TRAILING_DAYS: i64 = 7;
/// Days a renderer should keep from a long custom range.
pub const DAILY_DISPLAY_LIMIT: usize = 30;

/// Sums the monthly metrics of every station.
pub fn merged_monthly(stations: &[Station]) -> MonthlyMetrics {
    let mut merged = MonthlyMetrics::new();
    for station in stations {
        for (month, bottles) in &station.metrics_by_month {
            *merged.entry(*month).or_default() += bottles;
        }
    }
    merged
}

/// Sums the daily counts of every station.
pub fn merged_daily(stations: &[Station]) -> BTreeMap<DayKey, u64> {
    let mut merged = BTreeMap::new();
    for station in stations {
        for (day, bottles) in &station.daily_by_date {
            *merged.entry(*day).or_default() += bottles;
        }
    }
    merged
}

/// Builds one point per month, oldest first.
///
/// Without a range this is the trailing 12 months ending at the month of
/// `today`. With a range every month of it is emitted, however long.
/// Months missing from `metrics` are zero.
pub fn build_monthly(
    metrics: &MonthlyMetrics,
    range: Option<MonthRange>,
    today: NaiveDate,
) -> Vec<MonthlyPoint> {
    let range = range.unwrap_or_else(|| {
        let current = MonthKey::from_date(today);
        let start = current.add_months(-(TRAILING_MONTHS - 1));
        MonthRange::new(start, current).unwrap_or_else(|_| MonthRange::single(current))
    });

    range
        .months()
        .map(|month_key| {
            let bottles = metrics.get(&month_key).copied().unwrap_or(0);
            MonthlyPoint {
                month_key,
                label: month_key.label(),
                bottles,
                impact: impact(bottles),
            }
        })
        .collect()
}

/// Builds one point per day, oldest first.
///
/// Without a range this is the trailing 7 UTC days ending today, labelled by
/// weekday. With a range every day from the first of its first month to the
/// last of its last month is emitted; truncation is up to the caller (see
/// [`recent_days`]).
pub fn build_daily(
    daily: &BTreeMap<DayKey, u64>,
    range: Option<MonthRange>,
    today: NaiveDate,
) -> Vec<DailyPoint> {
    let point = |day_key: DayKey, label: String| {
        let bottles = daily.get(&day_key).copied().unwrap_or(0);
        DailyPoint {
            day_key,
            label,
            bottles,
            impact: impact(bottles),
        }
    };

    match range {
        None => {
            let end = DayKey::new(today);
            (0..TRAILING_DAYS)
                .rev()
                .map(|back| end.add_days(-back))
                .map(|d| point(d, d.weekday_label()))
                .collect()
        }
        Some(range) => range.days().map(|d| point(d, d.short_label())).collect(),
    }
}

/// The most recent `limit` points of a daily series.
pub fn recent_days(series: &[DailyPoint], limit: usize) -> &[DailyPoint] {
    &series[series.len().saturating_sub(limit)..]
}
