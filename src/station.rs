//! In-memory station records and defensive ingestion of their fields.

use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::calendar::{DayKey, MonthKey};

/// Bottles collected per month, keyed by UTC month.
pub type MonthlyMetrics = BTreeMap<MonthKey, u64>;

/// Per-day documents, keyed by UTC day.
pub type DailyMetrics = BTreeMap<DayKey, DailyRecord>;

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Coerces a loosely typed document field into a non-negative count.
///
/// Numbers and numeric strings are accepted; fractions are truncated.
/// Anything else (missing, negative, garbage) becomes 0.
pub fn coerce_count(value: &Value) -> u64 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::Bool(true) => 1.0,
        _ => 0.0,
    };
    if n.is_finite() && n > 0.0 { n as u64 } else { 0 }
}

/// Station document fields as returned by the name-match query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StationSummary {
    pub station_id: String,
    pub place_name: String,
    pub company_name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub capacity: u64,
    pub current_cap: u64,
}

impl StationSummary {
    /// Case-insensitive substring match over company, place and address.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        [&self.company_name, &self.place_name, &self.address]
            .iter()
            .any(|field| field.to_lowercase().contains(&term))
    }
}

/// One daily metrics document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DailyRecord {
    pub count: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Hour-of-day and day-of-week activity buckets (Sunday = 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsagePattern {
    pub by_hour: [u32; 24],
    pub by_day: [u32; 7],
}

impl Default for UsagePattern {
    fn default() -> Self {
        Self {
            by_hour: [0; 24],
            by_day: [0; 7],
        }
    }
}

impl UsagePattern {
    /// Buckets timestamps after shifting them to `offset`.
    ///
    /// Stations store the UTC bucketing; pass a local offset here only when
    /// rendering for a specific audience.
    pub fn from_timestamps<'a>(
        timestamps: impl IntoIterator<Item = &'a DateTime<Utc>>,
        offset: FixedOffset,
    ) -> Self {
        let mut pattern = Self::default();
        for ts in timestamps {
            let local = ts.with_timezone(&offset);
            pattern.by_hour[local.hour() as usize] += 1;
            pattern.by_day[local.weekday().num_days_from_sunday() as usize] += 1;
        }
        pattern
    }

    /// Busiest hour, `None` when there is no activity at all.
    pub fn peak_hour(&self) -> Option<usize> {
        peak(&self.by_hour)
    }

    pub fn peak_day(&self) -> Option<usize> {
        peak(&self.by_day)
    }

    /// `3 PM`, `12 AM`, ...
    pub fn peak_hour_label(&self) -> Option<String> {
        self.peak_hour().map(|h| {
            let suffix = if h >= 12 { "PM" } else { "AM" };
            let hour12 = if h % 12 == 0 { 12 } else { h % 12 };
            format!("{hour12} {suffix}")
        })
    }

    pub fn peak_day_label(&self) -> Option<&'static str> {
        self.peak_day().map(|d| DAY_NAMES[d])
    }
}

// first index wins on ties
fn peak(buckets: &[u32]) -> Option<usize> {
    let max = *buckets.iter().max()?;
    if max == 0 {
        return None;
    }
    buckets.iter().position(|&v| v == max)
}

/// A station together with its metric history for one search session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    pub station_id: String,
    pub place_name: String,
    pub company_name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub capacity: u64,
    pub current_cap: u64,
    pub metrics_by_month: MonthlyMetrics,
    pub daily_by_date: BTreeMap<DayKey, u64>,
    pub usage: UsagePattern,
    #[serde(skip)]
    daily_timestamps: Vec<DateTime<Utc>>,
}

impl Station {
    pub fn from_summary(summary: StationSummary) -> Self {
        Self {
            station_id: summary.station_id,
            place_name: summary.place_name,
            company_name: summary.company_name,
            address: summary.address,
            latitude: summary.latitude,
            longitude: summary.longitude,
            capacity: summary.capacity,
            current_cap: summary.current_cap,
            metrics_by_month: MonthlyMetrics::new(),
            daily_by_date: BTreeMap::new(),
            usage: UsagePattern::default(),
            daily_timestamps: Vec::new(),
        }
    }

    /// Replaces the whole monthly map; months absent from `metrics` are gone.
    pub fn replace_monthly(&mut self, metrics: MonthlyMetrics) {
        self.metrics_by_month = metrics;
    }

    /// Replaces the daily map and rebuilds the UTC usage buckets.
    pub fn replace_daily(&mut self, daily: DailyMetrics) {
        self.daily_timestamps = daily.values().filter_map(|r| r.updated_at).collect();
        self.daily_by_date = daily.into_iter().map(|(k, r)| (k, r.count)).collect();
        self.usage = UsagePattern::from_timestamps(&self.daily_timestamps, utc_offset());
    }

    /// Applies a station document update. A missing capacity keeps the
    /// previous value, a missing fill level means empty.
    pub fn apply_fields(&mut self, capacity: Option<u64>, current_cap: u64) {
        if let Some(capacity) = capacity {
            self.capacity = capacity;
        }
        self.current_cap = current_cap;
    }

    /// Raw daily update timestamps, for re-bucketing at a display offset.
    pub fn daily_timestamps(&self) -> &[DateTime<Utc>] {
        &self.daily_timestamps
    }

    /// Fill level as a percentage of capacity, 0 when capacity is unknown.
    pub fn efficiency(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.current_cap as f64 / self.capacity as f64 * 100.0
        }
    }

    pub fn all_time_bottles(&self) -> u64 {
        self.metrics_by_month.values().sum()
    }
}

pub(crate) fn utc_offset() -> FixedOffset {
    Utc.fix()
}
