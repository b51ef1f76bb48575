//! Data types produced by the aggregation pipeline.

use serde::Serialize;

use crate::calendar::{DayKey, MonthKey};
use crate::metrics::impact::Impact;
use crate::metrics::period::PeriodSelection;

/// One month of the trend chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyPoint {
    pub month_key: MonthKey,
    pub label: String,
    pub bottles: u64,
    pub impact: Impact,
}

/// One day of the activity chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    pub day_key: DayKey,
    pub label: String,
    pub bottles: u64,
    pub impact: Impact,
}

/// Snapshot consumed by rendering and export, rebuilt whole on every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentData {
    pub period: PeriodSelection,
    pub total_bottles: u64,
    pub stations_count: usize,
    pub impact: Impact,
    /// Trailing 12 months ending at the current month, whatever the period.
    pub time_series_data: Vec<MonthlyPoint>,
    /// Trailing 7 days, or every day of the custom range.
    pub daily_series: Vec<DailyPoint>,
    /// Mean station fill level in percent, 0 for an empty station set.
    pub avg_efficiency: f64,
}
