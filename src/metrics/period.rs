//! Period selection and bottle totals over a station set.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::calendar::{MonthKey, MonthRange};
use crate::station::Station;

/// First year offered by the "all time" quick period.
pub const FIRST_REPORTING_YEAR: i32 = 2020;

/// Time window the headline totals are computed over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "range", rename_all = "camelCase")]
pub enum PeriodSelection {
    /// The current UTC month.
    #[default]
    Month,
    /// The current UTC calendar year.
    Year,
    /// An inclusive month range. `None` when the requested range could not be
    /// understood; such a period always totals 0.
    Custom(Option<MonthRange>),
    AllTime,
}

impl fmt::Display for PeriodSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodSelection::Month => f.write_str("month"),
            PeriodSelection::Year => f.write_str("year"),
            PeriodSelection::Custom(Some(range)) => write!(f, "custom {range}"),
            PeriodSelection::Custom(None) => f.write_str("custom (unrecognized)"),
            PeriodSelection::AllTime => f.write_str("all time"),
        }
    }
}

impl FromStr for PeriodSelection {
    type Err = anyhow::Error;

    /// Parses the period names used on the command line. `custom` yields an
    /// unresolved range; attach one with [`RawCustomRange::resolve`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "month" => Ok(PeriodSelection::Month),
            "year" => Ok(PeriodSelection::Year),
            "all" | "total" | "alltime" | "all-time" => Ok(PeriodSelection::AllTime),
            "custom" => Ok(PeriodSelection::Custom(None)),
            other => Err(anyhow::anyhow!(
                "unknown period '{other}', expected month, year, all or custom"
            )),
        }
    }
}

/// A custom range as requested by a caller, before validation.
///
/// Accepts `{"fromMonth": "2024-01", "toMonth": "2024-03"}` and the numeric
/// form `{"fromYear": 2024, "fromMonth": 1, "toYear": 2024, "toMonth": 3}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawCustomRange {
    #[serde(rename_all = "camelCase")]
    Keys { from_month: String, to_month: String },
    #[serde(rename_all = "camelCase")]
    Numeric {
        from_year: i32,
        from_month: u32,
        to_year: i32,
        to_month: u32,
    },
}

impl RawCustomRange {
    /// Validates the range. Logs and returns `None` for anything malformed or
    /// inverted.
    pub fn resolve(&self) -> Option<MonthRange> {
        let bounds = match self {
            RawCustomRange::Keys {
                from_month,
                to_month,
            } => from_month
                .parse::<MonthKey>()
                .ok()
                .zip(to_month.parse::<MonthKey>().ok()),
            RawCustomRange::Numeric {
                from_year,
                from_month,
                to_year,
                to_month,
            } => MonthKey::new(*from_year, *from_month).zip(MonthKey::new(*to_year, *to_month)),
        };

        let Some((from, to)) = bounds else {
            warn!(range = ?self, "Custom date range format not recognized");
            return None;
        };

        match MonthRange::new(from, to) {
            Ok(range) => Some(range),
            Err(e) => {
                warn!(error = %e, "Rejected custom date range");
                None
            }
        }
    }
}

/// Preset ranges offered next to the custom range picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum QuickPeriod {
    Month,
    Quarter,
    Year,
    Total,
}

impl QuickPeriod {
    pub fn range(&self, today: NaiveDate) -> MonthRange {
        let current = MonthKey::from_date(today);
        let year = current.year();
        let (from, to) = match self {
            QuickPeriod::Month => (current, current),
            QuickPeriod::Quarter => {
                let start = (current.month() - 1) / 3 * 3 + 1;
                (month(year, start), month(year, start + 2))
            }
            QuickPeriod::Year => (month(year, 1), month(year, 12)),
            QuickPeriod::Total => (month(FIRST_REPORTING_YEAR.min(year), 1), month(year, 12)),
        };
        MonthRange::new(from, to).unwrap_or_else(|_| MonthRange::single(current))
    }

    pub fn describe(&self, today: NaiveDate) -> String {
        let range = self.range(today);
        let year = today.year();
        match self {
            QuickPeriod::Month => format!("This Month ({} {year})", month_name(range.from())),
            QuickPeriod::Quarter => format!(
                "This Quarter ({} - {} {year})",
                month_name(range.from()),
                month_name(range.to())
            ),
            QuickPeriod::Year => format!("This Year ({year})"),
            QuickPeriod::Total => format!("All Time ({} - Present)", range.from().year()),
        }
    }
}

fn month(year: i32, month: u32) -> MonthKey {
    MonthKey::new(year, month).unwrap_or_else(|| MonthKey::from_date(NaiveDate::MIN))
}

fn month_name(key: MonthKey) -> String {
    key.first_day().format("%B").to_string()
}

/// Months of a single station that fall into `period`, summed.
fn station_total(station: &Station, period: &PeriodSelection, today: NaiveDate) -> u64 {
    let current = MonthKey::from_date(today);
    let metrics = &station.metrics_by_month;
    match period {
        PeriodSelection::Month => metrics.get(&current).copied().unwrap_or(0),
        PeriodSelection::Year => metrics
            .range(MonthKey::new(current.year(), 1).unwrap_or(current)..)
            .take_while(|(k, _)| k.year() == current.year())
            .map(|(_, v)| v)
            .sum(),
        PeriodSelection::Custom(Some(range)) => metrics
            .range(range.from()..=range.to())
            .map(|(_, v)| v)
            .sum(),
        PeriodSelection::Custom(None) => 0,
        PeriodSelection::AllTime => metrics.values().sum(),
    }
}

/// Total bottles across `stations` for `period`, relative to `today` (UTC).
pub fn resolve_total(stations: &[Station], period: &PeriodSelection, today: NaiveDate) -> u64 {
    if matches!(period, PeriodSelection::Custom(None)) {
        warn!("No usable custom date range set, total is 0");
        return 0;
    }
    stations
        .iter()
        .map(|s| station_total(s, period, today))
        .sum()
}
