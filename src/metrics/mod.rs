//! Bottle-count aggregation and derived ESG metrics.
//!
//! This module resolves period totals over the station set, builds the
//! monthly and daily chart series, and converts bottle counts into
//! environmental, business and UN SDG figures.

pub mod aggregate;
pub mod business;
pub mod impact;
pub mod period;
pub mod series;
pub mod types;
pub mod utility;

pub use aggregate::{DashboardState, aggregate};
pub use business::{BusinessValue, UserCount, business_value};
pub use impact::{Impact, impact};
pub use period::{PeriodSelection, QuickPeriod, RawCustomRange, resolve_total};
pub use types::{CurrentData, DailyPoint, MonthlyPoint};
