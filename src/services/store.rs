//! Read contract of the document store backing the dashboard.

use anyhow::Result;

use crate::station::{DailyMetrics, MonthlyMetrics, StationSummary};
use crate::sync::{ChangeSink, ResourceKind, Subscription};
use crate::users::UserStats;

/// Abstraction over the station document store (e.g., Firestore).
#[async_trait::async_trait]
pub trait StationStore: Send + Sync {
    /// Stations whose company, place or address contains `term`,
    /// case-insensitively.
    async fn query_stations(&self, term: &str) -> Result<Vec<StationSummary>>;

    /// Monthly bottle counts of one station.
    async fn monthly_metrics(&self, station_id: &str) -> Result<MonthlyMetrics>;

    /// Daily documents of one station.
    async fn daily_metrics(&self, station_id: &str) -> Result<DailyMetrics>;

    /// Registered-user aggregates.
    async fn user_aggregates(&self) -> Result<UserStats>;

    /// Starts pushing snapshots of `kind` for `station_id` into `sink` until
    /// the returned handle is cancelled.
    async fn subscribe(
        &self,
        station_id: &str,
        kind: ResourceKind,
        sink: ChangeSink,
    ) -> Result<Box<dyn Subscription>>;
}
