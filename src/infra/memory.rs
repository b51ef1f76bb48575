//! In-process [`StationStore`] that pushes changes to subscribers as soon as
//! they are written.

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use tracing::debug;

use crate::services::StationStore;
use crate::station::{DailyMetrics, MonthlyMetrics, StationSummary};
use crate::sync::{ChangePayload, ChangeSink, ResourceKind, Subscription};
use crate::users::{UserRecord, UserStats};

#[derive(Debug, Clone, Default)]
struct StoredStation {
    summary: StationSummary,
    monthly: MonthlyMetrics,
    daily: DailyMetrics,
}

impl StoredStation {
    fn payload(&self, kind: ResourceKind) -> ChangePayload {
        match kind {
            ResourceKind::StationFields => ChangePayload::StationFields {
                capacity: Some(self.summary.capacity).filter(|c| *c > 0),
                current_cap: self.summary.current_cap,
            },
            ResourceKind::MonthlyMetrics => ChangePayload::MonthlyMetrics(self.monthly.clone()),
            ResourceKind::DailyMetrics => ChangePayload::DailyMetrics(self.daily.clone()),
        }
    }
}

#[derive(Default)]
struct Inner {
    stations: BTreeMap<String, StoredStation>,
    users: Vec<UserRecord>,
    listeners: HashMap<u64, ChangeSink>,
    next_listener: u64,
    unavailable: bool,
}

impl Inner {
    fn check(&self) -> Result<()> {
        if self.unavailable {
            bail!("store unavailable");
        }
        Ok(())
    }

    fn station(&self, station_id: &str) -> Result<&StoredStation> {
        self.stations
            .get(station_id)
            .ok_or_else(|| anyhow!("unknown station '{station_id}'"))
    }

    fn notify(&mut self, station_id: &str, kind: ResourceKind) {
        let Some(station) = self.stations.get(station_id) else {
            return;
        };
        let payload = station.payload(kind);
        self.listeners
            .retain(|_, sink| {
                if sink.station_id() != station_id || sink.kind() != kind {
                    return true;
                }
                sink.emit(payload.clone())
            });
    }
}

/// Shared handle; clones see the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_station(&self, summary: StationSummary) {
        let mut inner = self.inner.lock();
        let id = summary.station_id.clone();
        inner.stations.insert(
            id.clone(),
            StoredStation {
                summary,
                ..Default::default()
            },
        );
        inner.notify(&id, ResourceKind::StationFields);
    }

    /// Updates the station document. `capacity: None` leaves it unchanged.
    pub fn set_fields(&self, station_id: &str, capacity: Option<u64>, current_cap: u64) {
        let mut inner = self.inner.lock();
        if let Some(station) = inner.stations.get_mut(station_id) {
            if let Some(capacity) = capacity {
                station.summary.capacity = capacity;
            }
            station.summary.current_cap = current_cap;
        }
        inner.notify(station_id, ResourceKind::StationFields);
    }

    /// Replaces every monthly document of the station.
    pub fn set_monthly(&self, station_id: &str, monthly: MonthlyMetrics) {
        let mut inner = self.inner.lock();
        if let Some(station) = inner.stations.get_mut(station_id) {
            station.monthly = monthly;
        }
        inner.notify(station_id, ResourceKind::MonthlyMetrics);
    }

    /// Replaces every daily document of the station.
    pub fn set_daily(&self, station_id: &str, daily: DailyMetrics) {
        let mut inner = self.inner.lock();
        if let Some(station) = inner.stations.get_mut(station_id) {
            station.daily = daily;
        }
        inner.notify(station_id, ResourceKind::DailyMetrics);
    }

    pub fn add_user(&self, user: UserRecord) {
        self.inner.lock().users.push(user);
    }

    /// Makes every read fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().unavailable = unavailable;
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }
}

struct MemorySubscription {
    inner: Weak<Mutex<Inner>>,
    id: u64,
}

impl Subscription for MemorySubscription {
    fn cancel(self: Box<Self>) -> Result<()> {
        let inner = self.inner.upgrade().ok_or_else(|| anyhow!("store dropped"))?;
        match inner.lock().listeners.remove(&self.id) {
            Some(_) => Ok(()),
            None => bail!("listener {} already removed", self.id),
        }
    }
}

#[async_trait]
impl StationStore for MemoryStore {
    async fn query_stations(&self, term: &str) -> Result<Vec<StationSummary>> {
        let inner = self.inner.lock();
        inner.check()?;
        Ok(inner
            .stations
            .values()
            .filter(|s| s.summary.matches(term))
            .map(|s| s.summary.clone())
            .collect())
    }

    async fn monthly_metrics(&self, station_id: &str) -> Result<MonthlyMetrics> {
        let inner = self.inner.lock();
        inner.check()?;
        Ok(inner.station(station_id)?.monthly.clone())
    }

    async fn daily_metrics(&self, station_id: &str) -> Result<DailyMetrics> {
        let inner = self.inner.lock();
        inner.check()?;
        Ok(inner.station(station_id)?.daily.clone())
    }

    async fn user_aggregates(&self) -> Result<UserStats> {
        let inner = self.inner.lock();
        inner.check()?;
        Ok(UserStats::from_records(&inner.users, Utc::now()))
    }

    /// Registers `sink` and immediately delivers the current snapshot.
    async fn subscribe(
        &self,
        station_id: &str,
        kind: ResourceKind,
        sink: ChangeSink,
    ) -> Result<Box<dyn Subscription>> {
        let mut inner = self.inner.lock();
        inner.check()?;
        let initial = inner.station(station_id)?.payload(kind);
        sink.emit(initial);

        let id = inner.next_listener;
        inner.next_listener += 1;
        inner.listeners.insert(id, sink);
        debug!(station_id, resource = %kind, listener = id, "Listener registered");

        Ok(Box::new(MemorySubscription {
            inner: Arc::downgrade(&self.inner),
            id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::LiveSync;

    fn summary(id: &str) -> StationSummary {
        StationSummary {
            station_id: id.into(),
            company_name: "Cycl".into(),
            capacity: 100,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_subscribe_delivers_initial_and_updates() {
        let store = MemoryStore::new();
        store.insert_station(summary("A"));

        let mut sync = LiveSync::new();
        let sub = store
            .subscribe("A", ResourceKind::StationFields, sync.sink("A", ResourceKind::StationFields))
            .await
            .unwrap();

        store.set_fields("A", None, 40);
        let events = sync.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1].payload,
            ChangePayload::StationFields {
                capacity: Some(100),
                current_cap: 40
            }
        );

        sub.cancel().unwrap();
        assert_eq!(store.listener_count(), 0);
        store.set_fields("A", None, 41);
        assert!(sync.drain().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_twice_fails() {
        let store = MemoryStore::new();
        store.insert_station(summary("A"));
        let sync = LiveSync::new();

        let sub = store
            .subscribe("A", ResourceKind::DailyMetrics, sync.sink("A", ResourceKind::DailyMetrics))
            .await
            .unwrap();
        let duplicate = Box::new(MemorySubscription {
            inner: Arc::downgrade(&store.inner),
            id: 0,
        });

        sub.cancel().unwrap();
        assert!(duplicate.cancel().is_err());
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let store = MemoryStore::new();
        store.insert_station(summary("A"));
        store.set_unavailable(true);

        assert!(store.query_stations("cycl").await.is_err());
        assert!(store.user_aggregates().await.is_err());
    }
}
