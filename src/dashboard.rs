//! Stateful shell tying the store, live sync and aggregation together.
//!
//! A [`Dashboard`] owns one search session at a time: the loaded station set,
//! the selected period, the live subscriptions and the last computed
//! [`CurrentData`]. Every mutation recomputes the snapshot in full.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::metrics::series::{build_monthly, merged_monthly};
use crate::metrics::{
    BusinessValue, CurrentData, DashboardState, MonthlyPoint, PeriodSelection, QuickPeriod,
    RawCustomRange, aggregate, business_value,
};
use crate::services::StationStore;
use crate::station::{DailyMetrics, MonthlyMetrics, Station};
use crate::sync::{LiveSync, apply_change};
use crate::users::UserStats;

/// Source of "now". Fixed clocks make snapshots reproducible.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// The current UTC calendar day.
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The term was blank; nothing changed.
    EmptyQuery,
    /// The query ran and matched no station.
    NoResults,
    /// The station query failed; the dashboard is left empty.
    Unavailable(String),
    Loaded { stations: usize },
}

pub struct Dashboard {
    store: Arc<dyn StationStore>,
    clock: Clock,
    state: DashboardState,
    sync: LiveSync,
    current: CurrentData,
}

impl Dashboard {
    pub fn new(store: Arc<dyn StationStore>, clock: Clock) -> Self {
        let state = DashboardState::default();
        let current = aggregate(&state, clock.today());
        Self {
            store,
            clock,
            state,
            sync: LiveSync::new(),
            current,
        }
    }

    /// Replaces the station set with the stations matching `term`.
    ///
    /// The previous session's subscriptions are cancelled before anything is
    /// fetched. Stations and user stats are fetched concurrently, then every
    /// station's monthly and daily history is backfilled concurrently.
    #[tracing::instrument(skip(self), fields(session = tracing::field::Empty))]
    pub async fn search(&mut self, term: &str) -> SearchOutcome {
        let term = term.trim();
        if term.is_empty() {
            debug!("Ignoring empty search");
            return SearchOutcome::EmptyQuery;
        }

        let session = self.sync.begin_session();
        tracing::Span::current().record("session", tracing::field::display(session));

        let store = self.store.clone();
        let (stations, user_stats) = tokio::join!(store.query_stations(term), store.user_aggregates());

        let user_stats = user_stats.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to fetch user stats, using zero stats");
            UserStats::default()
        });

        let (summaries, failure) = match stations {
            Ok(summaries) => (summaries, None),
            Err(e) => {
                warn!(error = %e, "Station query failed");
                (Vec::new(), Some(e.to_string()))
            }
        };

        let mut stations: Vec<Station> = summaries.into_iter().map(Station::from_summary).collect();
        backfill(&store, &mut stations).await;

        let ids: Vec<String> = stations.iter().map(|s| s.station_id.clone()).collect();
        self.state.stations = stations;
        self.state.user_stats = Some(user_stats);

        if !ids.is_empty() {
            self.sync.attach(store.as_ref(), &ids).await;
        }
        // initial snapshots delivered on attach
        for event in self.sync.drain() {
            apply_change(&mut self.state, event);
        }
        self.recompute();

        info!(
            term,
            stations = ids.len(),
            total_bottles = self.current.total_bottles,
            "Search complete"
        );

        match failure {
            Some(reason) => SearchOutcome::Unavailable(reason),
            None if ids.is_empty() => SearchOutcome::NoResults,
            None => SearchOutcome::Loaded { stations: ids.len() },
        }
    }

    pub fn set_period(&mut self, period: PeriodSelection) {
        self.state.period = period;
        self.recompute();
    }

    /// Selects the custom period. An unusable range still selects it, with a
    /// total of 0.
    pub fn set_custom_range(&mut self, raw: &RawCustomRange) {
        self.set_period(PeriodSelection::Custom(raw.resolve()));
    }

    pub fn set_quick_period(&mut self, quick: QuickPeriod) {
        let range = quick.range(self.clock.today());
        debug!(quick = ?quick, range = %range, "Quick period selected");
        self.set_period(PeriodSelection::Custom(Some(range)));
    }

    /// Applies every change queued so far. Returns how many were applied.
    pub fn apply_pending(&mut self) -> usize {
        let mut applied = 0;
        for event in self.sync.drain() {
            applied += usize::from(apply_change(&mut self.state, event));
        }
        if applied > 0 {
            self.recompute();
        }
        applied
    }

    /// Waits for at least one live change, then applies everything queued.
    pub async fn next_change(&mut self) -> usize {
        let Some(first) = self.sync.recv().await else {
            return 0;
        };
        let mut applied = usize::from(apply_change(&mut self.state, first));
        for event in self.sync.drain() {
            applied += usize::from(apply_change(&mut self.state, event));
        }
        self.recompute();
        applied
    }

    pub fn current(&self) -> &CurrentData {
        &self.current
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn stations(&self) -> &[Station] {
        &self.state.stations
    }

    pub fn user_stats(&self) -> Option<&UserStats> {
        self.state.user_stats.as_ref()
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn active_subscriptions(&self) -> usize {
        self.sync.active_subscriptions()
    }

    /// Monthly series spanning the whole custom range, untruncated.
    pub fn custom_series(&self) -> Option<Vec<MonthlyPoint>> {
        match self.state.period {
            PeriodSelection::Custom(Some(range)) => Some(build_monthly(
                &merged_monthly(&self.state.stations),
                Some(range),
                self.clock.today(),
            )),
            _ => None,
        }
    }

    /// Business value of the current period total.
    pub fn business_value(&self) -> BusinessValue {
        business_value(
            self.current.total_bottles,
            self.state.user_stats.as_ref(),
            &self.state.stations,
        )
    }

    fn recompute(&mut self) {
        self.current = aggregate(&self.state, self.clock.today());
        debug!(
            period = %self.current.period,
            total_bottles = self.current.total_bottles,
            stations = self.current.stations_count,
            "Snapshot recomputed"
        );
    }
}

/// Loads monthly and daily history for every station concurrently. A failed
/// fetch leaves that history empty.
async fn backfill(store: &Arc<dyn StationStore>, stations: &mut [Station]) {
    let tasks: Vec<_> = stations
        .iter()
        .map(|station| {
            let store = store.clone();
            let station_id = station.station_id.clone();
            tokio::spawn(async move {
                let (monthly, daily) = tokio::join!(
                    store.monthly_metrics(&station_id),
                    store.daily_metrics(&station_id)
                );
                let monthly = monthly.unwrap_or_else(|e| {
                    warn!(station_id = %station_id, error = %e, "Failed to fetch monthly metrics");
                    MonthlyMetrics::new()
                });
                let daily = daily.unwrap_or_else(|e| {
                    warn!(station_id = %station_id, error = %e, "Failed to fetch daily metrics");
                    DailyMetrics::new()
                });
                (monthly, daily)
            })
        })
        .collect();

    for (station, task) in stations.iter_mut().zip(tasks) {
        match task.await {
            Ok((monthly, daily)) => {
                station.replace_monthly(monthly);
                station.replace_daily(daily);
            }
            Err(e) => warn!(station_id = %station.station_id, error = %e, "Backfill task failed"),
        }
    }
}
