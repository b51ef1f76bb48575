use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::metrics::DashboardState;
use crate::services::StationStore;
use crate::sync::events::{
    ChangeEvent, ChangePayload, ChangeSink, ResourceKind, SessionId, Subscription,
};

/// Keeps store subscriptions in step with the displayed station set.
///
/// All subscriptions of a session feed one inbound queue. Starting a new
/// session cancels every handle of the previous one first and discards
/// anything it already queued; events that still arrive late are dropped by
/// their session tag in [`LiveSync::drain`] and [`LiveSync::recv`].
pub struct LiveSync {
    session: SessionId,
    tx: UnboundedSender<ChangeEvent>,
    rx: UnboundedReceiver<ChangeEvent>,
    subscriptions: Vec<Box<dyn Subscription>>,
}

impl Default for LiveSync {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveSync {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            session: SessionId::default(),
            tx,
            rx,
            subscriptions: Vec::new(),
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.len()
    }

    /// Tears down the current session and opens the next one.
    pub fn begin_session(&mut self) -> SessionId {
        self.cancel_all();

        let mut discarded = 0usize;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }

        self.session = self.session.next();
        debug!(session = %self.session, discarded, "Live sync session started");
        self.session
    }

    /// Cancels every subscription, best effort.
    pub fn cancel_all(&mut self) {
        let count = self.subscriptions.len();
        for subscription in self.subscriptions.drain(..) {
            if let Err(e) = subscription.cancel() {
                warn!(error = %e, "Failed to cancel subscription");
            }
        }
        if count > 0 {
            debug!(count, "Subscriptions cancelled");
        }
    }

    /// A sink tagged with the current session.
    pub fn sink(&self, station_id: &str, kind: ResourceKind) -> ChangeSink {
        ChangeSink::new(self.tx.clone(), self.session, station_id, kind)
    }

    /// Subscribes to every resource of every station in `station_ids`.
    /// A failed subscription is logged and skipped.
    #[tracing::instrument(skip_all, fields(session = %self.session, stations = station_ids.len()))]
    pub async fn attach(&mut self, store: &dyn StationStore, station_ids: &[String]) -> usize {
        let mut attached = 0;
        for station_id in station_ids {
            for kind in ResourceKind::ALL {
                let sink = self.sink(station_id, kind);
                match store.subscribe(station_id, kind, sink).await {
                    Ok(subscription) => {
                        self.subscriptions.push(subscription);
                        attached += 1;
                    }
                    Err(e) => {
                        warn!(station_id = %station_id, resource = %kind, error = %e, "Failed to attach listener");
                    }
                }
            }
        }
        info!(attached, "Live listeners attached");
        attached
    }

    fn is_current(&self, event: &ChangeEvent) -> bool {
        if event.session == self.session {
            return true;
        }
        debug!(
            event_session = %event.session,
            session = %self.session,
            station_id = %event.station_id,
            "Dropping change from a superseded session"
        );
        false
    }

    /// Everything queued for the current session, in arrival order.
    pub fn drain(&mut self) -> Vec<ChangeEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            if self.is_current(&event) {
                events.push(event);
            }
        }
        events
    }

    /// Waits for the next event of the current session.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            let event = self.rx.recv().await?;
            if self.is_current(&event) {
                return Some(event);
            }
        }
    }
}

impl Drop for LiveSync {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Writes one change into the station it belongs to. Returns `false` when
/// the station is not part of `state`.
pub fn apply_change(state: &mut DashboardState, event: ChangeEvent) -> bool {
    let Some(station) = state.station_mut(&event.station_id) else {
        debug!(station_id = %event.station_id, "Change for unknown station ignored");
        return false;
    };

    match event.payload {
        ChangePayload::StationFields {
            capacity,
            current_cap,
        } => station.apply_fields(capacity, current_cap),
        ChangePayload::MonthlyMetrics(metrics) => station.replace_monthly(metrics),
        ChangePayload::DailyMetrics(daily) => station.replace_daily(daily),
    }
    true
}
