//! Typed change events delivered by store subscriptions.

use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use crate::station::{DailyMetrics, MonthlyMetrics};

/// Identifies one search session. Events carry the session they were
/// subscribed under so late deliveries from an old session can be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SessionId(u64);

impl SessionId {
    pub fn next(self) -> Self {
        SessionId(self.0 + 1)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The per-station resources a session subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    StationFields,
    MonthlyMetrics,
    DailyMetrics,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::StationFields,
        ResourceKind::MonthlyMetrics,
        ResourceKind::DailyMetrics,
    ];
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::StationFields => "station",
            ResourceKind::MonthlyMetrics => "metrics",
            ResourceKind::DailyMetrics => "daily",
        })
    }
}

/// Full snapshot of one resource after it changed.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangePayload {
    /// `capacity` is `None` when the document no longer carries it.
    StationFields {
        capacity: Option<u64>,
        current_cap: u64,
    },
    /// Every monthly document that still exists.
    MonthlyMetrics(MonthlyMetrics),
    /// Every daily document that still exists.
    DailyMetrics(DailyMetrics),
}

impl ChangePayload {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ChangePayload::StationFields { .. } => ResourceKind::StationFields,
            ChangePayload::MonthlyMetrics(_) => ResourceKind::MonthlyMetrics,
            ChangePayload::DailyMetrics(_) => ResourceKind::DailyMetrics,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub session: SessionId,
    pub station_id: Arc<str>,
    pub payload: ChangePayload,
}

/// Sending half handed to a store for one subscription.
///
/// Every event it emits is tagged with the session, station and resource the
/// subscription was opened for.
#[derive(Debug, Clone)]
pub struct ChangeSink {
    tx: UnboundedSender<ChangeEvent>,
    session: SessionId,
    station_id: Arc<str>,
    kind: ResourceKind,
}

impl ChangeSink {
    pub(crate) fn new(
        tx: UnboundedSender<ChangeEvent>,
        session: SessionId,
        station_id: &str,
        kind: ResourceKind,
    ) -> Self {
        Self {
            tx,
            session,
            station_id: Arc::from(station_id),
            kind,
        }
    }

    pub fn station_id(&self) -> &str {
        &self.station_id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Queues `payload`. Returns `false` once the receiving side is gone,
    /// which tells a polling subscription to stop.
    pub fn emit(&self, payload: ChangePayload) -> bool {
        if payload.kind() != self.kind {
            warn!(
                station_id = %self.station_id,
                expected = %self.kind,
                got = %payload.kind(),
                "Dropping change for the wrong resource"
            );
            return true;
        }
        self.tx
            .send(ChangeEvent {
                session: self.session,
                station_id: self.station_id.clone(),
                payload,
            })
            .is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Handle to an active store subscription.
pub trait Subscription: Send {
    /// Stops delivery. Failures are reported but never fatal to the caller.
    fn cancel(self: Box<Self>) -> anyhow::Result<()>;
}
