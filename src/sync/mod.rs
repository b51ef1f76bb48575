//! Live updates from the store.
//!
//! Stores push [`ChangeEvent`]s through per-subscription [`ChangeSink`]s into a
//! single queue owned by [`LiveSync`]. The dashboard drains that queue,
//! writes each snapshot into its station and recomputes.

mod events;
mod manager;

pub use events::{ChangeEvent, ChangePayload, ChangeSink, ResourceKind, SessionId, Subscription};
pub use manager::{LiveSync, apply_change};
