//! Firestore REST backend for [`StationStore`](crate::services::StationStore).

mod client;
pub mod values;

pub use client::FirestoreClient;
