pub mod store;

pub use store::StationStore;
