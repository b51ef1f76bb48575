pub mod calendar;
pub mod config;
pub mod dashboard;
pub mod fetch;
pub mod infra;
pub mod metrics;
pub mod output;
pub mod services;
pub mod station;
pub mod sync;
pub mod users;
