pub mod coalesce;
pub mod collections;
pub mod config;
pub mod log;
