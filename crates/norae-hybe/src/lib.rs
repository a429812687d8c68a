pub mod config;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod registration;
pub mod telemetry;
pub mod ticket;
pub mod uploads;
