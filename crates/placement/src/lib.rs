pub mod companies;
pub mod config;
pub mod error;
pub mod telemetry;
