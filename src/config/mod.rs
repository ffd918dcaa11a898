//! Application configuration.

pub mod app_config;

pub use app_config::{AppConfig, GeoConfig, ProbeConfig, SchedulerConfig};
