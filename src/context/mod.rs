//! Shared application context: the injected metrics capability.

pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
