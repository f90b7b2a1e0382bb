//! Process-wide download metrics.

mod collector;

pub use collector::{MetricsCollector, MetricsSnapshot};
