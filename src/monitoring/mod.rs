pub mod events;
pub mod format;
pub mod latency;
pub mod metrics;

pub use latency::{LatencyGuard, LatencyMetadata, guard_with_level};
pub use metrics::{prometheus_enabled, try_init_prometheus};
