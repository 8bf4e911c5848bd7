pub mod metrics;
pub mod tracing;

pub use metrics::{MetricsRegistry, TimingGuard};
pub use self::tracing::init_tracing;
