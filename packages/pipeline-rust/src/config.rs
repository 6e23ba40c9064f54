//! Runtime configuration for the pipeline.

use std::time::Duration;

/// Default per-topic channel capacity.
pub const DEFAULT_BUS_CAPACITY: usize = 64;

/// How the Source reacts to invalid outcomes.
///
/// The default policy retries forever with no delay, which matches the
/// pipeline's retry contract. A ceiling or a backoff can be layered on for
/// deployments where a permanently failing item must not spin the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    /// Maximum consecutive retries per item. `None` retries without bound.
    pub max_retries: Option<u32>,
    /// Fixed delay before each republish. `None` republishes immediately.
    pub backoff: Option<Duration>,
}

/// Top-level pipeline settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Capacity of each stage's inbound channel.
    pub bus_capacity: usize,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bus_capacity: DEFAULT_BUS_CAPACITY,
            retry: RetryPolicy::default(),
        }
    }
}
