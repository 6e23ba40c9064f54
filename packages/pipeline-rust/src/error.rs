//! Pipeline failure taxonomy.

use huesort_core::DecodeError;

/// Everything that can go wrong between loading an item and persisting it.
///
/// Transport and schema failures surface through [`PipelineError::Decode`];
/// the remaining variants are semantic failures detected after a frame has
/// decoded cleanly.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A frame failed to decode at the bus boundary.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A status or color referenced an item this stage does not know.
    #[error("unknown item '{name}' referenced on the bus")]
    Identity { name: String },

    /// The declared element count does not match the payload.
    #[error("integrity check failed for '{name}': declared {declared}, recomputed {actual}")]
    Integrity {
        name: String,
        declared: u64,
        actual: u64,
    },

    /// A color arrived for an item other than the cached one.
    #[error("color for '{got}' does not correlate with pending item {expected:?}")]
    Correlation {
        expected: Option<String>,
        got: String,
    },

    /// The retry ceiling was reached without a successful outcome.
    #[error("'{name}' still invalid after {attempts} retries")]
    RetryExhausted { name: String, attempts: u32 },

    /// The pipeline cannot start as configured.
    #[error("invalid pipeline configuration: {reason}")]
    Configuration { reason: String },

    /// A message failed to serialize for publishing.
    #[error("failed to encode outgoing message")]
    Encode(#[from] serde_json::Error),

    /// The underlying bus refused a publish or subscription.
    #[error(transparent)]
    Bus(#[from] anyhow::Error),
}
