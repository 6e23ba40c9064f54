//! Huesort Pipeline — bus transport, the three stages, image loading and
//! persistence.
//!
//! The stages never call each other: Source feeds work items one at a time,
//! Classifier assigns each a palette color, Sink correlates and persists, and
//! every hand-off travels through [`bus::BusClient`] as a topic-addressed
//! frame.

pub mod bus;
pub mod config;
pub mod error;
pub mod loader;
pub mod stages;
pub mod store;

pub use config::{PipelineConfig, RetryPolicy};
pub use error::PipelineError;
