//! Persistence seam for classified images.

use async_trait::async_trait;
use huesort_core::PixelMatrix;

pub mod dir;
pub mod memory;

pub use dir::DirectoryStore;
pub use memory::MemoryStore;

/// Where verified items end up, grouped by their assigned color.
///
/// Persistence is keyed on (color, name); persisting the same pair twice
/// overwrites, which keeps redelivered outcomes idempotent.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persist one item under its color group.
    async fn persist(&self, name: &str, color: &str, data: &PixelMatrix) -> anyhow::Result<()>;
}
