//! In-memory store, used by tests and dry runs.

use std::collections::HashMap;

use async_trait::async_trait;
use huesort_core::PixelMatrix;
use parking_lot::Mutex;

use super::ImageStore;

/// Keeps persisted items in a (color, name) keyed map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<(String, String), PixelMatrix>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, color: &str, name: &str) -> Option<PixelMatrix> {
        self.items
            .lock()
            .get(&(color.to_string(), name.to_string()))
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

#[async_trait]
impl ImageStore for MemoryStore {
    async fn persist(&self, name: &str, color: &str, data: &PixelMatrix) -> anyhow::Result<()> {
        self.items
            .lock()
            .insert((color.to_string(), name.to_string()), data.clone());
        Ok(())
    }
}
