//! Sink stage: correlates colors with cached data and persists the result.

use std::sync::Arc;

use async_trait::async_trait;
use huesort_core::{BusMessage, ColorMessage, DataMessage, ImageStatus, StatusMessage};
use tracing::{debug, info, warn};

use crate::bus::{publish_message, BusClient};
use crate::error::PipelineError;
use crate::store::ImageStore;

use super::{Flow, StageRunnable};

/// Holds at most one pending item at a time.
///
/// A new data frame replaces whatever was cached (last write wins). A color
/// frame either correlates with the cached item and persists it, or reports
/// `invalid` without touching the store. The end marker is observed but never
/// stops this stage; the sink stays online for whatever run comes next.
pub struct Sink {
    bus: Arc<dyn BusClient>,
    store: Arc<dyn ImageStore>,
    pending: Option<DataMessage>,
}

impl Sink {
    #[must_use]
    pub fn new(bus: Arc<dyn BusClient>, store: Arc<dyn ImageStore>) -> Self {
        Self {
            bus,
            store,
            pending: None,
        }
    }

    fn on_data(&mut self, msg: DataMessage) {
        if let Some(previous) = &self.pending {
            debug!(replaced = %previous.name, with = %msg.name, "pending item replaced");
        }
        self.pending = Some(msg);
    }

    async fn on_color(&mut self, msg: ColorMessage) -> Result<(), PipelineError> {
        let pending = match self.pending.take() {
            Some(pending) if pending.name == msg.name => pending,
            other => {
                let err = PipelineError::Correlation {
                    expected: other.as_ref().map(|pending| pending.name.clone()),
                    got: msg.name.clone(),
                };
                // Keep the cache; the mismatched color alone is rejected.
                self.pending = other;
                warn!(error = %err, "color rejected");
                let status = BusMessage::Status(StatusMessage::new(msg.name, ImageStatus::Invalid));
                return publish_message(self.bus.as_ref(), &status).await;
            }
        };

        let status = match self
            .store
            .persist(&pending.name, &msg.color, &pending.data)
            .await
        {
            Ok(()) => {
                debug!(name = %pending.name, color = %msg.color, "item persisted");
                ImageStatus::Ok
            }
            Err(err) => {
                warn!(name = %pending.name, error = %err, "persist failed");
                // The item goes back in the cache so a retried color can
                // still land.
                self.pending = Some(pending);
                ImageStatus::Invalid
            }
        };
        let report = BusMessage::Status(StatusMessage::new(msg.name, status));
        publish_message(self.bus.as_ref(), &report).await
    }
}

#[async_trait]
impl StageRunnable for Sink {
    fn name(&self) -> &'static str {
        "sink"
    }

    async fn on_message(&mut self, msg: BusMessage) -> anyhow::Result<Flow> {
        match msg {
            BusMessage::Data(data) => self.on_data(data),
            BusMessage::Color(color) => self.on_color(color).await?,
            BusMessage::Status(status) if status.status == ImageStatus::End => {
                // Deliberately not a stop condition.
                info!("end marker observed, staying online");
            }
            BusMessage::Status(_) => {}
        }
        Ok(Flow::Continue)
    }
}
