//! Test double that records publishes instead of routing them.

use async_trait::async_trait;
use huesort_core::BusMessage;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{BusClient, Envelope};

/// Captures every published frame for later assertion. Nothing is routed.
#[derive(Debug, Default)]
pub(crate) struct RecordingBus {
    frames: Mutex<Vec<Envelope>>,
}

impl RecordingBus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Decoded view of everything published so far, in publish order.
    pub(crate) fn messages(&self) -> Vec<BusMessage> {
        self.frames
            .lock()
            .iter()
            .map(|frame| {
                BusMessage::decode(&frame.topic, &frame.payload)
                    .unwrap_or_else(|err| panic!("recorded frame failed to decode: {err}"))
            })
            .collect()
    }

    pub(crate) fn clear(&self) {
        self.frames.lock().clear();
    }
}

#[async_trait]
impl BusClient for RecordingBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> anyhow::Result<()> {
        self.frames.lock().push(Envelope {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }

    fn attach(&self, _topic: &str, _tx: mpsc::Sender<Envelope>) {}
}
