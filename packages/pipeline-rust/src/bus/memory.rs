//! In-process bus backed by per-topic channel fan-out.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::trace;

use super::{BusClient, Envelope};

/// Topic-keyed fan-out over bounded channels.
///
/// Each publish clones the frame to every live subscriber of the topic and
/// applies their channel backpressure in attach order. Subscribers whose
/// receiving side has been dropped are pruned lazily on the next publish.
#[derive(Debug, Default)]
pub struct InProcessBus {
    topics: DashMap<String, Vec<mpsc::Sender<Envelope>>>,
}

impl InProcessBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BusClient for InProcessBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> anyhow::Result<()> {
        // Clone the subscriber list so the map shard is not held across await.
        let subscribers = self
            .topics
            .get(topic)
            .map(|entry| entry.clone())
            .unwrap_or_default();
        if subscribers.is_empty() {
            trace!(topic, "no subscribers, frame dropped");
            return Ok(());
        }

        let envelope = Envelope {
            topic: topic.to_string(),
            payload,
        };
        let mut delivered = 0_usize;
        for tx in &subscribers {
            if tx.send(envelope.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        trace!(topic, delivered, "frame published");

        if delivered < subscribers.len() {
            if let Some(mut entry) = self.topics.get_mut(topic) {
                entry.retain(|tx| !tx.is_closed());
            }
        }
        Ok(())
    }

    fn attach(&self, topic: &str, tx: mpsc::Sender<Envelope>) {
        self.topics.entry(topic.to_string()).or_default().push(tx);
    }
}
