//! Message bus seam.
//!
//! Stages never talk to each other directly; everything flows through a
//! [`BusClient`] as raw topic-addressed frames. The in-process implementation
//! in [`memory`] is the default transport, and the trait is the extension
//! point for an external broker.

use async_trait::async_trait;
use huesort_core::BusMessage;
use tokio::sync::mpsc;

use crate::error::PipelineError;

pub mod memory;

#[cfg(test)]
pub(crate) mod recording;

/// A raw frame in flight: the topic it was published on plus the encoded
/// payload. Decoding happens exactly once, on the receiving side.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Publish/subscribe access to the bus.
#[async_trait]
pub trait BusClient: Send + Sync {
    /// Publish one frame. Absence of subscribers is not an error.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> anyhow::Result<()>;

    /// Route future frames on `topic` into `tx`. One channel may be attached
    /// to several topics to form a single inbound stream.
    fn attach(&self, topic: &str, tx: mpsc::Sender<Envelope>);
}

/// Open an inbound stream covering all of `topics`.
pub fn subscribe(bus: &dyn BusClient, topics: &[&str], capacity: usize) -> mpsc::Receiver<Envelope> {
    let (tx, rx) = mpsc::channel(capacity);
    for topic in topics {
        bus.attach(topic, tx.clone());
    }
    rx
}

/// Encode and publish a decoded message on its own topic.
///
/// # Errors
///
/// `Encode` when serialization fails, `Bus` when the transport refuses the
/// frame.
pub async fn publish_message(bus: &dyn BusClient, msg: &BusMessage) -> Result<(), PipelineError> {
    let payload = msg.encode_payload()?;
    bus.publish(msg.topic(), payload).await?;
    Ok(())
}
