//! The three pipeline stages and the loop that drives them.
//!
//! Each stage implements [`StageRunnable`] and is pumped by [`drive`], which
//! owns the bus boundary: frames are decoded exactly once there, malformed
//! frames are logged and dropped, and handlers only ever see typed messages.

use async_trait::async_trait;
use huesort_core::BusMessage;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::bus::Envelope;

pub mod classifier;
pub mod sink;
pub mod source;

pub use classifier::Classifier;
pub use sink::Sink;
pub use source::{Source, WorkItem};

/// Whether the driving loop keeps pumping after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// A stage's message-facing surface.
#[async_trait]
pub trait StageRunnable: Send {
    /// Stage name for log context.
    fn name(&self) -> &'static str;

    /// React to one decoded message.
    async fn on_message(&mut self, msg: BusMessage) -> anyhow::Result<Flow>;

    /// Called once after the loop ends, whatever the reason.
    async fn shutdown(&mut self) {}
}

/// Pump a stage until its inbound stream closes or it asks to stop.
///
/// Handler errors are logged and the loop keeps going; a stage that must
/// stop returns [`Flow::Stop`] instead of erroring.
pub async fn drive<R: StageRunnable>(mut runnable: R, mut rx: mpsc::Receiver<Envelope>) {
    while let Some(frame) = rx.recv().await {
        let msg = match BusMessage::decode(&frame.topic, &frame.payload) {
            Ok(msg) => msg,
            Err(err) => {
                warn!(stage = runnable.name(), error = %err, "malformed frame dropped");
                continue;
            }
        };
        match runnable.on_message(msg).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Stop) => break,
            Err(err) => {
                warn!(stage = runnable.name(), error = %err, "handler failed, frame skipped");
            }
        }
    }
    runnable.shutdown().await;
    debug!(stage = runnable.name(), "stage stopped");
}

// ---------------------------------------------------------------------------
// End-to-end tests over the in-process bus
// ---------------------------------------------------------------------------
