//! Classifier stage: integrity check, mean color, nearest palette entry.

use std::sync::Arc;

use async_trait::async_trait;
use huesort_core::{
    bgr_to_rgb, BusMessage, ColorMessage, DataMessage, ImageStatus, Palette, StatusMessage,
};
use tracing::{debug, info, warn};

use crate::bus::{publish_message, BusClient};
use crate::error::PipelineError;

use super::{Flow, StageRunnable};

/// Stateless classifier: each data frame is handled on its own, with no
/// memory between items.
pub struct Classifier {
    bus: Arc<dyn BusClient>,
    palette: Palette,
}

impl Classifier {
    #[must_use]
    pub fn new(bus: Arc<dyn BusClient>, palette: Palette) -> Self {
        Self { bus, palette }
    }

    async fn on_data(&self, msg: DataMessage) -> Result<(), PipelineError> {
        let actual = msg.data.element_count();
        if actual != msg.checksum {
            let err = PipelineError::Integrity {
                name: msg.name.clone(),
                declared: msg.checksum,
                actual,
            };
            warn!(error = %err, "rejecting item");
            let status = BusMessage::Status(StatusMessage::new(msg.name, ImageStatus::Invalid));
            return publish_message(self.bus.as_ref(), &status).await;
        }

        let rgb = bgr_to_rgb(msg.data.mean_bgr());
        let color = self.palette.nearest(rgb).to_string();
        debug!(name = %msg.name, %color, "item classified");
        let result = BusMessage::Color(ColorMessage {
            name: msg.name,
            color,
        });
        publish_message(self.bus.as_ref(), &result).await
    }
}

#[async_trait]
impl StageRunnable for Classifier {
    fn name(&self) -> &'static str {
        "classifier"
    }

    async fn on_message(&mut self, msg: BusMessage) -> anyhow::Result<Flow> {
        match msg {
            BusMessage::Data(data) => {
                self.on_data(data).await?;
                Ok(Flow::Continue)
            }
            BusMessage::Status(status) if status.status == ImageStatus::End => {
                info!("end marker received, disconnecting");
                Ok(Flow::Stop)
            }
            // Per-item outcomes and color results are other stages' business.
            BusMessage::Status(_) | BusMessage::Color(_) => Ok(Flow::Continue),
        }
    }
}

#[cfg(test)]
mod tests {
    use huesort_core::PixelMatrix;

    use crate::bus::recording::RecordingBus;

    use super::*;

    fn classifier() -> (Arc<RecordingBus>, Classifier) {
        let bus = Arc::new(RecordingBus::new());
        let classifier = Classifier::new(bus.clone(), Palette::web_basic());
        (bus, classifier)
    }

    fn solid(bgr: [u8; 3]) -> PixelMatrix {
        PixelMatrix(vec![vec![bgr; 3]; 3])
    }

    #[tokio::test]
    async fn classifies_a_solid_image_by_its_mean() {
        let (bus, classifier) = classifier();

        // BGR capture order: blue channel first.
        classifier
            .on_data(DataMessage::new("r.png", solid([0, 0, 255])))
            .await
            .unwrap();
        classifier
            .on_data(DataMessage::new("b.png", solid([255, 0, 0])))
            .await
            .unwrap();

        assert_eq!(
            bus.messages(),
            vec![
                BusMessage::Color(ColorMessage {
                    name: "r.png".into(),
                    color: "red".into(),
                }),
                BusMessage::Color(ColorMessage {
                    name: "b.png".into(),
                    color: "blue".into(),
                }),
            ]
        );
    }

    #[tokio::test]
    async fn checksum_mismatch_yields_invalid_and_no_color() {
        let (bus, classifier) = classifier();

        let mut msg = DataMessage::new("a.png", solid([1, 2, 3]));
        msg.checksum += 1;
        classifier.on_data(msg).await.unwrap();

        assert_eq!(
            bus.messages(),
            vec![BusMessage::Status(StatusMessage::new(
                "a.png",
                ImageStatus::Invalid
            ))]
        );
    }

    #[tokio::test]
    async fn empty_matrix_with_matching_checksum_classifies_as_black() {
        let (bus, classifier) = classifier();

        classifier
            .on_data(DataMessage::new("empty.png", PixelMatrix(Vec::new())))
            .await
            .unwrap();

        assert_eq!(
            bus.messages(),
            vec![BusMessage::Color(ColorMessage {
                name: "empty.png".into(),
                color: "black".into(),
            })]
        );
    }

    #[tokio::test]
    async fn end_marker_stops_the_stage() {
        let (_bus, mut classifier) = classifier();
        let flow = classifier
            .on_message(BusMessage::Status(StatusMessage::new(
                "last.png",
                ImageStatus::End,
            )))
            .await
            .unwrap();
        assert_eq!(flow, Flow::Stop);
    }

    #[tokio::test]
    async fn per_item_outcomes_are_ignored() {
        let (bus, mut classifier) = classifier();

        for status in [ImageStatus::Ok, ImageStatus::Invalid] {
            let flow = classifier
                .on_message(BusMessage::Status(StatusMessage::new("a.png", status)))
                .await
                .unwrap();
            assert_eq!(flow, Flow::Continue);
        }
        assert!(bus.messages().is_empty());
    }
}
