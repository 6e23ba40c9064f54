//! Wire-compatible message schemas for the pipeline bus.
//!
//! Field names are pinned to the exact wire strings (`imagename`,
//! `imagedata`, `checksum`, `imagestatus`, `imagecolor`). Payloads are plain
//! JSON maps with no binary framing; the topic a frame arrives on selects
//! its schema, and [`BusMessage::decode`] is the single decode point at the
//! bus boundary.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::matrix::PixelMatrix;

/// Logical channel names. Exact strings shared by every stage.
pub mod topics {
    /// Raw work items: Source -> Classifier, Sink.
    pub const DATA: &str = "image/data";
    /// Outcome reports: Sink and Source -> Source (observed by the others).
    pub const STATUS: &str = "image/status";
    /// Classification results: Classifier -> Sink.
    pub const COLOR: &str = "image/color";
}

// ---------------------------------------------------------------------------
// Wire structs
// ---------------------------------------------------------------------------

/// A raw work item, published by Source on the data channel (initial publish
/// or retry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataMessage {
    #[serde(rename = "imagename")]
    pub name: String,
    #[serde(rename = "imagedata")]
    pub data: PixelMatrix,
    /// Declared element count of `data`, recomputed by every consumer.
    pub checksum: u64,
}

impl DataMessage {
    /// Build a message for one work item, deriving the integrity value from
    /// the payload itself.
    #[must_use]
    pub fn new(name: impl Into<String>, data: PixelMatrix) -> Self {
        let checksum = data.element_count();
        Self {
            name: name.into(),
            data,
            checksum,
        }
    }
}

/// Outcome of processing one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    /// The item was correlated and persisted; Source may advance.
    Ok,
    /// Integrity or correlation failed; Source republishes the same item.
    Invalid,
    /// All items processed. Emitted exactly once, by Source.
    End,
}

impl ImageStatus {
    /// Wire form, always lowercase.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Invalid => "invalid",
            Self::End => "end",
        }
    }
}

impl Serialize for ImageStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ImageStatus {
    // Case-insensitive on read, per protocol.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.to_ascii_lowercase().as_str() {
            "ok" => Ok(Self::Ok),
            "invalid" => Ok(Self::Invalid),
            "end" => Ok(Self::End),
            other => Err(serde::de::Error::unknown_variant(
                other,
                &["ok", "invalid", "end"],
            )),
        }
    }
}

/// Outcome report consumed by Source, observed passively by the other stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    #[serde(rename = "imagename")]
    pub name: String,
    #[serde(rename = "imagestatus")]
    pub status: ImageStatus,
}

impl StatusMessage {
    #[must_use]
    pub fn new(name: impl Into<String>, status: ImageStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

/// Classification result: Classifier -> Sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorMessage {
    #[serde(rename = "imagename")]
    pub name: String,
    #[serde(rename = "imagecolor")]
    pub color: String,
}

// ---------------------------------------------------------------------------
// BusMessage: the tagged union at the bus boundary
// ---------------------------------------------------------------------------

/// Everything that can travel on the bus, decoded once at the boundary.
///
/// Handlers dispatch on the decoded kind instead of re-parsing per topic
/// branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusMessage {
    Data(DataMessage),
    Status(StatusMessage),
    Color(ColorMessage),
}

impl BusMessage {
    /// Decode a raw frame according to the topic it arrived on.
    ///
    /// # Errors
    ///
    /// `Transport` when the bytes are not well-formed JSON, `Schema` when a
    /// required field is missing or mistyped, `UnknownTopic` for any other
    /// channel.
    pub fn decode(topic: &str, payload: &[u8]) -> Result<Self, DecodeError> {
        let value: serde_json::Value =
            serde_json::from_slice(payload).map_err(|source| DecodeError::Transport {
                topic: topic.to_string(),
                source,
            })?;
        let schema = |source| DecodeError::Schema {
            topic: topic.to_string(),
            source,
        };
        match topic {
            topics::DATA => serde_json::from_value(value).map(Self::Data).map_err(schema),
            topics::STATUS => serde_json::from_value(value)
                .map(Self::Status)
                .map_err(schema),
            topics::COLOR => serde_json::from_value(value)
                .map(Self::Color)
                .map_err(schema),
            _ => Err(DecodeError::UnknownTopic {
                topic: topic.to_string(),
            }),
        }
    }

    /// The topic this message belongs on.
    #[must_use]
    pub fn topic(&self) -> &'static str {
        match self {
            Self::Data(_) => topics::DATA,
            Self::Status(_) => topics::STATUS,
            Self::Color(_) => topics::COLOR,
        }
    }

    /// Encode the payload for publishing on [`BusMessage::topic`].
    ///
    /// # Errors
    ///
    /// Returns the underlying serializer error; well-formed messages always
    /// encode.
    pub fn encode_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::Data(msg) => serde_json::to_vec(msg),
            Self::Status(msg) => serde_json::to_vec(msg),
            Self::Color(msg) => serde_json::to_vec(msg),
        }
    }
}

/// Failures at the bus decode boundary.
///
/// Transport and Schema failures are logged and dropped by the stage driver;
/// no corrective status can be produced because the sender cannot be
/// identified from malformed content.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("payload on '{topic}' is not well-formed JSON: {source}")]
    Transport {
        topic: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("payload on '{topic}' is missing or mistypes a required field: {source}")]
    Schema {
        topic: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("no schema registered for topic '{topic}'")]
    UnknownTopic { topic: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
