//! Huesort Core — wire message schemas, pixel matrix math, and the reference palette.

pub mod matrix;
pub mod messages;
pub mod palette;

pub use matrix::{bgr_to_rgb, PixelMatrix};
pub use messages::{
    topics, BusMessage, ColorMessage, DataMessage, DecodeError, ImageStatus, StatusMessage,
};
pub use palette::{EmptyPalette, Palette};
