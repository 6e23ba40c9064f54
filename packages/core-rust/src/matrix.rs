//! Pixel payloads exchanged on the data channel.
//!
//! A matrix is stored in capture (BGR) channel order and travels on the wire
//! as a nested numeric array, reconstructed as the same shape by every
//! consumer with element order preserved exactly.

use serde::{Deserialize, Serialize};

/// Raw pixel payload: ordered rows x ordered columns x 3 channel values.
///
/// Channel order is BGR (capture order). [`PixelMatrix::mean_bgr`] combined
/// with [`bgr_to_rgb`] produces the display-order triple used for
/// classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PixelMatrix(pub Vec<Vec<[u8; 3]>>);

impl PixelMatrix {
    /// Total number of channel values in the payload.
    ///
    /// This is the declared integrity value (`checksum`) carried on the wire
    /// and recomputed by every consumer.
    #[must_use]
    pub fn element_count(&self) -> u64 {
        self.0.iter().map(|row| row.len() as u64 * 3).sum()
    }

    /// Two-stage channel-wise average: each row's mean, then the mean of the
    /// row means. Equivalent to averaging over all pixels for well-formed
    /// (rectangular) matrices. Empty matrices and empty rows average to zero.
    #[must_use]
    pub fn mean_bgr(&self) -> [f64; 3] {
        if self.0.is_empty() {
            return [0.0; 3];
        }
        let mut acc = [0.0_f64; 3];
        for row in &self.0 {
            let mean = row_mean(row);
            for (channel, value) in acc.iter_mut().zip(mean) {
                *channel += value;
            }
        }
        let rows = self.0.len() as f64;
        acc.map(|channel| channel / rows)
    }

    /// Number of pixel rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload contains no rows at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn row_mean(row: &[[u8; 3]]) -> [f64; 3] {
    if row.is_empty() {
        return [0.0; 3];
    }
    let mut acc = [0.0_f64; 3];
    for pixel in row {
        for (channel, value) in acc.iter_mut().zip(pixel) {
            *channel += f64::from(*value);
        }
    }
    let cols = row.len() as f64;
    acc.map(|channel| channel / cols)
}

/// Reorder a capture-order (BGR) triple into display order (RGB).
#[must_use]
pub fn bgr_to_rgb(bgr: [f64; 3]) -> [f64; 3] {
    [bgr[2], bgr[1], bgr[0]]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
