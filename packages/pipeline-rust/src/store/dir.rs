//! Filesystem store: one subdirectory per color, one image file per item.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use async_trait::async_trait;
use huesort_core::PixelMatrix;
use image::{ImageFormat, Rgb, RgbImage};
use tracing::debug;

use super::ImageStore;

/// Writes classified images under `root/<color>/<name>`.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ImageStore for DirectoryStore {
    async fn persist(&self, name: &str, color: &str, data: &PixelMatrix) -> anyhow::Result<()> {
        let encoded = encode(name, data)?;
        let dir = self.root.join(color);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create color directory {}", dir.display()))?;
        let path = dir.join(name);
        tokio::fs::write(&path, encoded)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        debug!(name, color, path = %path.display(), "image persisted");
        Ok(())
    }
}

/// Re-encode the matrix in the format its file name suggests, falling back to
/// PNG for names without a recognized encodable extension.
fn encode(name: &str, data: &PixelMatrix) -> anyhow::Result<Vec<u8>> {
    let rows = data.rows();
    if rows == 0 {
        bail!("'{name}' has no pixel rows to encode");
    }
    let cols = data.0[0].len();
    if cols == 0 || data.0.iter().any(|row| row.len() != cols) {
        bail!("'{name}' is not a rectangular non-empty matrix");
    }

    let width = u32::try_from(cols).context("image too wide")?;
    let height = u32::try_from(rows).context("image too tall")?;
    let mut img = RgbImage::new(width, height);
    for (y, row) in data.0.iter().enumerate() {
        for (x, bgr) in row.iter().enumerate() {
            img.put_pixel(x as u32, y as u32, Rgb([bgr[2], bgr[1], bgr[0]]));
        }
    }

    let format = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ImageFormat::from_extension)
        .filter(|format| format.can_write())
        .unwrap_or(ImageFormat::Png);

    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format)
        .with_context(|| format!("failed to encode '{name}' as {format:?}"))?;
    Ok(out.into_inner())
}
