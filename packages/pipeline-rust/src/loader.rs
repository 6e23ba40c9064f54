//! Filesystem scanning and decoding of input images into work items.

use std::path::{Path, PathBuf};

use anyhow::Context;
use huesort_core::PixelMatrix;
use tracing::{debug, info};

use crate::stages::WorkItem;

/// File extensions accepted as input images, lowercase.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "bmp", "jpeg", "jpg", "jpe", "jp2", "png", "webp", "tiff", "tif",
];

/// List the supported image files directly inside `dir`, sorted by file
/// name. Subdirectories and unsupported files are skipped with a debug log.
///
/// # Errors
///
/// Fails when the directory itself cannot be read.
pub fn enumerate_images(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read input directory {}", dir.display()))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
        let path = entry.path();
        if path.is_dir() {
            debug!(path = %path.display(), "skipping directory");
            continue;
        }
        if !has_supported_extension(&path) {
            debug!(path = %path.display(), "skipping unsupported file");
            continue;
        }
        paths.push(path);
    }
    paths.sort();
    Ok(paths)
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
}

/// Decode every supported image in `dir` into a work item carrying its
/// pixels in capture (BGR) order.
///
/// # Errors
///
/// Fails on the first unreadable or undecodable image; a partial run would
/// silently shrink the workload.
pub fn load_work_items(dir: &Path) -> anyhow::Result<Vec<WorkItem>> {
    let mut items = Vec::new();
    for path in enumerate_images(dir)? {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("non-unicode file name: {}", path.display()))?
            .to_string();
        let img = image::open(&path)
            .with_context(|| format!("failed to decode {}", path.display()))?
            .to_rgb8();
        items.push(WorkItem::new(name, to_bgr_matrix(&img)));
    }
    info!(items = items.len(), dir = %dir.display(), "input images loaded");
    Ok(items)
}

fn to_bgr_matrix(img: &image::RgbImage) -> PixelMatrix {
    let rows = (0..img.height())
        .map(|y| {
            (0..img.width())
                .map(|x| {
                    let [r, g, b] = img.get_pixel(x, y).0;
                    [b, g, r]
                })
                .collect()
        })
        .collect();
    PixelMatrix(rows)
}
