//! Board image ingestion: gather files, detect corners, build the dataset.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use boardcal_core::{BoardSpec, CorrespondenceView, Vec2};
use boardcal_detect::{detect_chessboard, DetectParams};
use image::ImageReader;
use tracing::{info, warn};

use crate::dataset::PlanarDataset;

/// Dataset built from a set of board images.
#[derive(Debug, Clone)]
pub struct ImageDataset {
    pub dataset: PlanarDataset,
    /// Common size of the input images, `[width, height]`.
    pub image_size: [u32; 2],
    /// Paths of the images in which the board was found, in dataset order.
    pub used_paths: Vec<PathBuf>,
    /// Number of images skipped (decode failure or board not found).
    pub skipped: usize,
}

/// Collect board image paths (`.jpg`, `.jpeg`, `.png`) from a directory,
/// sorted by file name for deterministic view ordering.
pub fn collect_board_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read image directory {}", dir.display()))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| {
                    let ext = ext.to_ascii_lowercase();
                    ext == "jpg" || ext == "jpeg" || ext == "png"
                })
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Detect the board in every image and accumulate correspondences.
///
/// Images where decoding fails or the full pattern is not visible are
/// skipped with a log message; calibration can proceed as long as enough
/// views remain. Fails when the images disagree on size or no board is found
/// at all.
pub fn build_dataset_from_images(
    paths: &[PathBuf],
    board: &BoardSpec,
    params: &DetectParams,
) -> Result<ImageDataset> {
    let object_points = board.object_points();

    let mut views = Vec::new();
    let mut used_paths = Vec::new();
    let mut skipped = 0usize;
    let mut image_size: Option<[u32; 2]> = None;

    for path in paths {
        let reader = ImageReader::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let img = match reader.decode() {
            Ok(img) => img,
            Err(err) => {
                warn!(path = %path.display(), %err, "skipping undecodable image");
                skipped += 1;
                continue;
            }
        };
        let gray = img.to_luma8();

        let size = [gray.width(), gray.height()];
        match image_size {
            None => image_size = Some(size),
            Some(existing) if existing != size => {
                bail!(
                    "image size mismatch: {} is {}x{}, expected {}x{}",
                    path.display(),
                    size[0],
                    size[1],
                    existing[0],
                    existing[1]
                );
            }
            Some(_) => {}
        }

        match detect_chessboard(&gray, board, params) {
            Some(detection) => {
                let points_2d: Vec<Vec2> = detection
                    .corners
                    .iter()
                    .map(|p| Vec2::new(p.x, p.y))
                    .collect();
                views.push(CorrespondenceView::new(object_points.clone(), points_2d));
                used_paths.push(path.clone());
            }
            None => {
                info!(path = %path.display(), "board not found, skipping view");
                skipped += 1;
            }
        }
    }

    if views.is_empty() {
        bail!("no chessboard corners detected in any input image");
    }
    info!(
        used = views.len(),
        skipped, "board detection finished"
    );

    let dataset = PlanarDataset::new(views)?;
    Ok(ImageDataset {
        dataset,
        image_size: image_size.expect("at least one image was decoded"),
        used_paths,
        skipped,
    })
}
