//! Calibration dataset containers and validation.

use boardcal_core::CorrespondenceView;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by dataset validation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DatasetError {
    #[error("need at least one view for calibration")]
    EmptyViews,
    #[error("view {view} has mismatched 3D/2D points ({points_3d} vs {points_2d})")]
    MismatchedPointCounts {
        view: usize,
        points_3d: usize,
        points_2d: usize,
    },
    #[error("view {view} needs at least 4 points (got {points})")]
    NotEnoughPoints { view: usize, points: usize },
    #[error("intrinsics estimation needs at least 3 views (got {0})")]
    NotEnoughViews(usize),
}

/// A planar calibration dataset: one correspondence view per image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanarDataset {
    pub views: Vec<CorrespondenceView>,
}

impl PlanarDataset {
    pub fn new(views: Vec<CorrespondenceView>) -> Result<Self, DatasetError> {
        let dataset = Self { views };
        dataset.validate()?;
        Ok(dataset)
    }

    pub fn num_views(&self) -> usize {
        self.views.len()
    }

    /// Per-view structural checks (point counts); view-count requirements are
    /// checked by the solvers that need them.
    pub fn validate(&self) -> Result<(), DatasetError> {
        if self.views.is_empty() {
            return Err(DatasetError::EmptyViews);
        }
        for (idx, view) in self.views.iter().enumerate() {
            if view.points_3d.len() != view.points_2d.len() {
                return Err(DatasetError::MismatchedPointCounts {
                    view: idx,
                    points_3d: view.points_3d.len(),
                    points_2d: view.points_2d.len(),
                });
            }
            if view.points_3d.len() < 4 {
                return Err(DatasetError::NotEnoughPoints {
                    view: idx,
                    points: view.points_3d.len(),
                });
            }
        }
        Ok(())
    }
}
