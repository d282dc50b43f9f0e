//! Observed correspondences for a single view of the calibration target.

use serde::{Deserialize, Serialize};

use crate::{Pt3, Vec2};

/// 3D-to-2D point correspondences observed in one image.
///
/// `points_3d` are target coordinates (Z = 0 for planar boards) and
/// `points_2d` the matching pixel observations, index-aligned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrespondenceView {
    pub points_3d: Vec<Pt3>,
    pub points_2d: Vec<Vec2>,
}

impl CorrespondenceView {
    pub fn new(points_3d: Vec<Pt3>, points_2d: Vec<Vec2>) -> Self {
        Self {
            points_3d,
            points_2d,
        }
    }

    pub fn len(&self) -> usize {
        self.points_3d.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points_3d.is_empty()
    }
}
