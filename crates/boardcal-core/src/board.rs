//! Chessboard calibration target geometry.
//!
//! A chessboard target is described by its inner-corner grid (the corners
//! where four squares meet) and the physical side length of a square. The
//! object-point grid is laid out row-major, matching the corner ordering
//! produced by the detector: index `j * cols + i` maps to the board point
//! `(i * square_size, j * square_size, 0)`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Pt2, Pt3, Real};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BoardSpecError {
    #[error("pattern needs at least 2x2 inner corners, got {0}x{1}")]
    PatternTooSmall(u32, u32),
    #[error("square size must be positive")]
    NonPositiveSquareSize,
}

/// Planar chessboard target: inner-corner counts and square side length.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct BoardSpec {
    /// Inner corners along the board X direction.
    pub cols: u32,
    /// Inner corners along the board Y direction.
    pub rows: u32,
    /// Physical square side length (any unit; the calibration result is
    /// expressed in the same unit).
    pub square_size: Real,
}

impl BoardSpec {
    pub fn new(cols: u32, rows: u32, square_size: Real) -> Result<Self, BoardSpecError> {
        if cols < 2 || rows < 2 {
            return Err(BoardSpecError::PatternTooSmall(cols, rows));
        }
        if square_size <= 0.0 {
            return Err(BoardSpecError::NonPositiveSquareSize);
        }
        Ok(Self {
            cols,
            rows,
            square_size,
        })
    }

    /// Total number of inner corners.
    pub fn corner_count(&self) -> usize {
        (self.cols * self.rows) as usize
    }

    /// 3D object points on the board plane (Z = 0), row-major.
    pub fn object_points(&self) -> Vec<Pt3> {
        let mut points = Vec::with_capacity(self.corner_count());
        for j in 0..self.rows {
            for i in 0..self.cols {
                points.push(Pt3::new(
                    i as Real * self.square_size,
                    j as Real * self.square_size,
                    0.0,
                ));
            }
        }
        points
    }

    /// 2D board-plane points (the object points with Z dropped), row-major.
    pub fn board_points_2d(&self) -> Vec<Pt2> {
        self.object_points()
            .iter()
            .map(|p| Pt2::new(p.x, p.y))
            .collect()
    }
}
