//! Chessboard corner detection for calibration images.
//!
//! This crate exposes three building blocks:
//!
//! - [`response`] – dense corner response computation on 8-bit grayscale
//!   images, based on a 16-sample ring that fires on chessboard X-junctions.
//! - [`corners`] – thresholding, non-maximum suppression (NMS), and
//!   center-of-mass seeding on a response map, plus iterative subpixel
//!   refinement ([`subpix`]).
//! - [`grid`] – recovery of the full board structure: the unordered corner
//!   cloud is ordered into a row-major `cols x rows` lattice or rejected.
//!
//! The top-level entry point is [`detect_chessboard`], which runs the whole
//! chain on an `image::GrayImage` and either returns every inner corner of
//! the pattern, ordered row-major, or `None` when the board is not fully
//! visible.

pub mod corners;
pub mod grid;
pub mod response;
pub mod subpix;

pub use corners::{find_corner_candidates, Corner};
pub use grid::{detect_chessboard, ChessboardDetection};
pub use response::{corner_response_image, ResponseMap};
pub use subpix::{refine_corners_subpix, TermCriteria};

/// Tunable parameters for the corner response computation and detection.
#[derive(Clone, Debug)]
pub struct DetectParams {
    /// Relative threshold as a fraction of the maximum response.
    pub threshold_rel: f32,
    /// Absolute threshold override; if `Some`, used instead of `threshold_rel`.
    pub threshold_abs: Option<f32>,
    /// Non-maximum suppression radius (in pixels).
    pub nms_radius: u32,
    /// Minimum count of positive-response neighbors in the NMS window
    /// to accept a corner (rejects isolated noise).
    pub min_cluster_size: u32,
    /// Snap tolerance for lattice assignment, as a fraction of the local
    /// predicted corner spacing.
    pub snap_tol_rel: f64,
    /// Subpixel refinement window half-size.
    pub subpix_win: (u32, u32),
    /// Subpixel refinement termination criteria.
    pub subpix_criteria: TermCriteria,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            threshold_rel: 0.1,
            threshold_abs: None,
            nms_radius: 4,
            min_cluster_size: 2,
            snap_tol_rel: 0.35,
            subpix_win: (11, 11),
            subpix_criteria: TermCriteria::default(),
        }
    }
}
