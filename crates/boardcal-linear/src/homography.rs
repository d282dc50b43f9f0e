//! Homography estimation (plane-induced projective transform).
//!
//! Implements the normalized Direct Linear Transform (DLT). The homography
//! `H` maps **board points** on a plane to **image points** in pixels:
//! `x' ~ H x`. Hartley-style point normalization is applied internally for
//! numerical stability and the output is de-normalized.

use boardcal_core::{normalize_points_2d, Mat3, Pt2};
use nalgebra::DMatrix;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy)]
pub enum HomographyError {
    #[error("need at least 4 point correspondences, got {0}")]
    NotEnoughPoints(usize),
    #[error("degenerate point configuration")]
    DegenerateConfiguration,
    #[error("svd failed")]
    SvdFailed,
}

/// Estimate H such that x' ~ H x using the normalized DLT.
///
/// The returned homography is scaled so that `H[2,2] == 1` when possible.
pub fn dlt_homography(world: &[Pt2], image: &[Pt2]) -> Result<Mat3, HomographyError> {
    let n = world.len();
    if n < 4 || image.len() != n {
        return Err(HomographyError::NotEnoughPoints(n));
    }

    let (world_n, t_w) =
        normalize_points_2d(world).ok_or(HomographyError::DegenerateConfiguration)?;
    let (image_n, t_i) =
        normalize_points_2d(image).ok_or(HomographyError::DegenerateConfiguration)?;

    let mut a = DMatrix::<f64>::zeros(2 * n, 9);

    for (i, (pw, pi)) in world_n.iter().zip(image_n.iter()).enumerate() {
        let x = pw.x;
        let y = pw.y;
        let u = pi.x;
        let v = pi.y;

        let r0 = 2 * i;
        let r1 = 2 * i + 1;

        a[(r0, 0)] = -x;
        a[(r0, 1)] = -y;
        a[(r0, 2)] = -1.0;
        a[(r0, 6)] = u * x;
        a[(r0, 7)] = u * y;
        a[(r0, 8)] = u;

        a[(r1, 3)] = -x;
        a[(r1, 4)] = -y;
        a[(r1, 5)] = -1.0;
        a[(r1, 6)] = v * x;
        a[(r1, 7)] = v * y;
        a[(r1, 8)] = v;
    }

    // Pad to at least 9 rows so V^T carries the full null space.
    let mut a_work = a;
    if a_work.nrows() < a_work.ncols() {
        let rows = a_work.nrows();
        let cols = a_work.ncols();
        let mut a_pad = DMatrix::<f64>::zeros(cols, cols);
        a_pad.view_mut((0, 0), (rows, cols)).copy_from(&a_work);
        a_work = a_pad;
    }

    // Solve A h = 0 via SVD: take the singular vector for the smallest singular value.
    let svd = a_work.svd(true, true);
    let v_t = svd.v_t.ok_or(HomographyError::SvdFailed)?;
    let h_vec = v_t.row(v_t.nrows() - 1);

    let mut h_mat = Mat3::zeros();
    for r in 0..3 {
        for c in 0..3 {
            h_mat[(r, c)] = h_vec[3 * r + c];
        }
    }

    let t_i_inv = t_i.try_inverse().ok_or(HomographyError::SvdFailed)?;
    h_mat = t_i_inv * h_mat * t_w;

    // normalise such that H[2,2] = 1
    let scale = h_mat[(2, 2)];
    if scale.abs() > f64::EPSILON {
        h_mat /= scale;
    }

    Ok(h_mat)
}

/// High-level entry point for homography estimation.
///
/// Thin wrapper around [`dlt_homography`], provided for API consistency with
/// the other solvers in this crate.
#[derive(Debug, Clone, Copy)]
pub struct HomographySolver;

impl HomographySolver {
    pub fn dlt(world: &[Pt2], image: &[Pt2]) -> Result<Mat3, HomographyError> {
        dlt_homography(world, image)
    }
}
