//! Closed-form initialization for planar intrinsic calibration.
//!
//! These solvers provide the linear seed that the non-linear refinement in
//! `boardcal-optim` polishes: plane homographies (normalized DLT), Zhang's
//! closed-form intrinsics, a linear Brown-Conrady distortion fit from
//! homography residuals, and planar pose decomposition.

mod distortion_fit;
mod homography;
mod planar_pose;
mod zhang;

pub use distortion_fit::*;
pub use homography::*;
pub use planar_pose::*;
pub use zhang::*;
