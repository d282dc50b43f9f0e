//! Non-linear refinement for planar intrinsic calibration.
//!
//! This crate bundles the generic non-linear least squares plumbing (problem
//! and backend traits, a Levenberg-Marquardt backend, robust IRLS kernels)
//! with the concrete intrinsics refinement problem: shared intrinsics and
//! Brown-Conrady distortion plus a 6-DoF pose per view, with Jacobians from
//! per-view forward-mode autodiff.

mod backend_lm;
mod jacobian;
mod problem;
mod residual;
mod robust;
mod traits;

pub use backend_lm::LmBackend;
pub use problem::{
    pack_initial_params, refine_intrinsics, IntrinsicsProblem, INTRINSICS_DIM, POSE_DIM,
};
pub use robust::RobustKernel;
pub use traits::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
