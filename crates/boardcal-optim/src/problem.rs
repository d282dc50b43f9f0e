//! The planar intrinsics refinement problem.
//!
//! Parameter vector layout:
//! `[fx, fy, cx, cy, k1, k2, p1, p2, k3]` shared across views (skew is fixed
//! at zero), followed by `[rx, ry, rz, tx, ty, tz]` per view (axis-angle
//! rotation + translation of the board in the camera frame).

use crate::jacobian::jacobian_unweighted_ad;
use crate::residual::residuals_view_generic;
use crate::robust::RobustKernel;
use crate::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
use anyhow::{ensure, Result};
use boardcal_core::{
    make_pinhole_camera, BrownConrady5, CorrespondenceView, FxFyCxCySkew, Iso3, PinholeCamera,
    Real,
};
use nalgebra::{DMatrix, DVector, UnitQuaternion, Vector3};

/// Shared parameters: 4 intrinsics + 5 distortion coefficients.
pub const INTRINSICS_DIM: usize = 9;
/// Per-view pose parameters: axis-angle + translation.
pub const POSE_DIM: usize = 6;
pub(crate) const LOCAL_DIM: usize = INTRINSICS_DIM + POSE_DIM;

/// Non-linear refinement problem for planar intrinsics (and per-view poses).
#[derive(Debug, Clone)]
pub struct IntrinsicsProblem {
    pub views: Vec<CorrespondenceView>,
    kernel: RobustKernel,
}

impl IntrinsicsProblem {
    pub fn new(views: Vec<CorrespondenceView>) -> Result<Self> {
        ensure!(!views.is_empty(), "need at least one view for calibration");
        for (i, v) in views.iter().enumerate() {
            ensure!(
                v.points_3d.len() == v.points_2d.len(),
                "view {} has mismatched 3D/2D point counts ({} vs {})",
                i,
                v.points_3d.len(),
                v.points_2d.len()
            );
            ensure!(v.len() >= 4, "view {} has too few points (need >=4)", i);
        }
        Ok(Self {
            views,
            kernel: RobustKernel::None,
        })
    }

    pub fn with_kernel(mut self, kernel: RobustKernel) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn num_views(&self) -> usize {
        self.views.len()
    }

    pub fn param_dim(&self) -> usize {
        INTRINSICS_DIM + POSE_DIM * self.num_views()
    }

    pub fn residual_dim(&self) -> usize {
        self.views.iter().map(|v| 2 * v.len()).sum()
    }
}

/// Pack initial intrinsics, distortion and poses into a parameter vector.
pub fn pack_initial_params(camera: &PinholeCamera, poses_board_to_cam: &[Iso3]) -> DVector<Real> {
    assert!(!poses_board_to_cam.is_empty(), "need at least one pose");
    let n_views = poses_board_to_cam.len();
    let dim = INTRINSICS_DIM + POSE_DIM * n_views;
    let mut x = DVector::zeros(dim);

    x[0] = camera.k.fx;
    x[1] = camera.k.fy;
    x[2] = camera.k.cx;
    x[3] = camera.k.cy;

    x[4] = camera.dist.k1;
    x[5] = camera.dist.k2;
    x[6] = camera.dist.p1;
    x[7] = camera.dist.p2;
    x[8] = camera.dist.k3;

    for (i, pose) in poses_board_to_cam.iter().enumerate() {
        let idx = INTRINSICS_DIM + POSE_DIM * i;

        let axis_angle = pose.rotation.scaled_axis();
        x[idx] = axis_angle.x;
        x[idx + 1] = axis_angle.y;
        x[idx + 2] = axis_angle.z;

        let t = pose.translation.vector;
        x[idx + 3] = t.x;
        x[idx + 4] = t.y;
        x[idx + 5] = t.z;
    }

    x
}

/// Decode a parameter vector into camera + per-view poses.
fn decode_params(prob: &IntrinsicsProblem, x: &DVector<Real>) -> (PinholeCamera, Vec<Iso3>) {
    let n_views = prob.num_views();
    assert_eq!(x.len(), INTRINSICS_DIM + POSE_DIM * n_views);

    let intrinsics = FxFyCxCySkew {
        fx: x[0],
        fy: x[1],
        cx: x[2],
        cy: x[3],
        skew: 0.0,
    };
    let distortion = BrownConrady5 {
        k1: x[4],
        k2: x[5],
        p1: x[6],
        p2: x[7],
        k3: x[8],
        iters: 8,
    };

    let camera = make_pinhole_camera(intrinsics, distortion);

    let mut poses = Vec::with_capacity(n_views);
    for i in 0..n_views {
        let idx = INTRINSICS_DIM + POSE_DIM * i;
        let axis_angle = Vector3::new(x[idx], x[idx + 1], x[idx + 2]);
        let rq = UnitQuaternion::from_scaled_axis(axis_angle);
        let trans = Vector3::new(x[idx + 3], x[idx + 4], x[idx + 5]);
        poses.push(Iso3::from_parts(trans.into(), rq));
    }

    (camera, poses)
}

impl NllsProblem for IntrinsicsProblem {
    fn num_params(&self) -> usize {
        self.param_dim()
    }

    fn num_residuals(&self) -> usize {
        self.residual_dim()
    }

    fn residuals_unweighted(&self, x: &DVector<Real>) -> DVector<Real> {
        let mut r = DVector::zeros(self.residual_dim());
        let shared = &x.as_slice()[..INTRINSICS_DIM];

        let mut offset = 0;
        for (view_idx, view) in self.views.iter().enumerate() {
            let pose_start = INTRINSICS_DIM + POSE_DIM * view_idx;
            let pose = &x.as_slice()[pose_start..pose_start + POSE_DIM];
            let r_view = residuals_view_generic::<Real>(shared, pose, view);
            r.rows_mut(offset, r_view.len()).copy_from(&r_view);
            offset += r_view.len();
        }

        r
    }

    fn jacobian_unweighted(&self, x: &DVector<Real>) -> DMatrix<Real> {
        jacobian_unweighted_ad(self, x)
    }

    fn robust_row_scales(&self, r_unweighted: &DVector<Real>) -> DVector<Real> {
        let mut scales = DVector::from_element(r_unweighted.len(), 1.0);
        if matches!(self.kernel, RobustKernel::None) {
            return scales;
        }

        // One weight per (u, v) residual pair
        for pair in 0..r_unweighted.len() / 2 {
            let ru = r_unweighted[2 * pair];
            let rv = r_unweighted[2 * pair + 1];
            let r2 = ru * ru + rv * rv;
            let (_, w) = self.kernel.rho_and_weight(r2);
            let s = w.sqrt();
            scales[2 * pair] = s;
            scales[2 * pair + 1] = s;
        }
        scales
    }
}

/// High-level API: refine camera intrinsics & per-view poses.
///
/// Returns (refined_camera, refined_poses, report).
pub fn refine_intrinsics<B: NllsSolverBackend>(
    backend: &B,
    problem: &IntrinsicsProblem,
    initial_params: DVector<Real>,
    opts: &SolveOptions,
) -> Result<(PinholeCamera, Vec<Iso3>, SolveReport)> {
    ensure!(
        initial_params.len() == problem.param_dim(),
        "initial parameter vector has wrong dimension ({} vs {})",
        initial_params.len(),
        problem.param_dim()
    );

    let (x_opt, report) = backend.solve(problem, initial_params, opts);
    let (camera, poses) = decode_params(problem, &x_opt);
    Ok((camera, poses, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend_lm::LmBackend;
    use boardcal_core::{synthetic, BoardSpec};

    fn ground_truth_camera() -> PinholeCamera {
        make_pinhole_camera(
            FxFyCxCySkew {
                fx: 800.0,
                fy: 780.0,
                cx: 640.0,
                cy: 360.0,
                skew: 0.0,
            },
            BrownConrady5 {
                k1: -0.1,
                k2: 0.01,
                k3: 0.0,
                p1: 0.001,
                p2: -0.001,
                iters: 8,
            },
        )
    }

    #[test]
    fn synthetic_refinement_recovers_camera() {
        let cam_gt = ground_truth_camera();
        let board = BoardSpec::new(6, 4, 0.03).unwrap();
        let poses_gt = synthetic::poses_yaw_y_z(3, 0.0, 0.1, 0.5, 0.2);
        let views =
            synthetic::project_views_all(&cam_gt, &board.object_points(), &poses_gt).unwrap();

        let problem = IntrinsicsProblem::new(views).unwrap();

        // Initial guess: slightly wrong intrinsics, no distortion, poses = GT.
        let cam_init = make_pinhole_camera(
            FxFyCxCySkew {
                fx: 780.0,
                fy: 760.0,
                cx: 630.0,
                cy: 350.0,
                skew: 0.0,
            },
            BrownConrady5::zeros(),
        );

        let x0 = pack_initial_params(&cam_init, &poses_gt);
        let backend = LmBackend;
        let opts = SolveOptions::default();

        let (cam_refined, poses_refined, report) =
            refine_intrinsics(&backend, &problem, x0, &opts).unwrap();

        assert!((cam_refined.k.fx - cam_gt.k.fx).abs() < 5.0);
        assert!((cam_refined.k.fy - cam_gt.k.fy).abs() < 5.0);
        assert!((cam_refined.k.cx - cam_gt.k.cx).abs() < 5.0);
        assert!((cam_refined.k.cy - cam_gt.k.cy).abs() < 5.0);

        assert!(report.converged, "LM did not converge: {:?}", report);
        assert!(report.final_cost < 1e-6, "final cost: {}", report.final_cost);
        assert_eq!(poses_refined.len(), poses_gt.len());
    }

    #[test]
    fn ad_jacobian_matches_finite_differences() {
        let cam_gt = ground_truth_camera();
        let board = BoardSpec::new(4, 3, 0.05).unwrap();
        let poses = synthetic::poses_yaw_y_z(2, 0.05, 0.1, 0.6, 0.1);
        let views =
            synthetic::project_views_all(&cam_gt, &board.object_points(), &poses).unwrap();

        let problem = IntrinsicsProblem::new(views).unwrap();
        let x = pack_initial_params(&cam_gt, &poses);

        let j_ad = problem.jacobian_unweighted(&x);

        // Central differences as the reference
        let m = problem.residual_dim();
        let n = x.len();
        let mut j_fd = DMatrix::zeros(m, n);
        let eps = 1e-6;
        for k in 0..n {
            let mut x_plus = x.clone();
            let mut x_minus = x.clone();
            x_plus[k] += eps;
            x_minus[k] -= eps;
            let diff = (problem.residuals_unweighted(&x_plus)
                - problem.residuals_unweighted(&x_minus))
                / (2.0 * eps);
            j_fd.set_column(k, &diff);
        }

        let max_err = (j_ad - j_fd).abs().max();
        assert!(max_err < 1e-4, "AD vs FD Jacobian mismatch: {}", max_err);
    }

    #[test]
    fn mismatched_view_is_rejected() {
        let views = vec![CorrespondenceView::new(
            vec![boardcal_core::Pt3::new(0.0, 0.0, 0.0); 5],
            vec![boardcal_core::Vec2::new(0.0, 0.0); 4],
        )];
        assert!(IntrinsicsProblem::new(views).is_err());
    }
}
