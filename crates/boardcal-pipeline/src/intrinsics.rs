//! Intrinsic calibration: linear seed plus non-linear refinement.

use anyhow::{ensure, Context, Result};
use boardcal_core::{
    make_pinhole_camera, pinhole_camera_params, BrownConrady5, CameraParams, CorrespondenceView,
    Iso3, PinholeCamera, Pt2, Real,
};
use boardcal_linear::{
    dlt_homography, estimate_distortion_from_homographies, estimate_intrinsics_from_homographies,
    estimate_planar_pose_from_h, DistortionFitOptions, DistortionView,
};
use boardcal_optim::{
    pack_initial_params, refine_intrinsics, IntrinsicsProblem, LmBackend, RobustKernel,
    SolveOptions,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::{DatasetError, PlanarDataset};

/// Serializable robust kernel selection.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub enum RobustConfig {
    #[default]
    None,
    Huber {
        delta: Real,
    },
    Cauchy {
        c: Real,
    },
}

impl RobustConfig {
    pub fn to_kernel(&self) -> RobustKernel {
        match *self {
            RobustConfig::None => RobustKernel::None,
            RobustConfig::Huber { delta } => RobustKernel::Huber { delta },
            RobustConfig::Cauchy { c } => RobustKernel::Cauchy { c },
        }
    }
}

/// Calibration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Maximum LM iterations (if `None`, use the backend default).
    pub max_iters: Option<usize>,
    /// Robust kernel applied per observed corner.
    #[serde(default)]
    pub robust: RobustConfig,
    /// Fix k3 to zero in the linear distortion seed (the refinement still
    /// optimizes it).
    pub seed_fix_k3: bool,
    /// Fix tangential terms to zero in the linear distortion seed.
    pub seed_fix_tangential: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            max_iters: None,
            robust: RobustConfig::None,
            seed_fix_k3: true,
            seed_fix_tangential: false,
        }
    }
}

impl CalibrationConfig {
    fn solve_options(&self) -> SolveOptions {
        let mut opts = SolveOptions::default();
        if let Some(iters) = self.max_iters {
            opts.max_iters = iters;
        }
        opts
    }

    fn distortion_fit_options(&self) -> DistortionFitOptions {
        DistortionFitOptions {
            fix_k3: self.seed_fix_k3,
            fix_tangential: self.seed_fix_tangential,
            iters: 8,
        }
    }
}

/// Calibration result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrinsicsReport {
    /// Refined camera model.
    pub camera: CameraParams,
    /// Image size in pixels, when calibrated from images.
    pub image_size: Option<[u32; 2]>,
    /// Final optimizer cost (half the squared residual norm).
    pub final_cost: Real,
    pub iterations: usize,
    pub converged: bool,
    /// RMS reprojection error per view, in pixels.
    pub per_view_errors: Vec<Real>,
    /// Mean of the per-view RMS errors.
    pub mean_reproj_error: Real,
    pub views_used: usize,
}

fn board_and_pixel_points(view: &CorrespondenceView) -> (Vec<Pt2>, Vec<Pt2>) {
    let board_2d: Vec<Pt2> = view.points_3d.iter().map(|p| Pt2::new(p.x, p.y)).collect();
    let pixel_2d: Vec<Pt2> = view.points_2d.iter().map(|v| Pt2::new(v.x, v.y)).collect();
    (board_2d, pixel_2d)
}

fn homographies_from_views(
    views: &[CorrespondenceView],
) -> Result<Vec<boardcal_core::Mat3>> {
    let mut homographies = Vec::with_capacity(views.len());
    for (idx, view) in views.iter().enumerate() {
        let (board_2d, pixel_2d) = board_and_pixel_points(view);
        let h = dlt_homography(&board_2d, &pixel_2d).with_context(|| {
            format!(
                "failed to compute homography for view {} (need >=4 well-conditioned points)",
                idx
            )
        })?;
        homographies.push(h);
    }
    Ok(homographies)
}

/// Linear initialization: Zhang intrinsics, a distortion seed from homography
/// residuals, and per-view poses.
pub fn intrinsics_seed_from_views(
    views: &[CorrespondenceView],
    config: &CalibrationConfig,
) -> Result<(PinholeCamera, Vec<Iso3>)> {
    ensure!(
        views.len() >= 3,
        DatasetError::NotEnoughViews(views.len())
    );

    let homographies = homographies_from_views(views)?;

    let mut intrinsics = estimate_intrinsics_from_homographies(&homographies)
        .context("closed-form intrinsics initialization failed")?;
    // The refinement parameterization assumes zero skew.
    intrinsics.skew = 0.0;

    // Distortion seed from homography residuals; fall back to zeros when the
    // geometry does not constrain it.
    let kmtx = intrinsics.k_matrix();
    let dist_views: Vec<DistortionView> = views
        .iter()
        .zip(homographies.iter())
        .map(|(view, h)| {
            let (board_2d, pixel_2d) = board_and_pixel_points(view);
            DistortionView::new(*h, board_2d, pixel_2d)
        })
        .collect::<Result<_, _>>()
        .context("building distortion views failed")?;

    let distortion = match estimate_distortion_from_homographies(
        &kmtx,
        &dist_views,
        config.distortion_fit_options(),
    ) {
        Ok(d) => d,
        Err(err) => {
            debug!(%err, "distortion seed failed, starting from zero distortion");
            BrownConrady5::zeros()
        }
    };

    let poses = homographies
        .iter()
        .enumerate()
        .map(|(idx, h)| {
            estimate_planar_pose_from_h(&kmtx, h)
                .with_context(|| format!("failed to recover pose for view {}", idx))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((make_pinhole_camera(intrinsics, distortion), poses))
}

/// RMS reprojection error of one view, in pixels.
fn view_rms_error(camera: &PinholeCamera, pose: &Iso3, view: &CorrespondenceView) -> Real {
    let mut sum_sq = 0.0;
    let mut count = 0usize;
    for (pw, uv) in view.points_3d.iter().zip(view.points_2d.iter()) {
        let p_cam = pose.transform_point(pw);
        if let Some(proj) = camera.project_point(&p_cam) {
            sum_sq += (proj - uv).norm_squared();
            count += 1;
        }
    }
    if count == 0 {
        return Real::INFINITY;
    }
    (sum_sq / count as Real).sqrt()
}

/// Calibrate camera intrinsics and distortion from a planar dataset.
pub fn calibrate_intrinsics(
    dataset: &PlanarDataset,
    config: &CalibrationConfig,
) -> Result<IntrinsicsReport> {
    dataset.validate()?;
    ensure!(
        dataset.num_views() >= 3,
        DatasetError::NotEnoughViews(dataset.num_views())
    );

    let (camera0, poses0) = intrinsics_seed_from_views(&dataset.views, config)?;

    let problem =
        IntrinsicsProblem::new(dataset.views.clone())?.with_kernel(config.robust.to_kernel());
    let x0 = pack_initial_params(&camera0, &poses0);

    let backend = LmBackend;
    let (camera, poses, report) =
        refine_intrinsics(&backend, &problem, x0, &config.solve_options())?;

    let per_view_errors: Vec<Real> = dataset
        .views
        .iter()
        .zip(poses.iter())
        .map(|(view, pose)| view_rms_error(&camera, pose, view))
        .collect();
    let mean_reproj_error =
        per_view_errors.iter().sum::<Real>() / per_view_errors.len() as Real;

    debug!(
        final_cost = report.final_cost,
        mean_reproj_error, "intrinsics refinement finished"
    );

    Ok(IntrinsicsReport {
        camera: pinhole_camera_params(&camera),
        image_size: None,
        final_cost: report.final_cost,
        iterations: report.iterations,
        converged: report.converged,
        per_view_errors,
        mean_reproj_error,
        views_used: dataset.num_views(),
    })
}
