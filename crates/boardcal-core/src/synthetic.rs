//! Synthetic planar scene generation.
//!
//! Deterministic board poses and projections used by tests throughout the
//! workspace. No randomness: poses are a fixed sweep in yaw, lateral offset
//! and depth, which is enough view diversity for Zhang-style initialization.

use nalgebra::{UnitQuaternion, Vector3};

use crate::{CorrespondenceView, Iso3, PinholeCamera, Pt3, Real};

/// Deterministic board poses: view `i` yaws by `yaw0 + i * yaw_step` around
/// Y, shifts laterally by `i * x_step` and sits at depth `z0 + i * z_step`.
pub fn poses_yaw_y_z(n: usize, yaw0: Real, yaw_step: Real, z0: Real, z_step: Real) -> Vec<Iso3> {
    let x_step = 0.02;
    (0..n)
        .map(|i| {
            let angle = yaw0 + yaw_step * i as Real;
            let axis = Vector3::new(0.0, 1.0, 0.0);
            let rotation = UnitQuaternion::from_scaled_axis(axis * angle);
            // small pitch so the homographies are not all related by pure yaw
            let pitch = UnitQuaternion::from_scaled_axis(
                Vector3::new(1.0, 0.0, 0.0) * (0.05 * (i as Real + 1.0)),
            );
            let translation = Vector3::new(x_step * i as Real, -0.01 * i as Real, z0 + z_step * i as Real);
            Iso3::from_parts(translation.into(), pitch * rotation)
        })
        .collect()
}

/// Project board points through all poses, producing one view per pose.
///
/// Returns `None` if any point lands behind the camera.
pub fn project_views_all(
    camera: &PinholeCamera,
    board_points: &[Pt3],
    poses: &[Iso3],
) -> Option<Vec<CorrespondenceView>> {
    let mut views = Vec::with_capacity(poses.len());
    for pose in poses {
        let mut points_2d = Vec::with_capacity(board_points.len());
        for pw in board_points {
            let p_cam = pose.transform_point(pw);
            let proj = camera.project_point(&p_cam)?;
            points_2d.push(proj);
        }
        views.push(CorrespondenceView::new(board_points.to_vec(), points_2d));
    }
    Some(views)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{make_pinhole_camera, BoardSpec, BrownConrady5, FxFyCxCySkew};

    #[test]
    fn synthetic_views_project_all_points() {
        let cam = make_pinhole_camera(
            FxFyCxCySkew {
                fx: 800.0,
                fy: 780.0,
                cx: 640.0,
                cy: 360.0,
                skew: 0.0,
            },
            BrownConrady5::zeros(),
        );
        let board = BoardSpec::new(5, 4, 0.05).unwrap();
        let poses = poses_yaw_y_z(3, 0.0, 0.1, 0.6, 0.1);
        let views = project_views_all(&cam, &board.object_points(), &poses).unwrap();

        assert_eq!(views.len(), 3);
        for view in &views {
            assert_eq!(view.len(), board.corner_count());
        }
    }
}
