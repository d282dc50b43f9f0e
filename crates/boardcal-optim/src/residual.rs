//! Generic reprojection residual evaluation.
//!
//! The residual is written over a generic `RealField` scalar so the same code
//! path serves both plain `f64` evaluation and forward-mode autodiff with
//! `num-dual` dual numbers.

use boardcal_core::CorrespondenceView;
use nalgebra::{DVector, RealField, UnitQuaternion, Vector3};

/// Apply Brown-Conrady distortion to normalized coordinates (generic for autodiff).
fn distort_brown_conrady_generic<T: RealField>(
    x: T,
    y: T,
    k1: T,
    k2: T,
    k3: T,
    p1: T,
    p2: T,
) -> (T, T) {
    let r2 = x.clone() * x.clone() + y.clone() * y.clone();
    let r4 = r2.clone() * r2.clone();
    let r6 = r4.clone() * r2.clone();

    let radial = T::one() + k1 * r2.clone() + k2 * r4 + k3 * r6;

    let two = T::one() + T::one();
    let x2 = x.clone() * x.clone();
    let y2 = y.clone() * y.clone();
    let xy = x.clone() * y.clone();

    let x_tan =
        two.clone() * p1.clone() * xy.clone() + p2.clone() * (r2.clone() + two.clone() * x2);
    let y_tan = p1 * (r2 + two.clone() * y2) + two * p2 * xy;

    (x.clone() * radial.clone() + x_tan, y * radial + y_tan)
}

/// Unweighted reprojection residuals for one view.
///
/// # Parameters
/// - `shared`: `[fx, fy, cx, cy, k1, k2, p1, p2, k3]` (skew fixed at zero)
/// - `pose`: `[rx, ry, rz, tx, ty, tz]` axis-angle rotation plus translation
///
/// Residuals are ordered `[u0, v0, u1, v1, ...]` with `r = measured - projected`.
pub(crate) fn residuals_view_generic<T: RealField>(
    shared: &[T],
    pose: &[T],
    view: &CorrespondenceView,
) -> DVector<T> {
    debug_assert!(shared.len() >= 9, "shared block must have 9 params");
    debug_assert!(pose.len() == 6, "pose must have 6 params");

    let fx = shared[0].clone();
    let fy = shared[1].clone();
    let cx = shared[2].clone();
    let cy = shared[3].clone();

    let k1 = shared[4].clone();
    let k2 = shared[5].clone();
    let p1 = shared[6].clone();
    let p2 = shared[7].clone();
    let k3 = shared[8].clone();

    let axis_angle = Vector3::new(pose[0].clone(), pose[1].clone(), pose[2].clone());
    let rot = UnitQuaternion::from_scaled_axis(axis_angle);
    let t = Vector3::new(pose[3].clone(), pose[4].clone(), pose[5].clone());

    let eps = T::from_f64(1e-12).unwrap();
    let mut r = DVector::<T>::zeros(2 * view.points_3d.len());

    for (j, (pw, uv)) in view.points_3d.iter().zip(view.points_2d.iter()).enumerate() {
        let pw_t = Vector3::new(
            T::from_f64(pw.x).unwrap(),
            T::from_f64(pw.y).unwrap(),
            T::from_f64(pw.z).unwrap(),
        );
        let pc = rot.transform_vector(&pw_t) + t.clone();

        // Project to normalized coordinates with a depth guard
        let z_safe = if pc.z.clone() > eps.clone() {
            pc.z.clone()
        } else {
            eps.clone()
        };
        let x_norm = pc.x.clone() / z_safe.clone();
        let y_norm = pc.y.clone() / z_safe;

        let (x_dist, y_dist) = distort_brown_conrady_generic(
            x_norm,
            y_norm,
            k1.clone(),
            k2.clone(),
            k3.clone(),
            p1.clone(),
            p2.clone(),
        );

        let u_proj = fx.clone() * x_dist + cx.clone();
        let v_proj = fy.clone() * y_dist + cy.clone();

        let u_meas = T::from_f64(uv.x).unwrap();
        let v_meas = T::from_f64(uv.y).unwrap();

        r[2 * j] = u_meas - u_proj;
        r[2 * j + 1] = v_meas - v_proj;
    }

    r
}
