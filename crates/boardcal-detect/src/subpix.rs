//! Iterative subpixel corner refinement.
//!
//! Refines corner locations with the gradient-orthogonality criterion: for
//! every point `p` in a window around the corner `q`, the image gradient at
//! `p` is orthogonal to `p - q` (gradients vanish in flat areas and are
//! perpendicular to the edges meeting at the corner). Solving the weighted
//! normal equations for `q` and iterating drives the estimate to the saddle
//! point.

use boardcal_core::Pt2;
use image::GrayImage;

/// Iteration and epsilon termination criteria for the refinement loop.
#[derive(Clone, Copy, Debug)]
pub struct TermCriteria {
    pub max_iters: u32,
    pub eps: f64,
}

impl Default for TermCriteria {
    fn default() -> Self {
        Self {
            max_iters: 30,
            eps: 1e-3,
        }
    }
}

#[inline]
fn sample_bilinear(img: &GrayImage, x: f64, y: f64) -> f64 {
    let w = img.width() as i64;
    let h = img.height() as i64;

    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let clamp = |px: i64, py: i64| -> f64 {
        let cx = px.clamp(0, w - 1);
        let cy = py.clamp(0, h - 1);
        img.get_pixel(cx as u32, cy as u32).0[0] as f64
    };

    let x0 = x0 as i64;
    let y0 = y0 as i64;
    let v00 = clamp(x0, y0);
    let v10 = clamp(x0 + 1, y0);
    let v01 = clamp(x0, y0 + 1);
    let v11 = clamp(x0 + 1, y0 + 1);

    v00 * (1.0 - fx) * (1.0 - fy) + v10 * fx * (1.0 - fy) + v01 * (1.0 - fx) * fy + v11 * fx * fy
}

/// Refine corner positions in place.
///
/// `win` is the half-size of the search window (a `(5, 5)` window spans
/// 11x11 samples). Corners whose window would leave the image are left
/// untouched. Each corner iterates until the update falls below
/// `criteria.eps` or `criteria.max_iters` is reached.
pub fn refine_corners_subpix(
    img: &GrayImage,
    corners: &mut [Pt2],
    win: (u32, u32),
    criteria: TermCriteria,
) {
    let (wx, wy) = (win.0 as i32, win.1 as i32);
    let width = img.width() as f64;
    let height = img.height() as f64;

    // Window plus the gradient stencil must stay inside the image.
    let min_x = (wx + 2) as f64;
    let min_y = (wy + 2) as f64;
    let max_x = width - (wx + 3) as f64;
    let max_y = height - (wy + 3) as f64;
    if max_x <= min_x || max_y <= min_y {
        return;
    }

    // Separable Gaussian-like window weights.
    let coeff_x = 1.0 / (win.0.max(1) as f64 * win.0.max(1) as f64);
    let coeff_y = 1.0 / (win.1.max(1) as f64 * win.1.max(1) as f64);

    for corner in corners.iter_mut() {
        if corner.x < min_x || corner.x > max_x || corner.y < min_y || corner.y > max_y {
            continue;
        }

        let seed = *corner;
        let mut q = *corner;

        for _ in 0..criteria.max_iters {
            let mut a = 0.0;
            let mut b = 0.0;
            let mut c = 0.0;
            let mut bb1 = 0.0;
            let mut bb2 = 0.0;

            for dy in -wy..=wy {
                for dx in -wx..=wx {
                    let px = q.x + dx as f64;
                    let py = q.y + dy as f64;

                    let gx = 0.5 * (sample_bilinear(img, px + 1.0, py)
                        - sample_bilinear(img, px - 1.0, py));
                    let gy = 0.5 * (sample_bilinear(img, px, py + 1.0)
                        - sample_bilinear(img, px, py - 1.0));

                    let w = (-(dx * dx) as f64 * coeff_x).exp()
                        * (-(dy * dy) as f64 * coeff_y).exp();

                    let gxx = w * gx * gx;
                    let gxy = w * gx * gy;
                    let gyy = w * gy * gy;

                    a += gxx;
                    b += gxy;
                    c += gyy;
                    bb1 += gxx * px + gxy * py;
                    bb2 += gxy * px + gyy * py;
                }
            }

            let det = a * c - b * b;
            if det.abs() < 1e-12 {
                break;
            }

            let qx = (c * bb1 - b * bb2) / det;
            let qy = (a * bb2 - b * bb1) / det;
            let shift = ((qx - q.x).powi(2) + (qy - q.y).powi(2)).sqrt();

            q = Pt2::new(qx.clamp(min_x, max_x), qy.clamp(min_y, max_y));

            if shift < criteria.eps {
                break;
            }
        }

        // Reject runaway solutions: the corner must stay inside the window.
        let drift = (q - seed).norm();
        if drift <= (wx.max(wy) + 1) as f64 {
            *corner = q;
        }
    }
}
