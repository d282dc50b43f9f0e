//! Image undistortion: new camera matrix, per-pixel maps, bilinear remap.
//!
//! The correction maps follow the usual convention
//! `undistorted(x, y) = distorted(map_x(x, y), map_y(x, y))`: for every
//! destination pixel, go to normalized coordinates through the new camera
//! matrix, apply forward distortion, and project back through the original
//! intrinsics.

use boardcal_core::{
    DistortionModel, FxFyCxCySkew, IntrinsicsModel, PinholeCamera, Real, Vec2,
};
use image::RgbImage;

/// Per-pixel source coordinates for undistortion, row-major.
#[derive(Clone, Debug)]
pub struct UndistortMaps {
    pub width: u32,
    pub height: u32,
    pub map_x: Vec<f32>,
    pub map_y: Vec<f32>,
}

impl UndistortMaps {
    /// Build the correction maps for the given camera and output intrinsics.
    pub fn build(camera: &PinholeCamera, new_k: &FxFyCxCySkew<Real>, size: (u32, u32)) -> Self {
        let (width, height) = size;
        let mut map_x = Vec::with_capacity((width * height) as usize);
        let mut map_y = Vec::with_capacity((width * height) as usize);

        for y in 0..height {
            for x in 0..width {
                let ideal = Vec2::new(x as Real, y as Real);
                let n = new_k.from_pixel(&ideal);
                let d = camera.dist.distort(&n);
                let src = camera.k.to_pixel(&d);
                map_x.push(src.x as f32);
                map_y.push(src.y as f32);
            }
        }

        Self {
            width,
            height,
            map_x,
            map_y,
        }
    }
}

/// Undistorted normalized bounding rectangles of the image border.
///
/// `outer` bounds every undistorted border point; `inner` is the largest
/// axis-aligned rectangle guaranteed to be covered by source pixels.
fn border_rectangles(
    camera: &PinholeCamera,
    size: (u32, u32),
) -> ((Real, Real, Real, Real), (Real, Real, Real, Real)) {
    const N: usize = 9;
    let (width, height) = (size.0 as Real, size.1 as Real);

    let mut x_min = Real::INFINITY;
    let mut x_max = Real::NEG_INFINITY;
    let mut y_min = Real::INFINITY;
    let mut y_max = Real::NEG_INFINITY;

    let mut left_max = Real::NEG_INFINITY;
    let mut right_min = Real::INFINITY;
    let mut top_max = Real::NEG_INFINITY;
    let mut bottom_min = Real::INFINITY;

    for j in 0..N {
        for i in 0..N {
            // only border samples constrain the rectangles
            if i != 0 && i != N - 1 && j != 0 && j != N - 1 {
                continue;
            }
            let px = (width - 1.0) * i as Real / (N - 1) as Real;
            let py = (height - 1.0) * j as Real / (N - 1) as Real;

            let n_dist = camera.k.from_pixel(&Vec2::new(px, py));
            let n = camera.dist.undistort(&n_dist);

            x_min = x_min.min(n.x);
            x_max = x_max.max(n.x);
            y_min = y_min.min(n.y);
            y_max = y_max.max(n.y);

            if i == 0 {
                left_max = left_max.max(n.x);
            }
            if i == N - 1 {
                right_min = right_min.min(n.x);
            }
            if j == 0 {
                top_max = top_max.max(n.y);
            }
            if j == N - 1 {
                bottom_min = bottom_min.min(n.y);
            }
        }
    }

    let outer = (x_min, y_min, x_max - x_min, y_max - y_min);
    let inner = (
        left_max,
        top_max,
        right_min - left_max,
        bottom_min - top_max,
    );
    (outer, inner)
}

fn intrinsics_for_rect(rect: (Real, Real, Real, Real), size: (u32, u32)) -> FxFyCxCySkew<Real> {
    let (x0, y0, w, h) = rect;
    let fx = (size.0 as Real - 1.0) / w;
    let fy = (size.1 as Real - 1.0) / h;
    FxFyCxCySkew {
        fx,
        fy,
        cx: -fx * x0,
        cy: -fy * y0,
        skew: 0.0,
    }
}

/// Estimate output intrinsics for undistortion with a free-scaling parameter.
///
/// `alpha = 0` zooms in so every output pixel is covered by valid source
/// pixels; `alpha = 1` zooms out so every source pixel is retained (black
/// fill appears near the border for barrel distortion). Values in between
/// interpolate.
pub fn optimal_new_intrinsics(
    camera: &PinholeCamera,
    size: (u32, u32),
    alpha: Real,
) -> FxFyCxCySkew<Real> {
    let (outer, inner) = border_rectangles(camera, size);

    let k_inner = intrinsics_for_rect(inner, size);
    let k_outer = intrinsics_for_rect(outer, size);

    let alpha = alpha.clamp(0.0, 1.0);
    FxFyCxCySkew {
        fx: k_inner.fx * (1.0 - alpha) + k_outer.fx * alpha,
        fy: k_inner.fy * (1.0 - alpha) + k_outer.fy * alpha,
        cx: k_inner.cx * (1.0 - alpha) + k_outer.cx * alpha,
        cy: k_inner.cy * (1.0 - alpha) + k_outer.cy * alpha,
        skew: 0.0,
    }
}

/// Resample an image through the correction maps with bilinear interpolation.
///
/// Samples that fall outside the source image are filled black.
pub fn remap_bilinear(src: &RgbImage, maps: &UndistortMaps) -> RgbImage {
    let (sw, sh) = (src.width() as i64, src.height() as i64);
    let mut out = RgbImage::new(maps.width, maps.height);

    for y in 0..maps.height {
        for x in 0..maps.width {
            let idx = (y * maps.width + x) as usize;
            let sx = maps.map_x[idx] as f64;
            let sy = maps.map_y[idx] as f64;

            let x0 = sx.floor();
            let y0 = sy.floor();
            if x0 < 0.0 || y0 < 0.0 || x0 as i64 + 1 >= sw || y0 as i64 + 1 >= sh {
                continue; // leave black
            }
            let fx = sx - x0;
            let fy = sy - y0;
            let (x0, y0) = (x0 as u32, y0 as u32);

            let p00 = src.get_pixel(x0, y0).0;
            let p10 = src.get_pixel(x0 + 1, y0).0;
            let p01 = src.get_pixel(x0, y0 + 1).0;
            let p11 = src.get_pixel(x0 + 1, y0 + 1).0;

            let mut rgb = [0u8; 3];
            for c in 0..3 {
                let v = p00[c] as f64 * (1.0 - fx) * (1.0 - fy)
                    + p10[c] as f64 * fx * (1.0 - fy)
                    + p01[c] as f64 * (1.0 - fx) * fy
                    + p11[c] as f64 * fx * fy;
                rgb[c] = v.round() as u8;
            }
            out.put_pixel(x, y, image::Rgb(rgb));
        }
    }

    out
}

/// Undistort an image with the calibrated camera model.
///
/// The output keeps the input size; `alpha` is the free-scaling parameter of
/// [`optimal_new_intrinsics`].
pub fn undistort_image(src: &RgbImage, camera: &PinholeCamera, alpha: Real) -> RgbImage {
    let size = (src.width(), src.height());
    let new_k = optimal_new_intrinsics(camera, size, alpha);
    let maps = UndistortMaps::build(camera, &new_k, size);
    remap_bilinear(src, &maps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardcal_core::{make_pinhole_camera, BrownConrady5};

    fn barrel_camera() -> PinholeCamera {
        make_pinhole_camera(
            FxFyCxCySkew {
                fx: 500.0,
                fy: 500.0,
                cx: 320.0,
                cy: 240.0,
                skew: 0.0,
            },
            BrownConrady5 {
                k1: -0.2,
                k2: 0.03,
                k3: 0.0,
                p1: 0.0,
                p2: 0.0,
                iters: 12,
            },
        )
    }

    fn distortion_free_camera() -> PinholeCamera {
        make_pinhole_camera(
            FxFyCxCySkew {
                fx: 500.0,
                fy: 500.0,
                cx: 320.0,
                cy: 240.0,
                skew: 0.0,
            },
            BrownConrady5::zeros(),
        )
    }

    #[test]
    fn zero_distortion_keeps_intrinsics() {
        let cam = distortion_free_camera();
        let new_k = optimal_new_intrinsics(&cam, (640, 480), 1.0);
        assert!((new_k.fx - 500.0).abs() < 1e-6);
        assert!((new_k.fy - 500.0).abs() < 1e-6);
        assert!((new_k.cx - 320.0).abs() < 1e-6);
        assert!((new_k.cy - 240.0).abs() < 1e-6);
    }

    #[test]
    fn zero_distortion_remap_is_identity() {
        let cam = distortion_free_camera();
        let src = RgbImage::from_fn(64, 48, |x, y| {
            image::Rgb([(x * 4) as u8, (y * 5) as u8, 128])
        });
        let new_k = optimal_new_intrinsics(&cam, (64, 48), 1.0);
        let maps = UndistortMaps::build(&cam, &new_k, (64, 48));
        let out = remap_bilinear(&src, &maps);

        // Interior pixels are untouched (the last row/column has no bilinear
        // support and stays black).
        for y in 1..46 {
            for x in 1..62 {
                assert_eq!(out.get_pixel(x, y), src.get_pixel(x, y), "at ({x},{y})");
            }
        }
    }

    #[test]
    fn barrel_outer_view_is_wider_than_inner() {
        let cam = barrel_camera();
        let k_all = optimal_new_intrinsics(&cam, (640, 480), 1.0);
        let k_valid = optimal_new_intrinsics(&cam, (640, 480), 0.0);
        // Retaining all source pixels means zooming out.
        assert!(
            k_all.fx < k_valid.fx,
            "alpha=1 fx {} should be smaller than alpha=0 fx {}",
            k_all.fx,
            k_valid.fx
        );
    }

    #[test]
    fn undistorted_center_matches_source_center() {
        let cam = barrel_camera();
        let src = RgbImage::from_pixel(640, 480, image::Rgb([200, 10, 60]));
        let out = undistort_image(&src, &cam, 1.0);

        assert_eq!(out.width(), 640);
        assert_eq!(out.height(), 480);
        // At the principal point the distortion vanishes, so the center pixel
        // must sample from the (uniform) source rather than the black fill.
        assert_eq!(out.get_pixel(320, 240).0, [200, 10, 60]);
    }
}
