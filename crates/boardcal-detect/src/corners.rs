//! Corner candidate extraction from a response map.
//!
//! Thresholding, non-maximum suppression and center-of-mass seeding. The
//! seeds produced here are integer-accurate; subpixel accuracy comes from the
//! later refinement stage.

use crate::response::ResponseMap;
use crate::DetectParams;

/// A corner candidate with a subpixel seed position.
#[derive(Clone, Copy, Debug)]
pub struct Corner {
    pub x: f64,
    pub y: f64,
    pub response: f32,
}

/// Extract corner candidates from a dense response map.
///
/// A pixel survives when its response exceeds the threshold, it is the
/// maximum within the NMS window (ties broken towards the earlier pixel in
/// scan order) and the window holds at least `min_cluster_size` positive
/// neighbors. The reported position is the center of mass of the positive
/// responses inside the window.
pub fn find_corner_candidates(map: &ResponseMap, params: &DetectParams) -> Vec<Corner> {
    let mut max_resp = 0.0f32;
    for &v in &map.data {
        if v > max_resp {
            max_resp = v;
        }
    }
    if max_resp <= 0.0 {
        return Vec::new();
    }

    let threshold = params
        .threshold_abs
        .unwrap_or(params.threshold_rel * max_resp);
    let radius = params.nms_radius as i32;

    let mut out = Vec::new();
    for y in 0..map.h {
        for x in 0..map.w {
            let center = map.at(x, y);
            if center < threshold {
                continue;
            }

            let mut is_max = true;
            let mut cluster = 0u32;
            let mut mass = 0.0f64;
            let mut mx = 0.0f64;
            let mut my = 0.0f64;

            'window: for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let nx = x as i32 + dx;
                    let ny = y as i32 + dy;
                    if nx < 0 || ny < 0 || nx >= map.w as i32 || ny >= map.h as i32 {
                        continue;
                    }
                    let v = map.at(nx as usize, ny as usize);
                    if v > 0.0 {
                        cluster += 1;
                        mass += v as f64;
                        mx += v as f64 * nx as f64;
                        my += v as f64 * ny as f64;
                    }
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    // Strictly greater neighbors suppress; equal neighbors
                    // suppress only when earlier in scan order.
                    if v > center || (v == center && (ny, nx) < (y as i32, x as i32)) {
                        is_max = false;
                        break 'window;
                    }
                }
            }

            if !is_max || cluster < params.min_cluster_size {
                continue;
            }

            out.push(Corner {
                x: mx / mass,
                y: my / mass,
                response: center,
            });
        }
    }

    out
}
