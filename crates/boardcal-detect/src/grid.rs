//! Board structure recovery.
//!
//! The corner detector produces an unordered cloud of candidates; calibration
//! needs the inner corners of the pattern in row-major order. Recovery works
//! on the full-board assumption (every inner corner visible, as with the
//! classic full-pattern chessboard detection):
//!
//! 1. convex hull of the candidate cloud,
//! 2. the maximum-area quadrilateral over hull vertices gives the four
//!    outer corners of the pattern,
//! 3. a homography from the four board corner cells to that quadrilateral
//!    predicts every lattice node; each node snaps to its nearest candidate
//!    within a spacing-relative tolerance,
//! 4. the first cyclic labeling of the quadrilateral that snaps every node
//!    uniquely wins; the 180-degree ambiguity of the symmetric lattice is
//!    resolved deterministically.

use crate::corners::{find_corner_candidates, Corner};
use crate::response::corner_response_image;
use crate::subpix::refine_corners_subpix;
use crate::DetectParams;
use boardcal_core::{from_homogeneous, to_homogeneous, BoardSpec, Pt2};
use boardcal_linear::dlt_homography;
use tracing::debug;

/// A fully recovered chessboard pattern.
#[derive(Clone, Debug)]
pub struct ChessboardDetection {
    /// Inner corners, row-major (`cols` fastest), subpixel refined.
    pub corners: Vec<Pt2>,
    pub cols: u32,
    pub rows: u32,
}

/// Detect a full chessboard pattern in a grayscale image.
///
/// Returns `None` when the pattern is not fully visible or the corner cloud
/// cannot be ordered into a `cols x rows` lattice.
pub fn detect_chessboard(
    img: &image::GrayImage,
    board: &BoardSpec,
    params: &DetectParams,
) -> Option<ChessboardDetection> {
    let map = corner_response_image(img);
    let candidates = find_corner_candidates(&map, params);
    if candidates.len() < board.corner_count() {
        debug!(
            found = candidates.len(),
            needed = board.corner_count(),
            "not enough corner candidates"
        );
        return None;
    }

    let mut corners = order_into_grid(&candidates, board.cols, board.rows, params.snap_tol_rel)?;
    refine_corners_subpix(img, &mut corners, params.subpix_win, params.subpix_criteria);

    Some(ChessboardDetection {
        corners,
        cols: board.cols,
        rows: board.rows,
    })
}

/// Order a candidate cloud into a row-major lattice.
pub(crate) fn order_into_grid(
    candidates: &[Corner],
    cols: u32,
    rows: u32,
    snap_tol_rel: f64,
) -> Option<Vec<Pt2>> {
    let points: Vec<Pt2> = candidates.iter().map(|c| Pt2::new(c.x, c.y)).collect();

    let hull = convex_hull(&points);
    if hull.len() < 4 {
        debug!(hull = hull.len(), "degenerate candidate hull");
        return None;
    }
    if hull.len() > 64 {
        debug!(hull = hull.len(), "candidate hull too noisy");
        return None;
    }

    let quad = max_area_quad(&hull)?;

    // Board corner cells in index coordinates, positive orientation.
    let c = (cols - 1) as f64;
    let r = (rows - 1) as f64;
    let grid_corners = [
        Pt2::new(0.0, 0.0),
        Pt2::new(c, 0.0),
        Pt2::new(c, r),
        Pt2::new(0.0, r),
    ];

    for rot in 0..4 {
        let quad_rot = [
            quad[rot],
            quad[(rot + 1) % 4],
            quad[(rot + 2) % 4],
            quad[(rot + 3) % 4],
        ];
        let Ok(h) = dlt_homography(&grid_corners, &quad_rot) else {
            continue;
        };

        if let Some(ordered) = snap_lattice(&h, &points, cols, rows, snap_tol_rel) {
            return Some(canonicalize(ordered));
        }
    }

    debug!("no quad labeling produced a consistent lattice");
    None
}

/// Predict every lattice node through `h` and snap to unique candidates.
fn snap_lattice(
    h: &boardcal_core::Mat3,
    points: &[Pt2],
    cols: u32,
    rows: u32,
    snap_tol_rel: f64,
) -> Option<Vec<Pt2>> {
    let cols = cols as usize;
    let rows = rows as usize;

    let mut predicted = Vec::with_capacity(cols * rows);
    for j in 0..rows {
        for i in 0..cols {
            let p = from_homogeneous(&(h * to_homogeneous(&Pt2::new(i as f64, j as f64))));
            predicted.push(p);
        }
    }

    let mut used = vec![false; points.len()];
    let mut ordered = Vec::with_capacity(cols * rows);

    for j in 0..rows {
        for i in 0..cols {
            let node = predicted[j * cols + i];

            // Local spacing from the predicted neighbors.
            let right = if i + 1 < cols {
                predicted[j * cols + i + 1]
            } else {
                predicted[j * cols + i - 1]
            };
            let down = if j + 1 < rows {
                predicted[(j + 1) * cols + i]
            } else {
                predicted[(j - 1) * cols + i]
            };
            let spacing = (node - right).norm().min((node - down).norm());
            let tol = snap_tol_rel * spacing;

            let mut best = None;
            let mut best_dist = f64::INFINITY;
            for (idx, p) in points.iter().enumerate() {
                let d = (p - node).norm();
                if d < best_dist {
                    best_dist = d;
                    best = Some(idx);
                }
            }

            let idx = best?;
            if best_dist > tol || used[idx] {
                return None;
            }
            used[idx] = true;
            ordered.push(points[idx]);
        }
    }

    Some(ordered)
}

/// Resolve the 180-degree labeling ambiguity of the symmetric lattice:
/// the ordering whose first corner is closer to the image origin wins.
fn canonicalize(mut ordered: Vec<Pt2>) -> Vec<Pt2> {
    let first = ordered[0];
    let last = ordered[ordered.len() - 1];
    if first.x + first.y > last.x + last.y {
        ordered.reverse();
    }
    ordered
}

/// Andrew monotone chain convex hull, counter-clockwise in algebraic axes.
fn convex_hull(points: &[Pt2]) -> Vec<Pt2> {
    let mut pts: Vec<Pt2> = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup_by(|a, b| (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9);

    if pts.len() < 3 {
        return pts;
    }

    let cross = |o: &Pt2, a: &Pt2, b: &Pt2| (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x);

    let mut lower: Vec<Pt2> = Vec::new();
    for p in &pts {
        while lower.len() >= 2
            && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0
        {
            lower.pop();
        }
        lower.push(*p);
    }

    let mut upper: Vec<Pt2> = Vec::new();
    for p in pts.iter().rev() {
        while upper.len() >= 2
            && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0
        {
            upper.pop();
        }
        upper.push(*p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Maximum-area quadrilateral over hull vertices (vertices kept in hull order).
fn max_area_quad(hull: &[Pt2]) -> Option<[Pt2; 4]> {
    let n = hull.len();
    if n < 4 {
        return None;
    }

    let area = |a: &Pt2, b: &Pt2, c: &Pt2, d: &Pt2| {
        // Shoelace over an ordered convex quadrilateral.
        0.5 * ((b.x - a.x) * (b.y + a.y)
            + (c.x - b.x) * (c.y + b.y)
            + (d.x - c.x) * (d.y + c.y)
            + (a.x - d.x) * (a.y + d.y))
            .abs()
    };

    let mut best = None;
    let mut best_area = 0.0;
    for i in 0..n - 3 {
        for j in i + 1..n - 2 {
            for k in j + 1..n - 1 {
                for l in k + 1..n {
                    let a = area(&hull[i], &hull[j], &hull[k], &hull[l]);
                    if a > best_area {
                        best_area = a;
                        best = Some([hull[i], hull[j], hull[k], hull[l]]);
                    }
                }
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardcal_core::Mat3;

    fn project(h: &Mat3, p: Pt2) -> Pt2 {
        from_homogeneous(&(h * to_homogeneous(&p)))
    }

    /// Candidates from a projected lattice, deterministically shuffled.
    fn lattice_candidates(h: &Mat3, cols: u32, rows: u32) -> Vec<Corner> {
        let mut corners = Vec::new();
        for j in 0..rows {
            for i in 0..cols {
                let p = project(h, Pt2::new(i as f64, j as f64));
                corners.push(Corner {
                    x: p.x,
                    y: p.y,
                    response: 1.0,
                });
            }
        }
        // rotate order so candidates are not already row-major
        corners.rotate_left(7);
        corners
    }

    fn mild_perspective() -> Mat3 {
        Mat3::new(42.0, 3.0, 120.0, -2.5, 40.0, 90.0, 1e-4, 5e-5, 1.0)
    }

    #[test]
    fn lattice_is_recovered_row_major() {
        let h = mild_perspective();
        let (cols, rows) = (9, 6);
        let candidates = lattice_candidates(&h, cols, rows);

        let ordered = order_into_grid(&candidates, cols, rows, 0.35).expect("grid should order");
        assert_eq!(ordered.len(), 54);

        // Canonical orientation: first corner nearest the origin-side.
        let first = ordered[0];
        let last = ordered[53];
        assert!(first.x + first.y <= last.x + last.y);

        // Row-major: consecutive corners within a row stay close, row jumps
        // are larger than column steps along the same row.
        let step = (ordered[1] - ordered[0]).norm();
        let row_jump = (ordered[cols as usize] - ordered[0]).norm();
        assert!(step > 10.0 && step < 100.0);
        assert!(row_jump > 10.0 && row_jump < 100.0);

        // Every recovered corner matches some predicted lattice node exactly
        // (candidates came from the lattice itself): check the four extremes
        // against the projected pattern corners (up to the 180 flip).
        let p00 = project(&h, Pt2::new(0.0, 0.0));
        let p_last = project(&h, Pt2::new(8.0, 5.0));
        let matches_direct = (ordered[0] - p00).norm() < 1e-9;
        let matches_flipped = (ordered[0] - p_last).norm() < 1e-9;
        assert!(matches_direct || matches_flipped);
    }

    #[test]
    fn far_outliers_break_the_quad_instead_of_mislabeling() {
        let h = mild_perspective();
        let (cols, rows) = (7, 5);
        let mut candidates = lattice_candidates(&h, cols, rows);
        // Outliers far from the lattice but inside the image.
        candidates.push(Corner {
            x: 900.0,
            y: 20.0,
            response: 1.0,
        });
        candidates.push(Corner {
            x: 15.0,
            y: 700.0,
            response: 1.0,
        });

        // Far outliers stretch the hull quad, so the snap must fail rather
        // than return a wrong lattice.
        let result = order_into_grid(&candidates, cols, rows, 0.35);
        assert!(result.is_none());
    }

    #[test]
    fn missing_corner_fails_detection() {
        let h = mild_perspective();
        let (cols, rows) = (7, 5);
        let mut candidates = lattice_candidates(&h, cols, rows);
        candidates.remove(12);

        assert!(order_into_grid(&candidates, cols, rows, 0.35).is_none());
    }

    #[test]
    fn jittered_lattice_still_orders() {
        let h = mild_perspective();
        let (cols, rows) = (9, 6);
        let mut candidates = lattice_candidates(&h, cols, rows);
        for (idx, c) in candidates.iter_mut().enumerate() {
            // deterministic sub-spacing jitter
            let sign = if idx % 2 == 0 { 1.0 } else { -1.0 };
            c.x += 1.5 * sign;
            c.y -= 1.0 * sign;
        }

        let ordered = order_into_grid(&candidates, cols, rows, 0.35).expect("jitter within tol");
        assert_eq!(ordered.len(), 54);
    }
}
