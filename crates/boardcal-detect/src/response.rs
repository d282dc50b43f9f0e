//! Dense corner response computation.
//!
//! The response follows the ring construction of the ChESS detector
//! ("Chess-board Extraction by Subtraction and Summation"): 16 samples on a
//! radius-5 ring around each pixel. At an X-junction, diametrically opposite
//! samples agree while samples a quarter turn apart disagree, so
//!
//! `response = sum_response - diff_response - mean_response`
//!
//! is strongly positive at chessboard corners, near zero in flat regions and
//! negative on plain edges.

use image::GrayImage;

/// 16-point sampling ring of radius 5. Entry `n + 8` is diametrically
/// opposite entry `n`, and entry `n + 4` is a quarter turn away.
const RING_R5: [(i32, i32); 16] = [
    (5, 0),
    (5, 2),
    (4, 4),
    (2, 5),
    (0, 5),
    (-2, 5),
    (-4, 4),
    (-5, 2),
    (-5, 0),
    (-5, -2),
    (-4, -4),
    (-2, -5),
    (0, -5),
    (2, -5),
    (4, -4),
    (5, -2),
];

/// Margin in pixels inside which no response is computed.
pub const RING_RADIUS: u32 = 5;

/// Dense response map in row-major layout.
#[derive(Clone, Debug)]
pub struct ResponseMap {
    pub w: usize,
    pub h: usize,
    pub data: Vec<f32>,
}

impl ResponseMap {
    /// Response value at an integer coordinate.
    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.w + x]
    }
}

/// Compute the dense corner response for raw 8-bit grayscale data.
///
/// Pixels closer than the ring radius to the border get zero response.
pub fn chess_response_u8(data: &[u8], w: usize, h: usize) -> ResponseMap {
    assert_eq!(data.len(), w * h, "buffer size must match dimensions");

    let mut out = vec![0.0f32; w * h];
    let margin = RING_RADIUS as usize;
    if w <= 2 * margin || h <= 2 * margin {
        return ResponseMap { w, h, data: out };
    }

    for y in margin..h - margin {
        for x in margin..w - margin {
            let mut s = [0.0f32; 16];
            for (n, (dx, dy)) in RING_R5.iter().enumerate() {
                let sx = (x as i32 + dx) as usize;
                let sy = (y as i32 + dy) as usize;
                s[n] = data[sy * w + sx] as f32;
            }

            let mut sum_resp = 0.0f32;
            for n in 0..4 {
                sum_resp += (s[n] + s[n + 8] - s[n + 4] - s[n + 12]).abs();
            }

            let mut diff_resp = 0.0f32;
            for n in 0..8 {
                diff_resp += (s[n] - s[n + 8]).abs();
            }

            // Local mean over the 3x3 neighborhood, scaled to the ring sum.
            let mut local = 0.0f32;
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    let sx = (x as i32 + dx) as usize;
                    let sy = (y as i32 + dy) as usize;
                    local += data[sy * w + sx] as f32;
                }
            }
            let ring_sum: f32 = s.iter().sum();
            let mean_resp = (ring_sum - 16.0 * local / 9.0).abs();

            out[y * w + x] = sum_resp - diff_resp - mean_resp;
        }
    }

    ResponseMap { w, h, data: out }
}

/// Compute a dense corner response map for an `image::GrayImage`.
#[inline]
pub fn corner_response_image(img: &GrayImage) -> ResponseMap {
    chess_response_u8(img.as_raw(), img.width() as usize, img.height() as usize)
}
