use glam::DVec2;
use serde::{Deserialize, Serialize};

/// An affine transform from grid (column, row) space to world space, in the GDAL layout:
///
/// ```text
/// x = t[0] + col * t[1] + row * t[2]
/// y = t[3] + col * t[4] + row * t[5]
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform(pub [f64; 6]);

impl Default for GeoTransform {
    fn default() -> Self {
        Self([0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
    }
}

impl GeoTransform {
    pub fn new(coefficients: [f64; 6]) -> Self {
        Self(coefficients)
    }

    /// Maps the fractional grid position `(col, row)` to world space.
    #[inline]
    pub fn apply(&self, col: f64, row: f64) -> DVec2 {
        let t = &self.0;

        DVec2::new(
            t[0] + col * t[1] + row * t[2],
            t[3] + col * t[4] + row * t[5],
        )
    }

    /// The inverse transform (world to grid), if the linear part is not singular.
    pub fn invert(&self) -> Option<Self> {
        let t = &self.0;
        let determinant = t[1] * t[5] - t[2] * t[4];

        if determinant == 0.0 || !determinant.is_finite() {
            return None;
        }

        let inverse = 1.0 / determinant;

        Some(Self([
            (t[2] * t[3] - t[0] * t[5]) * inverse,
            t[5] * inverse,
            -t[2] * inverse,
            (-t[1] * t[3] + t[0] * t[4]) * inverse,
            -t[4] * inverse,
            t[1] * inverse,
        ]))
    }
}
