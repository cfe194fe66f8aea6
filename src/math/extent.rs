use crate::math::{rotate_point, GeoTransform, QuadRect};
use glam::DVec2;
use serde::{Deserialize, Serialize};

/// A rectangle in world space, rotated about its center.
///
/// The rotation is stored in degrees, counter-clockwise positive.
/// A map view that is rotated clockwise by some angle displays exactly the world rectangle that is
/// rotated counter-clockwise by the same angle, so the map rotation can be passed in unchanged.
///
/// Extents are immutable, all modifications return a new extent.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    center: DVec2,
    width: f64,
    height: f64,
    #[serde(default)]
    rotation: f64,
}

impl Extent {
    pub fn new(center: DVec2, width: f64, height: f64, rotation: f64) -> Self {
        Self {
            center,
            width,
            height,
            rotation,
        }
    }

    /// Creates an extent from an axis aligned world rectangle, rotated about its center.
    pub fn from_rect(rect: QuadRect, rotation: f64) -> Self {
        Self::new(rect.center(), rect.width(), rect.height(), rotation)
    }

    #[inline]
    pub fn center(&self) -> DVec2 {
        self.center
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.height
    }

    #[inline]
    pub fn size(&self) -> DVec2 {
        DVec2::new(self.width, self.height)
    }

    #[inline]
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// The extent before the rotation is applied.
    pub fn unrotated_rect(&self) -> QuadRect {
        QuadRect::from_center_size(self.center, self.size())
    }

    /// Maps a world position into the normalized space of this extent, where the extent covers
    /// [0,1]² and the y axis points up.
    pub fn normalize_point(&self, point: DVec2) -> DVec2 {
        let point = rotate_point(point, -self.rotation, self.center);
        let rect = self.unrotated_rect();

        (point - rect.min) / rect.size()
    }

    /// Inverse of [`Extent::normalize_point`].
    pub fn denormalize_point(&self, normalized: DVec2) -> DVec2 {
        let rect = self.unrotated_rect();

        rotate_point(rect.min + normalized * rect.size(), self.rotation, self.center)
    }

    /// The part of this extent covered by a rectangle given in normalized space.
    /// The result keeps the rotation of this extent.
    pub fn subrectangle(&self, normalized: &QuadRect) -> Self {
        Self {
            center: self.denormalize_point(normalized.center()),
            width: self.width * normalized.width(),
            height: self.height * normalized.height(),
            rotation: self.rotation,
        }
    }

    pub fn scale(&self, factor: f64) -> Self {
        Self {
            width: self.width * factor,
            height: self.height * factor,
            ..*self
        }
    }

    /// Rotates the extent counter-clockwise about `origin`, or about its own center.
    pub fn rotate(&self, degrees: f64, origin: Option<DVec2>) -> Self {
        let origin = origin.unwrap_or(self.center);

        Self {
            center: rotate_point(self.center, degrees, origin),
            rotation: self.rotation + degrees,
            ..*self
        }
    }

    /// Computes the affine transform of a `cols` x `rows` raster covering this extent.
    ///
    /// With `grid_point` set, the raster pixels are centered on grid points that include the edges
    /// of the extent, so the origin is shifted by half a pixel and the resolution is
    /// `width / (cols - 1)`. Otherwise the pixels tile the extent and the origin is its corner.
    pub fn geotransform(&self, cols: usize, rows: usize, grid_point: bool) -> GeoTransform {
        let rect = self.unrotated_rect();

        let (x_res, y_res, origin) = if grid_point {
            let x_res = self.width / (cols.max(2) - 1) as f64;
            let y_res = self.height / (rows.max(2) - 1) as f64;
            let origin = DVec2::new(rect.min.x - 0.5 * x_res, rect.max.y + 0.5 * y_res);
            (x_res, y_res, origin)
        } else {
            let x_res = self.width / cols.max(1) as f64;
            let y_res = self.height / rows.max(1) as f64;
            (x_res, y_res, DVec2::new(rect.min.x, rect.max.y))
        };

        let origin = rotate_point(origin, self.rotation, self.center);
        let (sin, cos) = self.rotation.to_radians().sin_cos();

        GeoTransform([
            origin.x,
            x_res * cos,
            y_res * sin,
            origin.y,
            x_res * sin,
            -y_res * cos,
        ])
    }
}
