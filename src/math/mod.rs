//! Geometric value types shared by the quadtree and the tile assembly.

mod extent;
mod geo_transform;
mod rect;

pub use crate::math::{extent::Extent, geo_transform::GeoTransform, rect::QuadRect};

use glam::DVec2;

/// Rotates `point` counter-clockwise by `degrees` about `origin`.
pub fn rotate_point(point: DVec2, degrees: f64, origin: DVec2) -> DVec2 {
    if degrees == 0.0 {
        return point;
    }

    let (sin, cos) = degrees.to_radians().sin_cos();
    let delta = point - origin;

    origin + DVec2::new(delta.x * cos - delta.y * sin, delta.x * sin + delta.y * cos)
}
