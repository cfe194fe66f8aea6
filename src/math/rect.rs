use glam::DVec2;
use serde::{Deserialize, Serialize};

/// An axis aligned rectangle, used for the normalized space of an [`Extent`](super::Extent).
///
/// The y axis points up, so `max.y` is the top edge.
/// All predicates treat the rectangle as closed (edges and corners belong to it).
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuadRect {
    pub min: DVec2,
    pub max: DVec2,
}

impl QuadRect {
    pub const UNIT: QuadRect = QuadRect {
        min: DVec2::ZERO,
        max: DVec2::ONE,
    };

    pub fn new(min: DVec2, max: DVec2) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn from_center_size(center: DVec2, size: DVec2) -> Self {
        Self::new(center - 0.5 * size, center + 0.5 * size)
    }

    /// A degenerate rectangle covering a single point.
    pub fn from_point(point: DVec2) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    /// The bounding rectangle of all points.
    pub fn bounding(points: impl IntoIterator<Item = DVec2>) -> Option<Self> {
        points.into_iter().fold(None, |rect, point| {
            Some(match rect {
                None => Self::from_point(point),
                Some(rect) => Self {
                    min: rect.min.min(point),
                    max: rect.max.max(point),
                },
            })
        })
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn size(&self) -> DVec2 {
        self.max - self.min
    }

    #[inline]
    pub fn center(&self) -> DVec2 {
        0.5 * (self.min + self.max)
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn contains(&self, point: DVec2) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Touching rectangles intersect.
    pub fn intersects(&self, other: &QuadRect) -> bool {
        self.min.x.max(other.min.x) <= self.max.x.min(other.max.x)
            && self.min.y.max(other.min.y) <= self.max.y.min(other.max.y)
    }

    /// Splits the rectangle into four equal quadrants.
    /// The quadrant index is `2 * row + col`, where row 0 is the top half.
    pub fn quadrants(&self) -> [QuadRect; 4] {
        let mid = self.center();

        [
            QuadRect::new(DVec2::new(self.min.x, mid.y), DVec2::new(mid.x, self.max.y)),
            QuadRect::new(mid, self.max),
            QuadRect::new(self.min, mid),
            QuadRect::new(DVec2::new(mid.x, self.min.y), DVec2::new(self.max.x, mid.y)),
        ]
    }

    /// Maps a rectangle given relative to this one (in [0,1]²) into this rectangle's space.
    pub fn sub_rect(&self, relative: &QuadRect) -> Self {
        Self {
            min: self.min + relative.min * self.size(),
            max: self.min + relative.max * self.size(),
        }
    }

    /// Expresses `rect` relative to this rectangle, so that this rectangle maps to [0,1]².
    pub fn relative(&self, rect: &QuadRect) -> Self {
        Self {
            min: (rect.min - self.min) / self.size(),
            max: (rect.max - self.min) / self.size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadrants_are_ordered_top_row_first() {
        let [tl, tr, bl, br] = QuadRect::UNIT.quadrants();

        assert_eq!(tl, QuadRect::new(DVec2::new(0.0, 0.5), DVec2::new(0.5, 1.0)));
        assert_eq!(tr, QuadRect::new(DVec2::new(0.5, 0.5), DVec2::new(1.0, 1.0)));
        assert_eq!(bl, QuadRect::new(DVec2::new(0.0, 0.0), DVec2::new(0.5, 0.5)));
        assert_eq!(br, QuadRect::new(DVec2::new(0.5, 0.0), DVec2::new(1.0, 0.5)));
    }

    #[test]
    fn touching_rects_intersect() {
        let left = QuadRect::new(DVec2::ZERO, DVec2::new(0.5, 1.0));
        let right = QuadRect::new(DVec2::new(0.5, 0.0), DVec2::ONE);
        let far = QuadRect::new(DVec2::new(0.75, 0.0), DVec2::ONE);

        assert!(left.intersects(&right));
        assert!(!left.intersects(&far));
        assert!(left.intersects(&QuadRect::from_point(DVec2::new(0.25, 0.25))));
    }

    #[test]
    fn sub_rect_and_relative_are_inverse() {
        let outer = QuadRect::new(DVec2::new(2.0, 4.0), DVec2::new(6.0, 12.0));
        let relative = QuadRect::new(DVec2::new(0.25, 0.5), DVec2::new(0.5, 1.0));

        let absolute = outer.sub_rect(&relative);
        assert_eq!(absolute, QuadRect::new(DVec2::new(3.0, 8.0), DVec2::new(4.0, 12.0)));
        assert_eq!(outer.relative(&absolute), relative);
    }
}
