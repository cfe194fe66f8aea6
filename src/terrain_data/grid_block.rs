use crate::{
    math::{Extent, GeoTransform},
    terrain_data::{bilinear, Direction},
};
use glam::DVec2;
use ndarray::{Array2, ArrayViewMut1, Axis};
use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Optional geometry the viewer adds around a block.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[repr(transparent)]
    pub struct Decoration: u32 {
        const NONE  = 0;
        /// Vertical walls from the block edges down to the base.
        const SIDES = 1 << 0;
        /// A wireframe outline along the block edges.
        const FRAME = 1 << 1;
    }
}

/// A polygon (outer ring followed by holes) the terrain surface is cut along.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipPolygon {
    pub rings: Vec<Vec<DVec2>>,
}

impl ClipPolygon {
    pub fn new(rings: Vec<Vec<DVec2>>) -> Self {
        Self { rings }
    }

    /// Transforms all rings from world coordinates into the normalized space of `extent`.
    pub fn normalized(&self, extent: &Extent) -> Self {
        Self {
            rings: self
                .rings
                .iter()
                .map(|ring| {
                    ring.iter()
                        .map(|&point| extent.normalize_point(point))
                        .collect()
                })
                .collect(),
        }
    }

    /// Moves already normalized rings from the space of `from` into the space of `to`.
    pub fn renormalized(&self, from: &Extent, to: &Extent) -> Self {
        Self {
            rings: self
                .rings
                .iter()
                .map(|ring| {
                    ring.iter()
                        .map(|&point| to.normalize_point(from.denormalize_point(point)))
                        .collect()
                })
                .collect(),
        }
    }
}

/// The height range of the raw samples of a block.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockStats {
    pub min: f32,
    pub max: f32,
}

impl BlockStats {
    /// NaN samples are ignored.
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a f32>) -> Self {
        values.into_iter().fold(
            Self {
                min: f32::INFINITY,
                max: f32::NEG_INFINITY,
            },
            |stats, &value| Self {
                min: stats.min.min(value),
                max: stats.max.max(value),
            },
        )
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// The processing stage of a block.
/// Blocks only move forward: `Sampled -> ShiftScaled -> Decorated -> Ready`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum BlockStage {
    Sampled,
    ShiftScaled,
    Decorated,
    Ready,
}

/// Where a block is placed in the scene.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BlockLayout {
    /// The size of the block in scene units.
    pub plane_size: DVec2,
    /// The position of the block center in scene units.
    pub offset: DVec2,
    pub roughening: u32,
    pub depth: u32,
}

/// The sampled heights of one tile, together with its placement in the world and the scene.
#[derive(Clone, Debug)]
pub struct GridBlock {
    extent: Extent,
    /// Indexed `[row, col]`, row 0 is the top row.
    values: Array2<f32>,
    layout: BlockLayout,
    stats: BlockStats,
    clip: Option<ClipPolygon>,
    decoration: Decoration,
    stage: BlockStage,
}

impl GridBlock {
    /// Creates a block from freshly sampled row major `values` and captures their stats.
    ///
    /// Returns `None` if the number of values does not match the grid size.
    pub fn from_samples(
        extent: Extent,
        width: usize,
        height: usize,
        values: Vec<f32>,
        layout: BlockLayout,
    ) -> Option<Self> {
        let values = Array2::from_shape_vec((height, width), values).ok()?;
        let stats = BlockStats::from_values(&values);

        Some(Self {
            extent,
            values,
            layout,
            stats,
            clip: None,
            decoration: Decoration::NONE,
            stage: BlockStage::Sampled,
        })
    }

    /// Creates a block from values that are already final, such as merged blocks.
    pub(crate) fn from_parts(
        extent: Extent,
        values: Array2<f32>,
        layout: BlockLayout,
        stats: BlockStats,
        clip: Option<ClipPolygon>,
        decoration: Decoration,
    ) -> Self {
        Self {
            extent,
            values,
            layout,
            stats,
            clip,
            decoration,
            stage: BlockStage::Ready,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.values.ncols()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.values.nrows()
    }

    #[inline]
    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    #[inline]
    pub fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    #[inline]
    pub fn stats(&self) -> BlockStats {
        self.stats
    }

    #[inline]
    pub fn stage(&self) -> BlockStage {
        self.stage
    }

    pub fn clip(&self) -> Option<&ClipPolygon> {
        self.clip.as_ref()
    }

    pub fn decoration(&self) -> Decoration {
        self.decoration
    }

    pub fn grid(&self) -> &Array2<f32> {
        &self.values
    }

    #[inline]
    pub fn value(&self, col: usize, row: usize) -> f32 {
        self.values[[row, col]]
    }

    /// The row major values, top row first.
    pub fn values(&self) -> Vec<f32> {
        self.values.iter().copied().collect()
    }

    pub fn into_values(self) -> Vec<f32> {
        if self.values.is_standard_layout() {
            self.values.into_raw_vec_and_offset().0
        } else {
            self.values()
        }
    }

    /// The samples along one edge, ordered left to right or top to bottom.
    pub fn edge(&self, direction: Direction) -> Vec<f32> {
        let (axis, index) = self.edge_lane(direction);
        self.values.index_axis(axis, index).to_vec()
    }

    pub(crate) fn edge_mut(&mut self, direction: Direction) -> ArrayViewMut1<'_, f32> {
        let (axis, index) = self.edge_lane(direction);
        self.values.index_axis_mut(axis, index)
    }

    fn edge_lane(&self, direction: Direction) -> (Axis, usize) {
        match direction {
            Direction::Up => (Axis(0), 0),
            Direction::Down => (Axis(0), self.height() - 1),
            Direction::Left => (Axis(1), 0),
            Direction::Right => (Axis(1), self.width() - 1),
        }
    }

    /// Samples the grid bilinearly at a fractional `(col, row)` position.
    pub fn sample_grid(&self, col: f64, row: f64) -> f32 {
        bilinear(&self.values, col, row)
    }

    /// The affine transform from pixel space of the grid to world space.
    /// Grid point `(col, row)` sits at the pixel center `(col + 0.5, row + 0.5)`.
    pub fn grid_transform(&self) -> GeoTransform {
        self.extent.geotransform(self.width(), self.height(), true)
    }

    pub fn grid_to_world(&self, col: usize, row: usize) -> DVec2 {
        self.grid_transform().apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// The fractional grid position of a world point, or `None` for a degenerate extent.
    pub fn world_to_grid(&self, point: DVec2) -> Option<DVec2> {
        let inverse = self.grid_transform().invert()?;
        Some(inverse.apply(point.x, point.y) - 0.5)
    }

    /// Applies `v = (v + shift) * scale` to every sample. Only valid directly after sampling.
    pub(crate) fn shift_scale(&mut self, shift: f32, scale: f32) {
        debug_assert_eq!(self.stage, BlockStage::Sampled);
        if self.stage != BlockStage::Sampled {
            return;
        }

        self.values.mapv_inplace(|value| (value + shift) * scale);
        self.stage = BlockStage::ShiftScaled;
    }

    /// Attaches the optional geometry. A frame is dropped whenever a clip polygon is present.
    pub(crate) fn decorate(&mut self, clip: Option<ClipPolygon>, decoration: Decoration) {
        debug_assert_eq!(self.stage, BlockStage::ShiftScaled);
        if self.stage != BlockStage::ShiftScaled {
            return;
        }

        let mut decoration = decoration;
        if clip.is_some() {
            decoration.remove(Decoration::FRAME);
        }

        self.clip = clip;
        self.decoration = decoration;
        self.stage = BlockStage::Decorated;
    }

    pub(crate) fn finish(&mut self) {
        if self.stage == BlockStage::Decorated {
            self.stage = BlockStage::Ready;
        }
    }

    pub(crate) fn values_mut(&mut self) -> &mut Array2<f32> {
        &mut self.values
    }
}
