//! The data structures the terrain is assembled from: the [`Quadtree`](quadtree::Quadtree) that
//! decides where the terrain is sampled densely, the [`GridBlock`](grid_block::GridBlock) that
//! holds the samples of one tile, and the [`GridSampler`](sampler::GridSampler) they are read from.

pub mod grid_block;
pub mod quadtree;
pub mod sampler;

pub use crate::terrain_data::{
    grid_block::{BlockStage, BlockStats, ClipPolygon, Decoration, GridBlock},
    quadtree::{QuadId, QuadNode, Quadtree},
    sampler::{ConstantSampler, FunctionSampler, GridSampler, RasterSampler},
};

use ndarray::Array2;
use std::fmt;

/// The four edge directions of a tile, in the order neighbors are reported.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Left,
    Right,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Left,
        Direction::Right,
        Direction::Down,
    ];

    /// The cell step towards this direction, with y pointing up.
    pub fn step(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
            Direction::Down => (0, -1),
        }
    }
}

/// The position of a quad in its level of the tree.
/// Row 0 is the top row of the root rectangle.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct QuadCoordinate {
    pub depth: u32,
    pub x: u32,
    pub y: u32,
}

impl QuadCoordinate {
    pub fn new(depth: u32, x: u32, y: u32) -> Self {
        Self { depth, x, y }
    }
}

impl fmt::Display for QuadCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.depth, self.x, self.y)
    }
}

/// Samples `grid` (indexed `[row, col]`) at the fractional position `(x, y)`.
/// Positions outside of the grid are clamped to its border.
pub(crate) fn bilinear(grid: &Array2<f32>, x: f64, y: f64) -> f32 {
    let (rows, cols) = grid.dim();

    let x = x.clamp(0.0, (cols - 1) as f64);
    let y = y.clamp(0.0, (rows - 1) as f64);

    let x0 = (x.floor() as usize).min(cols.saturating_sub(2));
    let y0 = (y.floor() as usize).min(rows.saturating_sub(2));
    let x1 = (x0 + 1).min(cols - 1);
    let y1 = (y0 + 1).min(rows - 1);

    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let top = lerp(grid[[y0, x0]], grid[[y0, x1]], fx);
    let bottom = lerp(grid[[y1, x0]], grid[[y1, x1]], fx);

    lerp(top, bottom, fy)
}

/// Samples with zero weight are skipped, so a NaN neighbor does not spread onto grid points.
#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    if t == 0.0 {
        a
    } else if t == 1.0 {
        b
    } else {
        a * (1.0 - t) + b * t
    }
}
