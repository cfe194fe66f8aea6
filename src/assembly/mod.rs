//! Assembles sampled [`GridBlock`]s into the tiles of a scene.
//!
//! There are two layouts. [`RingAssembler`] places equally sized blocks in concentric rings
//! around a center block and streams them one at a time. [`QuadtreeAssembler`] samples the leaves
//! of a focus quadtree, which requires all leaves to be sampled before their edges can be
//! reconciled, so it works in two phases.
//!
//! Both run entirely on the calling thread and poll an [`AssemblyContext`] for cancellation
//! before producing each tile.

pub mod block;
pub mod merge;
pub mod quads;
pub mod ring;
pub mod stitch;

pub use crate::assembly::{
    block::{BlockAssembler, TileRequest},
    merge::{merge_blocks, DemQuadList},
    quads::{MaterializedQuads, QuadBlocks, QuadtreeAssembler},
    ring::{RingAssembler, RingBlocks, RingCell},
};

use crate::{
    config::TerrainConfig,
    terrain_data::{BlockStats, ClipPolygon, Decoration, GridBlock},
};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Receives the completed fraction of an export. Returning `false` cancels the export.
pub type ProgressCallback<'a> = dyn Fn(f64) -> bool + 'a;

/// A shared flag that stops an export before its next tile.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The per export state the assemblers poll while producing tiles.
#[derive(Clone, Default)]
pub struct AssemblyContext<'a> {
    cancel: CancellationToken,
    progress: Option<&'a ProgressCallback<'a>>,
}

impl<'a> AssemblyContext<'a> {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: &'a ProgressCallback<'a>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Reports `done` of `total` steps, cancelling the export if the callback asks for it.
    pub fn report(&self, done: usize, total: usize) {
        if let Some(progress) = self.progress {
            let fraction = if total == 0 {
                1.0
            } else {
                done as f64 / total as f64
            };

            if !progress(fraction) {
                self.cancel.cancel();
            }
        }
    }
}

/// A finished tile, as handed to the serializer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TileDescriptor {
    /// The position of the tile in the production order, stable across runs.
    pub index: usize,
    pub name: String,
    pub width: usize,
    pub height: usize,
    /// Row major heights, top row first, with the vertical shift and scale applied.
    #[serde(skip)]
    pub values: Vec<f32>,
    pub plane_width: f64,
    pub plane_height: f64,
    pub offset: DVec3,
    pub vertical_shift: f32,
    pub vertical_scale: f32,
    pub material: Option<u32>,
    /// The clip polygon in the normalized space of the tile.
    pub clip: Option<ClipPolygon>,
    pub sides: bool,
    pub frame: bool,
    pub roughening: u32,
    pub depth: u32,
    /// The height range of the raw samples.
    pub stats: BlockStats,
}

impl TileDescriptor {
    pub fn from_block(
        index: usize,
        name: String,
        block: GridBlock,
        config: &TerrainConfig,
    ) -> Self {
        let layout = *block.layout();
        let decoration = block.decoration();
        let clip = block.clip().cloned();
        let stats = block.stats();
        let (width, height) = (block.width(), block.height());

        Self {
            index,
            name,
            width,
            height,
            values: block.into_values(),
            plane_width: layout.plane_size.x,
            plane_height: layout.plane_size.y,
            offset: layout.offset.extend(0.0),
            vertical_shift: config.vertical_shift,
            vertical_scale: config.vertical_scale,
            material: config.material,
            clip,
            sides: decoration.contains(Decoration::SIDES),
            frame: decoration.contains(Decoration::FRAME),
            roughening: layout.roughening,
            depth: layout.depth,
            stats,
        }
    }
}

/// What an export produced.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub tile_count: usize,
    /// The raw height range over all tiles, `None` if no tile was produced.
    pub stats: Option<BlockStats>,
    /// Set if the export was cancelled before all tiles were produced.
    pub cancelled: bool,
}

impl ExportSummary {
    pub fn record(&mut self, tile: &TileDescriptor) {
        self.tile_count += 1;
        self.stats = Some(match self.stats {
            Some(stats) => stats.union(tile.stats),
            None => tile.stats,
        });
    }
}
