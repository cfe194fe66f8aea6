use crate::{
    assembly::{
        block::{BlockAssembler, TileRequest},
        stitch::{reconcile_ring_center, MIN_RING_BLOCKS},
        AssemblyContext, TileDescriptor,
    },
    config::TerrainConfig,
    math::Extent,
    result::TileResult,
    terrain_data::{grid_block::BlockLayout, Direction, GridBlock, GridSampler},
};
use glam::DVec2;
use itertools::iproduct;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// The position of a block in the ring, in block units from the center block, y pointing up.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RingCell {
    pub sx: i32,
    pub sy: i32,
}

impl RingCell {
    pub const CENTER: RingCell = RingCell { sx: 0, sy: 0 };

    pub fn new(sx: i32, sy: i32) -> Self {
        Self { sx, sy }
    }

    #[inline]
    pub fn dist2(&self) -> i32 {
        self.sx * self.sx + self.sy * self.sy
    }

    #[inline]
    pub fn is_center(&self) -> bool {
        *self == Self::CENTER
    }
}

/// All cells of a `size` x `size` ring, ordered by their distance to the center.
/// Cells at the same distance keep their raster order, top row first and left to right.
pub fn ring_cells(size: u32) -> Vec<RingCell> {
    let half = (size / 2) as i32;

    let mut cells: Vec<_> = iproduct!((-half..=half).rev(), -half..=half)
        .map(|(sy, sx)| RingCell::new(sx, sy))
        .collect();
    cells.sort_by_key(RingCell::dist2);

    cells
}

/// Places `ring_size`² equally sized blocks around a base extent.
///
/// The center block is sampled at the full base grid size, all other blocks are roughened.
#[derive(Clone, Debug)]
pub struct RingAssembler {
    config: TerrainConfig,
    base: Extent,
    assembler: BlockAssembler,
    cells: Vec<RingCell>,
}

impl RingAssembler {
    pub fn new(config: &TerrainConfig, base: Extent) -> TileResult<Self> {
        config.validate()?;

        Ok(Self {
            config: config.clone(),
            base,
            assembler: BlockAssembler::new(config),
            cells: ring_cells(config.ring_size),
        })
    }

    pub fn cells(&self) -> &[RingCell] {
        &self.cells
    }

    pub fn cell_index(&self, cell: RingCell) -> Option<usize> {
        self.cells.iter().position(|&other| other == cell)
    }

    /// The tile the cell at `index` of [`RingAssembler::cells`] is sampled from.
    pub fn request(&self, index: usize) -> TileRequest {
        let cell = self.cells[index];
        let offset = DVec2::new(cell.sx as f64, cell.sy as f64);

        let base_center = self.base.center();
        let extent = Extent::new(
            base_center + offset * self.base.size(),
            self.base.width(),
            self.base.height(),
            0.0,
        )
        .rotate(self.base.rotation(), Some(base_center));

        let plane_size = self.config.scene_size(&self.base);
        let roughening = if cell.is_center() {
            1
        } else {
            self.config.roughening
        };

        TileRequest {
            name: format!("ring_{}_{}", cell.sx, cell.sy),
            extent,
            layout: BlockLayout {
                plane_size,
                offset: plane_size * offset,
                roughening,
                depth: 0,
            },
        }
    }

    fn reconciles(&self) -> bool {
        self.config.reconcile_edges && self.cells.len() >= MIN_RING_BLOCKS
    }

    /// Streams the blocks of the ring, center first.
    pub fn blocks<'a, S: GridSampler>(
        self,
        sampler: S,
        context: AssemblyContext<'a>,
    ) -> RingBlocks<'a, S> {
        info!(
            "assembling a ring of {} blocks around {}",
            self.cells.len(),
            self.base.center()
        );

        RingBlocks {
            ring: self,
            sampler,
            context,
            next: 0,
            prefetched: HashMap::new(),
            stopped: false,
            cancelled: false,
        }
    }
}

/// The lazy sequence of ring tiles.
///
/// Every block is sampled when it is requested, except for the direct neighbors of the center,
/// which are sampled together with the center so its edges can be reconciled.
/// Production stops at the first error and whenever the context is cancelled.
pub struct RingBlocks<'a, S> {
    ring: RingAssembler,
    sampler: S,
    context: AssemblyContext<'a>,
    next: usize,
    prefetched: HashMap<usize, GridBlock>,
    stopped: bool,
    cancelled: bool,
}

impl<S: GridSampler> RingBlocks<'_, S> {
    /// Whether production stopped because the export was cancelled.
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    fn assemble(&self, index: usize) -> TileResult<GridBlock> {
        self.ring
            .assembler
            .assemble(&self.ring.request(index), &self.sampler)
    }

    fn produce(&mut self, index: usize) -> TileResult<GridBlock> {
        if let Some(block) = self.prefetched.remove(&index) {
            return Ok(block);
        }

        let mut block = self.assemble(index)?;

        if self.ring.cells[index].is_center() && self.ring.reconciles() {
            let mut neighbors = Vec::with_capacity(4);

            for direction in Direction::ALL {
                let (sx, sy) = direction.step();
                if let Some(neighbor) = self.ring.cell_index(RingCell::new(sx, sy)) {
                    neighbors.push((direction, neighbor, self.assemble(neighbor)?));
                }
            }

            let borrowed: Vec<_> = neighbors
                .iter()
                .map(|(direction, _, neighbor)| (*direction, neighbor))
                .collect();
            reconcile_ring_center(&mut block, &borrowed, self.ring.cells.len());

            self.prefetched.extend(
                neighbors
                    .into_iter()
                    .map(|(_, neighbor, neighbor_block)| (neighbor, neighbor_block)),
            );
        }

        Ok(block)
    }
}

impl<S: GridSampler> Iterator for RingBlocks<'_, S> {
    type Item = TileResult<TileDescriptor>;

    fn next(&mut self) -> Option<Self::Item> {
        let total = self.ring.cells.len();

        if self.stopped || self.next >= total {
            return None;
        }

        if self.context.is_cancelled() {
            warn!("export cancelled after {} of {total} blocks", self.next);
            self.stopped = true;
            self.cancelled = true;
            return None;
        }

        let index = self.next;

        match self.produce(index) {
            Ok(block) => {
                self.next += 1;
                self.context.report(self.next, total);
                debug!("produced ring block {index}");

                let name = self.ring.request(index).name;
                Some(Ok(TileDescriptor::from_block(
                    index,
                    name,
                    block,
                    &self.ring.config,
                )))
            }
            Err(error) => {
                self.stopped = true;
                Some(Err(error))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.ring.cells.len() - self.next))
    }
}
