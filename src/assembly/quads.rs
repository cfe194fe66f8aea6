use crate::{
    assembly::{
        block::{BlockAssembler, TileRequest},
        merge::DemQuadList,
        stitch::{reconcile_quad_edges, validate_quad_strides},
        AssemblyContext, TileDescriptor,
    },
    config::TerrainConfig,
    math::{Extent, QuadRect},
    result::{TileError, TileResult},
    terrain_data::{grid_block::BlockLayout, GridBlock, GridSampler, QuadId, Quadtree},
};
use glam::DVec2;
use tracing::{debug, info, warn};

/// Samples the terrain densely around a focus area and coarsely everywhere else.
///
/// Edge reconciliation needs every leaf to be sampled, so assembly runs in two phases:
/// [`QuadtreeAssembler::materialize_quads`] samples all leaves, then
/// [`MaterializedQuads::reconcile_and_stream`] stitches them and hands them out one by one.
#[derive(Debug)]
pub struct QuadtreeAssembler {
    config: TerrainConfig,
    base: Extent,
    assembler: BlockAssembler,
    tree: Quadtree,
}

impl QuadtreeAssembler {
    /// Builds the quadtree for `base`. Fails without sampling anything if the configuration has
    /// no focus, the focus lies outside of `base` or the base grid cannot be stitched across
    /// the depth differences of the tree.
    pub fn new(config: &TerrainConfig, base: Extent) -> TileResult<Self> {
        config.validate()?;

        let focus = config.focus.as_ref().ok_or_else(|| {
            TileError::InvalidConfiguration("quadtree mode requires a focus area".to_string())
        })?;

        let tree = Quadtree::build_focus(
            QuadRect::UNIT,
            focus.normalized_rect(&base),
            focus.max_depth,
        )?;

        if config.reconcile_edges {
            validate_quad_strides(&tree, config.base_grid_size)?;
        }

        info!(
            "built a quadtree of depth {} with {} leaves",
            focus.max_depth,
            tree.quads().len()
        );

        Ok(Self {
            config: config.clone(),
            base,
            assembler: BlockAssembler::new(config),
            tree,
        })
    }

    pub fn tree(&self) -> &Quadtree {
        &self.tree
    }

    /// The tile a leaf is sampled from. All leaves share the base grid size,
    /// so finer leaves have a higher sample density.
    pub fn request(&self, id: QuadId) -> TileRequest {
        let node = self.tree.node(id);
        let rect = node.rect();
        let scene_size = self.config.scene_size(&self.base);

        TileRequest {
            name: self.tree.coordinate(id).to_string(),
            extent: self.base.subrectangle(rect),
            layout: BlockLayout {
                plane_size: scene_size * rect.size(),
                offset: (rect.center() - DVec2::splat(0.5)) * scene_size,
                roughening: 1,
                depth: node.height(),
            },
        }
    }

    /// Samples every leaf of the tree. Stops early, keeping the blocks sampled so far,
    /// if the context is cancelled.
    pub fn materialize_quads<S: GridSampler + ?Sized>(
        mut self,
        sampler: &S,
        context: &AssemblyContext,
    ) -> TileResult<MaterializedQuads> {
        let quads = self.tree.quads();
        let total = quads.len();
        let mut cancelled = false;

        for (done, id) in quads.into_iter().enumerate() {
            if context.is_cancelled() {
                warn!("export cancelled after sampling {done} of {total} quads");
                cancelled = true;
                break;
            }

            let block = self.assembler.assemble(&self.request(id), sampler)?;
            self.tree.attach_block(id, block);

            context.report(done + 1, total);
        }

        Ok(MaterializedQuads {
            config: self.config,
            tree: self.tree,
            cancelled,
        })
    }
}

/// A quadtree whose leaves carry their sampled blocks.
#[derive(Debug)]
pub struct MaterializedQuads {
    config: TerrainConfig,
    tree: Quadtree,
    cancelled: bool,
}

impl MaterializedQuads {
    pub fn tree(&self) -> &Quadtree {
        &self.tree
    }

    /// Whether sampling was cancelled, leaving some leaves without a block.
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    /// Reconciles the edges of all leaves, merges the focus cluster if requested and streams the
    /// resulting tiles, the merged tile first.
    pub fn reconcile_and_stream<'a>(
        mut self,
        context: AssemblyContext<'a>,
    ) -> TileResult<QuadBlocks<'a>> {
        if self.config.reconcile_edges {
            reconcile_quad_edges(&mut self.tree);
        }

        let mut merged = None;

        if self.config.merge_center && !self.cancelled {
            if let Some(cluster) = DemQuadList::focus_cluster(&self.tree) {
                let block = cluster.merge(&self.tree)?;
                debug!("merged {} focus quads into one tile", cluster.quads().len());
                merged = Some((cluster, block));
            }
        }

        let order = self
            .tree
            .quads()
            .into_iter()
            .filter(|&id| self.tree.block(id).is_some())
            .filter(|&id| {
                merged
                    .as_ref()
                    .map_or(true, |(cluster, _)| !cluster.contains(id))
            })
            .collect();

        Ok(QuadBlocks {
            config: self.config,
            tree: self.tree,
            merged: merged.map(|(_, block)| block),
            order,
            next: 0,
            index: 0,
            context,
            cancelled: self.cancelled,
        })
    }
}

/// The tiles of a reconciled quadtree.
pub struct QuadBlocks<'a> {
    config: TerrainConfig,
    tree: Quadtree,
    merged: Option<GridBlock>,
    order: Vec<QuadId>,
    next: usize,
    index: usize,
    context: AssemblyContext<'a>,
    cancelled: bool,
}

impl QuadBlocks<'_> {
    /// Whether the export was cancelled, either while sampling or while streaming.
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    fn emit(&mut self, name: String, block: GridBlock) -> TileDescriptor {
        let index = self.index;
        self.index += 1;

        TileDescriptor::from_block(index, name, block, &self.config)
    }
}

impl Iterator for QuadBlocks<'_> {
    type Item = TileDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        if self.merged.is_none() && self.next >= self.order.len() {
            return None;
        }

        if self.context.is_cancelled() {
            if !self.cancelled {
                warn!("export cancelled after {} tiles", self.index);
                self.cancelled = true;
            }
            return None;
        }

        if let Some(block) = self.merged.take() {
            return Some(self.emit("center".to_string(), block));
        }

        let id = self.order[self.next];
        self.next += 1;

        let block = self.tree.take_block(id)?;
        let name = self.tree.coordinate(id).to_string();

        Some(self.emit(name, block))
    }
}
