use crate::{
    math::Extent,
    result::{TileError, TileResult},
    terrain_data::{grid_block::BlockLayout, BlockStats, GridBlock, QuadId, Quadtree},
};
use glam::DVec2;
use ndarray::{s, Array2};
use tracing::debug;

/// A rectangular arrangement of equally sized quads, listed row major with the top row first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DemQuadList {
    columns: usize,
    rows: usize,
    quads: Vec<QuadId>,
}

impl DemQuadList {
    pub fn new(columns: usize, rows: usize, quads: Vec<QuadId>) -> TileResult<Self> {
        if columns == 0 || rows == 0 || quads.len() != columns * rows {
            return Err(TileError::IncompatibleQuads(format!(
                "{} quads do not form a {columns}x{rows} arrangement",
                quads.len()
            )));
        }

        Ok(Self {
            columns,
            rows,
            quads,
        })
    }

    /// The deepest leaves touching the focus, if they form a complete rectangle of at least
    /// two quads.
    pub fn focus_cluster(tree: &Quadtree) -> Option<Self> {
        let max_height = tree.max_height();

        let mut cluster: Vec<_> = tree
            .quads()
            .into_iter()
            .filter(|&id| {
                let node = tree.node(id);
                node.height() == max_height && node.rect().intersects(tree.focus_rect())
            })
            .map(|id| (tree.coordinate(id), id))
            .collect();

        if cluster.len() < 2 {
            return None;
        }

        cluster.sort_by_key(|(coordinate, _)| (coordinate.y, coordinate.x));

        let (first, last) = (cluster[0].0, cluster[cluster.len() - 1].0);
        let min_x = cluster.iter().map(|(coordinate, _)| coordinate.x).min()?;
        let max_x = cluster.iter().map(|(coordinate, _)| coordinate.x).max()?;

        let columns = (max_x - min_x + 1) as usize;
        let rows = (last.y - first.y + 1) as usize;

        if cluster.len() != columns * rows {
            debug!("the focus quads do not form a rectangle, skipping the merge");
            return None;
        }

        let quads = cluster.into_iter().map(|(_, id)| id).collect();

        Self::new(columns, rows, quads).ok()
    }

    #[inline]
    pub fn columns(&self) -> usize {
        self.columns
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn quads(&self) -> &[QuadId] {
        &self.quads
    }

    pub fn contains(&self, id: QuadId) -> bool {
        self.quads.contains(&id)
    }

    /// Merges the blocks attached to the listed quads.
    pub fn merge(&self, tree: &Quadtree) -> TileResult<GridBlock> {
        let mut blocks = Vec::with_capacity(self.quads.len());

        for &id in &self.quads {
            let block = tree.block(id).ok_or_else(|| {
                TileError::IncompatibleQuads(format!("quad {} has no block", tree.coordinate(id)))
            })?;
            blocks.push(block);
        }

        merge_blocks(self.columns, self.rows, &blocks)
    }
}

/// Joins a `columns` x `rows` arrangement of blocks (row major, top row first) into one block.
///
/// Adjacent blocks share their boundary samples, so every block except those in the first
/// column or row contributes its samples without the shared first column or row.
pub fn merge_blocks(columns: usize, rows: usize, blocks: &[&GridBlock]) -> TileResult<GridBlock> {
    let (Some(first), Some(last)) = (blocks.first(), blocks.last()) else {
        return Err(TileError::IncompatibleQuads("no blocks to merge".to_string()));
    };

    if blocks.len() != columns * rows {
        return Err(TileError::IncompatibleQuads(format!(
            "{} blocks do not form a {columns}x{rows} arrangement",
            blocks.len()
        )));
    }

    let (width, height) = (first.width(), first.height());

    if let Some(block) = blocks
        .iter()
        .find(|block| block.width() != width || block.height() != height)
    {
        return Err(TileError::IncompatibleQuads(format!(
            "a {}x{} block can not be merged with {width}x{height} blocks",
            block.width(),
            block.height()
        )));
    }

    let merged_width = columns * (width - 1) + 1;
    let merged_height = rows * (height - 1) + 1;
    let mut values = Array2::zeros((merged_height, merged_width));

    for (index, block) in blocks.iter().enumerate() {
        let (column, row) = (index % columns, index / columns);
        let skip_col = usize::from(column > 0);
        let skip_row = usize::from(row > 0);

        let top = row * (height - 1) + skip_row;
        let left = column * (width - 1) + skip_col;

        values
            .slice_mut(s![top..top + height - skip_row, left..left + width - skip_col])
            .assign(&block.grid().slice(s![skip_row.., skip_col..]));
    }

    let stats = blocks
        .iter()
        .map(|block| block.stats())
        .reduce(BlockStats::union)
        .unwrap_or(first.stats());

    let arrangement = DVec2::new(columns as f64, rows as f64);
    let size = first.extent().size() * arrangement;
    let extent = Extent::new(
        (first.extent().center() + last.extent().center()) / 2.0,
        size.x,
        size.y,
        first.extent().rotation(),
    );

    let layout = BlockLayout {
        plane_size: first.layout().plane_size * arrangement,
        offset: (first.layout().offset + last.layout().offset) / 2.0,
        ..*first.layout()
    };

    let clip = first
        .clip()
        .map(|clip| clip.renormalized(first.extent(), &extent));

    debug!("merged {columns}x{rows} blocks into a {merged_width}x{merged_height} block");

    Ok(GridBlock::from_parts(
        extent,
        values,
        layout,
        stats,
        clip,
        first.decoration(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::block::{BlockAssembler, TileRequest},
        config::TerrainConfig,
        math::QuadRect,
        terrain_data::{ClipPolygon, ConstantSampler},
    };
    use glam::UVec2;
    use ndarray::array;

    fn uniform_block(center: DVec2, size: usize, value: f32) -> GridBlock {
        let extent = Extent::new(center, 1.0, 1.0, 0.0);
        let layout = BlockLayout {
            plane_size: DVec2::ONE,
            offset: center,
            ..Default::default()
        };

        GridBlock::from_samples(extent, size, size, vec![value; size * size], layout).unwrap()
    }

    #[test]
    fn two_by_two_blocks_share_their_boundaries() {
        let a = uniform_block(DVec2::new(-0.5, 0.5), 5, 1.0);
        let b = uniform_block(DVec2::new(0.5, 0.5), 5, 2.0);
        let c = uniform_block(DVec2::new(-0.5, -0.5), 5, 3.0);
        let d = uniform_block(DVec2::new(0.5, -0.5), 5, 4.0);

        let merged = merge_blocks(2, 2, &[&a, &b, &c, &d]).unwrap();

        assert_eq!((merged.width(), merged.height()), (9, 9));
        assert_eq!(merged.value(0, 0), 1.0);
        assert_eq!(merged.value(4, 0), 1.0);
        assert_eq!(merged.value(5, 0), 2.0);
        assert_eq!(merged.value(4, 5), 3.0);
        assert_eq!(merged.value(8, 8), 4.0);
        assert_eq!(merged.stats(), BlockStats { min: 1.0, max: 4.0 });

        assert_eq!(merged.extent().center(), DVec2::ZERO);
        assert_eq!(merged.extent().size(), DVec2::splat(2.0));
        assert_eq!(merged.layout().plane_size, DVec2::splat(2.0));
    }

    #[test]
    fn every_sample_comes_from_its_quad() {
        let blocks = [
            uniform_block(DVec2::new(-0.5, 0.5), 3, 0.0),
            uniform_block(DVec2::new(0.5, 0.5), 3, 1.0),
            uniform_block(DVec2::new(-0.5, -0.5), 3, 2.0),
            uniform_block(DVec2::new(0.5, -0.5), 3, 3.0),
        ];
        let blocks: Vec<_> = blocks.iter().collect();

        let merged = merge_blocks(2, 2, &blocks).unwrap();
        let expected: Array2<f32> = array![
            [0.0, 0.0, 0.0, 1.0, 1.0],
            [0.0, 0.0, 0.0, 1.0, 1.0],
            [0.0, 0.0, 0.0, 1.0, 1.0],
            [2.0, 2.0, 2.0, 3.0, 3.0],
            [2.0, 2.0, 2.0, 3.0, 3.0],
        ];

        assert_eq!(merged.grid(), &expected);
    }

    #[test]
    fn clip_is_renormalized_into_the_merged_block() {
        let base = Extent::new(DVec2::new(10.0, 10.0), 4.0, 4.0, 30.0);
        let normalized = vec![
            DVec2::new(0.25, 0.25),
            DVec2::new(0.75, 0.25),
            DVec2::new(0.5, 0.9),
        ];
        let world = normalized
            .iter()
            .map(|&point| base.denormalize_point(point))
            .collect();

        let config = TerrainConfig {
            base_grid_size: UVec2::splat(3),
            clip: Some(ClipPolygon::new(vec![world])),
            ..Default::default()
        };
        let assembler = BlockAssembler::new(&config);

        let blocks: Vec<_> = QuadRect::UNIT
            .quadrants()
            .iter()
            .map(|quadrant| {
                let request = TileRequest {
                    name: "quadrant".to_string(),
                    extent: base.subrectangle(quadrant),
                    layout: BlockLayout::default(),
                };
                assembler.assemble(&request, &ConstantSampler(1.0)).unwrap()
            })
            .collect();

        let assert_ring = |clip: &ClipPolygon, expected: &[DVec2]| {
            for (point, expected) in clip.rings[0].iter().zip(expected) {
                let distance = (*point - *expected).length();
                assert!(distance < 1e-9, "{point} != {expected}");
            }
        };

        // the top left block sees the polygon relative to its own quarter
        assert_ring(
            blocks[0].clip().unwrap(),
            &[
                DVec2::new(0.5, -0.5),
                DVec2::new(1.5, -0.5),
                DVec2::new(1.0, 0.8),
            ],
        );

        let blocks: Vec<_> = blocks.iter().collect();
        let merged = merge_blocks(2, 2, &blocks).unwrap();

        assert!((merged.extent().center() - base.center()).length() < 1e-9);
        assert!((merged.extent().size() - base.size()).length() < 1e-9);
        assert_ring(merged.clip().unwrap(), &normalized);
    }

    #[test]
    fn mismatched_blocks_are_rejected() {
        let a = uniform_block(DVec2::ZERO, 5, 1.0);
        let b = uniform_block(DVec2::X, 3, 1.0);

        assert!(matches!(
            merge_blocks(2, 1, &[&a, &b]),
            Err(TileError::IncompatibleQuads(_))
        ));
        assert!(matches!(
            merge_blocks(2, 2, &[&a, &a]),
            Err(TileError::IncompatibleQuads(_))
        ));
    }

    #[test]
    fn focus_cluster_selects_the_deepest_focus_quads() {
        // a focus point on the center of the root touches the four central leaves
        let focus = QuadRect::from_point(DVec2::splat(0.5));
        let tree = Quadtree::build_focus(QuadRect::UNIT, focus, 2).unwrap();
        let cluster = DemQuadList::focus_cluster(&tree).unwrap();

        assert_eq!((cluster.columns(), cluster.rows()), (2, 2));

        let coordinates: Vec<_> = cluster
            .quads()
            .iter()
            .map(|&id| tree.coordinate(id).to_string())
            .collect();
        assert_eq!(coordinates, ["2_1_1", "2_2_1", "2_1_2", "2_2_2"]);
    }

    #[test]
    fn single_focus_quad_is_not_merged() {
        let focus = QuadRect::from_point(DVec2::splat(0.1));
        let tree = Quadtree::build_focus(QuadRect::UNIT, focus, 3).unwrap();

        assert_eq!(DemQuadList::focus_cluster(&tree), None);
    }
}
