//! Removes cracks between adjacent blocks of different resolution.
//!
//! Finer blocks are always adjusted to match their coarser neighbor, never the other way around.

use crate::{
    result::{TileError, TileResult},
    terrain_data::{Direction, GridBlock, QuadId, Quadtree},
};
use glam::UVec2;
use ndarray::ArrayViewMut1;
use tracing::{debug, warn};

/// Ring reconciliation only runs once the center is surrounded by a full ring of blocks.
pub const MIN_RING_BLOCKS: usize = 9;

/// Replaces the samples between every `stride`th sample of `edge` by a linear interpolation
/// of the two enclosing aligned samples.
///
/// A trailing segment shorter than `stride` is left untouched.
pub fn stitch_edge_linear(mut edge: ArrayViewMut1<f32>, stride: usize) {
    if stride <= 1 || edge.is_empty() {
        return;
    }

    let last = edge.len() - 1;
    let mut start = 0;

    while start + stride <= last {
        let (z0, z1) = (edge[start], edge[start + stride]);

        for k in 1..stride {
            edge[start + k] = z0 + (z1 - z0) * k as f32 / stride as f32;
        }

        start += stride;
    }
}

/// The number of fine samples per coarse sample along a shared edge.
#[inline]
pub fn edge_stride(depth: u32, neighbor_depth: u32) -> usize {
    1 << depth.saturating_sub(neighbor_depth)
}

/// Every leaf edge that borders a coarser leaf, with the stride it has to be stitched with.
fn quad_stitches(tree: &Quadtree) -> Vec<(QuadId, Direction, usize)> {
    let mut stitches = Vec::new();

    for id in tree.quads() {
        let depth = tree.node(id).height();

        for (direction, neighbor) in Direction::ALL.into_iter().zip(tree.neighbors(id)) {
            let Some(neighbor) = neighbor else {
                continue;
            };

            let neighbor_depth = tree.node(neighbor).height();
            if neighbor_depth < depth {
                stitches.push((id, direction, edge_stride(depth, neighbor_depth)));
            }
        }
    }

    stitches
}

/// The number of cells along an edge of a `grid_size` block facing `direction`.
fn edge_cells(grid_size: UVec2, direction: Direction) -> u32 {
    match direction {
        Direction::Up | Direction::Down => grid_size.x.saturating_sub(1),
        Direction::Left | Direction::Right => grid_size.y.saturating_sub(1),
    }
}

/// The largest stride any leaf edge of `tree` is stitched with.
pub fn max_edge_stride(tree: &Quadtree) -> usize {
    quad_stitches(tree)
        .into_iter()
        .map(|(_, _, stride)| stride)
        .max()
        .unwrap_or(1)
}

/// Checks that leaves sampled with `grid_size` can be stitched without cracks.
///
/// Every coarse vertex along a shared edge has to coincide with a fine sample, so the cell
/// count of each stitched edge must be a multiple of its stride.
pub fn validate_quad_strides(tree: &Quadtree, grid_size: UVec2) -> TileResult<()> {
    for (id, direction, stride) in quad_stitches(tree) {
        let cells = edge_cells(grid_size, direction) as usize;

        if cells % stride != 0 {
            return Err(TileError::InvalidConfiguration(format!(
                "quad {} borders a neighbor {} levels coarser, which needs a multiple of {stride} \
                 cells per edge, but the grid size {grid_size} has {cells}",
                tree.coordinate(id),
                stride.trailing_zeros()
            )));
        }
    }

    Ok(())
}

/// Stitches every leaf block of `tree` to its coarser neighbors.
/// Requires the blocks of all leaves to be attached. Returns the number of stitched edges.
///
/// Edges whose cell count is not a multiple of the stride keep a crack, which is logged.
pub fn reconcile_quad_edges(tree: &mut Quadtree) -> usize {
    let stitches: Vec<_> = quad_stitches(tree)
        .into_iter()
        .filter(|&(id, _, _)| tree.block(id).is_some())
        .collect();

    for &(id, direction, stride) in &stitches {
        let name = tree.coordinate(id);

        if let Some(block) = tree.block_mut(id) {
            let edge = block.edge_mut(direction);

            let cells = edge.len().saturating_sub(1);

            if cells % stride != 0 {
                warn!(
                    "the {direction:?} edge of quad {name} has {cells} cells, which stride \
                     {stride} does not divide, so it keeps a crack"
                );
            }

            stitch_edge_linear(edge, stride);
        }
    }

    debug!("stitched {} quad edges", stitches.len());

    stitches.len()
}

/// Resamples the edge of `center` facing `direction` from the surface of `neighbor`.
///
/// Each boundary sample is moved to the world position of its grid point and replaced by the
/// bilinear value of the neighbor there.
pub fn stitch_edge_bilinear(center: &mut GridBlock, direction: Direction, neighbor: &GridBlock) {
    let Some(inverse) = neighbor.grid_transform().invert() else {
        return;
    };
    let transform = center.grid_transform();

    let (width, height) = (center.width(), center.height());
    let positions: Vec<(usize, usize)> = match direction {
        Direction::Up => (0..width).map(|col| (col, 0)).collect(),
        Direction::Down => (0..width).map(|col| (col, height - 1)).collect(),
        Direction::Left => (0..height).map(|row| (0, row)).collect(),
        Direction::Right => (0..height).map(|row| (width - 1, row)).collect(),
    };

    let values = center.values_mut();

    for (col, row) in positions {
        let world = transform.apply(col as f64 + 0.5, row as f64 + 0.5);
        let grid = inverse.apply(world.x, world.y) - 0.5;

        values[[row, col]] = neighbor.sample_grid(grid.x, grid.y);
    }
}

/// Stitches the center block of a ring to its four direct neighbors.
///
/// Neighbors are applied in the order given, so corner samples end up with the value of the
/// last neighbor touching them. Does nothing unless `block_count` reaches [`MIN_RING_BLOCKS`].
pub fn reconcile_ring_center(
    center: &mut GridBlock,
    neighbors: &[(Direction, &GridBlock)],
    block_count: usize,
) {
    if block_count < MIN_RING_BLOCKS {
        return;
    }

    for &(direction, neighbor) in neighbors {
        stitch_edge_bilinear(center, direction, neighbor);
    }

    debug!("stitched the ring center to {} neighbors", neighbors.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        math::{Extent, QuadRect},
        terrain_data::grid_block::BlockLayout,
    };
    use glam::DVec2;
    use ndarray::{array, Array1};

    fn plane_block(
        center: DVec2,
        size: f64,
        samples: usize,
        height: impl Fn(DVec2) -> f32,
    ) -> GridBlock {
        let extent = Extent::new(center, size, size, 0.0);
        let transform = extent.geotransform(samples, samples, true);
        let values = itertools::iproduct!(0..samples, 0..samples)
            .map(|(row, col)| height(transform.apply(col as f64 + 0.5, row as f64 + 0.5)))
            .collect();

        GridBlock::from_samples(extent, samples, samples, values, BlockLayout::default()).unwrap()
    }

    #[test]
    fn unit_stride_is_a_no_op() {
        let mut edge: Array1<f32> = array![3.0, -1.0, 8.0, 2.5];
        stitch_edge_linear(edge.view_mut(), 1);

        assert_eq!(edge, array![3.0, -1.0, 8.0, 2.5]);
    }

    #[test]
    fn stride_four_interpolates_between_aligned_samples() {
        let mut edge: Array1<f32> = array![10.0, 0.0, 0.0, 0.0, 30.0, 0.0, 0.0, 0.0, 50.0];
        stitch_edge_linear(edge.view_mut(), 4);

        assert_eq!(
            edge,
            array![10.0, 15.0, 20.0, 25.0, 30.0, 35.0, 40.0, 45.0, 50.0]
        );
    }

    #[test]
    fn trailing_partial_segment_is_left_alone() {
        let mut edge: Array1<f32> = array![0.0, 9.0, 2.0, 9.0];
        stitch_edge_linear(edge.view_mut(), 2);

        assert_eq!(edge, array![0.0, 1.0, 2.0, 9.0]);
    }

    #[test]
    fn stride_beyond_the_edge_leaves_it_untouched() {
        let mut edge: Array1<f32> = array![1.0, 7.0, 3.0];
        stitch_edge_linear(edge.view_mut(), 4);

        assert_eq!(edge, array![1.0, 7.0, 3.0]);
    }

    #[test]
    fn strides_have_to_divide_the_edge_cells() {
        // the deepest quads touch the coarse right half of the root
        let focus = QuadRect::from_point(DVec2::new(0.49, 0.7));
        let tree = Quadtree::build_focus(QuadRect::UNIT, focus, 4).unwrap();

        assert_eq!(max_edge_stride(&tree), 8);
        assert!(matches!(
            validate_quad_strides(&tree, UVec2::splat(5)),
            Err(TileError::InvalidConfiguration(_))
        ));
        assert!(validate_quad_strides(&tree, UVec2::splat(9)).is_ok());
        assert!(validate_quad_strides(&tree, UVec2::splat(17)).is_ok());
    }

    #[test]
    fn uniform_trees_need_no_stitching() {
        let focus = QuadRect::from_point(DVec2::splat(0.5));
        let tree = Quadtree::build_focus(QuadRect::UNIT, focus, 1).unwrap();

        assert_eq!(max_edge_stride(&tree), 1);
        assert!(validate_quad_strides(&tree, UVec2::splat(2)).is_ok());
    }

    #[test]
    fn fine_quads_follow_their_coarse_neighbors() {
        let focus = QuadRect::from_point(DVec2::new(0.1, 0.9));
        let mut tree = Quadtree::build_focus(QuadRect::UNIT, focus, 2).unwrap();

        for (index, id) in tree.quads().into_iter().enumerate() {
            let rect = *tree.node(id).rect();
            let extent = Extent::from_rect(rect, 0.0);
            let values = (0..25).map(|i| (i * 7 + index) as f32 % 11.0).collect();
            let block =
                GridBlock::from_samples(extent, 5, 5, values, BlockLayout::default()).unwrap();
            tree.attach_block(id, block);
        }

        let stitched = reconcile_quad_edges(&mut tree);
        assert!(stitched > 0);

        let fine = tree.quad_by_position(DVec2::new(0.375, 0.625)).unwrap();
        let edge = tree.block(fine).unwrap().edge(Direction::Right);

        // the right neighbor is one level coarser, so every second sample is interpolated
        assert_eq!(edge[1], (edge[0] + edge[2]) / 2.0);
        assert_eq!(edge[3], (edge[2] + edge[4]) / 2.0);
    }

    #[test]
    fn ring_center_edge_matches_the_neighbor_surface() {
        let slope = |point: DVec2| (2.0 * point.x + point.y) as f32;

        let mut center = plane_block(DVec2::ZERO, 10.0, 11, |_| 0.0);
        let right = plane_block(DVec2::new(10.0, 0.0), 10.0, 3, slope);

        reconcile_ring_center(&mut center, &[(Direction::Right, &right)], 9);

        let edge = center.edge(Direction::Right);
        for (row, value) in edge.into_iter().enumerate() {
            let expected = slope(DVec2::new(5.0, 5.0 - row as f64));
            assert!((value - expected).abs() < 1e-4, "{value} != {expected}");
        }
        assert_eq!(center.value(0, 5), 0.0);
    }

    #[test]
    fn small_rings_are_not_reconciled() {
        let mut center = plane_block(DVec2::ZERO, 10.0, 5, |_| 0.0);
        let up = plane_block(DVec2::new(0.0, 10.0), 10.0, 5, |_| 4.0);

        reconcile_ring_center(&mut center, &[(Direction::Up, &up)], 1);

        assert!(center.values().iter().all(|&value| value == 0.0));
    }
}
