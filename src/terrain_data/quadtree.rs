use crate::{
    config::MAX_QUAD_DEPTH,
    math::QuadRect,
    result::{TileError, TileResult},
    terrain_data::{Direction, GridBlock, QuadCoordinate},
};
use derive_more::derive::{Display, From};
use glam::DVec2;
use slab::Slab;

/// The index of a node inside of its [`Quadtree`].
#[derive(Copy, Clone, Debug, Display, From, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuadId(usize);

/// A node of the [`Quadtree`]. Nodes either have no children or exactly four.
#[derive(Debug)]
pub struct QuadNode {
    rect: QuadRect,
    location: usize,
    height: u32,
    parent: Option<QuadId>,
    children: Option<[QuadId; 4]>,
    block: Option<GridBlock>,
}

impl QuadNode {
    #[inline]
    pub fn rect(&self) -> &QuadRect {
        &self.rect
    }

    /// The quadrant index inside of the parent, `2 * row + col` with row 0 at the top.
    #[inline]
    pub fn location(&self) -> usize {
        self.location
    }

    /// The depth of the node, the root has height 0.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn parent(&self) -> Option<QuadId> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> Option<[QuadId; 4]> {
        self.children
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn block(&self) -> Option<&GridBlock> {
        self.block.as_ref()
    }
}

/// A quadtree that is subdivided down to `max_height` wherever it touches the focus rectangle.
///
/// All nodes live in an arena and reference each other by [`QuadId`].
/// The topology is fixed once the tree is built, only the sampled blocks of the leaves change.
#[derive(Debug)]
pub struct Quadtree {
    nodes: Slab<QuadNode>,
    root: QuadId,
    focus_rect: QuadRect,
    max_height: u32,
}

impl Quadtree {
    /// Builds the tree over `root_rect`, refining every node that intersects `focus_rect`
    /// until it reaches `max_height`.
    ///
    /// Fails if the focus does not touch the root rectangle, since nothing would be refined,
    /// or if `max_height` exceeds [`MAX_QUAD_DEPTH`].
    pub fn build_focus(
        root_rect: QuadRect,
        focus_rect: QuadRect,
        max_height: u32,
    ) -> TileResult<Self> {
        if max_height > MAX_QUAD_DEPTH {
            return Err(TileError::InvalidConfiguration(format!(
                "max depth {max_height} exceeds {MAX_QUAD_DEPTH}"
            )));
        }
        if !root_rect.intersects(&focus_rect) {
            return Err(TileError::InvalidConfiguration(format!(
                "the focus area {focus_rect:?} does not intersect the terrain {root_rect:?}"
            )));
        }

        let mut nodes = Slab::with_capacity(1 + 4 * max_height as usize);
        let root = QuadId(nodes.insert(QuadNode {
            rect: root_rect,
            location: 0,
            height: 0,
            parent: None,
            children: None,
            block: None,
        }));

        let mut tree = Self {
            nodes,
            root,
            focus_rect,
            max_height,
        };

        tree.subdivide_recursively(root);

        Ok(tree)
    }

    fn subdivide_recursively(&mut self, id: QuadId) {
        let node = &self.nodes[id.0];

        if self.max_height <= node.height || !node.rect.intersects(&self.focus_rect) {
            return;
        }

        let height = node.height + 1;
        let quadrants = node.rect.quadrants();

        let mut children = [id; 4];
        for (location, rect) in quadrants.into_iter().enumerate() {
            children[location] = QuadId(self.nodes.insert(QuadNode {
                rect,
                location,
                height,
                parent: Some(id),
                children: None,
                block: None,
            }));
        }

        self.nodes[id.0].children = Some(children);

        for child in children {
            self.subdivide_recursively(child);
        }
    }

    #[inline]
    pub fn root(&self) -> QuadId {
        self.root
    }

    #[inline]
    pub fn root_rect(&self) -> &QuadRect {
        &self.nodes[self.root.0].rect
    }

    #[inline]
    pub fn focus_rect(&self) -> &QuadRect {
        &self.focus_rect
    }

    #[inline]
    pub fn max_height(&self) -> u32 {
        self.max_height
    }

    pub fn node(&self, id: QuadId) -> &QuadNode {
        &self.nodes[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All leaves in depth first order, children visited in quadrant order.
    pub fn quads(&self) -> Vec<QuadId> {
        let mut quads = Vec::new();
        let mut stack = vec![self.root];

        while let Some(id) = stack.pop() {
            match self.nodes[id.0].children {
                Some(children) => stack.extend(children.into_iter().rev()),
                None => quads.push(id),
            }
        }

        quads
    }

    /// Finds the leaf containing `point`, or `None` if the point lies outside of the root.
    /// Points on a split line belong to the right or bottom quadrant.
    pub fn quad_by_position(&self, point: DVec2) -> Option<QuadId> {
        if !self.root_rect().contains(point) {
            return None;
        }

        let mut id = self.root;

        while let Some(children) = self.nodes[id.0].children {
            let center = self.nodes[id.0].rect.center();
            let col = usize::from(point.x >= center.x);
            let row = usize::from(point.y <= center.y);

            id = children[2 * row + col];
        }

        Some(id)
    }

    /// The leaves adjacent to `id` in the order up, left, right, down.
    ///
    /// Each neighbor is found by probing just outside of the edge midpoint, so at most one
    /// neighbor per direction is reported, even if several finer leaves share that edge.
    /// The root has no neighbors.
    pub fn neighbors(&self, id: QuadId) -> [Option<QuadId>; 4] {
        let node = &self.nodes[id.0];

        if node.parent.is_none() {
            return [None; 4];
        }

        let rect = node.rect;
        let center = rect.center();
        let delta = rect.size() * 0.5f64.powi(self.max_height as i32);

        Direction::ALL.map(|direction| {
            let position = match direction {
                Direction::Up => DVec2::new(center.x, rect.max.y + delta.y),
                Direction::Left => DVec2::new(rect.min.x - delta.x, center.y),
                Direction::Right => DVec2::new(rect.max.x + delta.x, center.y),
                Direction::Down => DVec2::new(center.x, rect.min.y - delta.y),
            };

            self.quad_by_position(position)
        })
    }

    /// The grid position of a node within its level, row 0 at the top of the root.
    pub fn coordinate(&self, id: QuadId) -> QuadCoordinate {
        let node = &self.nodes[id.0];
        let count = (1u64 << node.height) as f64;
        let relative = self.root_rect().relative(&node.rect);

        QuadCoordinate::new(
            node.height,
            (relative.min.x * count).round() as u32,
            ((1.0 - relative.max.y) * count).round() as u32,
        )
    }

    pub fn attach_block(&mut self, id: QuadId, block: GridBlock) {
        self.nodes[id.0].block = Some(block);
    }

    pub fn block(&self, id: QuadId) -> Option<&GridBlock> {
        self.nodes[id.0].block.as_ref()
    }

    pub(crate) fn block_mut(&mut self, id: QuadId) -> Option<&mut GridBlock> {
        self.nodes[id.0].block.as_mut()
    }

    pub fn take_block(&mut self, id: QuadId) -> Option<GridBlock> {
        self.nodes[id.0].block.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn unit_tree(focus: QuadRect, max_height: u32) -> Quadtree {
        Quadtree::build_focus(QuadRect::UNIT, focus, max_height).unwrap()
    }

    fn random_focus(rng: &mut StdRng) -> QuadRect {
        let a = DVec2::new(rng.random_range(0.0..1.0), rng.random_range(0.0..1.0));
        let b = DVec2::new(rng.random_range(0.0..1.0), rng.random_range(0.0..1.0));
        QuadRect::new(a, b)
    }

    #[test]
    fn leaves_partition_the_root() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..20 {
            let tree = unit_tree(random_focus(&mut rng), rng.random_range(0..6));
            let quads = tree.quads();

            let area: f64 = quads.iter().map(|&id| tree.node(id).rect().area()).sum();
            assert!((area - 1.0).abs() < 1e-12);

            let samples = 61;
            for (i, j) in itertools::iproduct!(0..samples, 0..samples) {
                let point = DVec2::new(
                    (i as f64 + 0.37) / samples as f64,
                    (j as f64 + 0.61) / samples as f64,
                );

                let containing = quads
                    .iter()
                    .filter(|&&id| tree.node(id).rect().contains(point))
                    .count();
                assert_eq!(containing, 1);

                let found = tree.quad_by_position(point).unwrap();
                assert!(tree.node(found).rect().contains(point));
            }
        }
    }

    #[test]
    fn leaves_respect_the_depth_bound() {
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..20 {
            let focus = random_focus(&mut rng);
            let max_height = rng.random_range(0..6);
            let tree = unit_tree(focus, max_height);

            for id in tree.quads() {
                let node = tree.node(id);

                assert!(node.height() <= max_height);
                if node.rect().intersects(&focus) {
                    assert_eq!(node.height(), max_height);
                }
            }
        }
    }

    #[test]
    fn children_partition_their_parent() {
        let tree = unit_tree(QuadRect::from_point(DVec2::new(0.3, 0.8)), 4);

        for key in 0..tree.node_count() {
            let node = tree.node(QuadId(key));

            if let Some(children) = node.children() {
                for (location, child) in children.into_iter().enumerate() {
                    let child = tree.node(child);
                    assert_eq!(child.height(), node.height() + 1);
                    assert_eq!(child.location(), location);
                    assert_eq!(child.parent(), Some(QuadId(key)));
                    assert_eq!(*child.rect(), node.rect().quadrants()[location]);
                }
            }
        }
    }

    #[test]
    fn focus_outside_of_root_is_rejected() {
        let focus = QuadRect::new(DVec2::new(2.0, 2.0), DVec2::new(3.0, 3.0));

        assert!(matches!(
            Quadtree::build_focus(QuadRect::UNIT, focus, 3),
            Err(TileError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn excessive_height_is_rejected() {
        let focus = QuadRect::from_point(DVec2::splat(0.5));

        assert!(matches!(
            Quadtree::build_focus(QuadRect::UNIT, focus, 64),
            Err(TileError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            Quadtree::build_focus(QuadRect::UNIT, focus, MAX_QUAD_DEPTH + 1),
            Err(TileError::InvalidConfiguration(_))
        ));

        let deepest = unit_tree(focus, MAX_QUAD_DEPTH);
        let leaf = deepest.quad_by_position(DVec2::splat(0.5)).unwrap();
        assert_eq!(deepest.coordinate(leaf).to_string(), "16_32768_32768");
    }

    #[test]
    fn zero_height_tree_is_a_single_leaf() {
        let tree = unit_tree(QuadRect::UNIT, 0);

        assert_eq!(tree.quads(), vec![tree.root()]);
        assert_eq!(tree.neighbors(tree.root()), [None; 4]);
    }

    #[test]
    fn quad_by_position_picks_top_row_first() {
        let tree = unit_tree(QuadRect::UNIT, 1);
        let location = |point: DVec2| tree.node(tree.quad_by_position(point).unwrap()).location();

        assert_eq!(location(DVec2::new(0.25, 0.75)), 0);
        assert_eq!(location(DVec2::new(0.75, 0.75)), 1);
        assert_eq!(location(DVec2::new(0.25, 0.25)), 2);
        assert_eq!(location(DVec2::new(0.75, 0.25)), 3);
        assert_eq!(tree.quad_by_position(DVec2::new(1.5, 0.5)), None);
    }

    #[test]
    fn neighbors_find_coarser_and_finer_leaves() {
        // focus on the top left corner, so the top left quadrant is refined twice
        let tree = unit_tree(QuadRect::from_point(DVec2::new(0.1, 0.9)), 2);

        let fine = tree.quad_by_position(DVec2::new(0.375, 0.625)).unwrap();
        assert_eq!(tree.node(fine).height(), 2);

        let [up, left, right, down] = tree.neighbors(fine);
        let height = |id: Option<QuadId>| id.map(|id| tree.node(id).height());

        assert_eq!(height(up), Some(2));
        assert_eq!(height(left), Some(2));
        assert_eq!(height(right), Some(1));
        assert_eq!(height(down), Some(1));

        let coarse = tree.quad_by_position(DVec2::new(0.75, 0.75)).unwrap();
        let [up, left, _, _] = tree.neighbors(coarse);

        assert_eq!(up, None);
        assert_eq!(height(left), Some(2));
    }

    #[test]
    fn coordinates_count_rows_from_the_top() {
        let tree = unit_tree(QuadRect::from_point(DVec2::new(0.9, 0.1)), 2);
        let id = tree.quad_by_position(DVec2::new(0.9, 0.1)).unwrap();

        assert_eq!(tree.coordinate(id), QuadCoordinate::new(2, 3, 3));
    }
}
