use log::warn;

use crate::bvh_node::BvhNode;
use crate::{Aabb, Blas, BvhBuilder, NodeKind, Primitive, SplitResult, SplitStrategy};

/// Recursive SAH builder, generic over the split plane strategy.
pub struct TopDownBuilder<S: SplitStrategy> {
    strategy: S,
    max_depth: u32,
}

impl<S: SplitStrategy> TopDownBuilder<S> {
    pub fn new(strategy: S, max_depth: u32) -> Self {
        Self {
            strategy,
            max_depth: max_depth.max(1),
        }
    }

    fn subdivide(
        &self,
        tree: &mut Blas,
        index: usize,
        centroid_bounds: Aabb,
        depth: u32,
        truncated: &mut u32,
    ) {
        tree.depth = tree.depth.max(depth);
        let range = match tree.nodes[index].primitive_range() {
            Some(range) => range,
            None => return,
        };

        if depth >= self.max_depth {
            if range.len() > 1 {
                *truncated += 1;
            }
            return;
        }

        let split = match self.strategy.find_split(tree, index, &centroid_bounds) {
            Some(split) => split,
            None => return,
        };

        let left = Self::update_tree(tree, index, range.start as u32, range.len() as u32, &split);
        self.subdivide(tree, left, split.left_centroids, depth + 1, truncated);
        self.subdivide(tree, left + 1, split.right_centroids, depth + 1, truncated);
    }

    /// Reorders the node's primitive slots and turns it into an internal node over a fresh
    /// child pair. Returns the index of the left child.
    fn update_tree(
        tree: &mut Blas,
        index: usize,
        first: u32,
        count: u32,
        split: &SplitResult,
    ) -> usize {
        let left_count = tree.reorder(&split.plane, first as usize, count as usize) as u32;
        debug_assert_eq!(left_count, split.left_count);

        let left = tree.pool_ptr;
        tree.pool_ptr += 2;

        tree.nodes[left] = BvhNode::leaf(split.left, first, left_count);
        tree.nodes[left + 1] = BvhNode::leaf(split.right, first + left_count, count - left_count);
        tree.nodes[index].kind = NodeKind::Internal {
            left: left as u32,
            axis: split.plane.axis,
        };

        left
    }
}

impl<S: SplitStrategy> BvhBuilder for TopDownBuilder<S> {
    fn build(&self, primitives: Vec<Primitive>) -> Blas {
        let mut tree = Blas::unbuilt(primitives);
        let centroid_bounds = tree.root_centroid_bounds;

        let mut truncated = 0;
        self.subdivide(&mut tree, 0, centroid_bounds, 1, &mut truncated);
        if truncated > 0 {
            warn!(
                "{} nodes reached the depth limit of {} and were kept as leaves",
                truncated, self.max_depth
            );
        }

        tree
    }
}
