use glam::Vec3;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::aabb::Bounds;
use crate::bvh_node::*;
use crate::traversal::{traverse, NodeVisitor};
use crate::{
    Aabb, BinnedSplit, BuildConfig, BvhBuilder, ExhaustiveSplit, Primitive, Ray, SplitPlane,
    SplitStrategyKind, TopDownBuilder,
};

/// Bottom level hierarchy over the primitives of a single mesh, kept in mesh-local space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blas {
    /// Node pool of `2 * N` slots. The root is node 0 and children are allocated in pairs
    /// starting at slot 2, slot 1 stays unused.
    pub nodes: Vec<BvhNode>,
    pub prim_indices: Vec<u32>,
    pub centroids: Vec<Vec3>,
    pub primitives: Vec<Primitive>,
    pub root_centroid_bounds: Aabb,
    pub depth: u32,
    pub(crate) pool_ptr: usize,
}

impl Blas {
    /// Allocates the node pool and fills in the root, which covers every primitive.
    pub(crate) fn unbuilt(primitives: Vec<Primitive>) -> Blas {
        let count = primitives.len();
        let centroids: Vec<Vec3> = primitives.par_iter().map(|p| p.centroid()).collect();

        let mut bounds = Aabb::new();
        let mut root_centroid_bounds = Aabb::new();
        for (prim, centroid) in primitives.iter().zip(centroids.iter()) {
            bounds.grow_bb(&prim.bounds());
            root_centroid_bounds.grow(*centroid);
        }

        let mut nodes = vec![BvhNode::new(); (count * 2).max(2)];
        nodes[0] = BvhNode::leaf(bounds, 0, count as u32);

        Blas {
            nodes,
            prim_indices: (0..count as u32).collect(),
            centroids,
            primitives,
            root_centroid_bounds,
            depth: 1,
            pool_ptr: 2,
        }
    }

    pub fn construct(primitives: Vec<Primitive>, config: &BuildConfig) -> Blas {
        let instant = std::time::Instant::now();
        let prim_count = primitives.len();

        let tree = match config.strategy {
            SplitStrategyKind::Exhaustive => {
                TopDownBuilder::new(ExhaustiveSplit, config.max_depth).build(primitives)
            }
            SplitStrategyKind::Binned => {
                TopDownBuilder::new(BinnedSplit::new(config.bins), config.max_depth)
                    .build(primitives)
            }
        };

        debug!(
            "built blas over {} primitives ({} nodes, depth {}) in {} ms",
            prim_count,
            tree.node_count(),
            tree.depth,
            instant.elapsed().as_millis()
        );

        tree
    }

    pub fn prim_count(&self) -> usize {
        self.prim_indices.len()
    }

    /// Number of allocated nodes, the root included.
    pub fn node_count(&self) -> usize {
        1 + self.pool_ptr - 2
    }

    /// Partitions the index slots `start..start + count` so primitives whose centroid lies on the
    /// left of `plane` come first. Returns how many went left; order within a side is unspecified.
    pub fn reorder(&mut self, plane: &SplitPlane, start: usize, count: usize) -> usize {
        let mut i = start;
        for j in start..(start + count) {
            let centroid = self.centroids[self.prim_indices[j] as usize];
            if plane.to_left(centroid) {
                self.prim_indices.swap(i, j);
                i += 1;
            }
        }
        i - start
    }

    /// Recomputes every bound for moved primitives, keeping the split structure and the build
    /// time centroids. Returns false and leaves the tree untouched when the primitive count
    /// differs, that needs a full rebuild.
    pub fn refit(&mut self, primitives: &[Primitive]) -> bool {
        if primitives.len() != self.primitives.len() {
            return false;
        }
        self.primitives.copy_from_slice(primitives);

        // Children always come after their parent
        for i in (0..self.nodes.len()).rev() {
            let bounds = match self.nodes[i].kind {
                NodeKind::Unused => continue,
                NodeKind::Leaf { .. } => {
                    let mut aabb = Aabb::new();
                    if let Some(range) = self.nodes[i].primitive_range() {
                        for &prim_id in &self.prim_indices[range] {
                            aabb.grow_bb(&self.primitives[prim_id as usize].bounds());
                        }
                    }
                    aabb
                }
                NodeKind::Internal { left, .. } => {
                    let left = left as usize;
                    self.nodes[left].bounds.union_of(&self.nodes[left + 1].bounds)
                }
            };

            self.nodes[i].bounds = bounds;
        }

        true
    }

    /// Closest hit along `ray`, updating its `t`, barycentrics and primitive.
    #[inline(always)]
    pub fn intersect(&self, ray: &mut Ray) -> u32 {
        traverse(self.nodes.as_slice(), 0, &mut ClosestHit { tree: self }, ray)
    }

    /// True when a non transparent primitive lies strictly between the origin and `max_distance`.
    pub fn is_occluded(&self, ray: &Ray, max_distance: f32) -> bool {
        let mut shadow_ray = *ray;
        shadow_ray.t = max_distance;

        let mut visitor = AnyHit {
            tree: self,
            max_distance,
            occluded: false,
        };
        traverse(self.nodes.as_slice(), 0, &mut visitor, &mut shadow_ray);
        visitor.occluded
    }

    /// Closest hit distance and the number of nodes entered to find it.
    pub fn depth_test(&self, ray: Ray) -> (f32, u32) {
        let mut ray = ray;
        let visited = self.intersect(&mut ray);
        (ray.t, visited)
    }
}

impl Bounds for Blas {
    fn bounds(&self) -> Aabb {
        self.nodes[0].bounds
    }
}

struct ClosestHit<'a> {
    tree: &'a Blas,
}

impl<'a> NodeVisitor for ClosestHit<'a> {
    type Node = BvhNode;

    fn bounds(node: &BvhNode) -> Option<&Aabb> {
        if node.is_used() {
            Some(&node.bounds)
        } else {
            None
        }
    }

    fn children(node: &BvhNode) -> Option<(usize, usize)> {
        node.children()
    }

    fn left_is_near(&self, _: &[BvhNode], node: &BvhNode, ray: &Ray, _: Vec3) -> bool {
        node.left_is_near(ray)
    }

    fn visit_leaf(&mut self, node: &BvhNode, ray: &mut Ray) -> bool {
        if let Some(range) = node.primitive_range() {
            for &prim_id in &self.tree.prim_indices[range] {
                if let Some(hit) = self.tree.primitives[prim_id as usize].intersect(ray) {
                    if hit.t < ray.t {
                        ray.t = hit.t;
                        ray.u = hit.u;
                        ray.v = hit.v;
                        ray.primitive = Some(prim_id);
                    }
                }
            }
        }
        false
    }
}

struct AnyHit<'a> {
    tree: &'a Blas,
    max_distance: f32,
    occluded: bool,
}

impl<'a> NodeVisitor for AnyHit<'a> {
    type Node = BvhNode;

    fn bounds(node: &BvhNode) -> Option<&Aabb> {
        if node.is_used() {
            Some(&node.bounds)
        } else {
            None
        }
    }

    fn children(node: &BvhNode) -> Option<(usize, usize)> {
        node.children()
    }

    fn left_is_near(&self, _: &[BvhNode], node: &BvhNode, ray: &Ray, _: Vec3) -> bool {
        node.left_is_near(ray)
    }

    fn visit_leaf(&mut self, node: &BvhNode, ray: &mut Ray) -> bool {
        if let Some(range) = node.primitive_range() {
            for &prim_id in &self.tree.prim_indices[range] {
                let prim = &self.tree.primitives[prim_id as usize];
                if prim.is_transparent() {
                    continue;
                }

                if let Some(hit) = prim.intersect(ray) {
                    if hit.t > 0.0 && hit.t < self.max_distance {
                        self.occluded = true;
                        return true;
                    }
                }
            }
        }
        false
    }
}
