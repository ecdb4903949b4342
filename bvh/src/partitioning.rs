use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{Aabb, Axis, Blas, Bounds};

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitPlane {
    pub axis: Axis,
    pub location: f32,
}

impl SplitPlane {
    pub fn new(axis: Axis, location: f32) -> Self {
        Self { axis, location }
    }

    /// Plane through `point` perpendicular to `axis`.
    pub fn through(axis: Axis, point: Vec3) -> Self {
        Self::new(axis, point[axis.index()])
    }

    /// Centroids on the plane go left.
    #[inline(always)]
    pub fn to_left(&self, centroid: Vec3) -> bool {
        centroid[self.axis.index()] <= self.location
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SplitResult {
    pub plane: SplitPlane,
    pub left: Aabb,
    pub right: Aabb,
    pub left_centroids: Aabb,
    pub right_centroids: Aabb,
    pub left_count: u32,
    pub right_count: u32,
}

impl SplitResult {
    /// `area(left) * left_count + area(right) * right_count`, an empty side adds nothing.
    pub fn sah(&self) -> f32 {
        let mut cost = 0.0;
        if self.left_count > 0 {
            cost += self.left.area() * self.left_count as f32;
        }
        if self.right_count > 0 {
            cost += self.right.area() * self.right_count as f32;
        }
        cost
    }

    pub fn separates(&self) -> bool {
        self.left_count > 0 && self.right_count > 0
    }
}

/// Partitions the primitives of leaf `node` by `plane` without moving them.
pub fn evaluate_split_plane(plane: SplitPlane, tree: &Blas, node: usize) -> SplitResult {
    let mut result = SplitResult {
        plane,
        left: Aabb::new(),
        right: Aabb::new(),
        left_centroids: Aabb::new(),
        right_centroids: Aabb::new(),
        left_count: 0,
        right_count: 0,
    };

    let range = match tree.nodes[node].primitive_range() {
        Some(range) => range,
        None => return result,
    };

    for &prim_id in &tree.prim_indices[range] {
        let prim_id = prim_id as usize;
        let centroid = tree.centroids[prim_id];
        let bounds = tree.primitives[prim_id].bounds();

        if plane.to_left(centroid) {
            result.left.grow_bb(&bounds);
            result.left_centroids.grow(centroid);
            result.left_count += 1;
        } else {
            result.right.grow_bb(&bounds);
            result.right_centroids.grow(centroid);
            result.right_count += 1;
        }
    }

    result
}

/// Cost of keeping `node` as a leaf.
pub fn leaf_cost(tree: &Blas, node: usize) -> f32 {
    let node = &tree.nodes[node];
    let count = node.primitive_range().map(|r| r.len()).unwrap_or(0);
    node.bounds.area() * count as f32
}

/// Proposes split planes for a leaf and picks the cheapest one.
pub trait SplitStrategy {
    /// Best split whose SAH cost is strictly lower than the leaf cost, `None` keeps the node a leaf.
    fn find_split(&self, tree: &Blas, node: usize, centroid_bounds: &Aabb) -> Option<SplitResult>;
}

fn best_of<I>(tree: &Blas, node: usize, planes: I) -> Option<SplitResult>
where
    I: IntoIterator<Item = SplitPlane>,
{
    let mut lowest_cost = leaf_cost(tree, node);
    let mut best = None;

    for plane in planes {
        let candidate = evaluate_split_plane(plane, tree, node);
        if !candidate.separates() {
            continue;
        }

        let cost = candidate.sah();
        if cost < lowest_cost {
            lowest_cost = cost;
            best = Some(candidate);
        }
    }

    best
}

/// Every centroid on every axis, optimal but quadratic per node.
#[derive(Debug, Copy, Clone, Default)]
pub struct ExhaustiveSplit;

impl ExhaustiveSplit {
    fn planes(tree: &Blas, node: usize) -> Vec<SplitPlane> {
        let range = match tree.nodes[node].primitive_range() {
            Some(range) => range,
            None => return Vec::new(),
        };

        let mut planes = Vec::with_capacity(range.len() * 3);
        for &prim_id in &tree.prim_indices[range] {
            let centroid = tree.centroids[prim_id as usize];
            for axis in Axis::ALL.iter() {
                planes.push(SplitPlane::through(*axis, centroid));
            }
        }
        planes
    }
}

impl SplitStrategy for ExhaustiveSplit {
    fn find_split(&self, tree: &Blas, node: usize, _centroid_bounds: &Aabb) -> Option<SplitResult> {
        best_of(tree, node, Self::planes(tree, node))
    }
}

/// Evenly spaced planes across the widest centroid axis.
#[derive(Debug, Copy, Clone)]
pub struct BinnedSplit {
    bins: u32,
}

impl BinnedSplit {
    pub fn new(bins: u32) -> Self {
        Self { bins: bins.max(2) }
    }
}

impl Default for BinnedSplit {
    fn default() -> Self {
        Self::new(crate::DEFAULT_BINS)
    }
}

impl SplitStrategy for BinnedSplit {
    fn find_split(&self, tree: &Blas, node: usize, centroid_bounds: &Aabb) -> Option<SplitResult> {
        let count = tree.nodes[node].primitive_range()?.len();
        if count < self.bins as usize {
            return best_of(tree, node, ExhaustiveSplit::planes(tree, node));
        }

        let axis = centroid_bounds.longest_axis();
        let extent = centroid_bounds.extend(axis);
        if !(extent > 0.0) {
            return None;
        }

        let start = centroid_bounds.min[axis.index()];
        let bin_size = extent / self.bins as f32;
        let planes = (1..self.bins).map(|i| SplitPlane::new(axis, start + bin_size * i as f32));
        best_of(tree, node, planes)
    }
}
