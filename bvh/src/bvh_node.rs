use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{Aabb, Axis, Ray};

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Pool slot that was never allocated.
    Unused,
    Leaf { first: u32, count: u32 },
    /// Children live at `left` and `left + 1`.
    Internal { left: u32, axis: Axis },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BvhNode {
    pub bounds: Aabb,
    pub kind: NodeKind,
}

impl Display for BvhNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?}", self.bounds, self.kind)
    }
}

impl Default for BvhNode {
    fn default() -> Self {
        Self::new()
    }
}

impl BvhNode {
    pub fn new() -> BvhNode {
        BvhNode {
            bounds: Aabb::new(),
            kind: NodeKind::Unused,
        }
    }

    pub fn leaf(bounds: Aabb, first: u32, count: u32) -> BvhNode {
        BvhNode {
            bounds,
            kind: NodeKind::Leaf { first, count },
        }
    }

    #[inline(always)]
    pub fn is_used(&self) -> bool {
        self.kind != NodeKind::Unused
    }

    #[inline(always)]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    /// Primitive slots `first..first + count` for leaves.
    pub fn primitive_range(&self) -> Option<std::ops::Range<usize>> {
        match self.kind {
            NodeKind::Leaf { first, count } => {
                Some(first as usize..(first as usize + count as usize))
            }
            _ => None,
        }
    }

    #[inline(always)]
    pub fn children(&self) -> Option<(usize, usize)> {
        match self.kind {
            NodeKind::Internal { left, .. } => Some((left as usize, left as usize + 1)),
            _ => None,
        }
    }

    /// The left child holds the lower coordinates along the split axis, so it is near
    /// whenever the ray travels in the positive direction of that axis.
    #[inline(always)]
    pub fn left_is_near(&self, ray: &Ray) -> bool {
        match self.kind {
            NodeKind::Internal { axis, .. } => ray.direction[axis.index()] > 0.0,
            _ => true,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum TlasNodeKind {
    Leaf { instance: u32 },
    /// Children are explicit, merge order does not keep them adjacent.
    Internal { left: u32, right: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlasNode {
    pub bounds: Aabb,
    pub kind: TlasNodeKind,
    /// Height of the subtree below this node, leaves are 1.
    pub depth: u32,
}

impl TlasNode {
    pub fn leaf(bounds: Aabb, instance: u32) -> TlasNode {
        TlasNode {
            bounds,
            kind: TlasNodeKind::Leaf { instance },
            depth: 1,
        }
    }

    pub fn merged(nodes: &[TlasNode], left: usize, right: usize) -> TlasNode {
        TlasNode {
            bounds: nodes[left].bounds.union_of(&nodes[right].bounds),
            kind: TlasNodeKind::Internal {
                left: left as u32,
                right: right as u32,
            },
            depth: nodes[left].depth.max(nodes[right].depth) + 1,
        }
    }

    #[inline(always)]
    pub fn children(&self) -> Option<(usize, usize)> {
        match self.kind {
            TlasNodeKind::Internal { left, right } => Some((left as usize, right as usize)),
            TlasNodeKind::Leaf { .. } => None,
        }
    }

    /// Top level splits are not axis aligned, the child entered first is near. Ties favour the
    /// left child.
    pub fn left_is_near(&self, nodes: &[TlasNode], origin: Vec3, dir_inverse: Vec3) -> bool {
        match self.kind {
            TlasNodeKind::Internal { left, right } => {
                let l = nodes[left as usize].bounds.distance_inv(origin, dir_inverse);
                let r = nodes[right as usize].bounds.distance_inv(origin, dir_inverse);
                l <= r
            }
            TlasNodeKind::Leaf { .. } => true,
        }
    }

    pub fn instance(&self) -> Option<usize> {
        match self.kind {
            TlasNodeKind::Leaf { instance } => Some(instance as usize),
            TlasNodeKind::Internal { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn left_is_near_follows_direction() {
        let node = BvhNode {
            bounds: Aabb::new(),
            kind: NodeKind::Internal {
                left: 2,
                axis: Axis::Y,
            },
        };

        assert!(node.left_is_near(&Ray::new(Vec3::ZERO, Vec3::Y)));
        assert!(!node.left_is_near(&Ray::new(Vec3::ZERO, -Vec3::Y)));
        assert!(!node.left_is_near(&Ray::new(Vec3::ZERO, Vec3::X)));
        assert_eq!(node.children(), Some((2, 3)));
        assert!(node.primitive_range().is_none());
    }

    #[test]
    fn tlas_near_child_by_entry_distance() {
        let low = Aabb::from((Vec3::ZERO, Vec3::ONE));
        let high = Aabb::from((Vec3::new(4.0, 0.0, 0.0), Vec3::new(5.0, 1.0, 1.0)));
        let nodes = vec![TlasNode::leaf(low, 0), TlasNode::leaf(high, 1)];
        let parent = TlasNode::merged(&nodes, 0, 1);

        let origin = Vec3::new(-2.0, 0.5, 0.5);
        assert!(parent.left_is_near(&nodes, origin, Vec3::X.recip()));
        let origin = Vec3::new(8.0, 0.5, 0.5);
        assert!(!parent.left_is_near(&nodes, origin, (-Vec3::X).recip()));
        assert_eq!(parent.depth, 2);
    }

    #[test]
    fn leaf_range() {
        let node = BvhNode::leaf(Aabb::new(), 4, 3);
        assert!(node.is_leaf());
        assert!(node.is_used());
        assert_eq!(node.primitive_range(), Some(4..7));
        assert!(!BvhNode::new().is_used());
    }
}
