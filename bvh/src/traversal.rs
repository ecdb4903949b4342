use glam::Vec3;

use crate::{Aabb, Ray};

const INLINE_STACK_SIZE: usize = 64;

/// Hooks that specialise [`traverse`] for one node layout.
pub trait NodeVisitor {
    type Node;

    /// `None` for pool slots that were never allocated.
    fn bounds(node: &Self::Node) -> Option<&Aabb>;

    /// `(left, right)` for internal nodes, `None` for leaves.
    fn children(node: &Self::Node) -> Option<(usize, usize)>;

    /// `dir_inverse` is the reciprocal of `ray.direction`, computed once per traversal.
    fn left_is_near(
        &self,
        nodes: &[Self::Node],
        node: &Self::Node,
        ray: &Ray,
        dir_inverse: Vec3,
    ) -> bool;

    /// Tests a leaf against the ray. Returning `true` ends the traversal.
    fn visit_leaf(&mut self, node: &Self::Node, ray: &mut Ray) -> bool;
}

/// Array backed stack that only touches the heap for unusually deep trees.
struct TraversalStack {
    inline: [u32; INLINE_STACK_SIZE],
    len: usize,
    spill: Vec<u32>,
}

impl TraversalStack {
    fn new() -> Self {
        Self {
            inline: [0; INLINE_STACK_SIZE],
            len: 0,
            spill: Vec::new(),
        }
    }

    #[inline(always)]
    fn push(&mut self, value: usize) {
        if self.len < INLINE_STACK_SIZE {
            self.inline[self.len] = value as u32;
            self.len += 1;
        } else {
            self.spill.push(value as u32);
        }
    }

    #[inline(always)]
    fn pop(&mut self) -> Option<usize> {
        if let Some(value) = self.spill.pop() {
            return Some(value as usize);
        }

        if self.len == 0 {
            return None;
        }

        self.len -= 1;
        Some(self.inline[self.len] as usize)
    }
}

/// Stack based descent shared by both hierarchy levels. Nodes are skipped when unused, missed,
/// or no closer than the current `ray.t`; the near child is always popped before the far one.
///
/// Returns the number of nodes whose bounds were entered.
pub fn traverse<V: NodeVisitor>(
    nodes: &[V::Node],
    root: usize,
    visitor: &mut V,
    ray: &mut Ray,
) -> u32 {
    if root >= nodes.len() {
        return 0;
    }

    let dir_inverse = ray.direction.recip();
    let mut stack = TraversalStack::new();
    let mut visited = 0;
    stack.push(root);

    while let Some(index) = stack.pop() {
        let node = &nodes[index];
        let bounds = match V::bounds(node) {
            Some(bounds) => bounds,
            None => continue,
        };

        let distance = bounds.distance_inv(ray.origin, dir_inverse);
        if distance.is_infinite() || ray.t <= distance {
            continue;
        }
        visited += 1;

        match V::children(node) {
            Some((left, right)) => {
                let (near, far) = if visitor.left_is_near(nodes, node, ray, dir_inverse) {
                    (left, right)
                } else {
                    (right, left)
                };
                stack.push(far);
                stack.push(near);
            }
            None => {
                if visitor.visit_leaf(node, ray) {
                    break;
                }
            }
        }
    }

    visited
}
