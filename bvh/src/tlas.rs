use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::aabb::Bounds;
use crate::traversal::{traverse, NodeVisitor};
use crate::{Aabb, Ray, TlasNode};

/// Top level hierarchy whose leaves reference instances. Built by
/// [`AgglomerativeBuilder`](crate::AgglomerativeBuilder), the root is the last node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tlas {
    pub nodes: Vec<TlasNode>,
}

impl Tlas {
    pub fn empty() -> Tlas {
        Tlas { nodes: Vec::new() }
    }

    pub fn root(&self) -> Option<usize> {
        self.nodes.len().checked_sub(1)
    }

    /// Height of the tree, 0 when empty.
    pub fn depth(&self) -> u32 {
        self.root().map_or(0, |root| self.nodes[root].depth)
    }

    /// Walks the tree near to far and calls `visit_instance` for every instance leaf the ray
    /// reaches before `ray.t`. The callback returns `true` to stop early.
    pub fn traverse<I>(&self, ray: &mut Ray, visit_instance: I) -> u32
    where
        I: FnMut(usize, &mut Ray) -> bool,
    {
        match self.root() {
            Some(root) => traverse(
                self.nodes.as_slice(),
                root,
                &mut InstanceVisitor { visit_instance },
                ray,
            ),
            None => 0,
        }
    }
}

impl Bounds for Tlas {
    fn bounds(&self) -> Aabb {
        self.root().map_or_else(Aabb::new, |root| self.nodes[root].bounds)
    }
}

struct InstanceVisitor<I> {
    visit_instance: I,
}

impl<I> NodeVisitor for InstanceVisitor<I>
where
    I: FnMut(usize, &mut Ray) -> bool,
{
    type Node = TlasNode;

    fn bounds(node: &TlasNode) -> Option<&Aabb> {
        Some(&node.bounds)
    }

    fn children(node: &TlasNode) -> Option<(usize, usize)> {
        node.children()
    }

    fn left_is_near(
        &self,
        nodes: &[TlasNode],
        node: &TlasNode,
        ray: &Ray,
        dir_inverse: Vec3,
    ) -> bool {
        node.left_is_near(nodes, ray.origin, dir_inverse)
    }

    fn visit_leaf(&mut self, node: &TlasNode, ray: &mut Ray) -> bool {
        match node.instance() {
            Some(instance) => (self.visit_instance)(instance, ray),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AgglomerativeBuilder;

    fn row_of_boxes(count: u32) -> Tlas {
        let leaves: Vec<(u32, Aabb)> = (0..count)
            .map(|i| {
                let min = Vec3::new(i as f32 * 3.0, 0.0, 0.0);
                (i, Aabb::from((min, min + Vec3::ONE)))
            })
            .collect();
        AgglomerativeBuilder.build(&leaves)
    }

    #[test]
    fn visits_instances_near_to_far() {
        let tlas = row_of_boxes(8);

        let mut order = Vec::new();
        let mut ray = Ray::new(Vec3::new(-5.0, 0.5, 0.5), Vec3::X);
        tlas.traverse(&mut ray, |instance, _| {
            order.push(instance);
            false
        });
        assert_eq!(order, (0..8).collect::<Vec<_>>());

        let mut order = Vec::new();
        let mut ray = Ray::new(Vec3::new(50.0, 0.5, 0.5), -Vec3::X);
        tlas.traverse(&mut ray, |instance, _| {
            order.push(instance);
            false
        });
        assert_eq!(order, (0..8).rev().collect::<Vec<_>>());
    }

    #[test]
    fn closer_hits_prune_far_instances() {
        let tlas = row_of_boxes(8);

        let mut visited = Vec::new();
        let mut ray = Ray::new(Vec3::new(-5.0, 0.5, 0.5), Vec3::X);
        tlas.traverse(&mut ray, |instance, ray| {
            visited.push(instance);
            // Pretend every instance is hit at its front face
            let t = 5.0 + instance as f32 * 3.0;
            if t < ray.t {
                ray.t = t;
            }
            false
        });
        assert_eq!(visited, vec![0]);
    }

    #[test]
    fn missing_ray_visits_nothing() {
        let tlas = row_of_boxes(4);
        let mut ray = Ray::new(Vec3::new(-5.0, 5.0, 0.5), Vec3::X);
        let visited = tlas.traverse(&mut ray, |_, _| panic!("no instance should be visited"));
        assert_eq!(visited, 0);
        assert_eq!(Tlas::empty().traverse(&mut ray, |_, _| true), 0);
    }

    #[test]
    fn early_exit() {
        let tlas = row_of_boxes(8);
        let mut count = 0;
        let mut ray = Ray::new(Vec3::new(-5.0, 0.5, 0.5), Vec3::X);
        tlas.traverse(&mut ray, |_, _| {
            count += 1;
            true
        });
        assert_eq!(count, 1);
    }
}
