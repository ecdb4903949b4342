use crate::{Aabb, Tlas, TlasNode};

/// Bottom-up top level builder: repeatedly merges mutual nearest neighbours, measured by the
/// surface area of their union, until a single cluster remains.
#[derive(Debug, Copy, Clone, Default)]
pub struct AgglomerativeBuilder;

impl AgglomerativeBuilder {
    /// Builds over `(instance, world bounds)` leaves. Leaves keep their input order at the start
    /// of the node list, the root is the last node.
    pub fn build(&self, leaves: &[(u32, Aabb)]) -> Tlas {
        let mut nodes: Vec<TlasNode> = Vec::with_capacity((leaves.len() * 2).saturating_sub(1));
        nodes.extend(leaves.iter().map(|(instance, bounds)| TlasNode::leaf(*bounds, *instance)));

        let mut active: Vec<usize> = (0..nodes.len()).collect();
        if active.len() < 2 {
            return Tlas { nodes };
        }

        let mut a = 0;
        let mut b = Self::find_best_match(&nodes, &active, a);
        while active.len() > 1 {
            let c = Self::find_best_match(&nodes, &active, b);

            // Equal cost counts as mutual so the walk cannot cycle between ties
            if c == a || Self::cost(&nodes, &active, b, c) >= Self::cost(&nodes, &active, a, b) {
                let parent = TlasNode::merged(&nodes, active[a], active[b]);
                nodes.push(parent);

                active[a] = nodes.len() - 1;
                active.remove(b);

                a = 0;
                if active.len() > 1 {
                    b = Self::find_best_match(&nodes, &active, a);
                }
            } else {
                a = b;
                b = c;
            }
        }

        Tlas { nodes }
    }

    #[inline]
    fn cost(nodes: &[TlasNode], active: &[usize], a: usize, b: usize) -> f32 {
        nodes[active[a]]
            .bounds
            .union_of(&nodes[active[b]].bounds)
            .area()
    }

    /// Position in `active` whose union with `a` has the smallest surface area.
    fn find_best_match(nodes: &[TlasNode], active: &[usize], a: usize) -> usize {
        let mut smallest = f32::INFINITY;
        let mut best = if a == 0 { 1 } else { 0 };

        for b in 0..active.len() {
            if b == a {
                continue;
            }

            let cost = Self::cost(nodes, active, a, b);
            if cost < smallest {
                smallest = cost;
                best = b;
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aabb::Bounds;
    use crate::TlasNodeKind;
    use glam::Vec3;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn unit_box_at(x: f32, y: f32, z: f32) -> Aabb {
        let min = Vec3::new(x, y, z);
        Aabb::from((min, min + Vec3::ONE))
    }

    fn check_structure(tlas: &Tlas, leaves: &[(u32, Aabb)]) {
        let root = tlas.root().unwrap();
        let internal = tlas
            .nodes
            .iter()
            .filter(|n| n.children().is_some())
            .count();
        assert_eq!(internal, leaves.len() - 1);
        assert_eq!(tlas.nodes.len(), leaves.len() * 2 - 1);

        let mut expected = Aabb::new();
        for (_, b) in leaves {
            expected.grow_bb(b);
        }
        assert_eq!(tlas.bounds(), expected);

        // Every leaf reachable exactly once from the root
        let mut seen = vec![0; leaves.len()];
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            let node = &tlas.nodes[index];
            match node.kind {
                TlasNodeKind::Leaf { instance } => seen[instance as usize] += 1,
                TlasNodeKind::Internal { left, right } => {
                    let (l, r) = (&tlas.nodes[left as usize], &tlas.nodes[right as usize]);
                    assert!(node.bounds.contains(&l.bounds));
                    assert!(node.bounds.contains(&r.bounds));
                    assert_eq!(node.depth, l.depth.max(r.depth) + 1);
                    stack.push(left as usize);
                    stack.push(right as usize);
                }
            }
        }
        assert!(seen.iter().all(|&n| n == 1));
    }

    #[test]
    fn pairs_closest_clusters_first() {
        let leaves = vec![
            (0, unit_box_at(0.0, 0.0, 0.0)),
            (1, unit_box_at(100.0, 0.0, 0.0)),
            (2, unit_box_at(1.5, 0.0, 0.0)),
            (3, unit_box_at(101.5, 0.0, 0.0)),
        ];
        let tlas = AgglomerativeBuilder.build(&leaves);
        check_structure(&tlas, &leaves);

        let root = &tlas.nodes[tlas.root().unwrap()];
        let (left, right) = root.children().unwrap();
        let mut pairs = Vec::new();
        for child in [left, right].iter() {
            let (l, r) = tlas.nodes[*child].children().unwrap();
            let mut pair = vec![
                tlas.nodes[l].instance().unwrap(),
                tlas.nodes[r].instance().unwrap(),
            ];
            pair.sort();
            pairs.push(pair);
        }
        pairs.sort();
        assert_eq!(pairs, vec![vec![0, 2], vec![1, 3]]);
        assert_eq!(tlas.depth(), 3);
    }

    #[test]
    fn equal_costs_terminate() {
        let leaves: Vec<(u32, Aabb)> = (0..16).map(|i| (i, unit_box_at(0.0, 0.0, 0.0))).collect();
        let tlas = AgglomerativeBuilder.build(&leaves);
        check_structure(&tlas, &leaves);
    }

    #[test]
    fn random_clusters() {
        let mut rng = SmallRng::seed_from_u64(42);
        let leaves: Vec<(u32, Aabb)> = (0..100)
            .map(|i| {
                let x = rng.gen_range(-50.0..50.0);
                let y = rng.gen_range(-50.0..50.0);
                let z = rng.gen_range(-50.0..50.0);
                (i, unit_box_at(x, y, z))
            })
            .collect();

        let tlas = AgglomerativeBuilder.build(&leaves);
        check_structure(&tlas, &leaves);
    }

    #[test]
    fn tiny_inputs() {
        let empty = AgglomerativeBuilder.build(&[]);
        assert!(empty.root().is_none());
        assert_eq!(empty.depth(), 0);
        assert!(empty.bounds().is_empty());

        let single = AgglomerativeBuilder.build(&[(7, unit_box_at(1.0, 2.0, 3.0))]);
        assert_eq!(single.root(), Some(0));
        assert_eq!(single.nodes[0].instance(), Some(7));
        assert_eq!(single.depth(), 1);
    }
}
