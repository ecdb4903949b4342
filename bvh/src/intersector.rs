use crate::aabb::Bounds;
use crate::{Aabb, Blas, Primitive, Ray};

/// Nearest hit and occlusion queries. Queries only read the structure so implementors are
/// shared freely between render threads.
pub trait Intersector: Bounds + Send + Sync {
    /// Updates `ray.t`, the barycentrics and the hit primitive when something closer than the
    /// current `ray.t` is found.
    fn intersect(&self, ray: &mut Ray);

    /// True when any non transparent primitive lies strictly between the origin and
    /// `max_distance`.
    fn is_occluded(&self, ray: &Ray, max_distance: f32) -> bool;
}

impl Intersector for Blas {
    fn intersect(&self, ray: &mut Ray) {
        Blas::intersect(self, ray);
    }

    fn is_occluded(&self, ray: &Ray, max_distance: f32) -> bool {
        Blas::is_occluded(self, ray, max_distance)
    }
}

/// Linear scan over every primitive. Reference answer for the hierarchies and good enough for
/// a handful of primitives.
#[derive(Debug, Clone, Default)]
pub struct BruteForce {
    primitives: Vec<Primitive>,
}

impl BruteForce {
    pub fn new(primitives: Vec<Primitive>) -> Self {
        Self { primitives }
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }
}

impl Bounds for BruteForce {
    fn bounds(&self) -> Aabb {
        let mut aabb = Aabb::new();
        for prim in self.primitives.iter().filter(|p| p.is_bounded()) {
            aabb.grow_bb(&prim.bounds());
        }
        aabb
    }
}

impl Intersector for BruteForce {
    fn intersect(&self, ray: &mut Ray) {
        for (i, prim) in self.primitives.iter().enumerate() {
            if let Some(hit) = prim.intersect(ray) {
                if hit.t < ray.t {
                    ray.t = hit.t;
                    ray.u = hit.u;
                    ray.v = hit.v;
                    ray.primitive = Some(i as u32);
                }
            }
        }
    }

    fn is_occluded(&self, ray: &Ray, max_distance: f32) -> bool {
        self.primitives
            .iter()
            .filter(|p| !p.is_transparent())
            .filter_map(|p| p.intersect(ray))
            .any(|hit| hit.t > 0.0 && hit.t < max_distance)
    }
}
