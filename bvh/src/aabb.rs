use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::Ray;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

pub trait Bounds {
    fn bounds(&self) -> Aabb;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    #[inline(always)]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

impl Display for Aabb {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(min: ({}, {}, {}),  max: ({}, {}, {}))",
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z,
        )
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::new()
    }
}

impl Aabb {
    /// Empty box: growing it by anything yields exactly that thing.
    pub fn new() -> Aabb {
        Aabb {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    pub fn from_points(points: &[Vec3]) -> Aabb {
        let mut aabb = Aabb::new();
        for p in points {
            aabb.grow(*p);
        }
        aabb
    }

    /// True when any axis has `min > max`, this includes the box returned by [`Aabb::new`].
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn grow(&mut self, pos: Vec3) {
        self.min = self.min.min(pos);
        self.max = self.max.max(pos);
    }

    pub fn grow_bb(&mut self, aabb: &Aabb) {
        self.min = self.min.min(aabb.min);
        self.max = self.max.max(aabb.max);
    }

    pub fn union_of(&self, bb: &Self) -> Self {
        Self {
            min: self.min.min(bb.min),
            max: self.max.max(bb.max),
        }
    }

    pub fn contains(&self, bb: &Self) -> bool {
        bb.is_empty() || (self.min.cmple(bb.min).all() && self.max.cmpge(bb.max).all())
    }

    /// Full surface area `2 * (dx * dy + dx * dz + dy * dz)`, zero for empty boxes.
    pub fn area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }

        let e = self.lengths();
        2.0 * (e.x * e.y + e.x * e.z + e.y * e.z)
    }

    pub fn lengths(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn extend(&self, axis: Axis) -> f32 {
        self.max[axis.index()] - self.min[axis.index()]
    }

    pub fn longest_axis(&self) -> Axis {
        let mut a = Axis::X;
        if self.extend(Axis::Y) > self.extend(a) {
            a = Axis::Y;
        }
        if self.extend(Axis::Z) > self.extend(a) {
            a = Axis::Z;
        }
        a
    }

    pub fn all_corners(&self) -> [Vec3; 8] {
        let (min, max) = (self.min, self.max);
        [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, max.y, max.z),
        ]
    }

    /// Bounds of the eight transformed corners. Empty boxes stay empty.
    pub fn transformed(&self, transform: Mat4) -> Aabb {
        if self.is_empty() {
            return *self;
        }

        let mut transformed = Aabb::new();
        for corner in self.all_corners().iter() {
            transformed.grow(transform.transform_point3(*corner));
        }
        transformed
    }

    /// Entry distance of `ray` into this box, see [`Aabb::distance_inv`].
    pub fn distance(&self, ray: &Ray) -> f32 {
        self.distance_inv(ray.origin, ray.direction.recip())
    }

    /// Slab test with a precomputed reciprocal direction.
    ///
    /// Returns the distance at which the ray enters the box, `0.0` when the origin lies inside
    /// it and `f32::INFINITY` when the ray misses or the box lies entirely behind the origin.
    /// Touching a flat box counts as a hit.
    pub fn distance_inv(&self, origin: Vec3, dir_inverse: Vec3) -> f32 {
        if self.is_empty() {
            return f32::INFINITY;
        }

        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;

        for axis in 0..3 {
            let o = origin[axis];
            let inv = dir_inverse[axis];
            let (min, max) = (self.min[axis], self.max[axis]);

            if inv.is_infinite() {
                // Parallel to this slab
                if o < min || o > max {
                    return f32::INFINITY;
                }
                continue;
            }

            let t1 = (min - o) * inv;
            let t2 = (max - o) * inv;
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
        }

        if t_min > t_max || t_max < 0.0 {
            return f32::INFINITY;
        }

        t_min.max(0.0)
    }
}

impl From<(Vec3, Vec3)> for Aabb {
    fn from(v: (Vec3, Vec3)) -> Self {
        Aabb { min: v.0, max: v.1 }
    }
}

impl From<Aabb> for (Vec3, Vec3) {
    fn from(aabb: Aabb) -> Self {
        (aabb.min, aabb.max)
    }
}
