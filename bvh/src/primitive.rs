use bitflags::bitflags;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{Aabb, Bounds, Ray};

const EPSILON: f32 = 1e-4;

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct PrimitiveFlags: u8 {
        const LIGHT = 1 << 0;
        /// Counts for closest hits but never occludes.
        const TRANSPARENT = 1 << 1;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Triangle { v0: Vec3, v1: Vec3, v2: Vec3 },
    Sphere { center: Vec3, radius2: f32 },
    /// Points `p` with `dot(p, normal) + d == 0`.
    Plane { normal: Vec3, d: f32 },
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    pub shape: Shape,
    pub flags: PrimitiveFlags,
    pub mesh_index: u32,
    pub triangle_index: u32,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Hit {
    pub t: f32,
    pub u: f32,
    pub v: f32,
}

impl Hit {
    fn at(t: f32) -> Hit {
        Hit { t, u: 0.0, v: 0.0 }
    }
}

impl Primitive {
    pub fn triangle(v0: Vec3, v1: Vec3, v2: Vec3) -> Primitive {
        Self::from_shape(Shape::Triangle { v0, v1, v2 })
    }

    pub fn sphere(center: Vec3, radius: f32) -> Primitive {
        Self::from_shape(Shape::Sphere {
            center,
            radius2: radius * radius,
        })
    }

    pub fn plane(normal: Vec3, d: f32) -> Primitive {
        Self::from_shape(Shape::Plane { normal, d })
    }

    fn from_shape(shape: Shape) -> Primitive {
        Primitive {
            shape,
            flags: PrimitiveFlags::empty(),
            mesh_index: 0,
            triangle_index: 0,
        }
    }

    pub fn with_flags(mut self, flags: PrimitiveFlags) -> Primitive {
        self.flags = flags;
        self
    }

    pub fn is_triangle(&self) -> bool {
        matches!(self.shape, Shape::Triangle { .. })
    }

    pub fn is_sphere(&self) -> bool {
        matches!(self.shape, Shape::Sphere { .. })
    }

    pub fn is_plane(&self) -> bool {
        matches!(self.shape, Shape::Plane { .. })
    }

    pub fn is_light(&self) -> bool {
        self.flags.contains(PrimitiveFlags::LIGHT)
    }

    pub fn is_transparent(&self) -> bool {
        self.flags.contains(PrimitiveFlags::TRANSPARENT)
    }

    /// Planes extend forever and cannot live inside a hierarchy.
    pub fn is_bounded(&self) -> bool {
        !self.is_plane()
    }

    pub fn centroid(&self) -> Vec3 {
        match self.shape {
            Shape::Triangle { v0, v1, v2 } => (v0 + v1 + v2) / 3.0,
            Shape::Sphere { center, .. } => center,
            Shape::Plane { normal, d } => normal * -d,
        }
    }

    /// Closest intersection in front of the ray origin, ignoring the ray's current `t`.
    pub fn intersect(&self, ray: &Ray) -> Option<Hit> {
        match self.shape {
            Shape::Triangle { v0, v1, v2 } => intersect_triangle(v0, v1, v2, ray),
            Shape::Sphere { center, radius2 } => intersect_sphere(center, radius2, ray),
            Shape::Plane { normal, d } => intersect_plane(normal, d, ray),
        }
    }
}

impl Bounds for Primitive {
    fn bounds(&self) -> Aabb {
        match self.shape {
            Shape::Triangle { v0, v1, v2 } => Aabb::from_points(&[v0, v1, v2]),
            Shape::Sphere { center, radius2 } => {
                let radius = Vec3::splat(radius2.sqrt());
                Aabb::from((center - radius, center + radius))
            }
            Shape::Plane { .. } => Aabb::from((
                Vec3::splat(f32::NEG_INFINITY),
                Vec3::splat(f32::INFINITY),
            )),
        }
    }
}

// Möller–Trumbore
fn intersect_triangle(v0: Vec3, v1: Vec3, v2: Vec3, ray: &Ray) -> Option<Hit> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = ray.direction.cross(edge2);
    let a = edge1.dot(h);
    // Scale invariant, rays moved into scaled instances are not unit length
    if a.abs() <= EPSILON * ray.direction.length() * edge1.cross(edge2).length() {
        return None;
    }

    let f = 1.0 / a;
    let s = ray.origin - v0;
    let u = f * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * ray.direction.dot(q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);
    if t > EPSILON {
        Some(Hit { t, u, v })
    } else {
        None
    }
}

fn intersect_sphere(center: Vec3, radius2: f32, ray: &Ray) -> Option<Hit> {
    let oc = ray.origin - center;
    let a = ray.direction.dot(ray.direction);
    let b = 2.0 * oc.dot(ray.direction);
    let c = oc.dot(oc) - radius2;
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }

    let root = discriminant.sqrt();
    // Entry point first, exit point when the origin is inside
    let near = -b - root;
    if near > 0.0 {
        return Some(Hit::at(near / (2.0 * a)));
    }

    let far = -b + root;
    if far > 0.0 {
        return Some(Hit::at(far / (2.0 * a)));
    }

    None
}

fn intersect_plane(normal: Vec3, d: f32, ray: &Ray) -> Option<Hit> {
    let denom = ray.direction.dot(normal);
    if denom.abs() <= EPSILON * ray.direction.length() * normal.length() {
        return None;
    }

    let t = -(ray.origin.dot(normal) + d) / denom;
    if t <= EPSILON {
        return None;
    }

    Some(Hit::at(t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn centroid() {
        let triangle = Primitive::triangle(Vec3::ZERO, Vec3::ONE, Vec3::new(1.0, 0.0, 1.0));
        let c = triangle.centroid();
        assert_relative_eq!(c.x, 2.0 / 3.0);
        assert_relative_eq!(c.y, 1.0 / 3.0);
        assert_relative_eq!(c.z, 2.0 / 3.0);

        let sphere = Primitive::sphere(Vec3::new(1.0, 2.0, 3.0), 4.0);
        assert_eq!(sphere.centroid(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn bounds() {
        let triangle = Primitive::triangle(
            Vec3::new(0.0, 5.0, 1.0),
            Vec3::new(-1.0, 2.0, 3.0),
            Vec3::new(4.0, 0.0, 2.0),
        );
        let b = triangle.bounds();
        assert_eq!(b.min, Vec3::new(-1.0, 0.0, 1.0));
        assert_eq!(b.max, Vec3::new(4.0, 5.0, 3.0));

        let sphere = Primitive::sphere(Vec3::new(1.0, 0.0, 0.0), 2.0);
        let b = sphere.bounds();
        assert_eq!(b.min, Vec3::new(-1.0, -2.0, -2.0));
        assert_eq!(b.max, Vec3::new(3.0, 2.0, 2.0));
    }

    #[test]
    fn sphere_entry_is_exact() {
        let sphere = Primitive::sphere(Vec3::ZERO, 1.0);
        let ray = Ray::new(Vec3::new(0.0, 0.0, -2.0), Vec3::Z);
        let hit = sphere.intersect(&ray).unwrap();
        assert_eq!(hit.t, 1.0);
    }

    #[test]
    fn sphere_from_inside_hits_exit() {
        let sphere = Primitive::sphere(Vec3::ZERO, 1.0);
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert_relative_eq!(sphere.intersect(&ray).unwrap().t, 1.0);

        let behind = Ray::new(Vec3::new(0.0, 0.0, 3.0), Vec3::Z);
        assert!(sphere.intersect(&behind).is_none());

        let miss = Ray::new(Vec3::new(0.0, 2.0, -3.0), Vec3::Z);
        assert!(sphere.intersect(&miss).is_none());
    }

    #[test]
    fn triangle_hit_and_barycentrics() {
        let triangle = Primitive::triangle(Vec3::ZERO, Vec3::X, Vec3::Y);
        let ray = Ray::new(Vec3::new(0.25, 0.25, -1.0), Vec3::Z);
        let hit = triangle.intersect(&ray).unwrap();
        assert_relative_eq!(hit.t, 1.0);
        assert_relative_eq!(hit.u, 0.25);
        assert_relative_eq!(hit.v, 0.25);

        // Both windings hit
        let flipped = Primitive::triangle(Vec3::ZERO, Vec3::Y, Vec3::X);
        assert!(flipped.intersect(&ray).is_some());
    }

    #[test]
    fn triangle_hit_with_short_direction() {
        // Small triangle and short direction, as seen through a scaled instance
        let triangle = Primitive::triangle(
            Vec3::ZERO,
            Vec3::new(0.02, 0.0, 0.0),
            Vec3::new(0.0, 0.02, 0.0),
        );
        let ray = Ray::new(Vec3::new(0.005, 0.005, -0.05), Vec3::new(0.0, 0.0, 0.01));
        let hit = triangle.intersect(&ray).unwrap();
        assert_relative_eq!(hit.t, 5.0, max_relative = 1e-5);

        let degenerate = Primitive::triangle(Vec3::ZERO, Vec3::X, Vec3::X * 2.0);
        assert!(degenerate.intersect(&ray).is_none());
    }

    #[test]
    fn triangle_rejects() {
        let triangle = Primitive::triangle(Vec3::ZERO, Vec3::X, Vec3::Y);

        let parallel = Ray::new(Vec3::new(-1.0, 0.25, 0.0), Vec3::X);
        assert!(triangle.intersect(&parallel).is_none());

        let outside = Ray::new(Vec3::new(0.75, 0.75, -1.0), Vec3::Z);
        assert!(triangle.intersect(&outside).is_none());

        let behind = Ray::new(Vec3::new(0.25, 0.25, 1.0), Vec3::Z);
        assert!(triangle.intersect(&behind).is_none());
    }

    #[test]
    fn plane() {
        let ground = Primitive::plane(Vec3::Y, 1.0);
        let down = Ray::new(Vec3::new(0.0, 3.0, 0.0), -Vec3::Y);
        assert_relative_eq!(ground.intersect(&down).unwrap().t, 4.0);

        let parallel = Ray::new(Vec3::new(0.0, 3.0, 0.0), Vec3::X);
        assert!(ground.intersect(&parallel).is_none());

        let up = Ray::new(Vec3::new(0.0, 3.0, 0.0), Vec3::Y);
        assert!(ground.intersect(&up).is_none());
        assert!(!ground.is_bounded());
    }

    #[test]
    fn flags() {
        let p = Primitive::sphere(Vec3::ZERO, 1.0)
            .with_flags(PrimitiveFlags::TRANSPARENT | PrimitiveFlags::LIGHT);
        assert!(p.is_transparent());
        assert!(p.is_light());
        assert!(!Primitive::sphere(Vec3::ZERO, 1.0).is_transparent());
    }
}
