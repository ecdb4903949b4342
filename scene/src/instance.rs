use bvh::{Aabb, Bounds, Ray};
use glam::Mat4;
use serde::{Deserialize, Serialize};

/// Placement of a mesh in the world. The mesh hierarchy stays in mesh space; rays are moved
/// into it instead.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    mesh: usize,
    transform: Mat4,
    inverse: Mat4,
    bounds: Aabb,
}

impl Instance {
    /// `None` when `transform` cannot be inverted.
    pub fn new(mesh: usize, mesh_bounds: &Aabb, transform: Mat4) -> Option<Instance> {
        let determinant = transform.determinant();
        if determinant == 0.0 || !determinant.is_finite() {
            return None;
        }

        Some(Instance {
            mesh,
            transform,
            inverse: transform.inverse(),
            bounds: mesh_bounds.transformed(transform),
        })
    }

    pub fn mesh(&self) -> usize {
        self.mesh
    }

    /// Re-derives the world bounds after the mesh changed.
    pub fn update_bounds(&mut self, mesh_bounds: &Aabb) {
        self.bounds = mesh_bounds.transformed(self.transform);
    }

    /// The ray in mesh space. `t` keeps its meaning because the direction is not renormalized.
    #[inline(always)]
    pub fn transform_ray(&self, ray: &Ray) -> Ray {
        ray.transformed(&self.inverse)
    }
}

impl Bounds for Instance {
    fn bounds(&self) -> Aabb {
        self.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec3;

    #[test]
    fn world_bounds_follow_transform() {
        let local = Aabb::from((Vec3::splat(-1.0), Vec3::splat(1.0)));
        let transform =
            Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)) * Mat4::from_scale(Vec3::splat(2.0));
        let instance = Instance::new(0, &local, transform).unwrap();

        assert_eq!(
            instance.bounds(),
            Aabb::from((Vec3::new(8.0, -2.0, -2.0), Vec3::new(12.0, 2.0, 2.0)))
        );
    }

    #[test]
    fn ray_distance_is_preserved() {
        let local = Aabb::from((Vec3::splat(-1.0), Vec3::splat(1.0)));
        let transform =
            Mat4::from_translation(Vec3::new(0.0, 0.0, 10.0)) * Mat4::from_scale(Vec3::splat(2.0));
        let instance = Instance::new(0, &local, transform).unwrap();

        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        let local_ray = instance.transform_ray(&ray);
        assert_relative_eq!(local_ray.origin.z, -5.0);
        assert_relative_eq!(local_ray.direction.z, 0.5);

        let world_point = ray.at(8.0);
        let local_point = local_ray.at(8.0);
        assert_relative_eq!(transform.transform_point3(local_point).z, world_point.z);
    }

    #[test]
    fn singular_transform_is_rejected() {
        let local = Aabb::from((Vec3::splat(-1.0), Vec3::splat(1.0)));
        assert!(Instance::new(0, &local, Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0))).is_none());
    }
}
