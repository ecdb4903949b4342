use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Sentinel distance of a ray that has not hit anything.
pub const MAX_DISTANCE: f32 = f32::MAX;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    /// Distance to the closest hit so far, [`MAX_DISTANCE`] on a miss.
    pub t: f32,
    /// Barycentric coordinates of the closest hit.
    pub u: f32,
    pub v: f32,
    pub alive: bool,
    /// Instance the closest hit belongs to, `None` for hits outside any instance.
    pub instance: Option<u32>,
    /// Index of the hit primitive within its mesh.
    pub primitive: Option<u32>,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Ray {
        Ray {
            origin,
            direction,
            t: MAX_DISTANCE,
            u: 0.0,
            v: 0.0,
            alive: true,
            instance: None,
            primitive: None,
        }
    }

    /// Clears hit information so the ray can be traced again.
    pub fn reset(&mut self) {
        self.t = MAX_DISTANCE;
        self.u = 0.0;
        self.v = 0.0;
        self.instance = None;
        self.primitive = None;
    }

    pub fn is_hit(&self) -> bool {
        self.t < MAX_DISTANCE
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Moves the ray into another space. The direction is not renormalized so distances along
    /// the ray stay comparable between both spaces.
    pub fn transformed(&self, transform: &Mat4) -> Ray {
        Ray {
            origin: transform.transform_point3(self.origin),
            direction: transform.transform_vector3(self.direction),
            ..*self
        }
    }
}

impl From<(Vec3, Vec3)> for Ray {
    fn from(v: (Vec3, Vec3)) -> Self {
        Ray::new(v.0, v.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn transformed_keeps_distances() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        let to_local = Mat4::from_scale(Vec3::splat(0.5)) * Mat4::from_translation(Vec3::X);
        let local = ray.transformed(&to_local);

        let world_point = ray.at(3.0);
        let local_point = local.at(3.0);
        assert_relative_eq!(to_local.transform_point3(world_point).z, local_point.z);
        assert_relative_eq!(to_local.transform_point3(world_point).x, local_point.x);
    }

    #[test]
    fn reset() {
        let mut ray = Ray::new(Vec3::ZERO, Vec3::X);
        ray.t = 2.0;
        ray.instance = Some(3);
        ray.primitive = Some(1);
        assert!(ray.is_hit());

        ray.reset();
        assert!(!ray.is_hit());
        assert_eq!(ray.instance, None);
        assert_eq!(ray.primitive, None);
    }
}
