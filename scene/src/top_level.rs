use bvh::{
    AgglomerativeBuilder, Aabb, Blas, Bounds, BuildConfig, Intersector, Primitive,
    PrimitiveFlags, Ray, Tlas,
};
use glam::{Mat4, Vec3};
use log::{debug, trace, warn};
use rayon::prelude::*;

use crate::{Instance, SceneError, SceneFlags};

/// What [`TopLevelBvh::set_mesh`] did with the new geometry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MeshUpdate {
    /// First geometry for this slot, a new hierarchy was built.
    Built,
    /// Same primitive count as before, bounds were refit in place.
    Refitted { bounds_changed: bool },
    /// The primitive count changed so the hierarchy was rebuilt.
    Rebuilt,
}

/// Two level acceleration structure: one bottom level hierarchy per mesh, instanced into the
/// world through a top level hierarchy that is rebuilt lazily by [`TopLevelBvh::finalize`].
///
/// Setters and `finalize` need exclusive access; queries only read and may run from any
/// number of threads once the structure is finalized.
#[derive(Debug, Clone)]
pub struct TopLevelBvh {
    trees: Vec<Option<Blas>>,
    instances: Vec<Option<Instance>>,
    planes: Vec<Primitive>,
    tlas: Tlas,
    flags: SceneFlags,
    config: BuildConfig,
}

impl Default for TopLevelBvh {
    fn default() -> Self {
        Self::new()
    }
}

impl TopLevelBvh {
    pub fn new() -> TopLevelBvh {
        Self::with_config(BuildConfig::default())
    }

    pub fn with_config(config: BuildConfig) -> TopLevelBvh {
        TopLevelBvh {
            trees: Vec::new(),
            instances: Vec::new(),
            planes: Vec::new(),
            tlas: Tlas::empty(),
            flags: SceneFlags::empty(),
            config,
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn mesh(&self, index: usize) -> Option<&Blas> {
        self.trees.get(index).and_then(|t| t.as_ref())
    }

    pub fn instance(&self, index: usize) -> Option<&Instance> {
        self.instances.get(index).and_then(|i| i.as_ref())
    }

    pub fn tlas(&self) -> &Tlas {
        &self.tlas
    }

    pub fn planes(&self) -> &[Primitive] {
        &self.planes
    }

    pub fn is_dirty(&self) -> bool {
        self.flags.contains(SceneFlags::DIRTY)
    }

    /// Builds the hierarchy of mesh slot `index` the first time, refits it afterwards. A refit
    /// or rebuild that moves the mesh bounds marks the top level dirty when an instance uses
    /// the mesh.
    pub fn set_mesh(
        &mut self,
        index: usize,
        primitives: &[Primitive],
    ) -> Result<MeshUpdate, SceneError> {
        if let Some(primitive) = primitives.iter().position(|p| !p.is_bounded()) {
            warn!("rejected mesh {}: primitive {} is unbounded", index, primitive);
            return Err(SceneError::UnboundedPrimitive {
                mesh: index,
                primitive,
            });
        }

        if self.trees.len() <= index {
            self.trees.resize_with(index + 1, || None);
        }

        let (update, bounds_changed) = match self.trees[index].as_mut() {
            None => {
                self.trees[index] = Some(Blas::construct(primitives.to_vec(), &self.config));
                (MeshUpdate::Built, false)
            }
            Some(tree) => {
                let before = tree.bounds();
                if tree.refit(primitives) {
                    let bounds_changed = tree.bounds() != before;
                    debug!("refit mesh {} (bounds changed: {})", index, bounds_changed);
                    (MeshUpdate::Refitted { bounds_changed }, bounds_changed)
                } else {
                    warn!(
                        "mesh {} changed from {} to {} primitives, rebuilding",
                        index,
                        tree.prim_count(),
                        primitives.len()
                    );
                    *tree = Blas::construct(primitives.to_vec(), &self.config);
                    (MeshUpdate::Rebuilt, tree.bounds() != before)
                }
            }
        };

        if bounds_changed && self.instances.iter().flatten().any(|i| i.mesh() == index) {
            self.flags.insert(SceneFlags::DIRTY);
        }

        Ok(update)
    }

    /// Places mesh `mesh` in the world as instance `index`. Unknown meshes and singular
    /// transforms are rejected without touching the current state.
    pub fn set_instance(
        &mut self,
        index: usize,
        mesh: usize,
        transform: Mat4,
    ) -> Result<(), SceneError> {
        let mesh_bounds = match self.mesh(mesh) {
            Some(tree) => tree.bounds(),
            None => {
                warn!("instance {} references unknown mesh {}", index, mesh);
                return Err(SceneError::MissingMesh { mesh });
            }
        };

        let instance = Instance::new(mesh, &mesh_bounds, transform)
            .ok_or(SceneError::SingularTransform { instance: index })?;

        if self.instances.len() <= index {
            self.instances.resize_with(index + 1, || None);
        }
        self.instances[index] = Some(instance);
        self.flags.insert(SceneFlags::DIRTY);
        Ok(())
    }

    pub fn remove_instance(&mut self, index: usize) -> Result<(), SceneError> {
        match self.instances.get_mut(index) {
            Some(slot) if slot.is_some() => {
                *slot = None;
                self.flags.insert(SceneFlags::DIRTY);
                Ok(())
            }
            _ => Err(SceneError::MissingInstance { instance: index }),
        }
    }

    /// Adds an infinite plane `dot(p, normal) + d == 0`. Planes are tested after the
    /// hierarchy and report hits without an instance. Returns the plane's index.
    pub fn add_plane(&mut self, normal: Vec3, d: f32, flags: PrimitiveFlags) -> usize {
        self.planes.push(Primitive::plane(normal, d).with_flags(flags));
        self.planes.len() - 1
    }

    /// Rebuilds the top level hierarchy when instances or their meshes changed. Returns
    /// whether a rebuild happened.
    pub fn finalize(&mut self) -> bool {
        if !self.is_dirty() {
            trace!("top level hierarchy is up to date");
            return false;
        }

        let instant = std::time::Instant::now();
        let trees = &self.trees;
        let mut leaves = Vec::with_capacity(self.instances.len());
        for (i, slot) in self.instances.iter_mut().enumerate() {
            if let Some(instance) = slot {
                if let Some(Some(tree)) = trees.get(instance.mesh()) {
                    instance.update_bounds(&tree.bounds());
                }
                leaves.push((i as u32, instance.bounds()));
            }
        }

        self.tlas = AgglomerativeBuilder.build(&leaves);
        self.flags.remove(SceneFlags::DIRTY);

        debug!(
            "built tlas over {} instances (depth {}) in {} ms",
            leaves.len(),
            self.tlas.depth(),
            instant.elapsed().as_millis()
        );
        true
    }

    /// Closest hit over every instance and plane. Sets `ray.instance` to the instance that was
    /// hit, or `None` for planes.
    pub fn intersect(&self, ray: &mut Ray) {
        debug_assert!(!self.is_dirty(), "finalize before tracing");

        let trees = &self.trees;
        let instances = &self.instances;
        self.tlas.traverse(ray, |i, ray| {
            if let Some((instance, tree)) = Self::resolve(trees, instances, i) {
                let mut local = instance.transform_ray(ray);
                tree.intersect(&mut local);
                if local.t < ray.t {
                    ray.t = local.t;
                    ray.u = local.u;
                    ray.v = local.v;
                    ray.primitive = local.primitive;
                    ray.instance = Some(i as u32);
                }
            }
            false
        });

        for (i, plane) in self.planes.iter().enumerate() {
            if let Some(hit) = plane.intersect(ray) {
                if hit.t < ray.t {
                    ray.t = hit.t;
                    ray.u = hit.u;
                    ray.v = hit.v;
                    ray.primitive = Some(i as u32);
                    ray.instance = None;
                }
            }
        }
    }

    /// True when something opaque lies strictly between the ray origin and `max_distance`.
    pub fn is_occluded(&self, ray: &Ray, max_distance: f32) -> bool {
        debug_assert!(!self.is_dirty(), "finalize before tracing");

        let blocked_by_plane = self
            .planes
            .iter()
            .filter(|p| !p.is_transparent())
            .filter_map(|p| p.intersect(ray))
            .any(|hit| hit.t < max_distance);
        if blocked_by_plane {
            return true;
        }

        let trees = &self.trees;
        let instances = &self.instances;
        let mut occluded = false;
        let mut shadow_ray = *ray;
        shadow_ray.t = max_distance;
        self.tlas.traverse(&mut shadow_ray, |i, ray| {
            if let Some((instance, tree)) = Self::resolve(trees, instances, i) {
                let local = instance.transform_ray(ray);
                occluded = tree.is_occluded(&local, max_distance);
            }
            occluded
        });

        occluded
    }

    /// Traces every ray in parallel.
    pub fn intersect_batch(&self, rays: &mut [Ray]) {
        rays.par_iter_mut().for_each(|ray| self.intersect(ray));
    }

    /// Occlusion for `(ray, max_distance)` pairs in parallel, results in input order.
    pub fn occluded_batch(&self, queries: &[(Ray, f32)]) -> Vec<bool> {
        queries
            .par_iter()
            .map(|(ray, max_distance)| self.is_occluded(ray, *max_distance))
            .collect()
    }

    #[inline(always)]
    fn resolve<'a>(
        trees: &'a [Option<Blas>],
        instances: &'a [Option<Instance>],
        index: usize,
    ) -> Option<(&'a Instance, &'a Blas)> {
        let instance = instances.get(index)?.as_ref()?;
        let tree = trees.get(instance.mesh())?.as_ref()?;
        Some((instance, tree))
    }
}

impl Bounds for TopLevelBvh {
    /// World bounds of every instance, planes excluded.
    fn bounds(&self) -> Aabb {
        self.tlas.bounds()
    }
}

impl Intersector for TopLevelBvh {
    fn intersect(&self, ray: &mut Ray) {
        TopLevelBvh::intersect(self, ray)
    }

    fn is_occluded(&self, ray: &Ray, max_distance: f32) -> bool {
        TopLevelBvh::is_occluded(self, ray, max_distance)
    }
}
