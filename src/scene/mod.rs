use std::sync::Arc;
use crate::{Bounds3f, Ray, Float, Transform, Transformable};
use crate::bvh::{Accelerator, BVH, LinearAccel, Primitives, SplitMethod};
use crate::interaction::SurfaceInteraction;
use crate::shapes::Shape;
use crate::material::Material;
use crate::light::{Light, LightFlags, DiffuseAreaLight};
use crate::medium::Medium;
use crate::spectrum::Spectrum;
use cgmath::InnerSpace;
use tracing::info;

/// Upper bound on the pass-through surfaces a single ray may cross before it is given up on.
pub const MAX_NULL_CROSSINGS: usize = 64;

/// Index of an entity in its scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntityId(pub usize);

/// Something placed in the scene. Any combination of capabilities may be present: a shape with
/// a material is visible, a shape without one is a pass-through boundary (for a medium, say),
/// and a light without a shape is a point, distant or environment emitter.
pub struct Entity {
    pub object_to_world: Transform,
    pub world_to_object: Transform,
    pub shape: Option<Arc<dyn Shape>>,
    pub material: Option<Arc<dyn Material>>,
    pub light: Option<Arc<dyn Light>>,
    pub medium: Option<Arc<dyn Medium>>,
}

impl Entity {
    pub fn new(object_to_world: Transform) -> Self {
        Self {
            object_to_world,
            world_to_object: object_to_world.inverse(),
            shape: None,
            material: None,
            light: None,
            medium: None,
        }
    }

    /// A light with no geometry of its own.
    pub fn light(light: impl Light + 'static) -> Self {
        Self::new(Transform::identity()).with_light(Arc::new(light))
    }

    /// A shape that emits `emit` from its front side.
    pub fn area_light(object_to_world: Transform, shape: Arc<dyn Shape>, emit: Spectrum) -> Self {
        let light = DiffuseAreaLight::new(emit, shape.clone(), object_to_world);
        Self::new(object_to_world)
            .with_shape(shape)
            .with_light(Arc::new(light))
    }

    pub fn with_shape(mut self, shape: Arc<dyn Shape>) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn with_material(mut self, material: Arc<dyn Material>) -> Self {
        self.material = Some(material);
        self
    }

    pub fn with_light(mut self, light: Arc<dyn Light>) -> Self {
        self.light = Some(light);
        self
    }

    pub fn with_medium(mut self, medium: Arc<dyn Medium>) -> Self {
        self.medium = Some(medium);
        self
    }

    pub fn is_visible(&self) -> bool {
        self.shape.is_some() && self.material.is_some()
    }

    pub fn world_bound(&self, prim: usize) -> Option<Bounds3f> {
        self.shape.as_ref().map(|s| s.object_bound(prim).transform(self.object_to_world))
    }
}

#[derive(Clone, Copy, Debug)]
struct PrimitiveRef {
    entity: EntityId,
    prim: usize,
    bounds: Bounds3f,
}

/// Every sub-primitive of every entity with a shape, flattened for the accelerator.
struct ScenePrimitives {
    entities: Vec<Entity>,
    refs: Vec<PrimitiveRef>,
}

impl ScenePrimitives {
    fn new(entities: Vec<Entity>) -> Self {
        let mut refs = Vec::new();
        for (i, entity) in entities.iter().enumerate() {
            if let Some(shape) = &entity.shape {
                for prim in 0..shape.primitive_count() {
                    let bounds = shape.object_bound(prim).transform(entity.object_to_world);
                    refs.push(PrimitiveRef { entity: EntityId(i), prim, bounds });
                }
            }
        }
        Self { entities, refs }
    }
}

impl Primitives for ScenePrimitives {
    fn count(&self) -> usize {
        self.refs.len()
    }

    fn bounds(&self, idx: usize) -> Bounds3f {
        self.refs[idx].bounds
    }

    fn intersect(&self, idx: usize, ray: &Ray) -> Option<SurfaceInteraction> {
        let r = self.refs[idx];
        let entity = &self.entities[r.entity.0];
        let shape = entity.shape.as_ref()?;

        let local_ray = ray.transform(entity.world_to_object);
        let si = shape.intersect(r.prim, &local_ray)?;
        let mut si = si.transform(entity.object_to_world);
        si.entity = Some(r.entity);
        si.prim_index = r.prim;
        Some(si)
    }

    fn intersect_test(&self, idx: usize, ray: &Ray) -> bool {
        let r = self.refs[idx];
        let entity = &self.entities[r.entity.0];
        match &entity.shape {
            Some(shape) => shape.intersect_test(r.prim, &ray.transform(entity.world_to_object)),
            None => false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AcceleratorKind {
    Bvh(SplitMethod),
    Linear,
}

/// The immutable collection of entities being rendered, with the accelerator built over their
/// shapes.
pub struct Scene {
    prims: ScenePrimitives,
    emitters: Vec<EntityId>,
    environments: Vec<EntityId>,
    accel: Box<dyn Accelerator>,
}

impl Scene {
    pub fn new(entities: Vec<Entity>) -> Self {
        Self::with_accelerator(entities, AcceleratorKind::Bvh(SplitMethod::SAH))
    }

    pub fn with_accelerator(entities: Vec<Entity>, kind: AcceleratorKind) -> Self {
        let prims = ScenePrimitives::new(entities);

        let accel: Box<dyn Accelerator> = match kind {
            AcceleratorKind::Bvh(split) => Box::new(BVH::build(&prims, split, 4)),
            AcceleratorKind::Linear => Box::new(LinearAccel::build(&prims)),
        };

        let emitters: Vec<EntityId> = prims.entities.iter()
            .enumerate()
            .filter(|(_, e)| e.light.is_some())
            .map(|(i, _)| EntityId(i))
            .collect();

        let environments: Vec<EntityId> = emitters.iter()
            .copied()
            .filter(|id| {
                prims.entities[id.0].light.as_ref()
                    .map_or(false, |l| l.flags() == LightFlags::Infinite)
            })
            .collect();

        info!(
            entities = prims.entities.len(),
            primitives = prims.count(),
            emitters = emitters.len(),
            "scene ready"
        );

        Self { prims, emitters, environments, accel }
    }

    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.prims.entities[id.0]
    }

    pub fn entities(&self) -> &[Entity] {
        &self.prims.entities
    }

    /// Every entity that carries a light, in entity order.
    pub fn emitters(&self) -> &[EntityId] {
        &self.emitters
    }

    /// The subset of `emitters` that are infinitely far away and are seen by rays that escape.
    pub fn environments(&self) -> &[EntityId] {
        &self.environments
    }

    /// The light of an entity listed in `emitters`.
    pub fn light(&self, id: EntityId) -> Option<&dyn Light> {
        self.entity(id).light.as_deref()
    }

    pub fn world_bound(&self) -> Bounds3f {
        self.accel.world_bound()
    }

    pub fn world_radius(&self) -> Float {
        self.world_bound().bounding_sphere().1
    }

    /// Closest hit along `ray`. On a hit, `ray.t_max` is shrunk to its distance.
    pub fn intersect(&self, ray: &mut Ray) -> Option<SurfaceInteraction> {
        self.accel.intersect(&self.prims, ray)
    }

    /// Whether anything blocks `ray` before `ray.t_max`.
    pub fn intersect_with_shadow_ray(&self, ray: &Ray) -> bool {
        self.accel.intersect_test(&self.prims, ray)
    }

    /// Total environment radiance along a ray that left the scene.
    pub fn environment_radiance(&self, ray: &Ray) -> Spectrum {
        self.environments.iter()
            .filter_map(|&id| self.light(id))
            .map(|light| light.environment_emitted_radiance(ray))
            .sum()
    }

    /// Fraction of light carried along `ray` up to `ray.t_max`. Surfaces with a material block
    /// the ray completely. Pass-through surfaces are crossed, and the segment leading up to a
    /// boundary that the ray leaves through is attenuated by that entity's medium.
    pub fn transmittance(&self, ray: &Ray) -> Spectrum {
        let end = if ray.t_max.is_finite() { Some(ray.at(ray.t_max)) } else { None };
        let mut tr = Spectrum::uniform(1.0);
        let mut ray = *ray;

        for _ in 0..MAX_NULL_CROSSINGS {
            let mut segment = ray;
            let si = match self.intersect(&mut segment) {
                Some(si) => si,
                None => return tr,
            };
            let entity = match si.entity {
                Some(id) => self.entity(id),
                None => return Spectrum::zero(),
            };
            if entity.material.is_some() {
                return Spectrum::zero();
            }

            if let Some(medium) = &entity.medium {
                if ray.dir.dot(si.n().0) > 0.0 {
                    tr *= medium.tr(&segment);
                }
            }
            if tr.is_black() {
                return tr;
            }

            ray = match end {
                Some(p) => si.hit.spawn_ray_to(p),
                None => si.spawn_ray(ray.dir),
            };
        }

        Spectrum::zero()
    }
}
