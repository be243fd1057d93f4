use crate::{Point2f, Vec3f, Point3f, Float, Ray, Frame, Transform, Transformable, offset_ray_origin, SHADOW_EPSILON, INFINITY};
use crate::geometry::Normal3;
use crate::scene::{Scene, EntityId};
use crate::reflection::bsdf::Bsdf;
use crate::spectrum::Spectrum;
use bumpalo::Bump;
use cgmath::InnerSpace;

/// A point on a surface (or inside a medium, where `n` is zero) that rays can be spawned from.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceHit {
    pub p: Point3f,
    /// Conservative bound on the absolute error in `p`
    pub p_err: Vec3f,
    pub time: Float,
    /// Geometric normal
    pub n: Normal3,
}

impl SurfaceHit {
    /// A scattering point inside a participating medium.
    pub fn in_medium(p: Point3f, time: Float) -> Self {
        Self { p, p_err: Vec3f::new(0.0, 0.0, 0.0), time, n: Normal3::zero() }
    }

    pub fn is_surface(&self) -> bool {
        !self.n.is_zero()
    }

    pub fn spawn_ray(&self, dir: Vec3f) -> Ray {
        let o = offset_ray_origin(&self.p, &self.p_err, &self.n, &dir);
        Ray { origin: o, dir, t_max: INFINITY, time: self.time }
    }

    /// A ray towards `p`, parametrized so that `p` is at t = 1. The far end is trimmed so the
    /// ray stops just short of the target.
    pub fn spawn_ray_to(&self, p: Point3f) -> Ray {
        let o = offset_ray_origin(&self.p, &self.p_err, &self.n, &(p - self.p));
        let d = p - o;
        Ray { origin: o, dir: d, t_max: 1.0 - SHADOW_EPSILON, time: self.time }
    }

    /// Like `spawn_ray_to`, but also offsets the target point off of its own surface.
    pub fn spawn_ray_to_hit(&self, other: &SurfaceHit) -> Ray {
        let o = offset_ray_origin(&self.p, &self.p_err, &self.n, &(other.p - self.p));
        let target = offset_ray_origin(&other.p, &other.p_err, &other.n, &(o - other.p));
        let d = target - o;
        Ray { origin: o, dir: d, t_max: 1.0 - SHADOW_EPSILON, time: self.time }
    }
}

impl Transformable for SurfaceHit {
    fn transform(&self, t: Transform) -> Self {
        let (p, p_err) = (self.p, self.p_err).transform(t);
        let n = if self.n.is_zero() { self.n } else { self.n.transform(t).normalize() };
        Self { p, p_err, time: self.time, n }
    }
}

/// The result of a ray-surface intersection.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceInteraction {
    pub hit: SurfaceHit,

    /// (u, v) coordinates from the parametrization of the surface
    pub uv: Point2f,

    /// Direction back along the incoming ray, normalized
    pub wo: Vec3f,

    pub shading_n: Normal3,

    pub dpdu: Vec3f,

    /// Parametric distance along the incoming ray
    pub t: Float,

    /// The entity that was hit. Filled in by the scene, shapes leave it empty.
    pub entity: Option<EntityId>,

    /// Which of the shape's primitives was hit
    pub prim_index: usize,
}

impl SurfaceInteraction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        p: Point3f,
        p_err: Vec3f,
        time: Float,
        uv: Point2f,
        wo: Vec3f,
        n: Normal3,
        dpdu: Vec3f,
        t: Float,
    ) -> Self {
        Self {
            hit: SurfaceHit { p, p_err, time, n },
            uv,
            wo: wo.normalize(),
            shading_n: n,
            dpdu,
            t,
            entity: None,
            prim_index: 0,
        }
    }

    pub fn p(&self) -> Point3f {
        self.hit.p
    }

    pub fn n(&self) -> Normal3 {
        self.hit.n
    }

    pub fn spawn_ray(&self, dir: Vec3f) -> Ray {
        self.hit.spawn_ray(dir)
    }

    /// Orthonormal shading frame around the shading normal, aligned with dp/du where possible.
    pub fn shading_frame(&self) -> Frame {
        let n = self.shading_n.0;
        let s = self.dpdu - n * n.dot(self.dpdu);
        if s.magnitude2() < 1e-12 {
            return Frame::from_normal(n);
        }
        let s = s.normalize();
        Frame { s, t: n.cross(s), n }
    }

    /// Build the scattering functions of the hit entity's material in `arena`. Entities without
    /// a material give a BSDF with no components, which marks the surface as a pass-through
    /// interface.
    pub fn compute_scattering_functions<'a>(&self, scene: &Scene, arena: &'a Bump) -> Bsdf<'a> {
        match self.entity.and_then(|id| scene.entity(id).material.as_ref()) {
            Some(material) => material.compute_scattering_functions(self, arena),
            None => Bsdf::new(self, 1.0),
        }
    }

    /// Radiance emitted from the hit point in direction `w`, if the entity is an emitter.
    pub fn le(&self, scene: &Scene, w: Vec3f) -> Spectrum {
        match self.entity.and_then(|id| scene.entity(id).light.as_ref()) {
            Some(light) => light.emitted_radiance(&self.hit, w),
            None => Spectrum::zero(),
        }
    }
}

impl Transformable for SurfaceInteraction {
    fn transform(&self, t: Transform) -> Self {
        let hit = self.hit.transform(t);
        let shading_n = self.shading_n.transform(t).normalize().faceforward(hit.n.0);
        let wo: Vec3f = self.wo.transform(t);
        let dpdu: Vec3f = self.dpdu.transform(t);

        Self {
            hit,
            uv: self.uv,
            wo: wo.normalize(),
            shading_n,
            dpdu,
            t: self.t,
            entity: self.entity,
            prim_index: self.prim_index,
        }
    }
}
