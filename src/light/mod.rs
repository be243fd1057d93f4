use crate::{Point2f, Vec3f, Float, Ray};
use crate::interaction::SurfaceHit;
use crate::spectrum::Spectrum;
use crate::scene::{Scene, EntityId};
use crate::sampling::Distribution1D;
use std::collections::HashMap;

pub mod point;
pub mod distant;
pub mod infinite;
pub mod diffuse;

pub use point::PointLight;
pub use distant::DistantLight;
pub use infinite::InfiniteAreaLight;
pub use diffuse::DiffuseAreaLight;

/// An emitter. Area lights are attached to an entity that also carries their shape, the other
/// kinds stand on their own.
pub trait Light: Sync + Send {
    fn flags(&self) -> LightFlags;

    fn is_delta(&self) -> bool {
        self.flags().is_delta_light()
    }

    /// Sample a direction from `reference` towards the light. Returns `None` if no light can
    /// arrive at the reference point through this sample.
    fn sample_incident_radiance(&self, reference: &SurfaceHit, u: Point2f) -> Option<LiSample>;

    /// The probability density with respect to solid angle for the light's
    /// `sample_incident_radiance` method to sample the direction `wi` from the reference
    /// point `reference`.
    fn pdf_incident_radiance(&self, reference: &SurfaceHit, wi: Vec3f) -> Float;

    /// Given a point on the area light's surface represented by `hit`, evaluate the area light's
    /// emitted radiance `L` in the given outgoing direction `w`.
    fn emitted_radiance(&self, _hit: &SurfaceHit, _w: Vec3f) -> Spectrum {
        Spectrum::zero()
    }

    /// Radiance carried by a ray that escapes the scene.
    fn environment_emitted_radiance(&self, _ray: &Ray) -> Spectrum {
        Spectrum::zero()
    }

    /// Total emitted power, for a scene bounded by a sphere of `world_radius`.
    fn power(&self, world_radius: Float) -> Spectrum;
}

pub struct LiSample {
    pub radiance: Spectrum,

    /// The direction *towards* the illumination
    pub wi: Vec3f,

    pub pdf: Float,

    pub vis: VisibilityTester,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LightFlags {
    DeltaPosition, DeltaDirection, Area, Infinite
}

impl LightFlags {
    pub fn is_delta_light(&self) -> bool {
        matches!(self, LightFlags::DeltaDirection | LightFlags::DeltaPosition)
    }
}

/// The shadow ray between a reference point and a light sample.
#[derive(Clone, Copy, Debug)]
pub struct VisibilityTester {
    pub ray: Ray,
}

impl VisibilityTester {
    pub fn new(ray: Ray) -> Self {
        Self { ray }
    }

    pub fn unoccluded(&self, scene: &Scene) -> bool {
        !scene.intersect_with_shadow_ray(&self.ray)
    }

    /// Fraction of light that makes it along the ray, passing through pass-through surfaces
    /// and attenuating by the media behind them.
    pub fn transmittance(&self, scene: &Scene) -> Spectrum {
        scene.transmittance(&self.ray)
    }
}

/// How an integrator picks which emitter to sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LightStrategy {
    /// Every emitter is equally likely
    Uniform,
    /// Emitters are chosen in proportion to their total emitted power
    Power,
}

/// Discrete distribution over the scene's emitters.
pub struct LightDistribution {
    emitters: Vec<EntityId>,
    index: HashMap<EntityId, usize>,
    distrib: Option<Distribution1D>,
}

impl LightDistribution {
    pub fn new(scene: &Scene, strategy: LightStrategy) -> Self {
        let emitters = scene.emitters().to_vec();
        let world_radius = scene.world_radius();

        let func: Vec<Float> = match strategy {
            LightStrategy::Uniform => vec![1.0; emitters.len()],
            LightStrategy::Power => emitters.iter()
                .map(|&id| scene.light(id).map_or(0.0, |l| l.power(world_radius).y().max(0.0)))
                .collect(),
        };
        let distrib = if func.is_empty() { None } else { Some(Distribution1D::new(&func)) };
        let index = emitters.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        Self { emitters, index, distrib }
    }

    /// Choose an emitter, returning it with the probability it had of being chosen.
    pub fn sample(&self, u: Float) -> Option<(EntityId, Float)> {
        let distrib = self.distrib.as_ref()?;
        let (i, pdf) = distrib.sample_discrete(u);
        if pdf == 0.0 {
            return None;
        }
        Some((self.emitters[i], pdf))
    }

    /// Probability of `sample` choosing `id`. Zero for entities that are not emitters.
    pub fn pdf(&self, id: EntityId) -> Float {
        match (self.distrib.as_ref(), self.index.get(&id)) {
            (Some(d), Some(&i)) => d.discrete_pdf(i),
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Entity;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_power_strategy_prefers_bright_lights() {
        let scene = Scene::new(vec![
            Entity::light(PointLight::at(point3f!(0, 1, 0), Spectrum::uniform(1.0))),
            Entity::light(PointLight::at(point3f!(0, 2, 0), Spectrum::uniform(3.0))),
        ]);
        let power = LightDistribution::new(&scene, LightStrategy::Power);
        assert_abs_diff_eq!(power.pdf(EntityId(0)), 0.25, epsilon = 1e-5);
        assert_abs_diff_eq!(power.pdf(EntityId(1)), 0.75, epsilon = 1e-5);
        assert_eq!(power.sample(0.1).map(|s| s.0), Some(EntityId(0)));
        assert_eq!(power.sample(0.5).map(|s| s.0), Some(EntityId(1)));

        let uniform = LightDistribution::new(&scene, LightStrategy::Uniform);
        assert_abs_diff_eq!(uniform.pdf(EntityId(1)), 0.5, epsilon = 1e-5);
        assert_eq!(uniform.pdf(EntityId(7)), 0.0);
    }

    #[test]
    fn test_no_emitters() {
        let scene = Scene::new(vec![]);
        let d = LightDistribution::new(&scene, LightStrategy::Power);
        assert!(d.sample(0.3).is_none());
    }
}
