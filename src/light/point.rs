use crate::{Transform, Point3f, Float, Point2f, Vec3f, Transformable};
use crate::spectrum::Spectrum;
use crate::light::{Light, LightFlags, LiSample, VisibilityTester};
use crate::interaction::SurfaceHit;
use crate::math::consts;
use cgmath::InnerSpace;

/// Isotropic point emitter.
pub struct PointLight {
    world_point: Point3f,
    intensity: Spectrum,
}

impl PointLight {
    pub fn new(light_to_world: Transform, intensity: Spectrum) -> Self {
        let world_point: Point3f = Point3f::new(0.0, 0.0, 0.0).transform(light_to_world);
        Self {
            world_point,
            intensity
        }
    }

    pub fn at(p: Point3f, intensity: Spectrum) -> Self {
        Self { world_point: p, intensity }
    }
}

impl Light for PointLight {
    fn flags(&self) -> LightFlags {
        LightFlags::DeltaPosition
    }

    fn sample_incident_radiance(&self, reference: &SurfaceHit, _u: Point2f) -> Option<LiSample> {
        let d = self.world_point - reference.p;
        let dist2 = d.magnitude2();
        if dist2 == 0.0 {
            return None;
        }
        let vis = VisibilityTester::new(reference.spawn_ray_to(self.world_point));
        Some(LiSample {
            radiance: self.intensity / dist2,
            wi: d.normalize(),
            pdf: 1.0,
            vis,
        })
    }

    fn pdf_incident_radiance(&self, _reference: &SurfaceHit, _wi: Vec3f) -> Float {
        0.0
    }

    fn power(&self, _world_radius: Float) -> Spectrum {
        4.0 * consts::PI * self.intensity
    }
}
