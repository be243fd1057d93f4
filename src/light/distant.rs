use crate::spectrum::Spectrum;
use crate::{Vec3f, Float, Point2f};
use crate::light::{Light, LightFlags, LiSample, VisibilityTester};
use crate::interaction::SurfaceHit;
use crate::math::consts;
use cgmath::InnerSpace;

/// Parallel light arriving from a single direction, like the sun.
pub struct DistantLight {
    radiance: Spectrum,
    /// Direction towards the light
    dir: Vec3f,
}

impl DistantLight {
    pub fn new(radiance: Spectrum, dir: Vec3f) -> Self {
        Self {
            radiance,
            dir: dir.normalize(),
        }
    }
}

impl Light for DistantLight {
    fn flags(&self) -> LightFlags {
        LightFlags::DeltaDirection
    }

    fn sample_incident_radiance(&self, reference: &SurfaceHit, _u: Point2f) -> Option<LiSample> {
        let vis = VisibilityTester::new(reference.spawn_ray(self.dir));

        Some(LiSample {
            radiance: self.radiance,
            wi: self.dir,
            pdf: 1.0,
            vis,
        })
    }

    fn pdf_incident_radiance(&self, _reference: &SurfaceHit, _wi: Vec3f) -> Float {
        0.0
    }

    fn power(&self, world_radius: Float) -> Spectrum {
        self.radiance * consts::PI * world_radius * world_radius
    }
}
