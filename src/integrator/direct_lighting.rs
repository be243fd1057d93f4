use crate::integrator::{
    IntegratorRadiance, Scatterer, SurfaceTrace, environment_with_pdf, sample_emitter,
    trace_to_scattering_surface,
};
use crate::sampler::Sampler;
use bumpalo::Bump;
use crate::{Ray, SurfaceInteraction, Float, abs_dot};
use crate::spectrum::Spectrum;
use crate::scene::Scene;
use crate::reflection::bsdf::Bsdf;
use crate::reflection::BxDFType;
use crate::light::{LightDistribution, LightStrategy};
use crate::sampling::power_heuristic;

/// Single-bounce direct lighting, combining emitter sampling and BSDF sampling with multiple
/// importance sampling. Specular surfaces are followed recursively up to `max_depth`.
pub struct DirectLightingIntegrator {
    pub max_depth: u16,
    pub emitter_samples: usize,
    pub bsdf_samples: usize,
    pub strategy: LightStrategy,
    lights: Option<LightDistribution>,
}

impl DirectLightingIntegrator {
    pub fn new(max_depth: u16, emitter_samples: usize, bsdf_samples: usize, strategy: LightStrategy) -> Self {
        Self { max_depth, emitter_samples, bsdf_samples, strategy, lights: None }
    }

    /// Estimate from `bsdf_samples` scattered directions, each shaded with whatever emitter it
    /// lands on.
    fn sample_bsdf(
        &self,
        intersect: &SurfaceInteraction,
        bsdf: &Bsdf,
        scene: &Scene,
        lights: &LightDistribution,
        sampler: &mut dyn Sampler,
    ) -> Spectrum {
        let mut radiance = Spectrum::zero();
        let wo = intersect.wo;

        for _ in 0..self.bsdf_samples {
            let scatter = match bsdf.sample_f(wo, sampler.get_2d(), BxDFType::all()) {
                Some(s) if s.pdf > 0.0 && !s.f.is_black() => s,
                _ => continue,
            };
            let f = scatter.f * abs_dot(scatter.wi, intersect.shading_n.0);

            let mut ray = intersect.spawn_ray(scatter.wi);
            let (le, light_pdf) = match scene.intersect(&mut ray) {
                Some(hit) => match hit.entity.and_then(|id| scene.light(id).map(|l| (id, l))) {
                    Some((id, light)) => {
                        let le = light.emitted_radiance(&hit.hit, hit.wo);
                        let pdf = light.pdf_incident_radiance(&intersect.hit, scatter.wi) * lights.pdf(id);
                        (le, pdf)
                    }
                    None => continue,
                },
                None => environment_with_pdf(&ray, &intersect.hit, scene, lights),
            };
            if le.is_black() {
                continue;
            }

            let weight = if scatter.sampled_type.contains(BxDFType::SPECULAR) {
                1.0
            } else {
                power_heuristic(self.bsdf_samples, scatter.pdf, self.emitter_samples, light_pdf)
            };

            radiance += f * le * weight / scatter.pdf;
        }

        radiance / self.bsdf_samples as Float
    }
}

impl IntegratorRadiance for DirectLightingIntegrator {
    fn preprocess(&mut self, scene: &Scene) {
        self.lights = Some(LightDistribution::new(scene, self.strategy));
    }

    fn incident_radiance(&self, ray: &mut Ray, scene: &Scene, sampler: &mut dyn Sampler, arena: &Bump, depth: u16) -> Spectrum {
        let lights = match &self.lights {
            Some(lights) if !scene.emitters().is_empty() => lights,
            _ => return Spectrum::zero(),
        };

        let mut radiance = Spectrum::zero();
        let (intersect, bsdf) = match trace_to_scattering_surface(ray, scene, arena, &mut radiance) {
            SurfaceTrace::Hit(intersect, bsdf) => (intersect, bsdf),
            SurfaceTrace::Escaped => return radiance + scene.environment_radiance(ray),
            SurfaceTrace::Lost => return Spectrum::zero(),
        };

        if self.emitter_samples > 0 {
            let scatterer = Scatterer::Surface(&intersect, &bsdf);
            let mut emitter_radiance = Spectrum::zero();
            for _ in 0..self.emitter_samples {
                emitter_radiance += sample_emitter(
                    &scatterer,
                    scene,
                    lights,
                    sampler.get_1d(),
                    sampler.get_2d(),
                    self.emitter_samples,
                    self.bsdf_samples,
                    false,
                );
            }
            radiance += emitter_radiance / self.emitter_samples as Float;
        }

        if self.bsdf_samples > 0 {
            radiance += self.sample_bsdf(&intersect, &bsdf, scene, lights, sampler);
        }

        if depth + 1 < self.max_depth {
            radiance += self.specular_reflect(&intersect, &bsdf, scene, sampler, arena, depth);
            radiance += self.specular_transmit(&intersect, &bsdf, scene, sampler, arena, depth);
        }

        radiance
    }
}
