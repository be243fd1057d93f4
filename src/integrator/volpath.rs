use bumpalo::Bump;
use cgmath::InnerSpace;

use crate::integrator::{IntegratorRadiance, Scatterer, environment_with_pdf, sample_emitter};
use crate::light::{LightDistribution, LightStrategy};
use crate::medium::PhaseFunction;
use crate::reflection::BxDFType;
use crate::sampler::Sampler;
use crate::sampling::power_heuristic;
use crate::scene::{Scene, MAX_NULL_CROSSINGS};
use crate::spectrum::Spectrum;
use crate::{Float, Ray, SurfaceHit, abs_dot};

/// Unidirectional path tracer with next event estimation that also scatters inside
/// participating media.
///
/// A medium fills the inside of the shape of the entity it's attached to. A path segment is
/// considered to travel through the medium when it ends by leaving that shape.
pub struct VolPathIntegrator {
    pub max_depth: u16,
    pub strategy: LightStrategy,
    lights: Option<LightDistribution>,
}

impl VolPathIntegrator {
    pub fn new(max_depth: u16, strategy: LightStrategy) -> Self {
        Self { max_depth, strategy, lights: None }
    }
}

/// Randomly terminate long paths with low throughput. Returns false if the path was
/// terminated, otherwise scales `beta` so the estimate stays unbiased.
fn russian_roulette(beta: &mut Spectrum, eta_scale: Float, bounces: u16, u: Float) -> bool {
    if bounces <= 3 {
        return true;
    }
    let q = Float::max(0.05, 1.0 - (*beta * eta_scale).max_component_value());
    if u < q {
        return false;
    }
    *beta /= 1.0 - q;
    true
}

impl IntegratorRadiance for VolPathIntegrator {
    fn preprocess(&mut self, scene: &Scene) {
        self.lights = Some(LightDistribution::new(scene, self.strategy));
    }

    fn incident_radiance(&self, ray: &mut Ray, scene: &Scene, sampler: &mut dyn Sampler, arena: &Bump, _depth: u16) -> Spectrum {
        let lights = match &self.lights {
            Some(lights) => lights,
            None => return Spectrum::zero(),
        };

        let mut radiance = Spectrum::zero();
        let mut beta = Spectrum::uniform(1.0);
        let mut eta_scale: Float = 1.0;
        let mut bounces: u16 = 0;
        let mut null_crossings = 0;

        // the previous scattering vertex, for weighting emitters that are hit by chance
        let mut specular_bounce = true;
        let mut prev_hit = SurfaceHit::in_medium(ray.origin, ray.time);
        let mut prev_pdf: Float = 0.0;

        let mut ray = *ray;

        loop {
            let hit = scene.intersect(&mut ray);

            if let Some(si) = &hit {
                let medium = si.entity.and_then(|id| scene.entity(id).medium.as_ref());
                if let Some(medium) = medium.filter(|_| ray.dir.dot(si.n().0) > 0.0) {
                    let (weight, mi) = medium.sample(&ray, sampler);
                    beta *= weight;
                    if beta.is_black() {
                        break;
                    }

                    if let Some(mi) = mi {
                        if bounces >= self.max_depth {
                            break;
                        }
                        bounces += 1;

                        radiance += beta * sample_emitter(
                            &Scatterer::Medium(&mi),
                            scene,
                            lights,
                            sampler.get_1d(),
                            sampler.get_2d(),
                            1,
                            1,
                            true,
                        );

                        // the phase function is sampled exactly, so beta is unchanged
                        let (wi, pdf) = mi.phase.sample_p(mi.wo, sampler.get_2d());
                        specular_bounce = false;
                        prev_hit = mi.hit;
                        prev_pdf = pdf;
                        ray = mi.hit.spawn_ray(wi);

                        if !russian_roulette(&mut beta, eta_scale, bounces, sampler.get_1d()) {
                            break;
                        }
                        continue;
                    }
                }
            }

            let si = match hit {
                Some(si) => si,
                None => {
                    if specular_bounce {
                        radiance += beta * scene.environment_radiance(&ray);
                    } else {
                        let (le, light_pdf) = environment_with_pdf(&ray, &prev_hit, scene, lights);
                        if !le.is_black() {
                            radiance += beta * le * power_heuristic(1, prev_pdf, 1, light_pdf);
                        }
                    }
                    break;
                }
            };

            if let Some((id, light)) = si.entity.and_then(|id| scene.light(id).map(|l| (id, l))) {
                let le = light.emitted_radiance(&si.hit, si.wo);
                if !le.is_black() {
                    let weight = if specular_bounce {
                        1.0
                    } else {
                        let light_pdf = light.pdf_incident_radiance(&prev_hit, ray.dir.normalize()) * lights.pdf(id);
                        power_heuristic(1, prev_pdf, 1, light_pdf)
                    };
                    radiance += beta * le * weight;
                }
            }

            let bsdf = si.compute_scattering_functions(scene, arena);
            if bsdf.count() == 0 {
                null_crossings += 1;
                if null_crossings > MAX_NULL_CROSSINGS {
                    return Spectrum::zero();
                }
                ray = si.spawn_ray(ray.dir);
                continue;
            }

            if bounces >= self.max_depth {
                break;
            }
            bounces += 1;

            if bsdf.num_components(BxDFType::all() - BxDFType::SPECULAR) > 0 {
                radiance += beta * sample_emitter(
                    &Scatterer::Surface(&si, &bsdf),
                    scene,
                    lights,
                    sampler.get_1d(),
                    sampler.get_2d(),
                    1,
                    1,
                    true,
                );
            }

            let scatter = match bsdf.sample_f(si.wo, sampler.get_2d(), BxDFType::all()) {
                Some(s) if s.pdf > 0.0 && !s.f.is_black() => s,
                _ => break,
            };

            beta *= scatter.f * abs_dot(scatter.wi, si.shading_n.0) / scatter.pdf;
            specular_bounce = scatter.sampled_type.contains(BxDFType::SPECULAR);
            if specular_bounce && scatter.sampled_type.contains(BxDFType::TRANSMISSION) {
                let eta = bsdf.eta;
                eta_scale *= if si.wo.dot(si.n().0) > 0.0 { eta * eta } else { 1.0 / (eta * eta) };
            }
            prev_hit = si.hit;
            prev_pdf = scatter.pdf;
            ray = si.spawn_ray(scatter.wi);

            if !russian_roulette(&mut beta, eta_scale, bounces, sampler.get_1d()) {
                break;
            }
        }

        radiance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Transform;
    use crate::light::InfiniteAreaLight;
    use crate::material::MatteMaterial;
    use crate::medium::HomogeneousMedium;
    use crate::sampler::RandomSampler;
    use crate::scene::Entity;
    use crate::shapes::{Quad, Sphere};
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    fn mean_radiance(integrator: &VolPathIntegrator, scene: &Scene, origin: crate::Point3f, dir: crate::Vec3f, n: usize) -> Float {
        let mut sampler = RandomSampler::new_with_seed(1, 11);
        let arena = Bump::new();
        let mut sum = 0.0;
        for _ in 0..n {
            let mut ray = Ray::new(origin, dir);
            sum += integrator.incident_radiance(&mut ray, scene, &mut sampler, &arena, 0)[0];
        }
        sum / n as Float
    }

    #[test]
    fn test_roulette_keeps_early_bounces() {
        let mut beta = Spectrum::uniform(0.01);
        assert!(russian_roulette(&mut beta, 1.0, 3, 0.0));
        assert_eq!(beta[0], 0.01);

        assert!(!russian_roulette(&mut beta, 1.0, 4, 0.5));

        let mut bright = Spectrum::uniform(2.0);
        assert!(russian_roulette(&mut bright, 1.0, 10, 0.5));
        assert_abs_diff_eq!(bright[0], 2.0 / 0.95, epsilon = 1e-5);
    }

    #[test]
    fn test_single_bounce_floor_under_sky() {
        let floor = Entity::new(Transform::rotate(-90.0, vec3f!(1, 0, 0)) * Transform::scale(100.0, 100.0, 1.0))
            .with_shape(Arc::new(Quad::new()))
            .with_material(Arc::new(MatteMaterial::new(Spectrum::uniform(0.5))));
        let sky = Entity::light(InfiniteAreaLight::new_uniform(Spectrum::uniform(1.0), Transform::identity()));
        let scene = Scene::new(vec![floor, sky]);

        let mut integrator = VolPathIntegrator::new(1, LightStrategy::Uniform);
        integrator.preprocess(&scene);

        let l = mean_radiance(&integrator, &scene, point3f!(0.1, 1, 0.2), vec3f!(0, -1, 0), 20000);
        assert_abs_diff_eq!(l, 0.5, epsilon = 0.02);
    }

    #[test]
    fn test_absorbing_fog_attenuates_sky() {
        let fog = Entity::new(Transform::identity())
            .with_shape(Arc::new(Sphere::new(1.0)))
            .with_medium(Arc::new(HomogeneousMedium::new(Spectrum::uniform(0.5), Spectrum::zero(), 0.0)));
        let sky = Entity::light(InfiniteAreaLight::new_uniform(Spectrum::uniform(1.0), Transform::identity()));
        let scene = Scene::new(vec![fog, sky]);

        let mut integrator = VolPathIntegrator::new(5, LightStrategy::Uniform);
        integrator.preprocess(&scene);

        let l = mean_radiance(&integrator, &scene, point3f!(0, 0, -5), vec3f!(0, 0, 1), 20000);
        assert_abs_diff_eq!(l, (-1.0 as Float).exp(), epsilon = 0.02);
    }

    #[test]
    fn test_unlit_fog_is_black() {
        let fog = Entity::new(Transform::identity())
            .with_shape(Arc::new(Sphere::new(1.0)))
            .with_medium(Arc::new(HomogeneousMedium::new(Spectrum::uniform(0.1), Spectrum::uniform(1.0), 0.3)));
        let scene = Scene::new(vec![fog]);

        let mut integrator = VolPathIntegrator::new(10, LightStrategy::Power);
        integrator.preprocess(&scene);

        let l = mean_radiance(&integrator, &scene, point3f!(0, 0, -5), vec3f!(0, 0, 1), 500);
        assert_eq!(l, 0.0);
    }
}
