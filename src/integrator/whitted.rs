use crate::integrator::{IntegratorRadiance, SurfaceTrace, trace_to_scattering_surface};
use crate::scene::Scene;
use crate::sampler::Sampler;
use crate::{Ray, abs_dot};
use bumpalo::Bump;
use crate::spectrum::Spectrum;
use crate::reflection::BxDFType;

/// Direct lighting from every emitter plus perfect specular reflection and transmission.
pub struct WhittedIntegrator {
    pub max_depth: u16,
}

impl WhittedIntegrator {
    pub fn new(max_depth: u16) -> Self {
        Self { max_depth }
    }
}

impl IntegratorRadiance for WhittedIntegrator {
    fn incident_radiance(&self, ray: &mut Ray, scene: &Scene, sampler: &mut dyn Sampler, arena: &Bump, depth: u16) -> Spectrum {
        let mut radiance = Spectrum::zero();

        let (intersect, bsdf) = match trace_to_scattering_surface(ray, scene, arena, &mut radiance) {
            SurfaceTrace::Hit(intersect, bsdf) => (intersect, bsdf),
            SurfaceTrace::Escaped => return radiance,
            SurfaceTrace::Lost => return Spectrum::zero(),
        };

        let n = intersect.shading_n;
        let wo = intersect.wo;

        for &id in scene.emitters() {
            let light = match scene.light(id) {
                Some(light) => light,
                None => continue,
            };

            let li_sample = match light.sample_incident_radiance(&intersect.hit, sampler.get_2d()) {
                Some(s) if s.pdf > 0.0 && !s.radiance.is_black() => s,
                _ => continue,
            };

            let f = bsdf.f(wo, li_sample.wi, BxDFType::all());

            if !f.is_black() && li_sample.vis.unoccluded(scene) {
                radiance += f * li_sample.radiance * abs_dot(li_sample.wi, n.0) / li_sample.pdf;
            }
        }

        if depth + 1 < self.max_depth {
            radiance += self.specular_reflect(&intersect, &bsdf, scene, sampler, arena, depth);
            radiance += self.specular_transmit(&intersect, &bsdf, scene, sampler, arena, depth);
        }

        radiance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Transform;
    use crate::light::PointLight;
    use crate::material::MatteMaterial;
    use crate::sampler::RandomSampler;
    use crate::scene::Entity;
    use crate::shapes::Sphere;
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    #[test]
    fn test_miss_is_black() {
        let scene = Scene::new(vec![Entity::light(PointLight::at(point3f!(0, 5, 0), Spectrum::uniform(10.0)))]);
        let integrator = WhittedIntegrator::new(5);
        let mut sampler = RandomSampler::new_with_seed(1, 0);
        let arena = Bump::new();
        let mut ray = Ray::new(point3f!(0, 0, 0), vec3f!(0, 0, 1));
        let l = integrator.incident_radiance(&mut ray, &scene, &mut sampler, &arena, 0);
        assert!(l.is_black());
    }

    #[test]
    fn test_point_light_on_matte_sphere() {
        let sphere = Entity::new(Transform::translate(vec3f!(0, 0, 5)))
            .with_shape(Arc::new(Sphere::new(1.0)))
            .with_material(Arc::new(MatteMaterial::new(Spectrum::uniform(0.5))));
        let light = Entity::light(PointLight::at(point3f!(0, 0, 0), Spectrum::uniform(1.0)));
        let scene = Scene::new(vec![sphere, light]);

        let integrator = WhittedIntegrator::new(5);
        let mut sampler = RandomSampler::new_with_seed(1, 0);
        let arena = Bump::new();
        let mut ray = Ray::new(point3f!(0, 0, 0), vec3f!(0, 0, 1));
        let l = integrator.incident_radiance(&mut ray, &scene, &mut sampler, &arena, 0);

        // facing hit at distance 4: (0.5 / pi) * (1 / 16)
        let expected = 0.5 / crate::math::consts::PI / 16.0;
        assert_abs_diff_eq!(l[0], expected, epsilon = 1e-4);
    }
}
