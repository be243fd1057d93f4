use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use approx::assert_abs_diff_eq;
use bumpalo::Bump;

use radiance::integrator::{DirectLightingIntegrator, IntegratorRadiance, WhittedIntegrator};
use radiance::interaction::SurfaceInteraction;
use radiance::light::{LightStrategy, PointLight};
use radiance::material::{Material, MatteMaterial, MirrorMaterial};
use radiance::reflection::bsdf::Bsdf;
use radiance::sampler::RandomSampler;
use radiance::scene::{Entity, Scene};
use radiance::shapes::{Quad, Sphere};
use radiance::spectrum::Spectrum;
use radiance::{point3f, vec3f, Float, Ray, Transform};

/// A mirror that counts how often it is shaded.
struct CountingMirror {
    mirror: MirrorMaterial,
    hits: Arc<AtomicUsize>,
}

impl Material for CountingMirror {
    fn compute_scattering_functions<'a>(&self, si: &SurfaceInteraction, arena: &'a Bump) -> Bsdf<'a> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        self.mirror.compute_scattering_functions(si, arena)
    }
}

#[test]
fn whitted_stops_at_max_depth_between_parallel_mirrors() {
    let hits = Arc::new(AtomicUsize::new(0));
    let material = Arc::new(CountingMirror { mirror: MirrorMaterial::new(Spectrum::uniform(1.0)), hits: hits.clone() });

    let mirrors = vec![
        Entity::new(Transform::translate(vec3f!(0, 0, 1)) * Transform::scale(100.0, 100.0, 1.0))
            .with_shape(Arc::new(Quad::new()))
            .with_material(material.clone()),
        Entity::new(Transform::translate(vec3f!(0, 0, -1)) * Transform::scale(100.0, 100.0, 1.0))
            .with_shape(Arc::new(Quad::new()))
            .with_material(material),
        Entity::light(PointLight::at(point3f!(0, 0.5, 0), Spectrum::uniform(1.0))),
    ];
    let scene = Scene::new(mirrors);

    let mut sampler = RandomSampler::new_with_seed(1, 0);
    let arena = Bump::new();

    for &max_depth in &[1u16, 3, 5, 8] {
        hits.store(0, Ordering::SeqCst);
        let integrator = WhittedIntegrator::new(max_depth);
        let mut ray = Ray::new(point3f!(0, 0, 0), vec3f!(0, 0, 1));
        integrator.incident_radiance(&mut ray, &scene, &mut sampler, &arena, 0);

        assert_eq!(hits.load(Ordering::SeqCst), max_depth as usize);
    }
}

/// A diffuse floor lit by a spherical emitter of radius `r` whose center is `d` straight above
/// the shading point reflects `albedo * L * (r / d)^2`.
fn sphere_light_over_floor(albedo: Float, radiance: Float, r: Float, d: Float) -> Scene {
    let light = Entity::area_light(
        Transform::translate(vec3f!(0, d, 0)),
        Arc::new(Sphere::new(r)),
        Spectrum::uniform(radiance),
    );
    Scene::new(vec![floor(albedo), light])
}

fn floor(albedo: Float) -> Entity {
    Entity::new(Transform::rotate(-90.0, vec3f!(1, 0, 0)) * Transform::scale(100.0, 100.0, 1.0))
        .with_shape(Arc::new(Quad::new()))
        .with_material(Arc::new(MatteMaterial::new(Spectrum::uniform(albedo))))
}

fn estimate(integrator: &DirectLightingIntegrator, scene: &Scene, n: usize) -> Float {
    let mut sampler = RandomSampler::new_with_seed(1, 42);
    let mut arena = Bump::new();
    let mut sum = 0.0;
    for _ in 0..n {
        let mut ray = Ray::new(point3f!(0, 0.5, 0), vec3f!(0, -1, 0));
        sum += integrator.incident_radiance(&mut ray, scene, &mut sampler, &arena, 0).average();
        arena.reset();
    }
    sum / n as Float
}

#[test]
fn direct_lighting_converges_to_analytic_value() {
    let scene = sphere_light_over_floor(0.5, 1.0, 2.0, 3.0);
    let expected = 0.5 * 1.0 * (2.0 / 3.0 as Float).powi(2);

    for &(emitter_samples, bsdf_samples) in &[(1, 1), (4, 1), (1, 0), (0, 1)] {
        let mut integrator = DirectLightingIntegrator::new(1, emitter_samples, bsdf_samples, LightStrategy::Uniform);
        integrator.preprocess(&scene);

        let l = estimate(&integrator, &scene, 40_000);
        assert_abs_diff_eq!(l, expected, epsilon = 0.005);
    }
}

#[test]
fn squashed_quad_light_agrees_between_sampling_strategies() {
    // a 0.5 x 0.5 emitter one unit above the shading point, built from the unit quad with
    // a scale that differs along its normal
    let light_to_world = Transform::translate(vec3f!(0, 1, 0))
        * Transform::rotate(90.0, vec3f!(1, 0, 0))
        * Transform::scale(0.5, 0.5, 1.0);
    let light = Entity::area_light(light_to_world, Arc::new(Quad::new()), Spectrum::uniform(4.0));
    let scene = Scene::new(vec![floor(0.5), light]);

    // albedo * L * (projected solid angle of the square / pi)
    let expected = 0.5 * 4.0 * 0.073_477_6;

    for &(emitter_samples, bsdf_samples) in &[(1, 0), (0, 1), (1, 1)] {
        let mut integrator = DirectLightingIntegrator::new(1, emitter_samples, bsdf_samples, LightStrategy::Power);
        integrator.preprocess(&scene);

        let l = estimate(&integrator, &scene, 200_000);
        assert_abs_diff_eq!(l, expected, epsilon = 0.006);
    }
}
