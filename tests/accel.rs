/*!
Checks the BVH against brute force intersection over whole scenes of transformed shapes.
*/

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use pretty_assertions::assert_eq;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

use radiance::bvh::SplitMethod;
use radiance::material::MatteMaterial;
use radiance::scene::{AcceleratorKind, Entity, EntityId, Scene};
use radiance::shapes::{Quad, Sphere, TriangleMesh};
use radiance::spectrum::Spectrum;
use radiance::{point3f, vec3f, Float, Point3f, Ray, Transform, Vec3f};
use cgmath::InnerSpace;

fn random_point(rng: &mut Xoshiro256Plus, extent: Float) -> Point3f {
    point3f!(
        rng.gen_range(-extent..extent),
        rng.gen_range(-extent..extent),
        rng.gen_range(-extent..extent)
    )
}

fn random_entities(seed: u64, n: usize) -> Vec<Entity> {
    let mut rng = Xoshiro256Plus::seed_from_u64(seed);
    let material = Arc::new(MatteMaterial::new(Spectrum::uniform(0.5)));

    (0..n)
        .map(|i| {
            let p = random_point(&mut rng, 10.0);
            let to_world = Transform::translate(vec3f!(p.x, p.y, p.z))
                * Transform::rotate(rng.gen_range(0.0..360.0), vec3f!(1, 1, 0));
            let entity = Entity::new(to_world);
            let entity = match i % 3 {
                0 => entity.with_shape(Arc::new(Sphere::new(rng.gen_range(0.1..1.0)))),
                1 => entity.with_shape(Arc::new(Quad::new())),
                _ => {
                    let tris = vec![[0, 1, 2], [0, 2, 3], [0, 3, 1], [1, 3, 2]];
                    let verts = vec![
                        point3f!(0, 0, 0),
                        point3f!(1, 0, 0),
                        point3f!(0, 1, 0),
                        point3f!(0, 0, 1),
                    ];
                    entity.with_shape(Arc::new(TriangleMesh::new(tris, verts, None)))
                }
            };
            // every other entity is a pass-through interface
            if i % 2 == 0 {
                entity.with_material(material.clone())
            } else {
                entity
            }
        })
        .collect()
}

fn random_rays(seed: u64, n: usize) -> Vec<Ray> {
    let mut rng = Xoshiro256Plus::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let o = random_point(&mut rng, 12.0);
            let target = random_point(&mut rng, 8.0);
            let dir: Vec3f = (target - o).normalize();
            Ray::new(o, dir)
        })
        .collect()
}

fn closest_hit(scene: &Scene, ray: &Ray) -> Option<(Float, EntityId, usize)> {
    let mut ray = *ray;
    scene.intersect(&mut ray).map(|si| (si.t, si.entity.unwrap(), si.prim_index))
}

#[test]
fn bvh_matches_linear_scan() {
    let rays = random_rays(7, 2000);
    let linear = Scene::with_accelerator(random_entities(1, 300), AcceleratorKind::Linear);

    for &method in &[SplitMethod::SAH, SplitMethod::Middle, SplitMethod::EqualCounts] {
        let bvh = Scene::with_accelerator(random_entities(1, 300), AcceleratorKind::Bvh(method));

        let mut hits = 0;
        for ray in &rays {
            let expected = closest_hit(&linear, ray);
            let actual = closest_hit(&bvh, ray);
            match (expected, actual) {
                (Some((t0, e0, p0)), Some((t1, e1, p1))) => {
                    hits += 1;
                    assert_abs_diff_eq!(t0, t1, epsilon = 1e-4);
                    assert_eq!((e0, p0), (e1, p1));
                }
                (None, None) => {}
                (e, a) => panic!("{:?}: linear found {:?}, bvh found {:?}", method, e, a),
            }
        }
        assert!(hits > 100, "too few rays hit anything to be a useful test");
    }
}

#[test]
fn shadow_rays_match_linear_scan() {
    let rays = random_rays(8, 2000);
    let linear = Scene::with_accelerator(random_entities(2, 200), AcceleratorKind::Linear);
    let bvh = Scene::new(random_entities(2, 200));

    for ray in &rays {
        let short = Ray::with_extent(ray.origin, ray.dir, 6.0);
        assert_eq!(
            linear.intersect_with_shadow_ray(&short),
            bvh.intersect_with_shadow_ray(&short),
        );
        assert_eq!(
            linear.intersect_with_shadow_ray(ray),
            closest_hit(&linear, ray).is_some(),
        );
    }
}

#[test]
fn empty_scene_hits_nothing() {
    let scene = Scene::new(vec![]);
    let mut ray = Ray::new(point3f!(0, 0, 0), vec3f!(0, 0, 1));
    assert!(scene.intersect(&mut ray).is_none());
    assert!(!scene.intersect_with_shadow_ray(&ray));
    assert!(scene.emitters().is_empty());
}
