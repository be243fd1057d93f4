/*!
Exercises the BVH and triangle intersection together, and checks that a closed mesh has no cracks
along its shared edges.
*/

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

use radiance::sampling::uniform_sample_sphere;
use radiance::scene::{Entity, Scene};
use radiance::shapes::TriangleMesh;
use radiance::{Float, Point2f, Point3f, Ray, Transform};
use cgmath::{EuclideanSpace, InnerSpace};

/// A sphere tessellated from an octahedron, `levels` times subdivided.
fn tessellated_sphere(levels: usize) -> TriangleMesh {
    let mut verts: Vec<Point3f> = vec![
        Point3f::new(1.0, 0.0, 0.0),
        Point3f::new(-1.0, 0.0, 0.0),
        Point3f::new(0.0, 1.0, 0.0),
        Point3f::new(0.0, -1.0, 0.0),
        Point3f::new(0.0, 0.0, 1.0),
        Point3f::new(0.0, 0.0, -1.0),
    ];
    let mut tris: Vec<[u32; 3]> = vec![
        [0, 2, 4], [2, 1, 4], [1, 3, 4], [3, 0, 4],
        [2, 0, 5], [1, 2, 5], [3, 1, 5], [0, 3, 5],
    ];

    for _ in 0..levels {
        let mut midpoints = std::collections::HashMap::new();
        let mut midpoint = |a: u32, b: u32, verts: &mut Vec<Point3f>| -> u32 {
            let key = (a.min(b), a.max(b));
            *midpoints.entry(key).or_insert_with(|| {
                let m = verts[a as usize].midpoint(verts[b as usize]);
                verts.push(Point3f::from_vec(m.to_vec().normalize()));
                (verts.len() - 1) as u32
            })
        };

        tris = tris.iter()
            .flat_map(|&[a, b, c]| {
                let ab = midpoint(a, b, &mut verts);
                let bc = midpoint(b, c, &mut verts);
                let ca = midpoint(c, a, &mut verts);
                vec![[a, ab, ca], [ab, b, bc], [ca, bc, c], [ab, bc, ca]]
            })
            .collect();
    }

    TriangleMesh::new(tris, verts, None)
}

#[test]
fn test_closed_mesh_is_watertight() {
    let scene = Scene::new(vec![
        Entity::new(Transform::identity()).with_shape(Arc::new(tessellated_sphere(4))),
    ]);

    let mut rng = Xoshiro256Plus::seed_from_u64(3);
    for _ in 0..100_000 {
        let u = Point2f::new(rng.gen::<Float>(), rng.gen::<Float>());
        let dir = uniform_sample_sphere(u);
        let mut ray = Ray::new(Point3f::origin(), dir);

        assert!(scene.intersect_with_shadow_ray(&ray), "shadow ray escaped along {:?}", dir);
        assert!(scene.intersect(&mut ray).is_some(), "ray escaped along {:?}", dir);
    }
}
