use crate::{Point3f, Ray, Float, Normal3, Vec3f, Point2f, max_dimension, max_component};
use crate::err_float::gamma;
use crate::geometry::bounds::Bounds3f;
use crate::interaction::{SurfaceInteraction, SurfaceHit};
use crate::sampling::{Distribution1D, uniform_sample_triangle};
use crate::shapes::Shape;
use crate::geometry::{Transform, Transformable};
use cgmath::{EuclideanSpace, InnerSpace};

/// An indexed triangle mesh. Each triangle is a separate primitive.
pub struct TriangleMesh {
    vertex_indices: Vec<[u32; 3]>,
    vertices: Vec<Point3f>,
    tex_coords: Option<Vec<Point2f>>,

    /// Picks triangles in proportion to their area when sampling
    area_distribution: Distribution1D,
    area: Float,
}

fn permute(v: Vec3f, kx: usize, ky: usize, kz: usize) -> Vec3f {
    Vec3f::new(v[kx], v[ky], v[kz])
}

impl TriangleMesh {
    pub fn new(
        vertex_indices: Vec<[u32; 3]>,
        vertices: Vec<Point3f>,
        tex_coords: Option<Vec<Point2f>>,
    ) -> Self {
        assert!(!vertex_indices.is_empty(), "mesh has no triangles");
        let n_vertices = vertices.len();
        assert!(
            vertex_indices.iter().flatten().all(|&i| (i as usize) < n_vertices),
            "vertex index out of range"
        );
        if let Some(ref uvs) = tex_coords {
            assert_eq!(uvs.len(), n_vertices);
        }

        let areas: Vec<Float> = vertex_indices.iter()
            .map(|v| {
                let p0 = vertices[v[0] as usize];
                let p1 = vertices[v[1] as usize];
                let p2 = vertices[v[2] as usize];
                0.5 * (p1 - p0).cross(p2 - p0).magnitude()
            })
            .collect();
        let area = areas.iter().sum();

        Self {
            vertex_indices,
            vertices,
            tex_coords,
            area_distribution: Distribution1D::new(&areas),
            area,
        }
    }

    fn positions(&self, tri: usize) -> [Point3f; 3] {
        let v = self.vertex_indices[tri];
        [
            self.vertices[v[0] as usize],
            self.vertices[v[1] as usize],
            self.vertices[v[2] as usize],
        ]
    }

    fn uvs(&self, tri: usize) -> [Point2f; 3] {
        match self.tex_coords {
            Some(ref uvs) => {
                let v = self.vertex_indices[tri];
                [uvs[v[0] as usize], uvs[v[1] as usize], uvs[v[2] as usize]]
            }
            None => [Point2f::new(0.0, 0.0), Point2f::new(1.0, 0.0), Point2f::new(1.0, 1.0)],
        }
    }

    /// Watertight ray-triangle test. Returns the hit distance and barycentric coordinates.
    fn hit(&self, tri: usize, ray: &Ray) -> Option<(Float, [Float; 3])> {
        let [p0, p1, p2] = self.positions(tri);

        // translate the vertices so the ray starts at the origin
        let o = ray.origin.to_vec();
        let p0t = p0.to_vec() - o;
        let p1t = p1.to_vec() - o;
        let p2t = p2.to_vec() - o;

        // permute so the ray direction's largest component is z
        let kz = max_dimension(ray.dir.map(Float::abs));
        let kx = if kz + 1 == 3 { 0 } else { kz + 1 };
        let ky = if kx + 1 == 3 { 0 } else { kx + 1 };
        let d = permute(ray.dir, kx, ky, kz);
        let mut p0t = permute(p0t, kx, ky, kz);
        let mut p1t = permute(p1t, kx, ky, kz);
        let mut p2t = permute(p2t, kx, ky, kz);

        // shear so the ray points along +z. The z shear is deferred until we know there is a hit.
        let sx = -d.x / d.z;
        let sy = -d.y / d.z;
        let sz = 1.0 / d.z;
        p0t.x += sx * p0t.z;
        p0t.y += sy * p0t.z;
        p1t.x += sx * p1t.z;
        p1t.y += sy * p1t.z;
        p2t.x += sx * p2t.z;
        p2t.y += sy * p2t.z;

        let mut e0 = p1t.x * p2t.y - p1t.y * p2t.x;
        let mut e1 = p2t.x * p0t.y - p2t.y * p0t.x;
        let mut e2 = p0t.x * p1t.y - p0t.y * p1t.x;

        // redo the edge functions in double precision when any lands exactly on zero
        if e0 == 0.0 || e1 == 0.0 || e2 == 0.0 {
            e0 = ((p1t.x as f64) * (p2t.y as f64) - (p1t.y as f64) * (p2t.x as f64)) as Float;
            e1 = ((p2t.x as f64) * (p0t.y as f64) - (p2t.y as f64) * (p0t.x as f64)) as Float;
            e2 = ((p0t.x as f64) * (p1t.y as f64) - (p0t.y as f64) * (p1t.x as f64)) as Float;
        }

        if (e0 < 0.0 || e1 < 0.0 || e2 < 0.0) && (e0 > 0.0 || e1 > 0.0 || e2 > 0.0) {
            return None;
        }
        let det = e0 + e1 + e2;
        if det == 0.0 {
            return None;
        }

        p0t.z *= sz;
        p1t.z *= sz;
        p2t.z *= sz;
        let t_scaled = e0 * p0t.z + e1 * p1t.z + e2 * p2t.z;
        if det < 0.0 && (t_scaled >= 0.0 || t_scaled < ray.t_max * det) {
            return None;
        } else if det > 0.0 && (t_scaled <= 0.0 || t_scaled > ray.t_max * det) {
            return None;
        }

        let inv_det = 1.0 / det;
        let b = [e0 * inv_det, e1 * inv_det, e2 * inv_det];
        let t = t_scaled * inv_det;

        // make sure t is conservatively greater than zero
        let max_zt = max_component(vec3f!(p0t.z, p1t.z, p2t.z).map(Float::abs));
        let delta_z = gamma(3) * max_zt;
        let max_xt = max_component(vec3f!(p0t.x, p1t.x, p2t.x).map(Float::abs));
        let max_yt = max_component(vec3f!(p0t.y, p1t.y, p2t.y).map(Float::abs));
        let delta_x = gamma(5) * (max_xt + max_zt);
        let delta_y = gamma(5) * (max_yt + max_zt);
        let delta_e = 2.0 * (gamma(2) * max_xt * max_yt + delta_y * max_xt + delta_x * max_yt);
        let max_e = max_component(vec3f!(e0, e1, e2).map(Float::abs));
        let delta_t = 3.0 * (gamma(3) * max_e * max_zt + delta_e * max_zt + delta_z * max_e) * inv_det.abs();
        if t <= delta_t {
            return None;
        }

        Some((t, b))
    }
}

impl Shape for TriangleMesh {
    fn primitive_count(&self) -> usize {
        self.vertex_indices.len()
    }

    fn object_bound(&self, prim: usize) -> Bounds3f {
        let [p0, p1, p2] = self.positions(prim);
        Bounds3f::with_bounds(p0, p1).join_point(&p2)
    }

    fn intersect(&self, prim: usize, ray: &Ray) -> Option<SurfaceInteraction> {
        let (t, b) = self.hit(prim, ray)?;
        let [p0, p1, p2] = self.positions(prim);
        let uv = self.uvs(prim);

        let duv02 = uv[0] - uv[2];
        let duv12 = uv[1] - uv[2];
        let dp02 = p0 - p2;
        let dp12 = p1 - p2;
        let n = dp02.cross(dp12).normalize();

        let determinant = duv02.x * duv12.y - duv02.y * duv12.x;
        let dpdu = if determinant.abs() < 1e-8 {
            // degenerate uvs, any tangent will do
            crate::coordinate_system(n).0
        } else {
            (duv12.y * dp02 - duv02.y * dp12) / determinant
        };

        let p_abs_sum = (b[0] * p0.to_vec()).map(Float::abs)
            + (b[1] * p1.to_vec()).map(Float::abs)
            + (b[2] * p2.to_vec()).map(Float::abs);
        let p_err = p_abs_sum * gamma(7);

        let p_hit = Point3f::from_vec(b[0] * p0.to_vec() + b[1] * p1.to_vec() + b[2] * p2.to_vec());
        let uv_hit = Point2f::from_vec(b[0] * uv[0].to_vec() + b[1] * uv[1].to_vec() + b[2] * uv[2].to_vec());

        let mut si = SurfaceInteraction::new(p_hit, p_err, ray.time, uv_hit, -ray.dir, Normal3(n), dpdu, t);
        si.prim_index = prim;
        Some(si)
    }

    fn intersect_test(&self, prim: usize, ray: &Ray) -> bool {
        self.hit(prim, ray).is_some()
    }

    fn area(&self) -> Float {
        self.area
    }

    fn world_area(&self, object_to_world: &Transform) -> Float {
        (0..self.vertex_indices.len())
            .map(|tri| {
                let [p0, p1, p2] = self.positions(tri);
                let e1: Vec3f = (p1 - p0).transform(*object_to_world);
                let e2: Vec3f = (p2 - p0).transform(*object_to_world);
                0.5 * e1.cross(e2).magnitude()
            })
            .sum()
    }

    fn sample(&self, u: Point2f) -> (SurfaceHit, Float) {
        let (tri, _, u0) = self.area_distribution.sample_discrete_remapped(u[0]);
        let (b0, b1) = uniform_sample_triangle(Point2f::new(u0, u[1]));
        let [p0, p1, p2] = self.positions(tri);
        let b2 = 1.0 - b0 - b1;

        let p = Point3f::from_vec(b0 * p0.to_vec() + b1 * p1.to_vec() + b2 * p2.to_vec());
        let n = (p1 - p0).cross(p2 - p0).normalize();
        let p_abs_sum = (b0 * p0.to_vec()).map(Float::abs)
            + (b1 * p1.to_vec()).map(Float::abs)
            + (b2 * p2.to_vec()).map(Float::abs);

        let hit = SurfaceHit { p, p_err: p_abs_sum * gamma(6), time: 0.0, n: Normal3(n) };
        (hit, 1.0 / self.area)
    }
}
