use crate::geometry::bounds::Bounds3f;
use crate::geometry::{Ray, Transform};
use crate::interaction::{SurfaceInteraction, SurfaceHit};
use crate::{Float, Point2f, Vec3f, distance_squared, abs_dot};
use cgmath::InnerSpace;

pub mod sphere;
pub mod quad;
pub mod triangle;

pub use sphere::Sphere;
pub use quad::Quad;
pub use triangle::TriangleMesh;

/// Geometry in its own local coordinate system. A shape may be made of several
/// sub-primitives (the triangles of a mesh, say), addressed by index.
///
/// Sampling and pdf methods work in local space as well. Callers placing the shape with a
/// transform that does not preserve angles must convert the densities themselves.
pub trait Shape: Sync + Send {
    fn primitive_count(&self) -> usize { 1 }

    fn object_bound(&self, prim: usize) -> Bounds3f;

    /// Closest intersection of `ray` with primitive `prim` in `(0, ray.t_max)`. The
    /// interaction's `t` is the parametric hit distance along `ray`.
    fn intersect(&self, prim: usize, ray: &Ray) -> Option<SurfaceInteraction>;

    fn intersect_test(&self, prim: usize, ray: &Ray) -> bool {
        self.intersect(prim, ray).is_some()
    }

    /// Total surface area of all primitives.
    fn area(&self) -> Float;

    /// Total surface area once placed in the world by `object_to_world`. The default
    /// integrates the area change over a grid of area samples.
    fn world_area(&self, object_to_world: &Transform) -> Float {
        const N: usize = 32;
        let mut sum = 0.0;
        for i in 0..N {
            for j in 0..N {
                let u = Point2f::new((i as Float + 0.5) / N as Float, (j as Float + 0.5) / N as Float);
                let (hit, _) = self.sample(u);
                sum += object_to_world.area_jacobian(&hit.n);
            }
        }
        self.area() * sum / (N * N) as Float
    }

    /// Closest intersection with any primitive, with `t` relative to `ray`.
    fn intersect_nearest(&self, ray: &Ray) -> Option<SurfaceInteraction> {
        let mut ray = *ray;
        let mut nearest = None;
        for prim in 0..self.primitive_count() {
            if let Some(si) = self.intersect(prim, &ray) {
                ray.t_max = si.t;
                nearest = Some(si);
            }
        }
        nearest
    }

    /// Sample a point uniformly by area, returning it with its area density.
    fn sample(&self, u: Point2f) -> (SurfaceHit, Float);

    /// Sample a point on the shape as seen from `reference`, returning the point and the
    /// density of the direction towards it with respect to solid angle.
    fn sample_from_ref(&self, reference: &SurfaceHit, u: Point2f) -> Option<(SurfaceHit, Float)> {
        let (hit, area_pdf) = self.sample(u);
        let wi = hit.p - reference.p;
        let dist2 = wi.magnitude2();
        if dist2 == 0.0 {
            return None;
        }
        let wi = wi.normalize();

        let cos = abs_dot(hit.n.0, -wi);
        if cos == 0.0 {
            return None;
        }
        let pdf = area_pdf * dist2 / cos;
        if pdf.is_finite() { Some((hit, pdf)) } else { None }
    }

    /// Solid angle density of `sample_from_ref` choosing direction `wi` from `reference`.
    fn pdf_from_ref(&self, reference: &SurfaceHit, wi: Vec3f) -> Float {
        match self.intersect_nearest(&reference.spawn_ray(wi)) {
            Some(si) => {
                let cos = abs_dot(si.hit.n.0, -wi.normalize());
                if cos == 0.0 {
                    return 0.0;
                }
                let pdf = distance_squared(reference.p, si.hit.p) / (cos * self.area());
                if pdf.is_finite() { pdf } else { 0.0 }
            }
            None => 0.0,
        }
    }
}
