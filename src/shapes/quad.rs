use crate::{Float, Normal3, Point3f, Vec3f, Point2f};
use crate::err_float::gamma;
use crate::geometry::{Ray, Transform, Transformable};
use crate::geometry::bounds::Bounds3f;
use crate::interaction::{SurfaceInteraction, SurfaceHit};
use crate::shapes::Shape;
use cgmath::{EuclideanSpace, InnerSpace};

/// The unit square `[-0.5, 0.5]^2` in the local z = 0 plane, facing +z. Scale and place it
/// with the entity's transform.
#[derive(Default)]
pub struct Quad;

impl Quad {
    pub fn new() -> Self {
        Quad
    }

    fn hit_t(ray: &Ray) -> Option<Float> {
        if ray.dir.z == 0.0 {
            return None;
        }
        let t = -ray.origin.z / ray.dir.z;
        if t <= 0.0 || t >= ray.t_max {
            return None;
        }
        let p = ray.at(t);
        if p.x.abs() > 0.5 || p.y.abs() > 0.5 {
            return None;
        }
        Some(t)
    }
}

impl Shape for Quad {
    fn object_bound(&self, _prim: usize) -> Bounds3f {
        bounds3f!((-0.5, -0.5, 0), (0.5, 0.5, 0))
    }

    fn intersect(&self, _prim: usize, ray: &Ray) -> Option<SurfaceInteraction> {
        let t = Self::hit_t(ray)?;
        let mut p = ray.at(t);
        p.z = 0.0;
        let p_err = Vec3f::new(p.x.abs(), p.y.abs(), 0.0) * gamma(3);
        let uv = Point2f::new(p.x + 0.5, p.y + 0.5);

        Some(SurfaceInteraction::new(
            p,
            p_err,
            ray.time,
            uv,
            -ray.dir,
            Normal3::new(0.0, 0.0, 1.0),
            Vec3f::new(1.0, 0.0, 0.0),
            t,
        ))
    }

    fn intersect_test(&self, _prim: usize, ray: &Ray) -> bool {
        Self::hit_t(ray).is_some()
    }

    fn area(&self) -> Float {
        1.0
    }

    fn world_area(&self, object_to_world: &Transform) -> Float {
        let du: Vec3f = Vec3f::new(1.0, 0.0, 0.0).transform(*object_to_world);
        let dv: Vec3f = Vec3f::new(0.0, 1.0, 0.0).transform(*object_to_world);
        du.cross(dv).magnitude()
    }

    fn sample(&self, u: Point2f) -> (SurfaceHit, Float) {
        let p = Point3f::new(u[0] - 0.5, u[1] - 0.5, 0.0);
        let hit = SurfaceHit {
            p,
            p_err: p.to_vec().map(Float::abs) * gamma(3),
            time: 0.0,
            n: Normal3::new(0.0, 0.0, 1.0),
        };
        (hit, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_two_sided_hits() {
        let quad = Quad::new();
        let from_above = Ray::new(point3f!(0.2, 0.1, 2), vec3f!(0, 0, -1));
        let from_below = Ray::new(point3f!(0.2, 0.1, -2), vec3f!(0, 0, 1));
        let si = quad.intersect(0, &from_above).unwrap();
        assert_abs_diff_eq!(si.t, 2.0);
        assert_abs_diff_eq!(si.uv, Point2f::new(0.7, 0.6), epsilon = 1e-6);
        assert!(quad.intersect(0, &from_below).is_some());
        assert!(!quad.intersect_test(0, &Ray::new(point3f!(0.6, 0, 2), vec3f!(0, 0, -1))));
    }

    #[test]
    fn test_area_pdf_conversion() {
        let quad = Quad::new();
        let reference = SurfaceHit::in_medium(point3f!(0, 0, 2), 0.0);
        let (hit, pdf) = quad.sample_from_ref(&reference, Point2f::new(0.5, 0.5)).unwrap();
        assert_abs_diff_eq!(hit.p, point3f!(0, 0, 0));
        assert_abs_diff_eq!(pdf, 4.0, epsilon = 1e-5);
        let wi = (hit.p - reference.p).normalize();
        assert_abs_diff_eq!(quad.pdf_from_ref(&reference, wi), 4.0, epsilon = 1e-4);
    }

    #[test]
    fn test_world_area_under_skew() {
        let quad = Quad::new();
        let t = Transform::rotate(90.0, vec3f!(1, 0, 0)) * Transform::scale(0.5, 3.0, 7.0);
        assert_abs_diff_eq!(quad.world_area(&t), 1.5, epsilon = 1e-5);
        assert_abs_diff_eq!(quad.world_area(&t), t.area_jacobian(&Normal3::new(0.0, 0.0, 1.0)), epsilon = 1e-4);
    }
}
