use crate::{Float, Normal3, Point3f, Vec3f, Point2f, coordinate_system, spherical_direction_in, distance_squared};
use crate::err_float::gamma;
use crate::geometry::Ray;
use crate::geometry::bounds::Bounds3f;
use crate::interaction::{SurfaceInteraction, SurfaceHit};
use crate::sampling::{uniform_sample_sphere, uniform_cone_pdf};
use crate::shapes::Shape;
use crate::math::consts;
use cgmath::{InnerSpace, EuclideanSpace};

/// A full sphere centered at the local origin.
pub struct Sphere {
    radius: Float,
}

impl Sphere {
    pub fn new(radius: Float) -> Self {
        assert!(radius > 0.0, "sphere radius must be positive");
        Self { radius }
    }

    pub fn radius(&self) -> Float {
        self.radius
    }

    /// Solve for the ray parameters where the ray crosses the sphere, in double precision.
    fn quadratic_hits(&self, ray: &Ray) -> Option<(f64, f64)> {
        let (ox, oy, oz) = (ray.origin.x as f64, ray.origin.y as f64, ray.origin.z as f64);
        let (dx, dy, dz) = (ray.dir.x as f64, ray.dir.y as f64, ray.dir.z as f64);
        let r = self.radius as f64;

        let a = dx * dx + dy * dy + dz * dz;
        let b = 2.0 * (dx * ox + dy * oy + dz * oz);
        let c = ox * ox + oy * oy + oz * oz - r * r;

        let discrim = b * b - 4.0 * a * c;
        if discrim < 0.0 || a == 0.0 {
            return None;
        }
        let root = discrim.sqrt();
        // numerically stable form of the quadratic formula
        let q = if b < 0.0 { -0.5 * (b - root) } else { -0.5 * (b + root) };
        let (t0, t1) = if q == 0.0 {
            (0.0, 0.0)
        } else {
            (q / a, c / q)
        };
        Some(if t0 > t1 { (t1, t0) } else { (t0, t1) })
    }

    fn hit_t(&self, ray: &Ray) -> Option<Float> {
        let (t0, t1) = self.quadratic_hits(ray)?;
        let t_max = ray.t_max as f64;
        if t0 >= t_max || t1 <= 0.0 {
            return None;
        }
        let t = if t0 > 0.0 { t0 } else { t1 };
        if t >= t_max {
            return None;
        }
        Some(t as Float)
    }

    fn surface_point(&self, p: Point3f, time: Float) -> SurfaceHit {
        // reproject onto the surface to cancel the error from evaluating the ray
        let mut p = p * (self.radius / p.to_vec().magnitude());
        if p.x == 0.0 && p.y == 0.0 {
            p.x = 1e-5 * self.radius;
        }
        let p_err = p.to_vec().map(Float::abs) * gamma(5);
        let n = Normal3(p.to_vec().normalize());
        SurfaceHit { p, p_err, time, n }
    }
}

impl Shape for Sphere {
    fn object_bound(&self, _prim: usize) -> Bounds3f {
        bounds3f!((-self.radius, -self.radius, -self.radius), (self.radius, self.radius, self.radius))
    }

    fn intersect(&self, _prim: usize, ray: &Ray) -> Option<SurfaceInteraction> {
        let t = self.hit_t(ray)?;
        let hit = self.surface_point(ray.at(t), ray.time);
        let p = hit.p;

        let mut phi = Float::atan2(p.y, p.x);
        if phi < 0.0 { phi += 2.0 * consts::PI }
        let theta = (p.z / self.radius).clamp(-1.0, 1.0).acos();
        let uv = Point2f::new(phi * consts::INV_2_PI, theta * consts::FRAC_1_PI);
        let dpdu = Vec3f::new(-2.0 * consts::PI * p.y, 2.0 * consts::PI * p.x, 0.0);

        Some(SurfaceInteraction::new(hit.p, hit.p_err, ray.time, uv, -ray.dir, hit.n, dpdu, t))
    }

    fn intersect_test(&self, _prim: usize, ray: &Ray) -> bool {
        self.hit_t(ray).is_some()
    }

    fn area(&self) -> Float {
        4.0 * consts::PI * self.radius * self.radius
    }

    fn sample(&self, u: Point2f) -> (SurfaceHit, Float) {
        let p = Point3f::from_vec(uniform_sample_sphere(u) * self.radius);
        (self.surface_point(p, 0.0), 1.0 / self.area())
    }

    /// Samples uniformly inside the cone of directions the sphere subtends from `reference`
    /// when it lies outside the sphere.
    fn sample_from_ref(&self, reference: &SurfaceHit, u: Point2f) -> Option<(SurfaceHit, Float)> {
        let center = Point3f::origin();
        let r = self.radius;
        let dc2 = distance_squared(reference.p, center);
        if dc2 <= r * r {
            // inside, fall back to area sampling
            let (hit, area_pdf) = self.sample(u);
            let wi = hit.p - reference.p;
            let dist2 = wi.magnitude2();
            if dist2 == 0.0 {
                return None;
            }
            let cos = hit.n.dot(-wi.normalize()).abs();
            let pdf = area_pdf * dist2 / cos;
            return if cos > 0.0 && pdf.is_finite() {
                Some((SurfaceHit { time: reference.time, ..hit }, pdf))
            } else {
                None
            };
        }

        let dc = dc2.sqrt();
        let sin_theta_max2 = r * r / dc2;
        let cos_theta_max = Float::sqrt(Float::max(0.0, 1.0 - sin_theta_max2));

        let cos_theta = (1.0 - u[0]) + u[0] * cos_theta_max;
        let sin_theta2 = Float::max(0.0, 1.0 - cos_theta * cos_theta);
        let phi = u[1] * 2.0 * consts::PI;

        // angle from the sphere center to the sampled point
        let ds = dc * cos_theta - Float::sqrt(Float::max(0.0, r * r - dc2 * sin_theta2));
        let cos_alpha = ((dc2 + r * r - ds * ds) / (2.0 * dc * r)).clamp(-1.0, 1.0);
        let sin_alpha = Float::sqrt(Float::max(0.0, 1.0 - cos_alpha * cos_alpha));

        let wc = (center - reference.p).normalize();
        let (wc_x, wc_y) = coordinate_system(wc);
        let n = spherical_direction_in(sin_alpha, cos_alpha, phi, -wc_x, -wc_y, -wc);
        let p = center + n * r;

        let hit = SurfaceHit {
            p,
            p_err: p.to_vec().map(Float::abs) * gamma(5),
            time: reference.time,
            n: Normal3(n.normalize()),
        };
        Some((hit, uniform_cone_pdf(cos_theta_max)))
    }

    fn pdf_from_ref(&self, reference: &SurfaceHit, wi: Vec3f) -> Float {
        let center = Point3f::origin();
        let r = self.radius;
        let dc2 = distance_squared(reference.p, center);
        if dc2 <= r * r {
            let ray = reference.spawn_ray(wi);
            return match self.intersect(0, &ray) {
                Some(si) => {
                    let cos = si.hit.n.dot(-wi.normalize()).abs();
                    let pdf = distance_squared(reference.p, si.hit.p) / (cos * self.area());
                    if pdf.is_finite() { pdf } else { 0.0 }
                }
                None => 0.0,
            };
        }

        let cos_theta_max = Float::sqrt(Float::max(0.0, 1.0 - r * r / dc2));
        uniform_cone_pdf(cos_theta_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256Plus;

    #[test]
    fn test_hit_from_outside_and_inside() {
        let sphere = Sphere::new(2.0);
        let outside = Ray::new(point3f!(0, 0, -5), vec3f!(0, 0, 1));
        let si = sphere.intersect(0, &outside).unwrap();
        assert_abs_diff_eq!(si.t, 3.0, epsilon = 1e-5);
        assert_abs_diff_eq!(si.hit.n.0, vec3f!(0, 0, -1), epsilon = 1e-5);

        let inside = Ray::new(point3f!(0, 0, 0), vec3f!(1, 0, 0));
        let si = sphere.intersect(0, &inside).unwrap();
        assert_abs_diff_eq!(si.t, 2.0, epsilon = 1e-5);

        let mut short = outside;
        short.t_max = 2.5;
        assert!(sphere.intersect(0, &short).is_none());
        assert!(!sphere.intersect_test(0, &Ray::new(point3f!(0, 3, -5), vec3f!(0, 0, 1))));
    }

    #[test]
    fn test_cone_samples_are_visible_and_match_pdf() {
        let sphere = Sphere::new(1.0);
        let reference = SurfaceHit::in_medium(point3f!(0, 0, -4), 0.0);
        let mut rng = Xoshiro256Plus::seed_from_u64(9);
        for _ in 0..200 {
            let (hit, pdf) = sphere.sample_from_ref(&reference, Point2f::new(rng.gen(), rng.gen())).unwrap();
            assert_abs_diff_eq!(hit.p.to_vec().magnitude(), 1.0, epsilon = 1e-4);
            // sampled points face the reference point
            assert!(hit.n.dot(reference.p - hit.p) >= -1e-4);
            let wi = (hit.p - reference.p).normalize();
            assert_abs_diff_eq!(sphere.pdf_from_ref(&reference, wi), pdf, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_world_area_of_scaled_sphere() {
        let sphere = Sphere::new(1.0);
        let uniform = crate::Transform::translate(vec3f!(1, 2, 3)) * crate::Transform::scale(2.0, 2.0, 2.0);
        assert_abs_diff_eq!(sphere.world_area(&uniform), 16.0 * consts::PI, epsilon = 1e-3);

        // prolate spheroid with semi-axes 1, 1, 2
        let e = Float::sqrt(0.75);
        let expected = 2.0 * consts::PI * (1.0 + 2.0 / e * e.asin());
        let stretched = crate::Transform::scale(1.0, 1.0, 2.0);
        assert_abs_diff_eq!(sphere.world_area(&stretched), expected, epsilon = 0.05);
    }
}
