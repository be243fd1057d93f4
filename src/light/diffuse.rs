use std::sync::Arc;
use crate::{Float, Transform, Vec3f, Point2f, Transformable, abs_dot, distance_squared};
use crate::spectrum::Spectrum;
use crate::shapes::Shape;
use crate::light::{Light, LiSample, LightFlags, VisibilityTester};
use crate::interaction::SurfaceHit;
use crate::math::consts;
use cgmath::InnerSpace;

/// Emits a constant radiance from the front side of a shape. The shape is shared with the
/// entity that carries the light, and `light_to_world` must be that entity's transform.
pub struct DiffuseAreaLight {
    emit: Spectrum,
    shape: Arc<dyn Shape>,
    l2w: Transform,
    w2l: Transform,
    area: Float,
}

impl DiffuseAreaLight {
    pub fn new(emit: Spectrum, shape: Arc<dyn Shape>, light_to_world: Transform) -> Self {
        let area = shape.world_area(&light_to_world);
        Self {
            emit,
            shape,
            l2w: light_to_world,
            w2l: light_to_world.inverse(),
            area,
        }
    }

    /// World space surface area of the emitter
    pub fn area(&self) -> Float {
        self.area
    }

    /// Converts a solid angle density measured in the shape's space into one measured in
    /// the world, going through the area densities on either side of the transform.
    fn world_solid_angle_pdf(
        &self,
        local_pdf: Float,
        local_ref: &SurfaceHit,
        local_hit: &SurfaceHit,
        reference: &SurfaceHit,
        hit: &SurfaceHit,
    ) -> Float {
        let local_wi = local_hit.p - local_ref.p;
        let wi = hit.p - reference.p;
        if local_pdf == 0.0 || local_wi.magnitude2() == 0.0 || wi.magnitude2() == 0.0 {
            return 0.0;
        }

        let local_cos = abs_dot(local_hit.n.0, local_wi.normalize());
        let cos = abs_dot(hit.n.0, wi.normalize());
        if cos == 0.0 {
            return 0.0;
        }

        let local_area_pdf = local_pdf * local_cos / local_wi.magnitude2();
        let area_pdf = local_area_pdf / self.l2w.area_jacobian(&local_hit.n);
        let pdf = area_pdf * distance_squared(reference.p, hit.p) / cos;
        if pdf.is_finite() { pdf } else { 0.0 }
    }
}

impl Light for DiffuseAreaLight {
    fn flags(&self) -> LightFlags {
        LightFlags::Area
    }

    fn sample_incident_radiance(&self, reference: &SurfaceHit, u: Point2f) -> Option<LiSample> {
        let local_ref = reference.transform(self.w2l);
        let (local_hit, local_pdf) = self.shape.sample_from_ref(&local_ref, u)?;
        let p_shape = local_hit.transform(self.l2w);

        let pdf = self.world_solid_angle_pdf(local_pdf, &local_ref, &local_hit, reference, &p_shape);
        if pdf == 0.0 {
            return None;
        }
        let wi = (p_shape.p - reference.p).normalize();
        let radiance = self.emitted_radiance(&p_shape, -wi);

        Some(LiSample {
            radiance,
            wi,
            pdf,
            vis: VisibilityTester::new(reference.spawn_ray_to_hit(&p_shape)),
        })
    }

    fn pdf_incident_radiance(&self, reference: &SurfaceHit, wi: Vec3f) -> Float {
        let local_ref = reference.transform(self.w2l);
        let local_wi: Vec3f = wi.transform(self.w2l);
        let local_wi = local_wi.normalize();
        let local_pdf = self.shape.pdf_from_ref(&local_ref, local_wi);
        if local_pdf == 0.0 {
            return 0.0;
        }

        match self.shape.intersect_nearest(&local_ref.spawn_ray(local_wi)) {
            Some(si) => {
                let hit = si.hit.transform(self.l2w);
                self.world_solid_angle_pdf(local_pdf, &local_ref, &si.hit, reference, &hit)
            }
            None => 0.0,
        }
    }

    fn emitted_radiance(&self, hit: &SurfaceHit, w: Vec3f) -> Spectrum {
        if hit.n.dot(w) > 0.0 {
            self.emit
        } else {
            Spectrum::zero()
        }
    }

    fn power(&self, _world_radius: Float) -> Spectrum {
        self.emit * self.area * consts::PI
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::Quad;
    use crate::geometry::Normal3;
    use approx::assert_abs_diff_eq;

    fn ceiling_light() -> DiffuseAreaLight {
        // a 2x2 quad at y = 1 facing down
        let l2w = Transform::translate(vec3f!(0, 1, 0))
            * Transform::rotate(90.0, vec3f!(1, 0, 0))
            * Transform::scale(2.0, 2.0, 2.0);
        DiffuseAreaLight::new(Spectrum::uniform(3.0), Arc::new(Quad), l2w)
    }

    fn floor_point() -> SurfaceHit {
        SurfaceHit {
            p: point3f!(0, 0, 0),
            p_err: vec3f!(0, 0, 0),
            time: 0.0,
            n: Normal3::new(0.0, 1.0, 0.0),
        }
    }

    #[test]
    fn test_world_area_and_power() {
        let light = ceiling_light();
        assert_abs_diff_eq!(light.area(), 4.0, epsilon = 1e-4);
        assert_abs_diff_eq!(light.power(1.0)[0], 3.0 * 4.0 * consts::PI, epsilon = 1e-3);
    }

    #[test]
    fn test_sample_faces_reference() {
        let light = ceiling_light();
        let reference = floor_point();
        let s = light.sample_incident_radiance(&reference, Point2f::new(0.3, 0.8)).unwrap();
        assert!(s.wi.y > 0.0);
        assert_eq!(s.radiance, Spectrum::uniform(3.0));
        let pdf = light.pdf_incident_radiance(&reference, s.wi);
        assert_abs_diff_eq!(pdf, s.pdf, epsilon = 1e-3 * s.pdf);
    }

    #[test]
    fn test_back_side_is_dark() {
        let light = ceiling_light();
        let above = SurfaceHit { p: point3f!(0, 2, 0), ..floor_point() };
        let s = light.sample_incident_radiance(&above, Point2f::new(0.5, 0.5)).unwrap();
        assert!(s.radiance.is_black());
    }

    fn narrow_light() -> DiffuseAreaLight {
        // a 0.5 x 0.25 quad at y = 1 facing down, squashed along its normal as well
        let l2w = Transform::translate(vec3f!(0, 1, 0))
            * Transform::rotate(90.0, vec3f!(1, 0, 0))
            * Transform::scale(0.5, 0.25, 3.0);
        DiffuseAreaLight::new(Spectrum::uniform(3.0), Arc::new(Quad), l2w)
    }

    #[test]
    fn test_non_uniform_scale_area_and_pdf() {
        let light = narrow_light();
        assert_abs_diff_eq!(light.area(), 0.125, epsilon = 1e-5);
        assert_abs_diff_eq!(light.power(1.0)[0], 3.0 * 0.125 * consts::PI, epsilon = 1e-4);

        // straight above the reference the density is dist^2 / area
        let reference = floor_point();
        let s = light.sample_incident_radiance(&reference, Point2f::new(0.5, 0.5)).unwrap();
        assert_abs_diff_eq!(s.wi, vec3f!(0, 1, 0), epsilon = 1e-5);
        assert_abs_diff_eq!(s.pdf, 8.0, epsilon = 1e-3);
        assert_abs_diff_eq!(light.pdf_incident_radiance(&reference, s.wi), 8.0, epsilon = 1e-3);
    }

    #[test]
    fn test_non_uniform_scale_pdf_integrates_to_one() {
        // pdf * dw summed over a fine grid of points on the emitter covers the whole sphere once
        let light = narrow_light();
        let reference = SurfaceHit { p: point3f!(0.3, 0.2, -0.4), ..floor_point() };
        let n = 64;
        let cell_area = light.area() / (n * n) as Float;
        let mut total = 0.0;
        for i in 0..n {
            for j in 0..n {
                let u = Point2f::new((i as Float + 0.5) / n as Float, (j as Float + 0.5) / n as Float);
                let s = light.sample_incident_radiance(&reference, u).unwrap();
                let p: crate::Point3f = point3f!(u[0] - 0.5, u[1] - 0.5, 0).transform(light.l2w);
                let solid_angle = cell_area * s.wi.y.abs() / distance_squared(reference.p, p);
                total += s.pdf * solid_angle;
                assert_abs_diff_eq!(light.pdf_incident_radiance(&reference, s.wi), s.pdf, epsilon = 1e-3 * s.pdf);
            }
        }
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-3);
    }
}
