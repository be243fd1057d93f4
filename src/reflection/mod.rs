use bitflags::bitflags;
use crate::{Vec3f, Point2f, Float, Normal3};
use crate::spectrum::Spectrum;
use crate::fresnel::{Fresnel, FresnelDielectric};
use crate::sampling::cosine_sample_hemisphere;
use crate::math::consts;
use cgmath::InnerSpace;
use std::fmt::Debug;

pub mod bsdf;

bitflags! {
    pub struct BxDFType: u8 {
        const REFLECTION = 1;
        const TRANSMISSION = 1 << 1;
        const DIFFUSE = 1 << 2;
        const GLOSSY = 1 << 3;
        const SPECULAR = 1 << 4;
    }
}

// Directions below are in the local shading frame, where the normal is +z.

fn cos_theta(w: Vec3f) -> Float { w.z }
fn abs_cos_theta(w: Vec3f) -> Float { w.z.abs() }

pub fn refract(wi: Vec3f, n: Normal3, eta: Float) -> Option<Vec3f> {
    let cos_theta_i = n.dot(wi);
    let sin2_theta_i = Float::max(0.0, 1.0 - cos_theta_i * cos_theta_i);
    let sin2_theta_t = eta * eta * sin2_theta_i;
    if sin2_theta_t >= 1.0 { return None }
    let cos_theta_t = Float::sqrt(1.0 - sin2_theta_t);
    let wt = eta * -wi + (eta * cos_theta_i - cos_theta_t) * n.0;
    Some(wt)
}

pub fn reflect(wo: Vec3f, n: Vec3f) -> Vec3f {
    -wo + 2.0 * wo.dot(n) * n
}

pub fn same_hemisphere(v1: Vec3f, v2: Vec3f) -> bool {
    v1.z * v2.z > 0.0
}

#[derive(Clone, Copy, Debug)]
pub struct ScatterSample {
    pub f: Spectrum,
    pub wi: Vec3f,
    pub pdf: Float,
    pub sampled_type: BxDFType
}

pub trait BxDF: Debug {

    fn matches_flags(&self, t: BxDFType) -> bool {
        t.contains(self.get_type())
    }

    fn get_type(&self) -> BxDFType;

    /// Returns the value of the distribution function for the given pair of directions.
    fn f(&self, wo: Vec3f, wi: Vec3f) -> Spectrum;

    /// Samples an incident direction for the outgoing direction `wo`, together with the value
    /// of the distribution function for the pair and the density of the sampled direction.
    fn sample_f(&self, wo: Vec3f, sample: Point2f) -> Option<ScatterSample>;

    fn pdf(&self, wo: Vec3f, wi: Vec3f) -> Float;

}

/// BxDFs that importance sample with a cosine-weighted hemisphere get `sample_f` and `pdf`
/// for free.
pub trait DefaultSampleF: Debug {
    fn get_type(&self) -> BxDFType;

    fn f(&self, wo: Vec3f, wi: Vec3f) -> Spectrum;
}

impl<T> BxDF for T where T: DefaultSampleF {
    fn get_type(&self) -> BxDFType {
        <Self as DefaultSampleF>::get_type(self)
    }

    fn f(&self, wo: Vec3f, wi: Vec3f) -> Spectrum {
        <Self as DefaultSampleF>::f(self, wo, wi)
    }

    fn sample_f(&self, wo: Vec3f, sample: Point2f) -> Option<ScatterSample> {
        let mut wi = cosine_sample_hemisphere(sample);
        // flip direction if wo is on the opposite hemisphere
        if wo.z < 0.0 { wi.z *= -1.0; }
        let pdf = self.pdf(wo, wi);
        if pdf == 0.0 {
            return None;
        }
        let f = self.f(wo, wi);
        Some(ScatterSample { f, wi, pdf, sampled_type: self.get_type() })
    }

    fn pdf(&self, wo: Vec3f, wi: Vec3f) -> Float {
        if same_hemisphere(wo, wi) {
            abs_cos_theta(wi) * consts::FRAC_1_PI
        } else {
            0.0
        }
    }
}

#[derive(Debug)]
pub struct LambertianReflection {
    pub r: Spectrum,
}

impl DefaultSampleF for LambertianReflection {
    fn get_type(&self) -> BxDFType {
        BxDFType::REFLECTION | BxDFType::DIFFUSE
    }

    fn f(&self, _wo: Vec3f, _wi: Vec3f) -> Spectrum {
        self.r * consts::FRAC_1_PI
    }
}

#[derive(Debug)]
pub struct SpecularReflection<F: Fresnel> {
    r: Spectrum,
    fresnel: F
}

impl<F: Fresnel> SpecularReflection<F> {
    pub fn new(r: Spectrum, fresnel: F) -> Self {
        Self {r, fresnel}
    }
}

impl<F: Fresnel + Debug> BxDF for SpecularReflection<F> {
    fn get_type(&self) -> BxDFType {
        BxDFType::REFLECTION | BxDFType::SPECULAR
    }

    fn f(&self, _wo: Vec3f, _wi: Vec3f) -> Spectrum {
        Spectrum::zero()
    }

    fn sample_f(&self, wo: Vec3f, _sample: Point2f) -> Option<ScatterSample> {
        let wi = Vec3f::new(-wo.x, -wo.y, wo.z);
        if cos_theta(wi) == 0.0 {
            return None;
        }

        let reflected = self.fresnel.evaluate(cos_theta(wi)) * self.r / abs_cos_theta(wi);
        Some(ScatterSample { f: reflected, wi, pdf: 1.0, sampled_type: self.get_type() })
    }

    fn pdf(&self, _wo: Vec3f, _wi: Vec3f) -> Float {
        0.0
    }
}

#[derive(Debug)]
pub struct SpecularTransmission {
    t: Spectrum,
    eta_a: Float,
    eta_b: Float,
    fresnel: FresnelDielectric,
}

impl SpecularTransmission {
    /// `eta_a` is the index of refraction above the surface (on the side of the normal),
    /// `eta_b` below it.
    pub fn new(t: Spectrum, eta_a: Float, eta_b: Float) -> Self {
        Self {
            t, eta_a, eta_b, fresnel: FresnelDielectric::new(eta_a, eta_b)
        }
    }
}

impl BxDF for SpecularTransmission {
    fn get_type(&self) -> BxDFType {
        BxDFType::TRANSMISSION | BxDFType::SPECULAR
    }

    fn f(&self, _wo: Vec3f, _wi: Vec3f) -> Spectrum {
        Spectrum::zero()
    }

    fn sample_f(&self, wo: Vec3f, _sample: Point2f) -> Option<ScatterSample> {
        let entering = cos_theta(wo) > 0.0;
        let eta_i = if entering { self.eta_a } else { self.eta_b };
        let eta_t = if entering { self.eta_b } else { self.eta_a };

        let wi = refract(
            wo,
            Normal3::new(0.0, 0.0, 1.0).faceforward(wo),
            eta_i / eta_t
        )?;
        if cos_theta(wi) == 0.0 {
            return None;
        }

        let mut ft = self.t * (Spectrum::uniform(1.0) - self.fresnel.evaluate(cos_theta(wi)));
        // radiance is compressed into a smaller solid angle on entering the denser medium
        ft *= (eta_i * eta_i) / (eta_t * eta_t);
        Some(ScatterSample {
            f: ft / abs_cos_theta(wi),
            wi,
            pdf: 1.0,
            sampled_type: self.get_type()
        })
    }

    fn pdf(&self, _wo: Vec3f, _wi: Vec3f) -> Float {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fresnel::FresnelNoOp;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_lambertian_sample_matches_pdf() {
        let bxdf = LambertianReflection { r: Spectrum::uniform(0.5) };
        let wo = vec3f!(0.3, 0.2, 0.9).normalize();
        let s = bxdf.sample_f(wo, Point2f::new(0.3, 0.7)).unwrap();
        assert!(s.wi.z > 0.0);
        assert_abs_diff_eq!(s.pdf, bxdf.pdf(wo, s.wi), epsilon = 1e-6);
        assert_abs_diff_eq!(s.f[0], 0.5 * consts::FRAC_1_PI, epsilon = 1e-6);
    }

    #[test]
    fn test_mirror_reflects_about_normal() {
        let bxdf = SpecularReflection::new(Spectrum::uniform(1.0), FresnelNoOp);
        let wo = vec3f!(0.6, 0.0, 0.8);
        let s = bxdf.sample_f(wo, Point2f::new(0.0, 0.0)).unwrap();
        assert_abs_diff_eq!(s.wi, vec3f!(-0.6, 0.0, 0.8), epsilon = 1e-6);
        // f * cos / pdf is the reflectance
        assert_abs_diff_eq!(s.f[0] * s.wi.z.abs() / s.pdf, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_refraction_obeys_snell() {
        let bxdf = SpecularTransmission::new(Spectrum::uniform(1.0), 1.0, 1.5);
        let wo = vec3f!(0.5, 0.0, (0.75 as Float).sqrt());
        let s = bxdf.sample_f(wo, Point2f::new(0.0, 0.0)).unwrap();
        assert!(s.wi.z < 0.0);
        let sin_t = (s.wi.x * s.wi.x + s.wi.y * s.wi.y).sqrt();
        assert_abs_diff_eq!(sin_t * 1.5, 0.5, epsilon = 1e-5);
    }
}
