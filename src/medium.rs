use crate::{Float, Ray, Vec3f, Point2f, coordinate_system, spherical_direction_in};
use crate::interaction::SurfaceHit;
use crate::sampler::Sampler;
use crate::spectrum::Spectrum;
use crate::math::consts;
use cgmath::InnerSpace;

/// A participating medium filling the inside of an entity's shape.
pub trait Medium: Sync + Send {
    /// Transmittance along `ray` from its origin to `ray.t_max`.
    fn tr(&self, ray: &Ray) -> Spectrum;

    /// Sample a free-flight distance along `ray` up to `ray.t_max`. Returns the factor to
    /// multiply the path throughput by, and the scattering point if one was chosen before
    /// `t_max`.
    fn sample(&self, ray: &Ray, sampler: &mut dyn Sampler) -> (Spectrum, Option<MediumInteraction>);
}

/// A scattering event inside a medium.
#[derive(Clone, Copy, Debug)]
pub struct MediumInteraction {
    pub hit: SurfaceHit,

    /// Direction back along the incoming ray, normalized
    pub wo: Vec3f,

    pub phase: HenyeyGreenstein,
}

pub trait PhaseFunction {
    /// Density of scattering from `wo` into `wi`, both pointing away from the scattering point.
    fn p(&self, wo: Vec3f, wi: Vec3f) -> Float;

    /// Sample an incident direction, returning it and its density. The phase function is
    /// sampled exactly, so the value equals the pdf.
    fn sample_p(&self, wo: Vec3f, u: Point2f) -> (Vec3f, Float);
}

#[derive(Clone, Copy, Debug)]
pub struct HenyeyGreenstein {
    g: Float,
}

impl HenyeyGreenstein {
    /// `g` in (-1, 1): negative scatters backwards, positive forwards, zero is isotropic.
    pub fn new(g: Float) -> Self {
        Self { g: g.clamp(-0.99, 0.99) }
    }
}

fn phase_hg(cos_theta: Float, g: Float) -> Float {
    let denom = 1.0 + g * g + 2.0 * g * cos_theta;
    consts::INV_4_PI * (1.0 - g * g) / (denom * denom.max(0.0).sqrt())
}

impl PhaseFunction for HenyeyGreenstein {
    fn p(&self, wo: Vec3f, wi: Vec3f) -> Float {
        phase_hg(wo.dot(wi), self.g)
    }

    fn sample_p(&self, wo: Vec3f, u: Point2f) -> (Vec3f, Float) {
        let g = self.g;
        let cos_theta = if g.abs() < 1e-3 {
            1.0 - 2.0 * u[0]
        } else {
            let sqr_term = (1.0 - g * g) / (1.0 + g - 2.0 * g * u[0]);
            -(1.0 + g * g - sqr_term * sqr_term) / (2.0 * g)
        };

        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
        let phi = 2.0 * consts::PI * u[1];
        let (v1, v2) = coordinate_system(wo);
        let wi = spherical_direction_in(sin_theta, cos_theta, phi, v1, v2, wo);
        (wi, phase_hg(cos_theta, g))
    }
}

/// Medium with constant absorption and scattering coefficients.
pub struct HomogeneousMedium {
    sigma_a: Spectrum,
    sigma_s: Spectrum,
    sigma_t: Spectrum,
    g: Float,
}

impl HomogeneousMedium {
    pub fn new(sigma_a: Spectrum, sigma_s: Spectrum, g: Float) -> Self {
        Self { sigma_a, sigma_s, sigma_t: sigma_a + sigma_s, g }
    }

    /// Parametrized by extinction and single scattering albedo instead.
    pub fn from_albedo(sigma_t: Spectrum, albedo: Spectrum, g: Float) -> Self {
        let albedo = albedo.clamp(0.0, 1.0);
        Self::new(sigma_t * (Spectrum::uniform(1.0) - albedo), sigma_t * albedo, g)
    }

    pub fn sigma_a(&self) -> Spectrum {
        self.sigma_a
    }

    pub fn sigma_s(&self) -> Spectrum {
        self.sigma_s
    }
}

impl Medium for HomogeneousMedium {
    fn tr(&self, ray: &Ray) -> Spectrum {
        let dist = (ray.t_max * ray.dir.magnitude()).min(Float::MAX);
        (-self.sigma_t * dist).exp()
    }

    fn sample(&self, ray: &Ray, sampler: &mut dyn Sampler) -> (Spectrum, Option<MediumInteraction>) {
        // pick a channel and sample a distance by its extinction
        let channel = ((sampler.get_1d() * 3.0) as usize).min(2);
        let dir_len = ray.dir.magnitude();
        let dist = -(1.0 - sampler.get_1d()).ln() / self.sigma_t[channel];
        let t = (dist / dir_len).min(ray.t_max);
        let sampled_medium = t < ray.t_max;

        let tr = (-self.sigma_t * (t.min(Float::MAX) * dir_len)).exp();

        // the pdf is averaged over the channel choice
        let density = if sampled_medium { self.sigma_t * tr } else { tr };
        let mut pdf = density.average();
        if pdf == 0.0 {
            debug_assert!(tr.is_black());
            pdf = 1.0;
        }

        if sampled_medium {
            let mi = MediumInteraction {
                hit: SurfaceHit::in_medium(ray.at(t), ray.time),
                wo: -ray.dir.normalize(),
                phase: HenyeyGreenstein::new(self.g),
            };
            (tr * self.sigma_s / pdf, Some(mi))
        } else {
            (tr / pdf, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::RandomSampler;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_tr_beer_lambert() {
        let m = HomogeneousMedium::new(Spectrum::uniform(0.5), Spectrum::uniform(0.5), 0.0);
        let ray = Ray::with_extent(point3f!(0, 0, 0), vec3f!(0, 0, 2), 1.0);
        assert_abs_diff_eq!(m.tr(&ray)[0], (-2.0 as Float).exp(), epsilon = 1e-6);
    }

    #[test]
    fn test_sample_is_unbiased_for_transmittance() {
        // with no scattering, the expected throughput of samples that pass through is Tr
        let m = HomogeneousMedium::new(Spectrum::uniform(0.7), Spectrum::zero(), 0.0);
        let ray = Ray::with_extent(point3f!(0, 0, 0), vec3f!(1, 0, 0), 1.5);
        let mut sampler = RandomSampler::new_with_seed(1, 5);
        let n = 20000;
        let mut sum = 0.0;
        for _ in 0..n {
            let (beta, mi) = m.sample(&ray, &mut sampler);
            if mi.is_none() {
                sum += beta[0];
            }
        }
        assert_abs_diff_eq!(sum / n as Float, m.tr(&ray)[0], epsilon = 0.02);
    }

    #[test]
    fn test_hg_normalized() {
        let hg = HenyeyGreenstein::new(0.6);
        let wo = vec3f!(0, 0, 1);
        let n = 64;
        let mut integral = 0.0;
        for i in 0..n {
            for j in 0..n {
                let u = Point2f::new((i as Float + 0.5) / n as Float, (j as Float + 0.5) / n as Float);
                let wi = crate::sampling::uniform_sample_sphere(u);
                integral += hg.p(wo, wi) / crate::sampling::uniform_sphere_pdf();
            }
        }
        assert_abs_diff_eq!(integral / (n * n) as Float, 1.0, epsilon = 0.05);

        let (wi, pdf) = hg.sample_p(wo, Point2f::new(0.3, 0.6));
        assert_abs_diff_eq!(pdf, hg.p(wo, wi), epsilon = 1e-4);
    }
}
