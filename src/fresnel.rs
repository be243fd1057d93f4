use crate::Float;
use crate::spectrum::Spectrum;

/// Unpolarized Fresnel reflectance at a boundary between two dielectrics. `cos_theta_i` is
/// measured on the incident side, negative values mean the light arrives from the `eta_t` side.
pub fn fresnel_dielectric(cos_theta_i: Float, mut eta_i: Float, mut eta_t: Float) -> Float {
    let mut cos_theta_i = cos_theta_i.clamp(-1.0, 1.0);
    let entering = cos_theta_i > 0.0;
    if !entering {
        std::mem::swap(&mut eta_i, &mut eta_t);
        cos_theta_i = cos_theta_i.abs();
    }

    // compute cos_theta_t using snell's law
    let sin_theta_i = Float::sqrt((1.0 - cos_theta_i * cos_theta_i).max(0.0));
    let sin_theta_t = eta_i / eta_t * sin_theta_i;
    if sin_theta_t >= 1.0 { return 1.0 } // total internal reflection
    let cos_theta_t = Float::sqrt((1.0 - sin_theta_t * sin_theta_t).max(0.0));

    let r_parallel = ((eta_t * cos_theta_i) - (eta_i * cos_theta_t)) / ((eta_t * cos_theta_i) + (eta_i * cos_theta_t));
    let r_perp =     ((eta_i * cos_theta_i) - (eta_t * cos_theta_t)) / ((eta_i * cos_theta_i) + (eta_t * cos_theta_t));

    (r_parallel * r_parallel + r_perp * r_perp) / 2.0
}

pub trait Fresnel: Sync + Send {

    /// Given the cosine of the angle made by the incoming direction and the surface normal,
    /// returns the amount of light reflected by the surface.
    fn evaluate(&self, cos_i: Float) -> Spectrum;
}

/// Reflects everything.
#[derive(Debug, Clone, Copy)]
pub struct FresnelNoOp;

impl Fresnel for FresnelNoOp {
    fn evaluate(&self, _cos_i: Float) -> Spectrum {
        Spectrum::uniform(1.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FresnelDielectric {
    /// incident index of refraction
    eta_i: Float,

    /// transmitted index of refraction
    eta_t: Float,
}

impl FresnelDielectric {
    pub fn new(eta_i: Float, eta_t: Float) -> Self {
        Self { eta_i, eta_t }
    }
}

impl Fresnel for FresnelDielectric {
    fn evaluate(&self, cos_i: Float) -> Spectrum {
        Spectrum::uniform(fresnel_dielectric(cos_i, self.eta_i, self.eta_t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_normal_incidence_glass() {
        // ((1.5 - 1) / (1.5 + 1))^2
        assert_abs_diff_eq!(fresnel_dielectric(1.0, 1.0, 1.5), 0.04, epsilon = 1e-5);
        assert_abs_diff_eq!(fresnel_dielectric(-1.0, 1.0, 1.5), 0.04, epsilon = 1e-5);
    }

    #[test]
    fn test_total_internal_reflection() {
        // from inside glass at a grazing angle
        assert_eq!(fresnel_dielectric(-0.1, 1.0, 1.5), 1.0);
        assert!(fresnel_dielectric(0.1, 1.0, 1.5) < 1.0);
    }
}
