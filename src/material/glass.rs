use crate::spectrum::Spectrum;
use crate::{Float, SurfaceInteraction};
use crate::material::Material;
use bumpalo::Bump;
use crate::reflection::bsdf::Bsdf;
use crate::reflection::{SpecularReflection, SpecularTransmission};
use crate::fresnel::FresnelDielectric;

/// Smooth dielectric with separate specular reflection and transmission lobes.
pub struct GlassMaterial {
    reflectance: Spectrum,
    transmittance: Spectrum,
    eta: Float,
}

impl GlassMaterial {
    pub fn new(kr: Spectrum, kt: Spectrum, eta: Float) -> Self {
        Self {
            reflectance: kr,
            transmittance: kt,
            eta,
        }
    }
}

impl Material for GlassMaterial {
    fn compute_scattering_functions<'a>(&self, si: &SurfaceInteraction, arena: &'a Bump) -> Bsdf<'a> {
        let r = self.reflectance.clamp_positive();
        let t = self.transmittance.clamp_positive();
        let mut bsdf = Bsdf::new(si, self.eta);

        // keep the reflection lobe even when black so the surface never turns pass-through
        if !r.is_black() || t.is_black() {
            let fresnel = FresnelDielectric::new(1.0, self.eta);
            let reflection = arena.alloc(SpecularReflection::new(r, fresnel));
            bsdf.add(reflection);
        }

        if !t.is_black() {
            let transmission = arena.alloc(SpecularTransmission::new(t, 1.0, self.eta));
            bsdf.add(transmission);
        }
        bsdf
    }
}
