use crate::spectrum::Spectrum;
use crate::material::Material;
use crate::SurfaceInteraction;
use bumpalo::Bump;
use crate::reflection::bsdf::Bsdf;
use crate::reflection::SpecularReflection;
use crate::fresnel::FresnelNoOp;

pub struct MirrorMaterial {
    reflectance: Spectrum,
}

impl MirrorMaterial {
    pub fn new(reflectance: Spectrum) -> Self {
        Self { reflectance }
    }
}

impl Material for MirrorMaterial {
    fn compute_scattering_functions<'a>(&self, si: &SurfaceInteraction, arena: &'a Bump) -> Bsdf<'a> {
        let mut bsdf = Bsdf::new(si, 1.0);
        let r = self.reflectance.clamp_positive();
        bsdf.add(arena.alloc(SpecularReflection::new(r, FresnelNoOp)));
        bsdf
    }
}
