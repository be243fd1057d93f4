use crate::spectrum::Spectrum;
use crate::material::Material;
use crate::interaction::SurfaceInteraction;
use bumpalo::Bump;
use crate::reflection::bsdf::Bsdf;
use crate::reflection::LambertianReflection;

/// A perfectly diffuse surface.
pub struct MatteMaterial {
    diffuse: Spectrum,
}

impl MatteMaterial {
    pub fn new(diffuse: Spectrum) -> Self {
        Self { diffuse }
    }
}

impl Material for MatteMaterial {
    fn compute_scattering_functions<'a>(&self, si: &SurfaceInteraction, arena: &'a Bump) -> Bsdf<'a> {
        let mut bsdf = Bsdf::new(si, 1.0);

        // a black surface still has a (black) lobe, so it is opaque rather than pass-through
        let r = self.diffuse.clamp_positive();
        bsdf.add(arena.alloc(LambertianReflection { r }));
        bsdf
    }
}
