use crate::interaction::SurfaceInteraction;
use bumpalo::Bump;
use crate::reflection::bsdf::Bsdf;

pub mod matte;
pub mod mirror;
pub mod glass;

pub use matte::MatteMaterial;
pub use mirror::MirrorMaterial;
pub use glass::GlassMaterial;

pub trait Material: Sync + Send {
    /// Build the BSDF at `si`, allocating its BxDFs in `arena`.
    fn compute_scattering_functions<'a>(
        &self,
        si: &SurfaceInteraction,
        arena: &'a Bump,
    ) -> Bsdf<'a>;
}
