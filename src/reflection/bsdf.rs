use crate::{Float, Normal3, Vec3f, Point2f, Frame};
use arrayvec::ArrayVec;
use crate::reflection::{BxDF, BxDFType, ScatterSample};
use crate::interaction::SurfaceInteraction;
use cgmath::InnerSpace;
use crate::spectrum::Spectrum;

pub const MAX_BXDFS: usize = 8;

/// The scattering functions at one surface point. BxDFs live in the per-tile arena and are
/// only valid for the sample they were created for.
pub struct Bsdf<'a> {

    /// Index of refraction over the boundary
    pub eta: Float,

    /// Geometry normal
    ng: Normal3,

    /// Shading frame, with the shading normal as `n`
    frame: Frame,

    bxdfs: ArrayVec<&'a dyn BxDF, MAX_BXDFS>
}

impl<'a> Bsdf<'a> {

    pub fn new(si: &SurfaceInteraction, eta: Float) -> Self {
        Self {
            eta,
            ng: si.hit.n,
            frame: si.shading_frame(),
            bxdfs: ArrayVec::new(),
        }
    }

    pub fn add(&mut self, bxdf: &'a dyn BxDF) {
        self.bxdfs.push(bxdf);
    }

    /// Total number of BxDFs. Zero means the surface doesn't scatter light at all and rays
    /// pass straight through it.
    pub fn count(&self) -> usize {
        self.bxdfs.len()
    }

    pub fn num_components(&self, flags: BxDFType) -> usize {
        self.matching(flags).count()
    }

    fn matching(&self, flags: BxDFType) -> impl Iterator<Item=&'a dyn BxDF> + '_ {
        self.bxdfs.iter().copied().filter(move |bxdf| bxdf.matches_flags(flags))
    }

    pub fn shading_normal(&self) -> Vec3f {
        self.frame.n
    }

    pub fn world_to_local(&self, v: Vec3f) -> Vec3f {
        self.frame.world_to_local(v)
    }

    pub fn local_to_world(&self, v: Vec3f) -> Vec3f {
        self.frame.local_to_world(v)
    }

    fn is_reflection(&self, wo_world: Vec3f, wi_world: Vec3f) -> bool {
        wi_world.dot(self.ng.0) * wo_world.dot(self.ng.0) > 0.0
    }

    pub fn f(&self, wo_world: Vec3f, wi_world: Vec3f, flags: BxDFType) -> Spectrum {
        let wi = self.world_to_local(wi_world);
        let wo = self.world_to_local(wo_world);
        if wo.z == 0.0 { return Spectrum::zero() }

        let reflect = self.is_reflection(wo_world, wi_world);

        self.bxdfs.iter()
            .filter(|bxdf| bxdf.matches_flags(flags))
            .filter(|bxdf| {
                (reflect && bxdf.get_type().contains(BxDFType::REFLECTION))
                || (!reflect && bxdf.get_type().contains(BxDFType::TRANSMISSION))
            })
            .map(|bxdf| bxdf.f(wo, wi))
            .sum()
    }

    /// Choose one of the components matching `flags` uniformly and sample it. For non-specular
    /// samples the returned value and density account for every matching component.
    pub fn sample_f(&self, wo_world: Vec3f, u: Point2f, flags: BxDFType) -> Option<ScatterSample> {
        let matching_comps = self.num_components(flags);
        if matching_comps == 0 { return None }

        let comp = ((u[0] * matching_comps as Float).floor() as usize).min(matching_comps - 1);

        let bxdf: &dyn BxDF = self.matching(flags).nth(comp)?;

        // the chosen component used up part of u[0], stretch the rest back over [0, 1)
        let u_remapped = Point2f::new(
            (u[0] * matching_comps as Float - comp as Float).min(1.0 - std::f32::EPSILON),
            u[1]
        );

        let wo = self.world_to_local(wo_world);
        if wo.z == 0.0 { return None }

        let mut sample = bxdf.sample_f(wo, u_remapped)?;
        if sample.pdf == 0.0 { return None }
        let wi_local = sample.wi;
        let wi_world = self.local_to_world(wi_local);

        let specular = bxdf.get_type().contains(BxDFType::SPECULAR);
        if !specular && matching_comps > 1 {
            sample.pdf += self.matching(flags)
                .enumerate()
                .filter(|&(i, _)| i != comp)
                .map(|(_, other)| other.pdf(wo, wi_local))
                .sum::<Float>();

            let reflect = self.is_reflection(wo_world, wi_world);
            sample.f = self.matching(flags)
                .filter(|b| {
                    (reflect && b.get_type().contains(BxDFType::REFLECTION))
                    || (!reflect && b.get_type().contains(BxDFType::TRANSMISSION))
                })
                .map(|b| b.f(wo, wi_local))
                .sum();
        }
        if matching_comps > 1 {
            sample.pdf /= matching_comps as Float;
        }

        sample.wi = wi_world;
        Some(sample)
    }

    pub fn pdf(&self, wo_world: Vec3f, wi_world: Vec3f, flags: BxDFType) -> Float {
        let n_comps = self.num_components(flags);
        if n_comps == 0 { return 0.0 }

        let wo = self.world_to_local(wo_world);
        let wi = self.world_to_local(wi_world);
        if wo.z == 0.0 { return 0.0 }

        let pdf: Float = self.bxdfs.iter()
            .filter(|bxdf| bxdf.matches_flags(flags))
            .map(|bxdf| bxdf.pdf(wo, wi))
            .sum();

        pdf / n_comps as Float
    }
}
