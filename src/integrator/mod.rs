use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use bumpalo::Bump;
use cgmath::InnerSpace;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::{abs_dot, Bounds2i, Float, Point2i, Ray, SurfaceHit, SurfaceInteraction, Vec3f};
use crate::camera::Camera;
use crate::film::{Film, FilmTile};
use crate::filter::Filter;
use crate::light::LightDistribution;
use crate::medium::{MediumInteraction, PhaseFunction};
use crate::reflection::bsdf::Bsdf;
use crate::reflection::BxDFType;
use crate::sampler::{RandomSampler, Sampler};
use crate::sampling::power_heuristic;
use crate::scene::{Scene, MAX_NULL_CROSSINGS};
use crate::spectrum::Spectrum;

pub mod whitted;
pub mod direct_lighting;
pub mod volpath;

pub use whitted::WhittedIntegrator;
pub use direct_lighting::DirectLightingIntegrator;
pub use volpath::VolPathIntegrator;

/// Options for a render that are independent of the light transport algorithm.
#[derive(Clone, Debug)]
pub struct RenderSettings {
    pub samples_per_pixel: usize,

    /// Render tiles on the rayon thread pool. Otherwise tiles are rendered one after another
    /// on the calling thread.
    pub parallel: bool,

    /// Side length of the square tiles the image is split into
    pub tile_size: i32,

    /// If set, only these pixels are traced. Every other pixel still receives its samples, but
    /// with zero radiance.
    pub traced_pixels: Option<HashSet<(i32, i32)>>,

    pub show_progress: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            samples_per_pixel: 16,
            parallel: true,
            tile_size: 16,
            traced_pixels: None,
            show_progress: false,
        }
    }
}

impl RenderSettings {
    pub fn traces(&self, pixel: Point2i) -> bool {
        match &self.traced_pixels {
            Some(pixels) => pixels.contains(&(pixel.x, pixel.y)),
            None => true,
        }
    }
}

pub trait Integrator {
    fn render<F: Filter>(&mut self, scene: &Scene, film: &Film<F>);
}

/// Renders an image by tracing camera rays through every pixel and estimating the radiance
/// along each with `R`.
pub struct SamplerIntegrator<R: IntegratorRadiance> {
    pub camera: Box<dyn Camera>,
    pub sampler: Box<dyn Sampler>,
    pub radiance: R,
    pub settings: RenderSettings,
}

pub trait IntegratorRadiance: Sync + Send {
    /// Called once before rendering starts.
    fn preprocess(&mut self, _scene: &Scene) {}

    /// Estimate the radiance arriving at the origin of `ray` from its direction. `depth` is
    /// the number of specular bounces taken so far.
    fn incident_radiance(
        &self,
        ray: &mut Ray,
        scene: &Scene,
        sampler: &mut dyn Sampler,
        arena: &Bump,
        depth: u16,
    ) -> Spectrum;

    fn specular_reflect(
        &self,
        intersect: &SurfaceInteraction,
        bsdf: &Bsdf,
        scene: &Scene,
        sampler: &mut dyn Sampler,
        arena: &Bump,
        depth: u16,
    ) -> Spectrum {
        let bxdf_type = BxDFType::REFLECTION | BxDFType::SPECULAR;
        self.specular_bounce(intersect, bsdf, bxdf_type, scene, sampler, arena, depth)
    }

    fn specular_transmit(
        &self,
        intersect: &SurfaceInteraction,
        bsdf: &Bsdf,
        scene: &Scene,
        sampler: &mut dyn Sampler,
        arena: &Bump,
        depth: u16,
    ) -> Spectrum {
        let bxdf_type = BxDFType::TRANSMISSION | BxDFType::SPECULAR;
        self.specular_bounce(intersect, bsdf, bxdf_type, scene, sampler, arena, depth)
    }

    #[allow(clippy::too_many_arguments)]
    fn specular_bounce(
        &self,
        intersect: &SurfaceInteraction,
        bsdf: &Bsdf,
        bxdf_type: BxDFType,
        scene: &Scene,
        sampler: &mut dyn Sampler,
        arena: &Bump,
        depth: u16,
    ) -> Spectrum {
        let wo = intersect.wo;
        match bsdf.sample_f(wo, sampler.get_2d(), bxdf_type) {
            Some(scatter) if scatter.pdf > 0.0 && !scatter.f.is_black() => {
                let cos = abs_dot(scatter.wi, intersect.shading_n.0);
                if cos == 0.0 {
                    return Spectrum::zero();
                }
                let mut ray = intersect.spawn_ray(scatter.wi);
                let li = self.incident_radiance(&mut ray, scene, sampler, arena, depth + 1);
                scatter.f * li * cos / scatter.pdf
            }
            _ => Spectrum::zero(),
        }
    }
}

impl<R: IntegratorRadiance> SamplerIntegrator<R> {
    pub fn new(camera: Box<dyn Camera>, radiance: R, settings: RenderSettings) -> Self {
        let sampler = Box::new(RandomSampler::new_with_seed(settings.samples_per_pixel.max(1), 0));
        Self { camera, sampler, radiance, settings }
    }

    fn tile_id(tile: Bounds2i, sample_bounds: Bounds2i, tile_size: i32) -> u64 {
        let n_tiles = sample_bounds.tile_counts(tile_size);
        let tx = (tile.min.x - sample_bounds.min.x) / tile_size;
        let ty = (tile.min.y - sample_bounds.min.y) / tile_size;
        (ty * n_tiles.x + tx) as u64
    }

    /// Take every sample of every pixel in `tile` and accumulate them in a new film tile.
    fn render_tile<'f, F: Filter>(
        &self,
        scene: &Scene,
        film: &'f Film<F>,
        tile: Bounds2i,
        tile_id: u64,
    ) -> FilmTile<'f> {
        let mut arena = Bump::new();
        let mut tile_sampler = self.sampler.clone_with_seed(tile_id);
        let mut film_tile = film.get_film_tile(tile);

        for pixel in tile.iter_points() {
            tile_sampler.start_pixel(pixel);
            let traced = self.settings.traces(pixel);

            loop {
                let camera_sample = tile_sampler.get_camera_sample(pixel);
                let (ray_weight, mut ray) = self.camera.generate_ray(camera_sample);

                let mut radiance = Spectrum::zero();
                if traced && ray_weight > 0.0 {
                    radiance = self.radiance.incident_radiance(
                        &mut ray,
                        scene,
                        tile_sampler.as_mut(),
                        &arena,
                        0,
                    );
                    radiance = check_radiance(radiance, pixel);
                }

                film_tile.add_sample(camera_sample.p_film, radiance, ray_weight);
                arena.reset();

                if !tile_sampler.start_next_sample() {
                    break;
                }
            }
        }
        film_tile
    }
}

impl<R: IntegratorRadiance> Integrator for SamplerIntegrator<R> {
    fn render<F: Filter>(&mut self, scene: &Scene, film: &Film<F>) {
        self.radiance.preprocess(scene);
        let this: &Self = self;

        let sample_bounds = film.sample_bounds();
        let tile_size = this.settings.tile_size.max(1);
        let tiles: Vec<Bounds2i> = sample_bounds.iter_tiles(tile_size).collect();

        info!(
            width = film.width(),
            height = film.height(),
            tiles = tiles.len(),
            spp = this.sampler.samples_per_pixel(),
            parallel = this.settings.parallel,
            "starting render"
        );
        let start = Instant::now();

        let progress = if this.settings.show_progress {
            let bar = ProgressBar::new(tiles.len() as u64);
            let style = ProgressStyle::with_template("{elapsed_precise} [{bar:40}] {pos}/{len} tiles ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            bar
        } else {
            ProgressBar::hidden()
        };
        let tiles_done = AtomicUsize::new(0);

        let run_tile = |tile: &Bounds2i| {
            let tile_id = Self::tile_id(*tile, sample_bounds, tile_size);
            let film_tile = this.render_tile(scene, film, *tile, tile_id);
            let done = tiles_done.fetch_add(1, Ordering::Relaxed) + 1;
            progress.set_position(done as u64);
            film_tile
        };

        let film_tiles: Vec<FilmTile> = if this.settings.parallel {
            tiles.par_iter().map(run_tile).collect()
        } else {
            tiles.iter().map(run_tile).collect()
        };

        for film_tile in film_tiles {
            film.merge_film_tile(film_tile);
        }

        progress.finish_and_clear();
        info!(elapsed = ?start.elapsed(), "render finished");
    }
}

/// Replace invalid radiance estimates with zero so one bad sample can't ruin a pixel.
fn check_radiance(l: Spectrum, pixel: Point2i) -> Spectrum {
    if l.has_nans() {
        warn!(x = pixel.x, y = pixel.y, "NaN radiance value, dropping sample");
        Spectrum::zero()
    } else if !l.is_finite() {
        warn!(x = pixel.x, y = pixel.y, "infinite radiance value, dropping sample");
        Spectrum::zero()
    } else if (0..3).any(|c| l[c] < 0.0) {
        warn!(x = pixel.x, y = pixel.y, ?l, "negative radiance value, dropping sample");
        Spectrum::zero()
    } else {
        l
    }
}

/// Outcome of following a ray past pass-through surfaces.
pub enum SurfaceTrace<'a> {
    /// The ray left the scene
    Escaped,
    Hit(SurfaceInteraction, Bsdf<'a>),
    /// Too many pass-through surfaces were crossed
    Lost,
}

/// Trace `ray` to the first surface with scattering functions, crossing pass-through surfaces
/// without changing direction. Radiance emitted towards the ray origin by every surface hit on
/// the way, the final one included, is added to `emitted`. On return, `ray` is the last
/// segment traced.
pub fn trace_to_scattering_surface<'a>(
    ray: &mut Ray,
    scene: &Scene,
    arena: &'a Bump,
    emitted: &mut Spectrum,
) -> SurfaceTrace<'a> {
    for _ in 0..MAX_NULL_CROSSINGS {
        let si = match scene.intersect(ray) {
            Some(si) => si,
            None => return SurfaceTrace::Escaped,
        };
        *emitted += si.le(scene, si.wo);

        let bsdf = si.compute_scattering_functions(scene, arena);
        if bsdf.count() > 0 {
            return SurfaceTrace::Hit(si, bsdf);
        }
        *ray = si.spawn_ray(ray.dir);
    }
    SurfaceTrace::Lost
}

/// A point that scatters light, either on a surface or inside a medium.
pub enum Scatterer<'s, 'a> {
    Surface(&'s SurfaceInteraction, &'s Bsdf<'a>),
    Medium(&'s MediumInteraction),
}

impl Scatterer<'_, '_> {
    pub fn hit(&self) -> &SurfaceHit {
        match self {
            Scatterer::Surface(si, _) => &si.hit,
            Scatterer::Medium(mi) => &mi.hit,
        }
    }

    /// Scattered fraction of light arriving from `wi`, including the cosine term on surfaces.
    pub fn f(&self, wi: Vec3f) -> Spectrum {
        match self {
            Scatterer::Surface(si, bsdf) => {
                bsdf.f(si.wo, wi, BxDFType::all()) * abs_dot(wi, si.shading_n.0)
            }
            Scatterer::Medium(mi) => Spectrum::uniform(mi.phase.p(mi.wo, wi)),
        }
    }

    pub fn pdf(&self, wi: Vec3f) -> Float {
        match self {
            Scatterer::Surface(si, bsdf) => bsdf.pdf(si.wo, wi, BxDFType::all()),
            Scatterer::Medium(mi) => mi.phase.p(mi.wo, wi),
        }
    }
}

/// One sample of light arriving at `scatterer` by sampling an emitter. The emitter is chosen
/// from `lights` and the estimate is weighted against `n_scatter` samples of the scattering
/// function by the power heuristic. With `handle_media`, shadow rays cross pass-through
/// surfaces and are attenuated by media, otherwise any hit blocks them.
#[allow(clippy::too_many_arguments)]
pub fn sample_emitter(
    scatterer: &Scatterer,
    scene: &Scene,
    lights: &LightDistribution,
    u_select: Float,
    u_light: crate::Point2f,
    n_emitter: usize,
    n_scatter: usize,
    handle_media: bool,
) -> Spectrum {
    let (light_id, select_pdf) = match lights.sample(u_select) {
        Some(s) => s,
        None => return Spectrum::zero(),
    };
    let light = match scene.light(light_id) {
        Some(light) => light,
        None => return Spectrum::zero(),
    };

    let ls = match light.sample_incident_radiance(scatterer.hit(), u_light) {
        Some(ls) if ls.pdf > 0.0 && !ls.radiance.is_black() => ls,
        _ => return Spectrum::zero(),
    };

    let f = scatterer.f(ls.wi);
    if f.is_black() {
        return Spectrum::zero();
    }

    let li = if handle_media {
        ls.radiance * ls.vis.transmittance(scene)
    } else if ls.vis.unoccluded(scene) {
        ls.radiance
    } else {
        return Spectrum::zero();
    };
    if li.is_black() {
        return Spectrum::zero();
    }

    let light_pdf = ls.pdf * select_pdf;
    if light.is_delta() {
        f * li / light_pdf
    } else {
        let weight = power_heuristic(n_emitter, light_pdf, n_scatter, scatterer.pdf(ls.wi));
        f * li * weight / light_pdf
    }
}

/// Radiance arriving along an escaped ray from the scene's environment emitters, together with
/// the combined density of sampling that direction through `lights` from `reference`.
pub fn environment_with_pdf(
    ray: &Ray,
    reference: &SurfaceHit,
    scene: &Scene,
    lights: &LightDistribution,
) -> (Spectrum, Float) {
    let dir = ray.dir.normalize();
    scene.environments().iter()
        .filter_map(|&id| scene.light(id).map(|light| (id, light)))
        .fold((Spectrum::zero(), 0.0), |(le, pdf), (id, light)| {
            (
                le + light.environment_emitted_radiance(ray),
                pdf + light.pdf_incident_radiance(reference, dir) * lights.pdf(id),
            )
        })
}
