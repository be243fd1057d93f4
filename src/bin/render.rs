use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use radiance::{Point2i, Transform, Float};
use radiance::camera::PerspectiveCamera;
use radiance::film::Film;
use radiance::filter::GaussianFilter;
use radiance::imageio::write_image;
use radiance::integrator::{
    DirectLightingIntegrator, Integrator, IntegratorRadiance, RenderSettings, SamplerIntegrator,
    VolPathIntegrator, WhittedIntegrator,
};
use radiance::light::LightStrategy;
use radiance::material::{GlassMaterial, MatteMaterial, MirrorMaterial};
use radiance::medium::HomogeneousMedium;
use radiance::scene::{Entity, Scene};
use radiance::shapes::{Quad, Sphere};
use radiance::spectrum::Spectrum;
use radiance::{point3f, vec3f};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum IntegratorKind {
    Whitted,
    Direct,
    Volpath,
}

/// Render the built-in Cornell box to a PNG.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Samples per pixel
    #[arg(long, default_value_t = 16)]
    spp: usize,

    #[arg(long, default_value_t = 5)]
    max_depth: u16,

    #[arg(long, value_enum, default_value_t = IntegratorKind::Volpath)]
    integrator: IntegratorKind,

    /// Render tiles one at a time on the main thread
    #[arg(long)]
    sequential: bool,

    /// Only trace this pixel, given as `x,y`. Can be repeated.
    #[arg(long = "trace-pixel", value_parser = parse_pixel)]
    trace_pixel: Vec<(i32, i32)>,

    #[arg(long, default_value_t = 400)]
    width: i32,

    #[arg(long, default_value_t = 400)]
    height: i32,

    /// Fill part of the box with a scattering medium
    #[arg(long)]
    fog: bool,

    #[arg(long, short, default_value = "render.png")]
    output: PathBuf,
}

fn parse_pixel(s: &str) -> Result<(i32, i32), String> {
    let (x, y) = s.split_once(',').ok_or_else(|| format!("expected `x,y`, got `{}`", s))?;
    let x = x.trim().parse().map_err(|e| format!("bad x coordinate: {}", e))?;
    let y = y.trim().parse().map_err(|e| format!("bad y coordinate: {}", e))?;
    Ok((x, y))
}

fn wall(object_to_world: Transform, color: Spectrum) -> Entity {
    Entity::new(object_to_world * Transform::scale(2.0, 2.0, 1.0))
        .with_shape(Arc::new(Quad::new()))
        .with_material(Arc::new(MatteMaterial::new(color)))
}

fn cornell_box(fog: bool) -> Vec<Entity> {
    let white = Spectrum::uniform(0.73);
    let red = Spectrum::rgb(0.65, 0.05, 0.05);
    let green = Spectrum::rgb(0.12, 0.45, 0.15);

    let mut entities = vec![
        // floor, ceiling, back
        wall(Transform::translate(vec3f!(0, -1, 0)) * Transform::rotate(-90.0, vec3f!(1, 0, 0)), white),
        wall(Transform::translate(vec3f!(0, 1, 0)) * Transform::rotate(90.0, vec3f!(1, 0, 0)), white),
        wall(Transform::translate(vec3f!(0, 0, 1)) * Transform::rotate(180.0, vec3f!(0, 1, 0)), white),
        // left, right
        wall(Transform::translate(vec3f!(-1, 0, 0)) * Transform::rotate(90.0, vec3f!(0, 1, 0)), red),
        wall(Transform::translate(vec3f!(1, 0, 0)) * Transform::rotate(-90.0, vec3f!(0, 1, 0)), green),
    ];

    let light_to_world = Transform::translate(vec3f!(0, 0.995, 0))
        * Transform::rotate(90.0, vec3f!(1, 0, 0))
        * Transform::scale(0.5, 0.5, 1.0);
    entities.push(Entity::area_light(light_to_world, Arc::new(Quad::new()), Spectrum::uniform(17.0)));

    entities.push(
        Entity::new(Transform::translate(vec3f!(0.4, -0.64, -0.3)))
            .with_shape(Arc::new(Sphere::new(0.35)))
            .with_material(Arc::new(GlassMaterial::new(Spectrum::uniform(1.0), Spectrum::uniform(1.0), 1.5))),
    );
    entities.push(
        Entity::new(Transform::translate(vec3f!(-0.45, -0.59, 0.35)))
            .with_shape(Arc::new(Sphere::new(0.4)))
            .with_material(Arc::new(MirrorMaterial::new(Spectrum::uniform(0.9)))),
    );

    if fog {
        let medium = HomogeneousMedium::from_albedo(Spectrum::uniform(1.5), Spectrum::uniform(0.8), 0.2);
        entities.push(
            Entity::new(Transform::translate(vec3f!(0, 0.35, 0)))
                .with_shape(Arc::new(Sphere::new(0.45)))
                .with_medium(Arc::new(medium)),
        );
    }

    entities
}

fn render<R: IntegratorRadiance>(radiance: R, args: &Args) -> anyhow::Result<()> {
    let resolution = Point2i::new(args.width, args.height);
    let camera_to_world = Transform::look_at(point3f!(0, 0, -3.4), point3f!(0, 0, 0), vec3f!(0, 1, 0))
        .context("degenerate camera orientation")?;
    let camera = PerspectiveCamera::with_fov(camera_to_world, resolution, 40.0);

    let settings = RenderSettings {
        samples_per_pixel: args.spp,
        parallel: !args.sequential,
        traced_pixels: if args.trace_pixel.is_empty() {
            None
        } else {
            Some(args.trace_pixel.iter().copied().collect())
        },
        show_progress: true,
        ..Default::default()
    };

    let scene = Scene::new(cornell_box(args.fog));
    let film = Film::with_resolution(resolution, GaussianFilter::new(vec2f(1.5), 4.0));

    let mut integrator = SamplerIntegrator::new(Box::new(camera), radiance, settings);
    integrator.render(&scene, &film);

    write_image(&args.output, &film)?;
    info!(path = %args.output.display(), "wrote image");
    Ok(())
}

fn vec2f(r: Float) -> radiance::Vec2f {
    radiance::Vec2f::new(r, r)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    info!(integrator = ?args.integrator, spp = args.spp, max_depth = args.max_depth, "rendering cornell box");

    match args.integrator {
        IntegratorKind::Whitted => render(WhittedIntegrator::new(args.max_depth), &args),
        IntegratorKind::Direct => render(
            DirectLightingIntegrator::new(args.max_depth, 1, 1, LightStrategy::Power),
            &args,
        ),
        IntegratorKind::Volpath => render(VolPathIntegrator::new(args.max_depth, LightStrategy::Power), &args),
    }
}
