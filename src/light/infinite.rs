use std::path::Path;
use crate::spectrum::Spectrum;
use crate::sampling::Distribution2D;
use crate::{Float, Point2f, Transform, Vec3f, Ray, Transformable, spherical_phi, spherical_theta};
use crate::light::{Light, LiSample, LightFlags, VisibilityTester};
use crate::interaction::SurfaceHit;
use crate::imageio::load_image;
use crate::math::consts;
use cgmath::InnerSpace;

/// Environment emitter surrounding the whole scene. Radiance comes from a latitude-longitude
/// map (u follows phi, v follows theta) and is importance sampled by luminance.
pub struct InfiniteAreaLight {
    l_map: Vec<Spectrum>,
    width: usize,
    height: usize,
    distribution: Distribution2D,

    light_to_world: Transform,
    world_to_light: Transform,
}

impl InfiniteAreaLight {
    pub fn new_uniform(radiance: Spectrum, light_to_world: Transform) -> Self {
        Self::new_envmap(vec![radiance], (1, 1), light_to_world)
    }

    /// `texels` holds `height` rows of `width` linear values.
    pub fn new_envmap(texels: Vec<Spectrum>, (width, height): (usize, usize), light_to_world: Transform) -> Self {
        assert_eq!(texels.len(), width * height);
        let distribution = Self::compute_distribution(&texels, width, height);

        Self {
            l_map: texels,
            width,
            height,
            distribution,
            light_to_world,
            world_to_light: light_to_world.inverse(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>, scale: Spectrum, light_to_world: Transform) -> anyhow::Result<Self> {
        let (texels, dims) = load_image(path)?;
        let texels = texels.into_iter().map(|s| s * scale).collect();
        Ok(Self::new_envmap(texels, dims, light_to_world))
    }

    fn compute_distribution(texels: &[Spectrum], width: usize, height: usize) -> Distribution2D {
        let mut img = vec![0.0; width * height];
        for j in 0..height {
            // rows near the poles cover less solid angle
            let sin_theta = (consts::PI * (j as Float + 0.5) / height as Float).sin();
            for i in 0..width {
                img[i + j * width] = texels[i + j * width].y().max(0.0) * sin_theta;
            }
        }
        Distribution2D::new(&img, width, height)
    }

    fn lookup(&self, st: Point2f) -> Spectrum {
        let i = ((st.x * self.width as Float) as usize).min(self.width - 1);
        let j = ((st.y * self.height as Float) as usize).min(self.height - 1);
        self.l_map[i + j * self.width]
    }

    fn direction_to_st(&self, w: Vec3f) -> (Point2f, Float) {
        let w = w.transform(self.world_to_light).normalize();
        let theta = spherical_theta(w);
        let st = Point2f::new(spherical_phi(w) * consts::INV_2_PI, theta * consts::FRAC_1_PI);
        (st, theta)
    }
}

impl Light for InfiniteAreaLight {
    fn flags(&self) -> LightFlags {
        LightFlags::Infinite
    }

    fn sample_incident_radiance(&self, reference: &SurfaceHit, u: Point2f) -> Option<LiSample> {
        let (uv, map_pdf) = self.distribution.sample_continuous(u);
        if map_pdf == 0.0 {
            return None;
        }

        // map (u, v) sample to spherical coordinates
        let theta = uv.y * consts::PI;
        let phi = uv.x * 2.0 * consts::PI;
        let sin_theta = theta.sin();
        if sin_theta == 0.0 {
            return None;
        }
        let wi: Vec3f = Vec3f::new(
            sin_theta * phi.cos(),
            sin_theta * phi.sin(),
            theta.cos()
        ).transform(self.light_to_world).normalize();

        let pdf = map_pdf / (2.0 * consts::PI * consts::PI * sin_theta);

        Some(LiSample {
            radiance: self.lookup(uv),
            wi,
            pdf,
            vis: VisibilityTester::new(reference.spawn_ray(wi)),
        })
    }

    fn pdf_incident_radiance(&self, _reference: &SurfaceHit, wi: Vec3f) -> Float {
        let (st, theta) = self.direction_to_st(wi);
        let sin_theta = theta.sin();
        if sin_theta == 0.0 {
            0.0
        } else {
            self.distribution.pdf(st) / (2.0 * consts::PI * consts::PI * sin_theta)
        }
    }

    fn environment_emitted_radiance(&self, ray: &Ray) -> Spectrum {
        let (st, _) = self.direction_to_st(ray.dir);
        self.lookup(st)
    }

    fn power(&self, world_radius: Float) -> Spectrum {
        let n = self.l_map.len() as Float;
        let average = self.l_map.iter().copied().sum::<Spectrum>() / n;
        consts::PI * world_radius * world_radius * average
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Normal3;
    use approx::assert_abs_diff_eq;

    fn origin() -> SurfaceHit {
        SurfaceHit { p: point3f!(0, 0, 0), p_err: vec3f!(0, 0, 0), time: 0.0, n: Normal3::zero() }
    }

    #[test]
    fn test_constant_map_pdf_follows_latitude() {
        // a single texel spreads the samples evenly over (phi, theta), so the density per
        // solid angle grows towards the poles
        let light = InfiniteAreaLight::new_uniform(Spectrum::uniform(0.5), Transform::identity());
        for &(u, v) in &[(0.1, 0.2), (0.7, 0.5), (0.4, 0.9), (0.25, 0.03)] {
            let s = light.sample_incident_radiance(&origin(), Point2f::new(u, v)).unwrap();
            let sin_theta = Float::sqrt(Float::max(0.0, 1.0 - s.wi.z * s.wi.z));
            let expected = 1.0 / (2.0 * consts::PI * consts::PI * sin_theta);
            assert_abs_diff_eq!(s.pdf, expected, epsilon = 1e-3 * expected);
            assert_abs_diff_eq!(light.pdf_incident_radiance(&origin(), s.wi), s.pdf, epsilon = 1e-3 * s.pdf);
            assert_eq!(s.radiance, Spectrum::uniform(0.5));
        }
    }

    #[test]
    fn test_pdf_integrates_to_one_over_sphere() {
        let light = InfiniteAreaLight::new_uniform(Spectrum::uniform(1.0), Transform::rotate(30.0, vec3f!(1, 1, 0)));
        let (n_theta, n_phi) = (64, 128);
        let d_theta = consts::PI / n_theta as Float;
        let d_phi = 2.0 * consts::PI / n_phi as Float;
        let mut total = 0.0;
        for i in 0..n_theta {
            let theta = (i as Float + 0.5) * d_theta;
            for j in 0..n_phi {
                let phi = (j as Float + 0.5) * d_phi;
                let w = vec3f!(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos());
                total += light.pdf_incident_radiance(&origin(), w) * theta.sin() * d_theta * d_phi;
            }
        }
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-2);
    }

    #[test]
    fn test_bright_half_is_preferred() {
        // top row (theta < pi/2, +z) bright, bottom row dark
        let texels = vec![Spectrum::uniform(10.0), Spectrum::uniform(10.0), Spectrum::zero(), Spectrum::zero()];
        let light = InfiniteAreaLight::new_envmap(texels, (2, 2), Transform::identity());
        for k in 0..16 {
            let u = Point2f::new((k as Float + 0.5) / 16.0, ((k * 7 % 16) as Float + 0.5) / 16.0);
            let s = light.sample_incident_radiance(&origin(), u).unwrap();
            assert!(s.wi.z > 0.0);
        }
        let down = Ray::new(point3f!(0, 0, 0), vec3f!(0, 0, -1));
        assert!(light.environment_emitted_radiance(&down).is_black());
        assert_eq!(light.pdf_incident_radiance(&origin(), vec3f!(0.0, 0.6, -0.8)), 0.0);
    }
}
