use crate::{Point2f, Float, Ray, Bounds2f, Point2i, Transformable, Point3f, lerp, INFINITY};
use crate::geometry::Transform;
use cgmath::InnerSpace;

#[derive(Clone, Copy, Debug)]
pub struct CameraSample {
    /// Position on the film in continuous raster coordinates
    pub p_film: Point2f,
    pub p_lens: Point2f,
    pub time: Float
}

pub trait Camera: Sync + Send {
    /// Generate the world space ray for a film sample, along with a weight for how much the
    /// ray's radiance contributes to the image.
    fn generate_ray(&self, sample: CameraSample) -> (Float, Ray);
}

struct CameraProjection {
    raster_to_camera: Transform,
}

impl CameraProjection {
    fn new(
        camera_to_screen: Transform,
        full_resolution: Point2i,
        screen_window: Bounds2f,
    ) -> Self {
        let screen_to_raster =
            Transform::scale(full_resolution.x as Float, full_resolution.y as Float, 1.0) *
            Transform::scale(
                1.0 / (screen_window.max.x - screen_window.min.x),
                1.0 / (screen_window.min.y - screen_window.max.y),
                1.0
            ) *
            Transform::translate(vec3f!(-screen_window.min.x, -screen_window.max.y, 0.0));

        let raster_to_screen = screen_to_raster.inverse();
        let raster_to_camera = camera_to_screen.inverse() * raster_to_screen;

        Self { raster_to_camera }
    }
}

/// A pinhole camera with a perspective projection.
pub struct PerspectiveCamera {
    camera_to_world: Transform,
    proj: CameraProjection,
    shutter_interval: (Float, Float),
}

impl PerspectiveCamera {
    pub fn new(
        camera_to_world: Transform,
        full_resolution: Point2i,
        screen_window: Bounds2f,
        shutter_interval: (Float, Float),
        fov: Float
    ) -> Self {
        let persp = Transform::perspective(fov, 0.001, 1000.0);
        let proj = CameraProjection::new(persp, full_resolution, screen_window);

        Self {
            camera_to_world,
            proj,
            shutter_interval,
        }
    }

    /// Camera whose `fov` (in degrees) spans the shorter image axis.
    pub fn with_fov(camera_to_world: Transform, full_resolution: Point2i, fov: Float) -> Self {
        let aspect = full_resolution.x as Float / full_resolution.y as Float;
        let screen_window = if aspect > 1.0 {
            Bounds2f::with_bounds(Point2f::new(-aspect, -1.0), Point2f::new(aspect, 1.0))
        } else {
            Bounds2f::with_bounds(Point2f::new(-1.0, -1.0 / aspect), Point2f::new(1.0, 1.0 / aspect))
        };
        Self::new(camera_to_world, full_resolution, screen_window, (0.0, 1.0), fov)
    }
}

impl Camera for PerspectiveCamera {
    fn generate_ray(&self, sample: CameraSample) -> (Float, Ray) {
        let p_film = point3f!(sample.p_film.x, sample.p_film.y, 0);
        let p_camera: Point3f = p_film.transform(self.proj.raster_to_camera);

        let origin = Point3f::new(0.0, 0.0, 0.0);
        let dir = (p_camera - origin).normalize();

        let time = lerp(sample.time, self.shutter_interval.0, self.shutter_interval.1);
        let ray = Ray { origin, dir, time, t_max: INFINITY };
        let mut ray = ray.transform(self.camera_to_world);
        ray.dir = ray.dir.normalize();
        ray.t_max = INFINITY;
        (1.0, ray)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vec3f;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_center_ray_looks_forward() {
        let cam_to_world = Transform::look_at(point3f!(0, 1, -4), point3f!(0, 1, 0), vec3f!(0, 1, 0)).unwrap();
        let camera = PerspectiveCamera::with_fov(cam_to_world, Point2i::new(64, 32), 45.0);
        let sample = CameraSample { p_film: Point2f::new(32.0, 16.0), p_lens: Point2f::new(0.5, 0.5), time: 0.0 };
        let (weight, ray) = camera.generate_ray(sample);
        assert_eq!(weight, 1.0);
        assert_abs_diff_eq!(ray.origin, point3f!(0, 1, -4), epsilon = 1e-4);
        assert_abs_diff_eq!(ray.dir, vec3f!(0, 0, 1), epsilon = 1e-4);
    }

    #[test]
    fn test_top_of_film_points_up() {
        let camera = PerspectiveCamera::with_fov(Transform::identity(), Point2i::new(32, 32), 60.0);
        let top = CameraSample { p_film: Point2f::new(16.0, 0.0), p_lens: Point2f::new(0.5, 0.5), time: 0.0 };
        let (_, ray) = camera.generate_ray(top);
        assert!(ray.dir.y > 0.0);
        // half the fov spans half the short axis
        assert_abs_diff_eq!(ray.dir.angle(Vec3f::unit_z()).0, (30.0 as Float).to_radians(), epsilon = 1e-3);
    }
}
