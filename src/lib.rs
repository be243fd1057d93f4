#[macro_use] pub mod macros; // must stay at the top
pub mod math;
pub mod err_float;
pub mod geometry;
pub mod spectrum;
pub mod sampling;
pub mod sampler;
pub mod filter;
pub mod film;
pub mod camera;
pub mod interaction;
pub mod shapes;
pub mod fresnel;
pub mod reflection;
pub mod material;
pub mod light;
pub mod medium;
pub mod bvh;
pub mod scene;
pub mod integrator;
pub mod imageio;

pub use geometry::*;
pub use math::*;
pub use interaction::{SurfaceHit, SurfaceInteraction};

use cgmath::{InnerSpace, Point2, Point3, Vector2, Vector3};
use std::fmt::Debug;

pub type Float = f32;

pub type Point2f = Point2<Float>;
pub type Point2i = Point2<i32>;
pub type Point3f = Point3<Float>;
pub type Vec2f = Vector2<Float>;
pub type Vec2i = Vector2<i32>;
pub type Vec3f = Vector3<Float>;

pub trait Scalar: cgmath::BaseNum + num::Bounded + Debug {
    fn min(self, other: Self) -> Self;
    fn max(self, other: Self) -> Self;
}

impl Scalar for f32 {
    fn min(self, other: Self) -> Self {
        f32::min(self, other)
    }

    fn max(self, other: Self) -> Self {
        f32::max(self, other)
    }
}

impl Scalar for i32 {
    fn min(self, other: Self) -> Self {
        Ord::min(self, other)
    }

    fn max(self, other: Self) -> Self {
        Ord::max(self, other)
    }
}

pub fn abs_dot(v1: Vec3f, v2: Vec3f) -> Float {
    v1.dot(v2).abs()
}

/// Flip `v` so that it lies in the same hemisphere as `n`.
pub fn faceforward(v: Vec3f, n: Vec3f) -> Vec3f {
    if v.dot(n) < 0.0 { -v } else { v }
}

pub fn max_dimension(v: Vec3f) -> usize {
    if v.x > v.y {
        if v.x > v.z { 0 } else { 2 }
    } else if v.y > v.z {
        1
    } else {
        2
    }
}

pub fn max_component(v: Vec3f) -> Float {
    v.x.max(v.y).max(v.z)
}

/// Build an orthonormal basis (v2, v3) around the unit vector v1.
pub fn coordinate_system(v1: Vec3f) -> (Vec3f, Vec3f) {
    let v2 = if v1.x.abs() > v1.y.abs() {
        Vec3f::new(-v1.z, 0.0, v1.x) / (v1.x * v1.x + v1.z * v1.z).sqrt()
    } else {
        Vec3f::new(0.0, v1.z, -v1.y) / (v1.y * v1.y + v1.z * v1.z).sqrt()
    };
    let v3 = v1.cross(v2);
    (v2, v3)
}
