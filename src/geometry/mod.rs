use crate::{Vec3f, Point3f, Float, coordinate_system};
use cgmath::prelude::*;
use cgmath::{Matrix4, Transform as cgTransform};
use std::ops::{Deref, Neg, Mul};
use approx::AbsDiffEq;

pub mod bounds;

pub use bounds::*;
use crate::err_float::{gamma, next_float_up, next_float_down};

/// Fraction of a shadow segment left unsearched at the far end, so that the target surface
/// itself does not register as an occluder.
pub const SHADOW_EPSILON: Float = 0.0001;

pub fn distance(p1: Point3f, p2: Point3f) -> Float {
    (p1 - p2).magnitude()
}

pub fn distance_squared(p1: Point3f, p2: Point3f) -> Float {
    (p1 - p2).magnitude2()
}

/// Offset a ray origin along the normal by the conservative error bound of the point,
/// rounding each component away from the surface to the next representable value.
pub fn offset_ray_origin(p: &Point3f, p_err: &Vec3f, n: &Normal3, dir: &Vec3f) -> Point3f {
    let d = n.map(|v| v.abs()).dot(*p_err);
    let mut offset = d * n.0;
    if dir.dot(n.0) < 0.0 {
        offset = -offset;
    }
    let mut po: Point3f = *p + offset;
    for i in 0..3 {
        if offset[i] > 0.0 { po[i] = next_float_up(po[i]) }
        else if offset[i] < 0.0 { po[i] = next_float_down(po[i]) }
    }

    po
}

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Point3f,
    pub dir: Vec3f,

    /// Maximum extent of the ray. Closest-hit queries shrink it as nearer hits are found.
    pub t_max: Float,
    pub time: Float,
}

impl Ray {
    pub fn new(origin: Point3f, dir: Vec3f) -> Self {
        Self {
            origin, dir, t_max: std::f32::INFINITY, time: 0.0
        }
    }

    pub fn with_extent(origin: Point3f, dir: Vec3f, t_max: Float) -> Self {
        Self { origin, dir, t_max, time: 0.0 }
    }

    pub fn at(&self, t: Float) -> Point3f {
        self.origin + (self.dir * t)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Normal3(pub Vec3f);

impl Normal3 {
    pub fn new(x: Float, y: Float, z: Float) -> Self {
        Self(Vec3f::new(x, y, z))
    }

    pub fn zero() -> Self {
        Self(Vec3f::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == Vec3f::zero()
    }

    pub fn faceforward(self, v: Vec3f) -> Self {
        if self.dot(v) < 0.0 {
            Self(-self.0)
        } else {
            self
        }
    }

    pub fn normalize(self) -> Self {
        Self(self.0.normalize())
    }
}

impl Deref for Normal3 {
    type Target = Vec3f;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Neg for Normal3 {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl From<Vec3f> for Normal3 {
    fn from(v: Vec3f) -> Self {
        Self(v)
    }
}

impl From<Normal3> for Vec3f {
    fn from(n: Normal3) -> Self {
        n.0
    }
}

/// An orthonormal frame, used for shading and for local phase function coordinates.
#[derive(Clone, Copy, Debug)]
pub struct Frame {
    pub s: Vec3f,
    pub t: Vec3f,
    pub n: Vec3f,
}

impl Frame {
    pub fn from_normal(n: Vec3f) -> Self {
        let (s, t) = coordinate_system(n);
        Self { s, t, n }
    }

    pub fn world_to_local(&self, v: Vec3f) -> Vec3f {
        Vec3f::new(v.dot(self.s), v.dot(self.t), v.dot(self.n))
    }

    pub fn local_to_world(&self, v: Vec3f) -> Vec3f {
        self.s * v.x + self.t * v.y + self.n * v.z
    }
}

/// An affine (or projective) transform together with its inverse. Both matrices are fixed at
/// construction so they are always mutual inverses.
#[derive(Clone, Copy, Debug)]
pub struct Transform {
    pub t: Matrix4<Float>,
    pub invt: Matrix4<Float>
}

impl Transform {

    pub fn identity() -> Self {
        Self::new(Matrix4::identity(), Matrix4::identity())
    }

    /// Returns `None` if the matrix is singular.
    pub fn from_mat(mat: Matrix4<Float>) -> Option<Self> {
        let m_inv = mat.invert()?;
        Some(Self::new(mat, m_inv))
    }

    pub fn new(mat: Matrix4<Float>, mat_inv: Matrix4<Float>) -> Self {
        debug_assert!(
            (mat * mat_inv).abs_diff_eq(&Matrix4::identity(), 1e-2),
            "transform matrices are not mutual inverses"
        );
        Self { t: mat, invt: mat_inv }
    }

    pub fn translate(delta: Vec3f) -> Self {
        let m = Matrix4::from_translation(delta);
        let m_inv = Matrix4::from_translation(-delta);
        Self::new(m, m_inv)
    }

    pub fn scale(sx: Float, sy: Float, sz: Float) -> Self {
        let m = Matrix4::from_nonuniform_scale(sx, sy, sz);
        let m_inv = Matrix4::from_nonuniform_scale(1.0 / sx, 1.0 / sy, 1.0 / sz);
        Self::new(m, m_inv)
    }

    /// Rotation by `degrees` about `axis`.
    pub fn rotate(degrees: Float, axis: Vec3f) -> Self {
        let m = Matrix4::from_axis_angle(axis.normalize(), cgmath::Deg(degrees));
        // rotations are orthogonal
        let m_inv = m.transpose();
        Self::new(m, m_inv)
    }

    /// Returns the camera-to-world transform of a camera at `pos` looking at `look`.
    /// Camera space looks down +z with +y up.
    pub fn look_at(pos: Point3f, look: Point3f, up: Vec3f) -> Option<Self> {
        let dir = (look - pos).normalize();
        let right = up.normalize().cross(dir);
        if right.magnitude2() == 0.0 {
            return None;
        }
        let right = right.normalize();
        let new_up = dir.cross(right);
        let camera_to_world = Matrix4::from_cols(
            right.extend(0.0),
            new_up.extend(0.0),
            dir.extend(0.0),
            pos.to_vec().extend(1.0),
        );
        Self::from_mat(camera_to_world)
    }

    pub fn perspective(fov: Float, near: Float, far: Float) -> Self {
        // cgmath's `Matrix4::new` takes its arguments column by column
        let mat = Matrix4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, far / (far - near), 1.0,
            0.0, 0.0, -far * near / (far - near), 0.0
        );
        let persp = Self::new(mat, mat.invert().unwrap_or_else(Matrix4::identity));

        let inv_tan_ang = 1.0 / (fov.to_radians() / 2.0).tan();
        Transform::scale(inv_tan_ang, inv_tan_ang, 1.0) * persp
    }

    /// Factor by which the transform scales a small patch of surface with normal `n`.
    pub fn area_jacobian(&self, n: &Normal3) -> Float {
        let n = Normal3(n.0.normalize());
        self.t.determinant().abs() * self.transform_normal(&n).0.magnitude()
    }

    pub fn inverse(&self) -> Self {
        Self { t: self.invt, invt: self.t }
    }

    /// Element `(row, col)` of the forward matrix.
    #[inline]
    fn m(&self, row: usize, col: usize) -> Float {
        self.t[col][row]
    }

    pub fn transform_normal(&self, n: &Normal3) -> Normal3 {
        // transform by the transpose of the inverse
        let inv = &self.invt;
        let x = inv[0][0] * n.x + inv[0][1] * n.y + inv[0][2] * n.z;
        let y = inv[1][0] * n.x + inv[1][1] * n.y + inv[1][2] * n.z;
        let z = inv[2][0] * n.x + inv[2][1] * n.y + inv[2][2] * n.z;
        Normal3(vec3f!(x, y, z))
    }

    /// Sum of absolute values of the linear part of row `r` applied to `v`.
    fn abs_row_sum(&self, r: usize, v: Vec3f) -> Float {
        (self.m(r, 0) * v.x).abs() + (self.m(r, 1) * v.y).abs() + (self.m(r, 2) * v.z).abs()
    }
}

impl Mul for Transform {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self { t: self.t * rhs.t, invt: rhs.invt * self.invt }
    }
}

pub trait Transformable<O=Self> {
    fn transform(&self, t: Transform) -> O;
}

impl Transformable for Vec3f {
    fn transform(&self, t: Transform) -> Self {
        t.t.transform_vector(*self)
    }
}

impl Transformable for Point3f {
    fn transform(&self, t: Transform) -> Self { t.t.transform_point(*self) }
}

impl Transformable for Normal3 {
    fn transform(&self, t: Transform) -> Self {
        t.transform_normal(self)
    }
}

impl Transformable<(Self, Vec3f)> for Point3f {
    /// Transform a Point, giving the transformed point and a vector of the absolute error
    /// introduced by the transformation
    fn transform(&self, t: Transform) -> (Point3f, Vec3f) {
        let pt = t.t.transform_point(*self);
        let v = self.to_vec();
        let p_error = vec3f!(
            t.abs_row_sum(0, v) + t.m(0, 3).abs(),
            t.abs_row_sum(1, v) + t.m(1, 3).abs(),
            t.abs_row_sum(2, v) + t.m(2, 3).abs()
        ) * gamma(3);
        (pt, p_error)
    }
}

impl Transformable<(Point3f, Vec3f)> for (Point3f, Vec3f) {
    /// Transform a point given its existing absolute error, producing the transformed point
    /// and its new absolute error
    fn transform(&self, t: Transform) -> (Point3f, Vec3f) {
        let (p, perr) = *self;
        let pt = t.t.transform_point(p);
        let v = p.to_vec();

        let err = |r: usize| {
            (gamma(3) + 1.0) * t.abs_row_sum(r, perr)
                + gamma(3) * (t.abs_row_sum(r, v) + t.m(r, 3).abs())
        };

        (pt, vec3f!(err(0), err(1), err(2)))
    }
}

impl Transformable for Ray {
    fn transform(&self, t: Transform) -> Ray {
        let (mut origin, o_err): (Point3f, Vec3f) = self.origin.transform(t);
        let dir: Vec3f = self.dir.transform(t);
        let mut t_max = self.t_max;

        // push the origin past its own error bounds so the new ray doesn't start inside a surface
        let len_sq = dir.magnitude2();
        if len_sq > 0.0 {
            let dt = dir.map(|v| v.abs()).dot(o_err) / len_sq;
            origin += dir * dt;
            t_max -= dt;
        }

        Ray { origin, dir, t_max, time: self.time }
    }
}

impl Transformable for Bounds3f {
    fn transform(&self, t: Transform) -> Bounds3f {
        (0..8).fold(Bounds3f::empty(), |b, i| {
            let corner: Point3f = self.corner(i).transform(t);
            b.join_point(&corner)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_transform_inverse() {
        let t = Transform::translate(vec3f!(1, 2, 3)) * Transform::rotate(30.0, vec3f!(0, 1, 1)) * Transform::scale(2.0, 3.0, 4.0);
        let p = point3f!(0.5, -1.0, 2.0);
        let back: Point3f = Transformable::<Point3f>::transform(&p, t);
        let back: Point3f = back.transform(t.inverse());
        assert_abs_diff_eq!(back, p, epsilon = 1e-4);
    }

    #[test]
    fn test_normal_stays_perpendicular() {
        let t = Transform::scale(1.0, 4.0, 1.0) * Transform::rotate(45.0, vec3f!(0, 0, 1));
        let tangent = vec3f!(1, -1, 0);
        let n = Normal3::new(1.0, 1.0, 0.0);
        let tt: Vec3f = tangent.transform(t);
        let nt: Normal3 = n.transform(t);
        assert_abs_diff_eq!(tt.dot(nt.0), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_area_jacobian() {
        let t = Transform::translate(vec3f!(1, 2, 3)) * Transform::rotate(60.0, vec3f!(1, 0, 0)) * Transform::scale(3.0, 3.0, 3.0);
        assert_abs_diff_eq!(t.area_jacobian(&Normal3::new(0.0, 0.6, 0.8)), 9.0, epsilon = 1e-3);

        // a patch facing z only sees the x and y scales
        let squash = Transform::rotate(30.0, vec3f!(0, 1, 0)) * Transform::scale(2.0, 3.0, 4.0);
        assert_abs_diff_eq!(squash.area_jacobian(&Normal3::new(0.0, 0.0, 1.0)), 6.0, epsilon = 1e-3);
        assert_abs_diff_eq!(squash.area_jacobian(&Normal3::new(1.0, 0.0, 0.0)), 12.0, epsilon = 1e-3);
    }

    #[test]
    fn test_look_at_forward() {
        let cam = Transform::look_at(point3f!(0, 0, -5), point3f!(0, 0, 0), vec3f!(0, 1, 0)).unwrap();
        let fwd: Vec3f = vec3f!(0, 0, 1).transform(cam);
        assert_abs_diff_eq!(fwd, vec3f!(0, 0, 1), epsilon = 1e-6);
        let origin: Point3f = point3f!(0, 0, 0).transform(cam);
        assert_abs_diff_eq!(origin, point3f!(0, 0, -5), epsilon = 1e-6);
    }

    #[test]
    fn test_offset_ray_origin_moves_off_surface() {
        let p = point3f!(1, 1, 1);
        let n = Normal3::new(0.0, 0.0, 1.0);
        let err = vec3f!(1e-4, 1e-4, 1e-4);
        let up = offset_ray_origin(&p, &err, &n, &vec3f!(0, 0, 1));
        let down = offset_ray_origin(&p, &err, &n, &vec3f!(0, 0, -1));
        assert!(up.z > p.z);
        assert!(down.z < p.z);
    }
}
