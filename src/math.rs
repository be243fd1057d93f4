use crate::{Float, Vec3f};

pub const INFINITY: Float = std::f32::INFINITY;
pub const NEG_INFINITY: Float = std::f32::NEG_INFINITY;

pub mod consts {
    pub use std::f32::consts::*;

    pub const INV_2_PI: f32 = 0.159_154_94;
    pub const INV_4_PI: f32 = 0.079_577_47;
}

pub fn lerp(t: Float, v1: Float, v2: Float) -> Float {
    (1.0 - t) * v1 + t * v2
}

pub fn spherical_theta(v: Vec3f) -> Float {
    v.z.clamp(-1.0, 1.0).acos()
}

pub fn spherical_phi(v: Vec3f) -> Float {
    let p = v.y.atan2(v.x);
    if p < 0.0 { p + 2.0 * consts::PI } else { p }
}

pub fn spherical_direction(sin_theta: Float, cos_theta: Float, phi: Float) -> Vec3f {
    Vec3f::new(
        sin_theta.clamp(-1.0, 1.0) * phi.cos(),
        sin_theta.clamp(-1.0, 1.0) * phi.sin(),
        cos_theta.clamp(-1.0, 1.0),
    )
}

/// Like `spherical_direction`, but expressed in the frame (x, y, z).
pub fn spherical_direction_in(sin_theta: Float, cos_theta: Float, phi: Float, x: Vec3f, y: Vec3f, z: Vec3f) -> Vec3f {
    sin_theta * phi.cos() * x + sin_theta * phi.sin() * y + cos_theta * z
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_spherical_roundtrip_angles() {
        let v = spherical_direction(0.6, 0.8, 1.2);
        assert_abs_diff_eq!(spherical_theta(v), (0.8 as Float).acos(), epsilon = 1e-5);
        assert_abs_diff_eq!(spherical_phi(v), 1.2, epsilon = 1e-5);
    }

    #[test]
    fn test_phi_wraps_to_positive() {
        let phi = spherical_phi(Vec3f::new(0.0, -1.0, 0.0));
        assert_abs_diff_eq!(phi, 1.5 * consts::PI, epsilon = 1e-5);
    }
}
