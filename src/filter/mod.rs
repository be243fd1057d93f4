use crate::{Float, Point2f, Vec2f};

/// A pixel reconstruction kernel, centered at the origin and zero outside `radius`.
pub trait Filter: Sync + Send {
    fn evaluate(&self, p: &Point2f) -> Float;

    fn radius(&self) -> Vec2f;
}

pub struct BoxFilter {
    pub radius: Vec2f
}

impl BoxFilter {
    pub fn new(radius: Vec2f) -> Self {
        Self { radius }
    }
}

impl Default for BoxFilter {
    /// Covers exactly one pixel.
    fn default() -> Self {
        Self::new(Vec2f::new(0.5, 0.5))
    }
}

impl Filter for BoxFilter {
    fn evaluate(&self, _p: &Point2f) -> Float {
        1.0
    }

    fn radius(&self) -> Vec2f {
        self.radius
    }
}

pub struct TriangleFilter {
    pub radius: Vec2f
}

impl TriangleFilter {
    pub fn new(radius: Vec2f) -> Self {
        Self { radius }
    }
}

impl Filter for TriangleFilter {
    fn evaluate(&self, p: &Point2f) -> Float {
        Float::max(0.0, self.radius.x - p.x.abs()) * Float::max(0.0, self.radius.y - p.y.abs())
    }

    fn radius(&self) -> Vec2f {
        self.radius
    }
}

pub struct GaussianFilter {
    radius: Vec2f,
    alpha: Float,
    exp_x: Float,
    exp_y: Float,
}

impl GaussianFilter {
    pub fn new(radius: Vec2f, alpha: Float) -> Self {
        Self {
            radius,
            alpha,
            exp_x: (-alpha * radius.x * radius.x).exp(),
            exp_y: (-alpha * radius.y * radius.y).exp(),
        }
    }

    /// Gaussian shifted down so it reaches zero at the filter edge
    fn gaussian(&self, d: Float, expv: Float) -> Float {
        Float::max(0.0, (-self.alpha * d * d).exp() - expv)
    }
}

impl Filter for GaussianFilter {
    fn evaluate(&self, p: &Point2f) -> Float {
        self.gaussian(p.x, self.exp_x) * self.gaussian(p.y, self.exp_y)
    }

    fn radius(&self) -> Vec2f {
        self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_filters_vanish_at_edge() {
        let r = Vec2f::new(2.0, 1.5);
        let tri = TriangleFilter::new(r);
        let gauss = GaussianFilter::new(r, 2.0);
        let edge = Point2f::new(2.0, 0.0);
        assert_abs_diff_eq!(tri.evaluate(&edge), 0.0);
        assert_abs_diff_eq!(gauss.evaluate(&edge), 0.0);
        assert!(tri.evaluate(&Point2f::new(0.0, 0.0)) > tri.evaluate(&Point2f::new(1.0, 0.5)));
        assert!(gauss.evaluate(&Point2f::new(0.0, 0.0)) > gauss.evaluate(&Point2f::new(1.0, 0.5)));
    }
}
