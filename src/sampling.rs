use crate::{Point2f, Vec2f, Vec3f, Float};
use crate::math::consts;
use cgmath::EuclideanSpace;

pub fn concentric_sample_disk(u: Point2f) -> Point2f {
    // map sample from [0, 1] to [-1, 1]
    let u_offset = Point2f::from_vec(2.0 * u.to_vec() - Vec2f::new(1.0, 1.0));
    if u_offset.x == 0.0 && u_offset.y == 0.0 {
        return Point2f::new(0.0, 0.0);
    }

    let (r, theta) = if u_offset.x.abs() > u_offset.y.abs() {
        (u_offset.x, consts::FRAC_PI_4 * (u_offset.y / u_offset.x))
    } else {
        (u_offset.y, consts::FRAC_PI_2 - consts::FRAC_PI_4 * (u_offset.x / u_offset.y))
    };

    Point2f::new(r * theta.cos(), r * theta.sin())
}

pub fn cosine_sample_hemisphere(u: Point2f) -> Vec3f {
    let d = concentric_sample_disk(u);
    let z = Float::sqrt(Float::max(0.0, 1.0 - d.x * d.x - d.y * d.y));
    Vec3f::new(d.x, d.y, z)
}

pub fn cosine_hemisphere_pdf(cos_theta: Float) -> Float {
    cos_theta * consts::FRAC_1_PI
}

pub fn uniform_sample_sphere(u: Point2f) -> Vec3f {
    let z = 1.0 - 2.0 * u[0];
    let r = Float::sqrt(Float::max(0.0, 1.0 - z * z));
    let phi = 2.0 * consts::PI * u[1];
    Vec3f::new(r * phi.cos(), r * phi.sin(), z)
}

pub fn uniform_sphere_pdf() -> Float {
    consts::INV_4_PI
}

/// Uniformly sample a direction inside the cone around +z with the given cosine of its
/// half-angle.
pub fn uniform_sample_cone(u: Point2f, cos_theta_max: Float) -> Vec3f {
    let cos_theta = (1.0 - u[0]) + u[0] * cos_theta_max;
    let sin_theta = Float::sqrt(Float::max(0.0, 1.0 - cos_theta * cos_theta));
    let phi = u[1] * 2.0 * consts::PI;
    Vec3f::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta)
}

pub fn uniform_cone_pdf(cos_theta_max: Float) -> Float {
    1.0 / (2.0 * consts::PI * (1.0 - cos_theta_max))
}

/// Returns barycentric coordinates (b0, b1) uniformly distributed over a triangle.
pub fn uniform_sample_triangle(u: Point2f) -> (Float, Float) {
    let su0 = u[0].sqrt();
    (1.0 - su0, u[1] * su0)
}

/// Weight for a sample from strategy f when combining it with strategy g, where each strategy
/// drew `nf` and `ng` samples respectively.
pub fn power_heuristic(nf: usize, f_pdf: Float, ng: usize, g_pdf: Float) -> Float {
    let f = nf as Float * f_pdf;
    let g = ng as Float * g_pdf;
    if f == 0.0 && g == 0.0 {
        return 0.0;
    }
    (f * f) / (f * f + g * g)
}

/// Find the largest index `i` in `[0, len - 2]` such that `pred(i)` holds, assuming `pred` is
/// true for a prefix of the indices.
fn find_interval<P: Fn(usize) -> bool>(len: usize, pred: P) -> usize {
    let mut first = 0;
    let mut size = len;
    while size > 0 {
        let half = size >> 1;
        let middle = first + half;
        if pred(middle) {
            first = middle + 1;
            size -= half + 1;
        } else {
            size = half;
        }
    }
    (first.saturating_sub(1)).min(len.saturating_sub(2))
}

/// A piecewise-constant 1D function over [0, 1] together with its normalized CDF, used for
/// inverse-transform importance sampling.
#[derive(Clone, Debug)]
pub struct Distribution1D {
    func: Vec<Float>,
    cdf: Vec<Float>,
    func_int: Float,
}

pub struct ContinuousSample {
    /// The sampled position in [0, 1)
    pub value: Float,
    pub pdf: Float,
    /// Which piecewise-constant segment the sample fell in
    pub offset: usize,
}

impl Distribution1D {
    pub fn new(func: &[Float]) -> Self {
        assert!(!func.is_empty(), "distribution needs at least one value");
        debug_assert!(func.iter().all(|&f| f >= 0.0), "distribution values must be nonnegative");

        let n = func.len();
        let mut cdf = Vec::with_capacity(n + 1);
        cdf.push(0.0);
        for i in 1..=n {
            let prev = cdf[i - 1];
            cdf.push(prev + func[i - 1] / n as Float);
        }

        let func_int = cdf[n];
        if func_int == 0.0 {
            // fall back to a uniform ramp
            for (i, c) in cdf.iter_mut().enumerate().skip(1) {
                *c = i as Float / n as Float;
            }
        } else {
            for c in cdf.iter_mut().skip(1) {
                *c /= func_int;
            }
        }

        Self { func: func.to_vec(), cdf, func_int }
    }

    pub fn count(&self) -> usize {
        self.func.len()
    }

    pub fn integral(&self) -> Float {
        self.func_int
    }

    pub fn cdf(&self) -> &[Float] {
        &self.cdf
    }

    pub fn func(&self) -> &[Float] {
        &self.func
    }

    fn segment(&self, u: Float) -> usize {
        let cdf = &self.cdf;
        find_interval(cdf.len(), |i| cdf[i] <= u)
    }

    pub fn sample_continuous(&self, u: Float) -> ContinuousSample {
        let offset = self.segment(u);

        let mut du = u - self.cdf[offset];
        let width = self.cdf[offset + 1] - self.cdf[offset];
        if width > 0.0 {
            du /= width;
        }

        let pdf = if self.func_int > 0.0 {
            self.func[offset] / self.func_int
        } else {
            1.0
        };

        let value = ((offset as Float + du) / self.count() as Float).min(1.0 - std::f32::EPSILON);
        ContinuousSample { value, pdf, offset }
    }

    /// Choose one of the buckets with probability proportional to its value. Returns the
    /// bucket index and its probability.
    pub fn sample_discrete(&self, u: Float) -> (usize, Float) {
        let offset = self.segment(u);
        (offset, self.discrete_pdf(offset))
    }

    /// Like `sample_discrete`, but also rescales `u` to a fresh uniform value in [0, 1) within
    /// the chosen bucket, so it can be reused for a further sampling decision.
    pub fn sample_discrete_remapped(&self, u: Float) -> (usize, Float, Float) {
        let offset = self.segment(u);
        let width = self.cdf[offset + 1] - self.cdf[offset];
        let u_remapped = if width > 0.0 {
            ((u - self.cdf[offset]) / width).clamp(0.0, 1.0 - std::f32::EPSILON)
        } else {
            0.0
        };
        (offset, self.discrete_pdf(offset), u_remapped)
    }

    pub fn discrete_pdf(&self, index: usize) -> Float {
        if self.func_int > 0.0 {
            self.func[index] / (self.func_int * self.count() as Float)
        } else {
            1.0 / self.count() as Float
        }
    }
}

/// A piecewise-constant 2D function over [0, 1]^2, sampled by first choosing a row from the
/// marginal distribution and then a column from that row's conditional distribution.
#[derive(Clone, Debug)]
pub struct Distribution2D {
    conditional: Vec<Distribution1D>,
    marginal: Distribution1D,
}

impl Distribution2D {
    /// `func` holds `nv` rows of `nu` values each.
    pub fn new(func: &[Float], nu: usize, nv: usize) -> Self {
        assert_eq!(func.len(), nu * nv);
        let conditional: Vec<Distribution1D> = func.chunks(nu)
            .map(Distribution1D::new)
            .collect();

        let marginal_func: Vec<Float> = conditional.iter().map(|d| d.integral()).collect();
        let marginal = Distribution1D::new(&marginal_func);

        Self { conditional, marginal }
    }

    pub fn sample_continuous(&self, u: Point2f) -> (Point2f, Float) {
        let v = self.marginal.sample_continuous(u[1]);
        let d = self.conditional[v.offset].sample_continuous(u[0]);
        (Point2f::new(d.value, v.value), d.pdf * v.pdf)
    }

    pub fn pdf(&self, p: Point2f) -> Float {
        let nu = self.conditional[0].count();
        let nv = self.marginal.count();
        let iu = ((p[0] * nu as Float) as isize).clamp(0, nu as isize - 1) as usize;
        let iv = ((p[1] * nv as Float) as isize).clamp(0, nv as isize - 1) as usize;
        if self.marginal.integral() == 0.0 {
            return 1.0;
        }
        self.conditional[iv].func()[iu] / self.marginal.integral()
    }
}
