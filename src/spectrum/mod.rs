use crate::Float;

#[inline]
pub fn zip<F: Fn(Float, Float) -> Float, const N: usize>(a: [Float; N], b: [Float; N], f: F) -> [Float; N] {
    std::array::from_fn(|i| f(a[i], b[i]))
}

#[allow(clippy::excessive_precision)]
pub fn rgb_to_xyz(rgb: [Float; 3]) -> [Float; 3] {
    let mut xyz = [0.0; 3];
    xyz[0] = 0.412453 * rgb[0] + 0.357580 * rgb[1] + 0.180423 * rgb[2];
    xyz[1] = 0.212671 * rgb[0] + 0.715160 * rgb[1] + 0.072169 * rgb[2];
    xyz[2] = 0.019334 * rgb[0] + 0.119193 * rgb[1] + 0.950227 * rgb[2];
    xyz
}

#[derive(Clone, Copy)]
pub struct CoefficientSpectrum<const N: usize>([Float; N]);

pub type Spectrum = CoefficientSpectrum<3>;

impl<const N: usize> CoefficientSpectrum<N> {

    #[inline]
    pub fn new_with<F: FnMut(usize) -> Float>(init: F) -> Self {
        Self(std::array::from_fn(init))
    }

    #[inline]
    pub fn zip<F: Fn(Float, Float) -> Float>(&self, other: &Self, f: F) -> Self {
        Self(zip(self.0, other.0, f))
    }

    pub fn uniform(val: Float) -> Self {
        Self([val; N])
    }

    pub fn zero() -> Self {
        Self::uniform(0.0)
    }

    pub fn map<F: Fn(Float) -> Float>(&self, f: F) -> Self {
        Self::new_with(|i| f(self[i]))
    }

    pub fn is_black(&self) -> bool {
        self.0.iter().all(|&x| x == 0.0)
    }

    pub fn has_nans(&self) -> bool {
        self.0.iter().any(|&x| x.is_nan())
    }

    /// No NaN or infinite channels.
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|&x| x.is_finite())
    }

    pub fn max_component_value(&self) -> Float {
        self.0.iter().copied().fold(std::f32::NEG_INFINITY, Float::max)
    }

    pub fn average(&self) -> Float {
        self.0.iter().sum::<Float>() / N as Float
    }

    pub fn lerp(t: Float, s1: Self, s2: Self) -> Self {
        (1.0 - t) * s1 + t * s2
    }

    pub fn sqrt(self) -> Self {
        Self::new_with(|i| self[i].sqrt())
    }

    pub fn exp(self) -> Self {
        Self::new_with(|i| self[i].exp())
    }

    pub fn clamp(self, low: Float, high: Float) -> Self {
        Self::new_with(|i| self[i].clamp(low, high))
    }

    pub fn clamp_positive(self) -> Self {
        self.clamp(0.0, std::f32::INFINITY)
    }

    pub fn into_array(self) -> [Float; N] {
        self.0
    }
}

impl CoefficientSpectrum<3> {
    pub fn rgb(r: Float, g: Float, b: Float) -> Self {
        Self([r, g, b])
    }

    pub fn to_xyz(self) -> [Float; 3] {
        rgb_to_xyz(self.0)
    }

    /// The Y (luminance) coefficient of the XYZ color.
    pub fn y(&self) -> Float {
        0.212671 * self[0] + 0.715160 * self[1] + 0.072169 * self[2]
    }
}

pub fn spectrum_from_rgb8(rgb8: [u8; 3]) -> Spectrum {
    let c = [
        rgb8[0] as Float / 255.0,
        rgb8[1] as Float / 255.0,
        rgb8[2] as Float / 255.0,
    ];
    CoefficientSpectrum(c)
}

pub fn spectrum_into_rgb8(s: Spectrum) -> [u8; 3] {
    let rgb = [
        Float::round(s[0].clamp(0.0, 1.0) * 255.0) as u8,
        Float::round(s[1].clamp(0.0, 1.0) * 255.0) as u8,
        Float::round(s[2].clamp(0.0, 1.0) * 255.0) as u8,
    ];
    rgb
}

impl<const N: usize> std::ops::Index<usize> for CoefficientSpectrum<N> {
    type Output = Float;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<const N: usize> std::ops::IndexMut<usize> for CoefficientSpectrum<N> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl<const N: usize> std::cmp::PartialEq for CoefficientSpectrum<N> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<const N: usize> Default for CoefficientSpectrum<N> {
    fn default() -> Self {
        Self::uniform(Float::default())
    }
}

impl<const N: usize> std::fmt::Debug for CoefficientSpectrum<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl<const N: usize> From<[Float; N]> for CoefficientSpectrum<N> {
    fn from(a: [Float; N]) -> Self {
        Self(a)
    }
}

impl<const N: usize> From<Float> for CoefficientSpectrum<N> {
    fn from(x: Float) -> Self {
        Self::uniform(x)
    }
}

impl<const N: usize> From<CoefficientSpectrum<N>> for [Float; N] {
    fn from(s: CoefficientSpectrum<N>) -> Self {
        s.0
    }
}

impl<const N: usize> std::iter::Sum for CoefficientSpectrum<N> {
    fn sum<I: Iterator<Item=Self>>(iter: I) -> Self {
        iter.fold(Self::uniform(0.0), std::ops::Add::add)
    }
}

impl<const N: usize> std::ops::Neg for CoefficientSpectrum<N> {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new_with(|i| -self[i])
    }
}

macro_rules! impl_op {
    ($op:ident, $name:ident, $sym:tt) => {
        impl<const N: usize> std::ops::$op for CoefficientSpectrum<N> {
            type Output = Self;

            fn $name(self, rhs: Self) -> Self::Output {
                Self::zip(&self, &rhs, |x, y| x $sym y)
            }
        }

        impl<const N: usize> std::ops::$op<Float> for CoefficientSpectrum<N> {
            type Output = Self;

            fn $name(self, rhs: Float) -> Self::Output {
                Self::new_with(|i| self[i] $sym rhs)
            }
        }

        impl<const N: usize> std::ops::$op<CoefficientSpectrum<N>> for Float {
            type Output = CoefficientSpectrum<N>;

            fn $name(self, rhs: CoefficientSpectrum<N>) -> Self::Output {
                CoefficientSpectrum::new_with(|i| self $sym rhs[i])
            }
        }
    }
}

macro_rules! impl_assign_op {
    ($op:ident, $name:ident, $sym:tt) => {
        impl<const N: usize> std::ops::$op for CoefficientSpectrum<N> {
            fn $name(&mut self, rhs: Self) {
                for i in 0..N {
                    self[i] $sym rhs[i];
                }
            }
        }

        impl<const N: usize> std::ops::$op<Float> for CoefficientSpectrum<N> {
            fn $name(&mut self, rhs: Float) {
                for i in 0..N {
                    self[i] $sym rhs;
                }
            }
        }
    }
}

impl_op!(Add, add, +);
impl_op!(Sub, sub, -);
impl_op!(Mul, mul, *);
impl_op!(Div, div, /);
impl_assign_op!(AddAssign, add_assign, +=);
impl_assign_op!(SubAssign, sub_assign, -=);
impl_assign_op!(MulAssign, mul_assign, *=);
impl_assign_op!(DivAssign, div_assign, /=);
