//! Scalar element types accepted by compute backends.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use num_complex::Complex;
use num_traits::Float;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;

/// Scalar type that can live inside a backend buffer.
///
/// Covers the real and complex floating-point types the solvers run on. The
/// associated [`Element::Real`] type carries norms, residuals and step sizes,
/// which stay real-valued even when iterates are complex.
pub trait Element:
    Copy
    + PartialEq
    + fmt::Debug
    + fmt::Display
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    /// Real scalar paired with this element type.
    type Real: Float + fmt::Debug + fmt::Display + fmt::LowerExp + Send + Sync + 'static;

    /// Name used in diagnostics.
    const DTYPE: &'static str;

    fn zero() -> Self;

    /// Embeds a real scalar.
    fn from_real(r: Self::Real) -> Self;

    /// Complex conjugate; identity for real types.
    fn conj(self) -> Self;

    /// Real part.
    fn real(self) -> Self::Real;

    /// Squared modulus.
    fn abs_sq(self) -> Self::Real;

    /// Principal square root.
    fn sqrt(self) -> Self;

    /// Modulus.
    fn abs(self) -> Self::Real {
        self.abs_sq().sqrt()
    }

    /// Draws one standard-normal sample; complex types draw independent real
    /// and imaginary parts.
    fn standard_normal(rng: &mut StdRng) -> Self;
}

impl Element for f32 {
    type Real = f32;

    const DTYPE: &'static str = "f32";

    fn zero() -> Self {
        0.0
    }

    fn from_real(r: f32) -> Self {
        r
    }

    fn conj(self) -> Self {
        self
    }

    fn real(self) -> f32 {
        self
    }

    fn abs_sq(self) -> f32 {
        self * self
    }

    fn sqrt(self) -> Self {
        f32::sqrt(self)
    }

    fn standard_normal(rng: &mut StdRng) -> Self {
        rng.sample(StandardNormal)
    }
}

impl Element for f64 {
    type Real = f64;

    const DTYPE: &'static str = "f64";

    fn zero() -> Self {
        0.0
    }

    fn from_real(r: f64) -> Self {
        r
    }

    fn conj(self) -> Self {
        self
    }

    fn real(self) -> f64 {
        self
    }

    fn abs_sq(self) -> f64 {
        self * self
    }

    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    fn standard_normal(rng: &mut StdRng) -> Self {
        rng.sample(StandardNormal)
    }
}

impl Element for Complex<f32> {
    type Real = f32;

    const DTYPE: &'static str = "complex64";

    fn zero() -> Self {
        Complex::new(0.0, 0.0)
    }

    fn from_real(r: f32) -> Self {
        Complex::new(r, 0.0)
    }

    fn conj(self) -> Self {
        Complex::conj(&self)
    }

    fn real(self) -> f32 {
        self.re
    }

    fn abs_sq(self) -> f32 {
        self.norm_sqr()
    }

    fn sqrt(self) -> Self {
        Complex::sqrt(self)
    }

    fn standard_normal(rng: &mut StdRng) -> Self {
        Complex::new(rng.sample(StandardNormal), rng.sample(StandardNormal))
    }
}

impl Element for Complex<f64> {
    type Real = f64;

    const DTYPE: &'static str = "complex128";

    fn zero() -> Self {
        Complex::new(0.0, 0.0)
    }

    fn from_real(r: f64) -> Self {
        Complex::new(r, 0.0)
    }

    fn conj(self) -> Self {
        Complex::conj(&self)
    }

    fn real(self) -> f64 {
        self.re
    }

    fn abs_sq(self) -> f64 {
        self.norm_sqr()
    }

    fn sqrt(self) -> Self {
        Complex::sqrt(self)
    }

    fn standard_normal(rng: &mut StdRng) -> Self {
        Complex::new(rng.sample(StandardNormal), rng.sample(StandardNormal))
    }
}
