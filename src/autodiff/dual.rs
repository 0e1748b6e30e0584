//! Forward-mode dual numbers over an arbitrary [`Real`] base.
//!
//! Chain rule, applied componentwise:
//! - `(f + g)' = f' + g'`
//! - `(f * g)' = f' * g + f * g'`
//! - `tanh(f)' = f' * (1 - tanh²(f))`
//! - `sin(f)' = f' * cos(f)`, `cos(f)' = -f' * sin(f)`

use std::ops::{Add, Mul, Neg, Sub};

use super::Real;

/// A value and one directional derivative (tangent).
#[derive(Copy, Clone, Debug)]
pub struct Dual<S> {
    pub re: S,
    pub eps: S,
}

impl<S: Real> Dual<S> {
    #[inline]
    pub fn new(re: S, eps: S) -> Self {
        Self { re, eps }
    }

    /// Constant with zero tangent.
    #[inline]
    pub fn constant(re: S) -> Self {
        Self { re, eps: S::zero() }
    }

    /// Seed with a unit tangent.
    #[inline]
    pub fn seed(re: S) -> Self {
        Self { re, eps: S::one() }
    }
}

impl<S: Real> Add for Dual<S> {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.re + rhs.re, self.eps + rhs.eps)
    }
}

impl<S: Real> Sub for Dual<S> {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.re - rhs.re, self.eps - rhs.eps)
    }
}

impl<S: Real> Mul for Dual<S> {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self::new(self.re * rhs.re, self.eps * rhs.re + self.re * rhs.eps)
    }
}

impl<S: Real> Neg for Dual<S> {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.re, -self.eps)
    }
}

impl<S: Real> Real for Dual<S> {
    #[inline]
    fn constant(value: f64) -> Self {
        Self::constant(S::constant(value))
    }

    #[inline]
    fn value(self) -> f64 {
        self.re.value()
    }

    #[inline]
    fn tanh(self) -> Self {
        let t = self.re.tanh();
        Self::new(t, self.eps * (S::one() - t * t))
    }

    #[inline]
    fn sin(self) -> Self {
        Self::new(self.re.sin(), self.eps * self.re.cos())
    }

    #[inline]
    fn cos(self) -> Self {
        Self::new(self.re.cos(), -(self.eps * self.re.sin()))
    }

    #[inline]
    fn scale(self, k: f64) -> Self {
        Self::new(self.re.scale(k), self.eps.scale(k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_rule() {
        // f(x) = x * x * 3 at x = 2 → f = 12, f' = 12
        let x = Dual::seed(2.0_f64);
        let f = x * x * Dual::constant(3.0);
        assert_eq!(f.re, 12.0);
        assert_eq!(f.eps, 12.0);
    }

    #[test]
    fn transcendental_tangents() {
        let x = Dual::seed(0.3_f64);
        assert!((x.sin().eps - 0.3_f64.cos()).abs() < 1e-15);
        assert!((x.cos().eps + 0.3_f64.sin()).abs() < 1e-15);
        let t = 0.3_f64.tanh();
        assert!((x.tanh().eps - (1.0 - t * t)).abs() < 1e-15);
    }

    #[test]
    fn nested_duals_give_mixed_second_derivative() {
        // f(x, y) = sin(x) * y² ; ∂²f/∂x∂y = 2y cos(x)
        let (x0, y0) = (0.7_f64, 1.3_f64);
        let x = Dual::seed(Dual::constant(x0));
        let y = Dual::constant(Dual::seed(y0));
        let f = x.sin() * y * y;
        assert!((f.eps.eps - 2.0 * y0 * x0.cos()).abs() < 1e-12);
        assert!((f.re.eps - 2.0 * y0 * x0.sin()).abs() < 1e-12);
    }
}
