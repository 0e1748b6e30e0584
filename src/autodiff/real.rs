use std::fmt::Debug;
use std::ops::{Add, Mul, Neg, Sub};

/// Scalar algebra every surrogate is written against.
///
/// Implemented for `f64` (plain evaluation), [`super::Dual`] (forward-mode
/// tangents) and [`super::Var`] (reverse-mode tape entries).
pub trait Real:
    Copy + Debug + Add<Output = Self> + Sub<Output = Self> + Mul<Output = Self> + Neg<Output = Self>
{
    /// Lift a constant; constants carry no derivative information.
    fn constant(value: f64) -> Self;

    /// Primal value, stripped of all derivative information.
    fn value(self) -> f64;

    fn tanh(self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;

    #[inline]
    fn zero() -> Self {
        Self::constant(0.0)
    }

    #[inline]
    fn one() -> Self {
        Self::constant(1.0)
    }

    /// Multiply by a plain constant.
    #[inline]
    fn scale(self, k: f64) -> Self {
        self * Self::constant(k)
    }

    #[inline]
    fn square(self) -> Self {
        self * self
    }
}

impl Real for f64 {
    #[inline]
    fn constant(value: f64) -> Self {
        value
    }

    #[inline]
    fn value(self) -> f64 {
        self
    }

    #[inline]
    fn tanh(self) -> Self {
        f64::tanh(self)
    }

    #[inline]
    fn sin(self) -> Self {
        f64::sin(self)
    }

    #[inline]
    fn cos(self) -> Self {
        f64::cos(self)
    }

    #[inline]
    fn scale(self, k: f64) -> Self {
        self * k
    }
}
