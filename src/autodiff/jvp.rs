use ndarray::{Array1, Array3};

use super::{Dual, Real};

/// Independent input axes of the surrogate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAxis {
    T,
    X,
    Y,
}

/// Per-axis sample arrays. Surrogates evaluate on their Cartesian product,
/// producing fields of shape `(t.len(), x.len(), y.len())`.
#[derive(Debug, Clone)]
pub struct Coords<S> {
    pub t: Array1<S>,
    pub x: Array1<S>,
    pub y: Array1<S>,
}

impl<S: Real> Coords<S> {
    pub fn new(t: Array1<S>, x: Array1<S>, y: Array1<S>) -> Self {
        Self { t, x, y }
    }

    /// Grid shape `(nt, nx, ny)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.t.len(), self.x.len(), self.y.len())
    }

    /// Lift into duals with a ones tangent on `axis` and zero elsewhere.
    pub fn seeded(&self, axis: InputAxis) -> Coords<Dual<S>> {
        let lift_axis = |values: &Array1<S>, seeded: bool| {
            values.mapv(|v| if seeded { Dual::seed(v) } else { Dual::constant(v) })
        };
        Coords {
            t: lift_axis(&self.t, axis == InputAxis::T),
            x: lift_axis(&self.x, axis == InputAxis::X),
            y: lift_axis(&self.y, axis == InputAxis::Y),
        }
    }
}

impl Coords<f64> {
    /// Convert plain coordinates into any scalar type as constants.
    pub fn cast<S: Real>(&self) -> Coords<S> {
        Coords {
            t: self.t.mapv(S::constant),
            x: self.x.mapv(S::constant),
            y: self.y.mapv(S::constant),
        }
    }
}

/// Lift parameters one dual level up with zero tangents.
pub fn lift<S: Real>(params: &[S]) -> Vec<Dual<S>> {
    params.iter().map(|&p| Dual::constant(p)).collect()
}

/// ∂f/∂axis over a batch, by a forward-mode pass seeded with a ones vector
/// shaped like the `axis` samples.
///
/// The surrogate output at grid point `(i, j, k)` depends only on
/// `(t[i], x[j], y[k])`, so a ones seed over a whole axis yields the
/// pointwise partial derivative at every grid point at once.
pub fn directional_derivative<S, F>(f: F, coords: &Coords<S>, axis: InputAxis) -> Array3<S>
where
    S: Real,
    F: FnOnce(&Coords<Dual<S>>) -> Array3<Dual<S>>,
{
    f(&coords.seeded(axis)).mapv(|d| d.eps)
}
