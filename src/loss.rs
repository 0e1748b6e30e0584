//! Training objective and its gradient.
//!
//! ```text
//! L = w_w·mean(R_w²) + w_c·mean(R_c²) + w_ρ·mean(R_ρ²)
//!   + w_ic·[mean((ω−ω₀)²) + mean((u−u₀)²) + mean((v−v₀)²) + mean((ρ−ρ₀)²)]
//! ```
//!
//! A [`LossKernel`] is specialized to one interior batch shape and one
//! initial-condition shape. Calls with other shapes are rejected with
//! [`PinnError::ShapeMismatch`]; switching batch shape means building a new
//! kernel. Batches that only differ in values (offset sets of one shape)
//! reuse the same kernel.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::autodiff::{Coords, Real, Tape};
use crate::error::{PinnError, Result};
use crate::network::Surrogate;
use crate::residuals::Equation;
use crate::vorticity::vorticity;

/// Fixed, non-negative loss weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossWeights {
    /// Incompressibility residual.
    pub continuity: f64,
    /// Density-transport residual.
    pub density: f64,
    /// Vorticity-transport residual.
    pub vorticity: f64,
    /// Initial-condition mismatch.
    pub initial: f64,
}

/// One time slice of ground truth on an `(nx, ny)` grid.
///
/// Ground-truth arrays are indexed `[j, k]` for `(x[j], y[k])`, the same
/// orientation the surrogate produces, with no transpose applied.
#[derive(Debug, Clone)]
pub struct InitialCondition {
    pub coords: Coords<f64>,
    pub w0: Array2<f64>,
    pub u0: Array2<f64>,
    pub v0: Array2<f64>,
    pub rho0: Array2<f64>,
}

impl InitialCondition {
    /// Checks the single time slice and that every ground-truth array lines
    /// up with the `(x, y)` grid.
    pub fn validate(&self) -> Result<()> {
        let (nt, nx, ny) = self.coords.shape();
        if nt != 1 {
            return Err(PinnError::shape("initial condition time axis", &[1], &[nt]));
        }
        for truth in [&self.w0, &self.u0, &self.v0, &self.rho0] {
            if truth.dim() != (nx, ny) {
                return Err(PinnError::shape("initial condition ground truth", &[nx, ny], truth.shape()));
            }
        }
        Ok(())
    }
}

/// Mean of squares; zero for an empty iterator.
pub fn mean_square<S: Real>(values: impl Iterator<Item = S>) -> S {
    let (sum, n) = values.fold((S::zero(), 0usize), |(acc, n), v| (acc + v * v, n + 1));
    if n == 0 {
        S::zero()
    } else {
        sum.scale(1.0 / n as f64)
    }
}

/// Unweighted initial-condition mismatch.
pub fn initial_loss<S, N>(net: &N, params: &[S], ic: &InitialCondition) -> S
where
    S: Real,
    N: Surrogate,
{
    let coords = ic.coords.cast::<S>();
    let w = vorticity(net, params, &coords);
    let fields = net.forward(params, &coords);
    let mismatch = |pred: ndarray::ArrayView2<S>, truth: &Array2<f64>| {
        mean_square(pred.iter().zip(truth.iter()).map(|(&p, &t)| p - S::constant(t)))
    };
    mismatch(w.index_axis(Axis(0), 0), &ic.w0)
        + mismatch(fields.u.index_axis(Axis(0), 0), &ic.u0)
        + mismatch(fields.v.index_axis(Axis(0), 0), &ic.v0)
        + mismatch(fields.rho.index_axis(Axis(0), 0), &ic.rho0)
}

/// Interior loss plus weighted initial-condition loss.
pub fn total_loss<S, N>(
    equation: Equation,
    net: &N,
    params: &[S],
    interior: &Coords<f64>,
    ic: &InitialCondition,
    weights: &LossWeights,
) -> S
where
    S: Real,
    N: Surrogate,
{
    equation.interior_loss(net, params, &interior.cast::<S>(), weights)
        + initial_loss(net, params, ic).scale(weights.initial)
}

/// Loss-and-gradient function bound to one surrogate, equation, weight set
/// and batch shape.
#[derive(Debug)]
pub struct LossKernel<'n, N> {
    net: &'n N,
    equation: Equation,
    weights: LossWeights,
    interior_shape: (usize, usize, usize),
    ic_shape: (usize, usize, usize),
}

impl<'n, N: Surrogate> LossKernel<'n, N> {
    /// Validate the batches once and fix their shapes.
    pub fn specialize(
        net: &'n N,
        equation: Equation,
        weights: LossWeights,
        interior: &Coords<f64>,
        ic: &InitialCondition,
    ) -> Result<Self> {
        ic.validate()?;
        if net.is_separable() {
            for (name, samples) in [("t", &interior.t), ("x", &interior.x), ("y", &interior.y)] {
                ensure_distinct(name, samples)?;
            }
        }
        log::debug!(
            "specialized loss kernel: interior {:?}, initial condition {:?}",
            interior.shape(),
            ic.coords.shape()
        );
        Ok(Self {
            net,
            equation,
            weights,
            interior_shape: interior.shape(),
            ic_shape: ic.coords.shape(),
        })
    }

    pub fn equation(&self) -> Equation {
        self.equation
    }

    fn check_shapes(&self, params: &Array1<f64>, interior: &Coords<f64>, ic: &InitialCondition) -> Result<()> {
        if params.len() != self.net.num_params() {
            return Err(PinnError::shape("parameters", &[self.net.num_params()], &[params.len()]));
        }
        let found = interior.shape();
        if found != self.interior_shape {
            let (a, b, c) = self.interior_shape;
            return Err(PinnError::shape("interior batch", &[a, b, c], &[found.0, found.1, found.2]));
        }
        let found = ic.coords.shape();
        if found != self.ic_shape {
            let (a, b, c) = self.ic_shape;
            return Err(PinnError::shape("initial condition batch", &[a, b, c], &[found.0, found.1, found.2]));
        }
        Ok(())
    }

    /// Loss value without gradient.
    pub fn value(&self, params: &Array1<f64>, interior: &Coords<f64>, ic: &InitialCondition) -> Result<f64> {
        self.check_shapes(params, interior, ic)?;
        let params = params.to_vec();
        Ok(total_loss(self.equation, self.net, &params, interior, ic, &self.weights))
    }

    /// Loss value and its gradient with respect to every parameter, from one
    /// forward recording and one reverse sweep.
    pub fn value_and_grad(
        &self,
        params: &Array1<f64>,
        interior: &Coords<f64>,
        ic: &InitialCondition,
    ) -> Result<(f64, Array1<f64>)> {
        self.check_shapes(params, interior, ic)?;
        let tape = Tape::new();
        let vars = tape.vars(&params.to_vec());
        let loss = total_loss(self.equation, self.net, &vars, interior, ic, &self.weights);
        log::trace!("loss tape recorded {} nodes", tape.len());
        Ok((loss.value(), tape.gradient(loss, &vars)))
    }
}

fn ensure_distinct(axis: &str, samples: &Array1<f64>) -> Result<()> {
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    if sorted.windows(2).any(|w| w[0] == w[1]) {
        return Err(PinnError::Contract(format!(
            "separable surrogate needs distinct samples on the {axis} axis"
        )));
    }
    Ok(())
}
