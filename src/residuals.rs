//! PDE residuals of the 2D Boussinesq convection system.
//!
//! For a surrogate `(u, v, ρ)` with vorticity `ω = ∂v/∂x − ∂u/∂y`:
//!
//! ```text
//! R_w = ω_t + u ω_x + v ω_y − ρ_x     (vorticity transport)
//! R_ρ = ρ_t + u ρ_x + v ρ_y           (density transport)
//! R_c = u_x + v_y                     (incompressibility)
//! ```
//!
//! Every partial is its own forward-mode pass along one input axis. The
//! partials of ω re-run the vorticity composition under a second dual
//! level instead of differentiating a cached ω.
//!
//! There is no boundary residual: the domain is periodic and the positional
//! encoding makes every surrogate periodic by construction.

use clap::ValueEnum;
use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::autodiff::{directional_derivative, lift, Coords, InputAxis, Real};
use crate::loss::{mean_square, LossWeights};
use crate::network::Surrogate;
use crate::vorticity::vorticity;

/// Residual fields, one value per grid point.
#[derive(Debug, Clone)]
pub struct Residuals<S> {
    /// R_w
    pub vorticity: Array3<S>,
    /// R_ρ
    pub density: Array3<S>,
    /// R_c
    pub continuity: Array3<S>,
}

/// Supported PDE families. Each variant owns its residual computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum Equation {
    #[value(name = "Boussinesq_convection_flow_3d")]
    #[serde(rename = "Boussinesq_convection_flow_3d")]
    BoussinesqConvection,
}

impl Equation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BoussinesqConvection => "Boussinesq_convection_flow_3d",
        }
    }

    pub fn residuals<S, N>(&self, net: &N, params: &[S], coords: &Coords<S>) -> Residuals<S>
    where
        S: Real,
        N: Surrogate,
    {
        match self {
            Self::BoussinesqConvection => boussinesq_residuals(net, params, coords),
        }
    }

    /// Weighted interior loss `w_w·mean(R_w²) + w_c·mean(R_c²) + w_ρ·mean(R_ρ²)`.
    pub fn interior_loss<S, N>(&self, net: &N, params: &[S], coords: &Coords<S>, weights: &LossWeights) -> S
    where
        S: Real,
        N: Surrogate,
    {
        let r = self.residuals(net, params, coords);
        mean_square(r.vorticity.iter().copied()).scale(weights.vorticity)
            + mean_square(r.continuity.iter().copied()).scale(weights.continuity)
            + mean_square(r.density.iter().copied()).scale(weights.density)
    }
}

pub fn boussinesq_residuals<S, N>(net: &N, params: &[S], coords: &Coords<S>) -> Residuals<S>
where
    S: Real,
    N: Surrogate,
{
    let fields = net.forward(params, coords);
    let lifted = lift(params);

    let omega = |axis| directional_derivative(|c| vorticity(net, &lifted, c), coords, axis);
    let w_t = omega(InputAxis::T);
    let w_x = omega(InputAxis::X);
    let w_y = omega(InputAxis::Y);

    let rho = |axis| directional_derivative(|c| net.forward(&lifted, c).rho, coords, axis);
    let rho_t = rho(InputAxis::T);
    let rho_x = rho(InputAxis::X);
    let rho_y = rho(InputAxis::Y);

    let u_x = directional_derivative(|c| net.forward(&lifted, c).u, coords, InputAxis::X);
    let v_y = directional_derivative(|c| net.forward(&lifted, c).v, coords, InputAxis::Y);

    let (u, v) = (&fields.u, &fields.v);
    let shape = u.dim();
    Residuals {
        vorticity: Array3::from_shape_fn(shape, |p| w_t[p] + u[p] * w_x[p] + v[p] * w_y[p] - rho_x[p]),
        density: Array3::from_shape_fn(shape, |p| rho_t[p] + u[p] * rho_x[p] + v[p] * rho_y[p]),
        continuity: Array3::from_shape_fn(shape, |p| u_x[p] + v_y[p]),
    }
}

/// Pointwise |R_ρ|, |R_w|, |R_c| for diagnostics.
pub fn residual_magnitudes<N: Surrogate>(
    equation: Equation,
    net: &N,
    params: &[f64],
    coords: &Coords<f64>,
) -> Residuals<f64> {
    let r = equation.residuals(net, params, coords);
    Residuals {
        vorticity: r.vorticity.mapv(f64::abs),
        density: r.density.mapv(f64::abs),
        continuity: r.continuity.mapv(f64::abs),
    }
}
