//! Physics-informed surrogate training for 2D Boussinesq convection.
//!
//! A separable (SPINN) or dense (PINN) network maps `(t, x, y)` to
//! `(u, v, ρ)`. Training minimizes the residuals of vorticity transport,
//! density transport and incompressibility plus an initial-condition
//! mismatch, one time window at a time.

pub mod artifacts;
pub mod autodiff;
pub mod config;
pub mod data;
pub mod error;
pub mod eval;
pub mod loss;
pub mod marching;
pub mod network;
pub mod optim;
pub mod reference;
pub mod residuals;
pub mod train;
pub mod visualization;
pub mod vorticity;

pub use error::{PinnError, Result};
