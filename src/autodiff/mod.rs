//! # Automatic differentiation
//!
//! Two number types cooperate to differentiate PDE residuals through a
//! surrogate network:
//!
//! - [`Dual`] carries one tangent alongside a value (forward mode). Seeding
//!   the tangent of a single input axis with ones yields the partial
//!   derivative along that axis for every sample in a batch. Nesting
//!   (`Dual<Dual<S>>`) gives mixed second derivatives such as ∂ω/∂t.
//! - [`Var`] records every operation on a [`Tape`] (reverse mode), so one
//!   backward sweep yields the gradient of a scalar loss with respect to all
//!   network parameters.
//!
//! Network code is written once against the [`Real`] trait and is
//! instantiated with `f64`, `Dual<f64>`, `Dual<Var>` or `Dual<Dual<Var>>`
//! depending on which derivatives a caller needs.

mod dual;
mod jvp;
mod real;
mod tape;

pub use dual::Dual;
pub use jvp::{directional_derivative, lift, Coords, InputAxis};
pub use real::Real;
pub use tape::{Tape, Var};
