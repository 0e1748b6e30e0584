//! Scalar vorticity from a velocity-producing surrogate.

use ndarray::Array3;

use crate::autodiff::{directional_derivative, lift, Coords, InputAxis, Real};
use crate::network::Surrogate;

/// ω = ∂v/∂x − ∂u/∂y, each partial a separate forward-mode pass.
///
/// Generic over the scalar type so the result can itself be differentiated
/// along another axis (ω_t, ω_x, ω_y) or through the parameters.
pub fn vorticity<S, N>(net: &N, params: &[S], coords: &Coords<S>) -> Array3<S>
where
    S: Real,
    N: Surrogate,
{
    let lifted = lift(params);
    let v_x = directional_derivative(|c| net.forward(&lifted, c).v, coords, InputAxis::X);
    let u_y = directional_derivative(|c| net.forward(&lifted, c).u, coords, InputAxis::Y);
    v_x - u_y
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Closed-form surrogates with known derivatives.

    use ndarray::Array3;

    use crate::autodiff::{Coords, Real};
    use crate::network::{Fields, Surrogate};

    /// Rigid rotation scaled by `params[0]`: u = −a·y, v = a·x, ρ = a·x.
    /// Vorticity is 2a everywhere and the flow is divergence free.
    pub struct RigidRotation;

    impl Surrogate for RigidRotation {
        fn num_params(&self) -> usize {
            1
        }

        fn forward<S: Real>(&self, params: &[S], coords: &Coords<S>) -> Fields<S> {
            let a = params[0];
            let shape = coords.shape();
            Fields {
                u: Array3::from_shape_fn(shape, |(_, _, k)| -(a * coords.y[k])),
                v: Array3::from_shape_fn(shape, |(_, j, _)| a * coords.x[j]),
                rho: Array3::from_shape_fn(shape, |(_, j, _)| a * coords.x[j]),
            }
        }
    }

    /// Steady shear flow u = sin(y)·p0, v = 0, ρ = cos(x − t)·p1 + p2.
    pub struct ShearWave;

    impl Surrogate for ShearWave {
        fn num_params(&self) -> usize {
            3
        }

        fn forward<S: Real>(&self, params: &[S], coords: &Coords<S>) -> Fields<S> {
            let shape = coords.shape();
            Fields {
                u: Array3::from_shape_fn(shape, |(_, _, k)| coords.y[k].sin() * params[0]),
                v: Array3::from_shape_fn(shape, |_| S::zero()),
                rho: Array3::from_shape_fn(shape, |(i, j, _)| {
                    (coords.x[j] - coords.t[i]).cos() * params[1] + params[2]
                }),
            }
        }
    }
}
