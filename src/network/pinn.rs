use ndarray::Array3;

use super::dense::{encoded_dim, positional_encoding, Dense, Mlp, ParamLayout};
use super::{Fields, NetworkConfig, Surrogate};
use crate::autodiff::{Coords, Real};

/// Dense PINN on `[t, enc(x), enc(y)]`, evaluated at every point of the
/// product grid.
#[derive(Debug, Clone)]
pub struct Pinn {
    body: Mlp,
    pos_enc: usize,
    num_params: usize,
    layers: Vec<Dense>,
}

impl Pinn {
    pub fn new(config: &NetworkConfig) -> Self {
        let mut layout = ParamLayout::default();
        let in_dim = 1 + 2 * encoded_dim(config.pos_enc);
        let body = Mlp::new(
            &mut layout,
            config.mlp,
            in_dim,
            config.features,
            config.n_layers,
            config.out_dim,
        );
        Self {
            body,
            pos_enc: config.pos_enc,
            num_params: layout.size(),
            layers: layout.into_layers(),
        }
    }

    pub(super) fn layers(&self) -> &[Dense] {
        &self.layers
    }
}

impl Surrogate for Pinn {
    fn num_params(&self) -> usize {
        self.num_params
    }

    fn forward<S: Real>(&self, params: &[S], coords: &Coords<S>) -> Fields<S> {
        let shape = coords.shape();
        let x_enc: Vec<Vec<S>> = coords.x.iter().map(|&x| positional_encoding(x, self.pos_enc)).collect();
        let y_enc: Vec<Vec<S>> = coords.y.iter().map(|&y| positional_encoding(y, self.pos_enc)).collect();

        let mut u = Vec::with_capacity(shape.0 * shape.1 * shape.2);
        let mut v = Vec::with_capacity(u.capacity());
        let mut rho = Vec::with_capacity(u.capacity());
        for &t in coords.t.iter() {
            for xe in &x_enc {
                for ye in &y_enc {
                    let mut input = Vec::with_capacity(1 + xe.len() + ye.len());
                    input.push(t);
                    input.extend_from_slice(xe);
                    input.extend_from_slice(ye);
                    let out = self.body.forward(params, &input);
                    u.push(out[0]);
                    v.push(out[1]);
                    rho.push(out[2]);
                }
            }
        }
        let (_, nx, ny) = shape;
        let grid = |values: Vec<S>| Array3::from_shape_fn(shape, |(i, j, k)| values[(i * nx + j) * ny + k]);
        Fields {
            u: grid(u),
            v: grid(v),
            rho: grid(rho),
        }
    }
}
