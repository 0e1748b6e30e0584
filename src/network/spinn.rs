use ndarray::{Array2, Array3};

use super::dense::{encoded_dim, positional_encoding, Dense, Mlp, ParamLayout};
use super::{Fields, NetworkConfig, Surrogate, FIELD_CHANNELS};
use crate::autodiff::{Coords, Real};

/// Separable PINN: per-axis MLP branches combined by a rank-`r` outer
/// product,
///
/// `field_c(t_i, x_j, y_k) = Σ_q T[i, c·r + q] · X[j, c·r + q] · Y[k, c·r + q]`.
#[derive(Debug, Clone)]
pub struct Spinn {
    t_branch: Mlp,
    x_branch: Mlp,
    y_branch: Mlp,
    rank: usize,
    pos_enc: usize,
    num_params: usize,
    layers: Vec<Dense>,
}

impl Spinn {
    pub fn new(config: &NetworkConfig) -> Self {
        let mut layout = ParamLayout::default();
        let width = config.out_dim * config.rank;
        let space_in = encoded_dim(config.pos_enc);
        let mut branch = |in_dim| {
            Mlp::new(
                &mut layout,
                config.mlp,
                in_dim,
                config.features,
                config.n_layers,
                width,
            )
        };
        let t_branch = branch(1);
        let x_branch = branch(space_in);
        let y_branch = branch(space_in);
        Self {
            t_branch,
            x_branch,
            y_branch,
            rank: config.rank,
            pos_enc: config.pos_enc,
            num_params: layout.size(),
            layers: layout.into_layers(),
        }
    }

    pub(super) fn layers(&self) -> &[Dense] {
        &self.layers
    }

    /// Branch features for every sample on one axis, shape `(n, out_dim·r)`.
    fn branch_features<S: Real>(&self, branch: &Mlp, params: &[S], samples: &[S], encode: bool) -> Array2<S> {
        let rows: Vec<Vec<S>> = samples
            .iter()
            .map(|&s| {
                let input = if encode {
                    positional_encoding(s, self.pos_enc)
                } else {
                    vec![s]
                };
                branch.forward(params, &input)
            })
            .collect();
        let width = rows.first().map_or(0, Vec::len);
        Array2::from_shape_fn((rows.len(), width), |(i, q)| rows[i][q])
    }
}

impl Surrogate for Spinn {
    fn num_params(&self) -> usize {
        self.num_params
    }

    fn forward<S: Real>(&self, params: &[S], coords: &Coords<S>) -> Fields<S> {
        let t: Vec<S> = coords.t.to_vec();
        let x: Vec<S> = coords.x.to_vec();
        let y: Vec<S> = coords.y.to_vec();
        let ft = self.branch_features(&self.t_branch, params, &t, false);
        let fx = self.branch_features(&self.x_branch, params, &x, true);
        let fy = self.branch_features(&self.y_branch, params, &y, true);

        let r = self.rank;
        let channel = |c: usize| {
            Array3::from_shape_fn((t.len(), x.len(), y.len()), |(i, j, k)| {
                (c * r..(c + 1) * r).fold(S::zero(), |acc, q| acc + ft[[i, q]] * fx[[j, q]] * fy[[k, q]])
            })
        };
        debug_assert!(FIELD_CHANNELS * r <= ft.ncols());
        Fields {
            u: channel(0),
            v: channel(1),
            rho: channel(2),
        }
    }

    fn is_separable(&self) -> bool {
        true
    }
}
