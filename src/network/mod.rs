//! # Surrogate networks
//!
//! Both architectures satisfy one call contract, [`Surrogate::forward`]:
//! given per-axis samples `(t, x, y)` they return `(u, v, ρ)` on the full
//! `(nt, nx, ny)` product grid.
//!
//! - [`Spinn`]: factorized network. One MLP per axis, channels combined by
//!   a rank-`r` outer product. Cost scales with points per axis.
//! - [`Pinn`]: one MLP on concatenated coordinates, evaluated pointwise over
//!   the product grid.
//!
//! Parameters are a flat `f64` vector owned by the caller and replaced
//! wholesale on every optimizer update.

mod dense;
mod pinn;
mod spinn;

pub use dense::{encoded_dim, positional_encoding, Dense, Mlp, MlpKind, ParamLayout};
pub use pinn::Pinn;
pub use spinn::Spinn;

use clap::ValueEnum;
use ndarray::{Array1, Array3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::autodiff::{Coords, Real};
use crate::error::{PinnError, Result};

/// Output channels the residuals consume: u, v, ρ.
pub const FIELD_CHANNELS: usize = 3;

/// Velocity and density fields on a product grid.
#[derive(Debug, Clone)]
pub struct Fields<S> {
    pub u: Array3<S>,
    pub v: Array3<S>,
    pub rho: Array3<S>,
}

/// The surrogate call contract.
pub trait Surrogate {
    fn num_params(&self) -> usize;

    /// Evaluate `(u, v, ρ)` on the product grid of `coords`.
    fn forward<S: Real>(&self, params: &[S], coords: &Coords<S>) -> Fields<S>;

    /// Whether the architecture combines axes by outer product, which
    /// requires independently sampled, distinct values per axis.
    fn is_separable(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Spinn,
    Pinn,
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Spinn => "spinn",
            Self::Pinn => "pinn",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub model: ModelKind,
    pub mlp: MlpKind,
    pub n_layers: usize,
    pub features: usize,
    /// Rank of the factorized representation (SPINN only).
    pub rank: usize,
    pub out_dim: usize,
    /// Positional encoding order for x and y; 0 disables encoding.
    pub pos_enc: usize,
}

/// Closed set of supported architectures.
#[derive(Debug, Clone)]
pub enum Network {
    Spinn(Spinn),
    Pinn(Pinn),
}

impl Network {
    pub fn build(config: &NetworkConfig) -> Result<Self> {
        if config.out_dim < FIELD_CHANNELS {
            return Err(PinnError::Contract(format!(
                "surrogate must produce at least {FIELD_CHANNELS} channels (u, v, rho), got out_dim = {}",
                config.out_dim
            )));
        }
        if config.features == 0 {
            return Err(PinnError::Config("features must be positive".into()));
        }
        Ok(match config.model {
            ModelKind::Spinn => {
                if config.rank == 0 {
                    return Err(PinnError::Config("rank must be positive".into()));
                }
                Self::Spinn(Spinn::new(config))
            }
            ModelKind::Pinn => Self::Pinn(Pinn::new(config)),
        })
    }

    fn layers(&self) -> &[Dense] {
        match self {
            Self::Spinn(net) => net.layers(),
            Self::Pinn(net) => net.layers(),
        }
    }

    /// Fresh parameters: Glorot-normal weights, zero biases.
    pub fn init_params(&self, seed: u64) -> Array1<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut params = vec![0.0; self.num_params()];
        for layer in self.layers() {
            layer.init(&mut rng, &mut params);
        }
        Array1::from(params)
    }
}

impl Surrogate for Network {
    fn num_params(&self) -> usize {
        match self {
            Self::Spinn(net) => net.num_params(),
            Self::Pinn(net) => net.num_params(),
        }
    }

    fn forward<S: Real>(&self, params: &[S], coords: &Coords<S>) -> Fields<S> {
        match self {
            Self::Spinn(net) => net.forward(params, coords),
            Self::Pinn(net) => net.forward(params, coords),
        }
    }

    fn is_separable(&self) -> bool {
        matches!(self, Self::Spinn(_))
    }
}
