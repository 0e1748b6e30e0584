//! Dense layers and MLP bodies over a flat parameter vector.
//!
//! Layers do not own weights. Each [`Dense`] remembers an offset into the
//! flat parameter slice, so the same network can be evaluated with `f64`
//! parameters or with tape variables without copying anything.

use clap::ValueEnum;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::autodiff::Real;

/// Hands out consecutive parameter ranges while a network is being built.
#[derive(Debug, Default)]
pub struct ParamLayout {
    size: usize,
    layers: Vec<Dense>,
}

impl ParamLayout {
    pub fn dense(&mut self, fan_in: usize, fan_out: usize) -> Dense {
        let layer = Dense {
            offset: self.size,
            fan_in,
            fan_out,
        };
        self.size += layer.num_params();
        self.layers.push(layer);
        layer
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn into_layers(self) -> Vec<Dense> {
        self.layers
    }
}

/// Affine map `y = x W + b`, row-major `W` of shape `(fan_in, fan_out)`
/// followed by `b`.
#[derive(Debug, Clone, Copy)]
pub struct Dense {
    offset: usize,
    fan_in: usize,
    fan_out: usize,
}

impl Dense {
    pub fn num_params(&self) -> usize {
        self.fan_in * self.fan_out + self.fan_out
    }

    pub fn apply<S: Real>(&self, params: &[S], input: &[S]) -> Vec<S> {
        debug_assert_eq!(input.len(), self.fan_in);
        let block = &params[self.offset..self.offset + self.num_params()];
        let (w, b) = block.split_at(self.fan_in * self.fan_out);
        (0..self.fan_out)
            .map(|j| {
                input
                    .iter()
                    .enumerate()
                    .fold(b[j], |acc, (i, &x)| acc + x * w[i * self.fan_out + j])
            })
            .collect()
    }

    /// Glorot-normal weights, zero biases.
    pub fn init<R: Rng>(&self, rng: &mut R, params: &mut [f64]) {
        let std = (2.0 / (self.fan_in + self.fan_out) as f64).sqrt();
        let block = &mut params[self.offset..self.offset + self.num_params()];
        let (w, b) = block.split_at_mut(self.fan_in * self.fan_out);
        w.iter_mut()
            .for_each(|v| *v = std * rng.sample::<f64, _>(StandardNormal));
        b.iter_mut().for_each(|v| *v = 0.0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MlpKind {
    Mlp,
    #[value(name = "modified_mlp")]
    ModifiedMlp,
}

impl MlpKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mlp => "mlp",
            Self::ModifiedMlp => "modified_mlp",
        }
    }
}

/// Fully connected body with tanh activations.
///
/// The modified variant gates every hidden state between two input
/// encodings: `h ← (1 − z) ⊙ U + z ⊙ V`, `z = tanh(W h + b)`.
#[derive(Debug, Clone)]
pub struct Mlp {
    kind: MlpKind,
    hidden: Vec<Dense>,
    gates: Option<(Dense, Dense)>,
    output: Dense,
}

impl Mlp {
    pub fn new(
        layout: &mut ParamLayout,
        kind: MlpKind,
        in_dim: usize,
        features: usize,
        n_layers: usize,
        out_dim: usize,
    ) -> Self {
        let gates = match kind {
            MlpKind::Mlp => None,
            MlpKind::ModifiedMlp => Some((
                layout.dense(in_dim, features),
                layout.dense(in_dim, features),
            )),
        };
        let hidden = (0..n_layers)
            .map(|l| layout.dense(if l == 0 { in_dim } else { features }, features))
            .collect();
        let output = layout.dense(if n_layers == 0 { in_dim } else { features }, out_dim);
        Self {
            kind,
            hidden,
            gates,
            output,
        }
    }

    pub fn forward<S: Real>(&self, params: &[S], input: &[S]) -> Vec<S> {
        let mut h = input.to_vec();
        match (self.kind, self.gates) {
            (MlpKind::ModifiedMlp, Some((enc_u, enc_v))) => {
                let u: Vec<S> = enc_u.apply(params, input).into_iter().map(S::tanh).collect();
                let v: Vec<S> = enc_v.apply(params, input).into_iter().map(S::tanh).collect();
                for layer in &self.hidden {
                    let z = layer.apply(params, &h);
                    h = z
                        .into_iter()
                        .zip(u.iter().zip(&v))
                        .map(|(z, (&u, &v))| {
                            let z = z.tanh();
                            (S::one() - z) * u + z * v
                        })
                        .collect();
                }
            }
            _ => {
                for layer in &self.hidden {
                    h = layer.apply(params, &h).into_iter().map(S::tanh).collect();
                }
            }
        }
        self.output.apply(params, &h)
    }
}

/// Periodic encoding `[sin(kx), …, cos(kx), …]` for `k = 1..=order`, the raw
/// coordinate when `order == 0`. Period 2π in every component.
pub fn positional_encoding<S: Real>(x: S, order: usize) -> Vec<S> {
    if order == 0 {
        return vec![x];
    }
    let sines = (1..=order).map(|k| x.scale(k as f64).sin());
    let cosines = (1..=order).map(|k| x.scale(k as f64).cos());
    sines.chain(cosines).collect()
}

pub fn encoded_dim(order: usize) -> usize {
    if order == 0 {
        1
    } else {
        2 * order
    }
}
