//! Parameter update rules.

use ndarray::{Array1, Zip};

/// `init(params) -> state`, `update(grad, params, state) -> (params, state)`.
///
/// Parameters and state are values: each update consumes the previous ones
/// and returns replacements.
pub trait Optimizer {
    type State;

    fn init(&self, params: &Array1<f64>) -> Self::State;

    fn update(&self, grad: &Array1<f64>, params: Array1<f64>, state: Self::State) -> (Array1<f64>, Self::State);
}

/// Adam with bias-corrected moment estimates.
#[derive(Debug, Clone, Copy)]
pub struct Adam {
    pub lr: f64,
    pub b1: f64,
    pub b2: f64,
    pub eps: f64,
}

impl Adam {
    pub fn new(lr: f64) -> Self {
        Self {
            lr,
            b1: 0.9,
            b2: 0.999,
            eps: 1e-8,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AdamState {
    pub step: u32,
    pub mu: Array1<f64>,
    pub nu: Array1<f64>,
}

impl Optimizer for Adam {
    type State = AdamState;

    fn init(&self, params: &Array1<f64>) -> AdamState {
        AdamState {
            step: 0,
            mu: Array1::zeros(params.len()),
            nu: Array1::zeros(params.len()),
        }
    }

    fn update(&self, grad: &Array1<f64>, mut params: Array1<f64>, mut state: AdamState) -> (Array1<f64>, AdamState) {
        state.step += 1;
        let c1 = 1.0 - self.b1.powi(state.step as i32);
        let c2 = 1.0 - self.b2.powi(state.step as i32);
        let (b1, b2, lr, eps) = (self.b1, self.b2, self.lr, self.eps);
        Zip::from(&mut params)
            .and(&mut state.mu)
            .and(&mut state.nu)
            .and(grad)
            .for_each(|p, m, v, &g| {
                *m = b1 * *m + (1.0 - b1) * g;
                *v = b2 * *v + (1.0 - b2) * g * g;
                *p -= lr * (*m / c1) / ((*v / c2).sqrt() + eps);
            });
        (params, state)
    }
}
