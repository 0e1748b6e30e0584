//! Reverse-mode Wengert tape.
//!
//! Each recorded node stores at most two parents with their local partial
//! derivatives. [`Tape::gradient`] sweeps the nodes once in reverse order to
//! accumulate adjoints.
//!
//! Constants never touch the tape, and products with an exact constant zero
//! fold to a constant. Zero tangents are everywhere in nested duals, so this
//! keeps the tape proportional to the derivatives actually requested.

use std::cell::RefCell;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use ndarray::Array1;

use super::Real;

#[derive(Clone, Copy, Debug)]
struct Node {
    parents: [usize; 2],
    weights: [f64; 2],
}

#[derive(Debug, Default)]
pub struct Tape {
    nodes: RefCell<Vec<Node>>,
}

impl Tape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an independent variable.
    pub fn var(&self, value: f64) -> Var<'_> {
        let index = self.push(Node {
            parents: [0, 0],
            weights: [0.0, 0.0],
        });
        Var {
            node: Some((self, index)),
            value,
        }
    }

    /// Register one independent variable per entry.
    pub fn vars(&self, values: &[f64]) -> Vec<Var<'_>> {
        values.iter().map(|&v| self.var(v)).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, node: Node) -> usize {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(node);
        nodes.len() - 1
    }

    fn unary(&self, parent: usize, weight: f64, value: f64) -> Var<'_> {
        let index = self.push(Node {
            parents: [parent, 0],
            weights: [weight, 0.0],
        });
        Var {
            node: Some((self, index)),
            value,
        }
    }

    fn binary(&self, parents: [usize; 2], weights: [f64; 2], value: f64) -> Var<'_> {
        let index = self.push(Node { parents, weights });
        Var {
            node: Some((self, index)),
            value,
        }
    }

    /// Gradient of `output` with respect to each of `wrt`.
    ///
    /// Variables that do not influence `output` (or constants) get zero.
    pub fn gradient(&self, output: Var<'_>, wrt: &[Var<'_>]) -> Array1<f64> {
        let nodes = self.nodes.borrow();
        let mut adjoint = vec![0.0; nodes.len()];
        if let Some((_, index)) = output.node {
            adjoint[index] = 1.0;
        }
        for i in (0..nodes.len()).rev() {
            let a = adjoint[i];
            if a == 0.0 {
                continue;
            }
            let node = nodes[i];
            for k in 0..2 {
                if node.weights[k] != 0.0 {
                    adjoint[node.parents[k]] += node.weights[k] * a;
                }
            }
        }
        wrt.iter()
            .map(|v| v.node.map_or(0.0, |(_, index)| adjoint[index]))
            .collect()
    }
}

/// A scalar that is either a constant or an entry on a [`Tape`].
#[derive(Clone, Copy)]
pub struct Var<'t> {
    node: Option<(&'t Tape, usize)>,
    value: f64,
}

impl fmt::Debug for Var<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node {
            Some((_, index)) => write!(f, "Var({} @ {index})", self.value),
            None => write!(f, "Var({})", self.value),
        }
    }
}

impl<'t> Var<'t> {
    #[inline]
    fn is_zero_constant(&self) -> bool {
        self.node.is_none() && self.value == 0.0
    }

    fn record_unary(self, value: f64, weight: f64) -> Self {
        match self.node {
            Some((tape, index)) => tape.unary(index, weight, value),
            None => Var { node: None, value },
        }
    }

    fn record_binary(self, rhs: Self, value: f64, dl: f64, dr: f64) -> Self {
        match (self.node, rhs.node) {
            (None, None) => Var { node: None, value },
            (Some((tape, l)), None) => tape.unary(l, dl, value),
            (None, Some((tape, r))) => tape.unary(r, dr, value),
            (Some((tape, l)), Some((other, r))) => {
                debug_assert!(std::ptr::eq(tape, other), "variables from different tapes");
                tape.binary([l, r], [dl, dr], value)
            }
        }
    }
}

impl<'t> Add for Var<'t> {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        if rhs.is_zero_constant() {
            return self;
        }
        if self.is_zero_constant() {
            return rhs;
        }
        self.record_binary(rhs, self.value + rhs.value, 1.0, 1.0)
    }
}

impl<'t> Sub for Var<'t> {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        if rhs.is_zero_constant() {
            return self;
        }
        self.record_binary(rhs, self.value - rhs.value, 1.0, -1.0)
    }
}

impl<'t> Mul for Var<'t> {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        if self.is_zero_constant() || rhs.is_zero_constant() {
            return Var::constant(0.0);
        }
        self.record_binary(rhs, self.value * rhs.value, rhs.value, self.value)
    }
}

impl<'t> Neg for Var<'t> {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        self.record_unary(-self.value, -1.0)
    }
}

impl<'t> Real for Var<'t> {
    #[inline]
    fn constant(value: f64) -> Self {
        Var { node: None, value }
    }

    #[inline]
    fn value(self) -> f64 {
        self.value
    }

    fn tanh(self) -> Self {
        let t = self.value.tanh();
        self.record_unary(t, 1.0 - t * t)
    }

    fn sin(self) -> Self {
        self.record_unary(self.value.sin(), self.value.cos())
    }

    fn cos(self) -> Self {
        self.record_unary(self.value.cos(), -self.value.sin())
    }

    #[inline]
    fn scale(self, k: f64) -> Self {
        if k == 0.0 {
            return Var::constant(0.0);
        }
        self.record_unary(self.value * k, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_of_polynomial() {
        // f(a, b) = a² b + 3a → ∂f/∂a = 2ab + 3, ∂f/∂b = a²
        let tape = Tape::new();
        let a = tape.var(2.0);
        let b = tape.var(5.0);
        let f = a * a * b + a.scale(3.0);
        assert_eq!(f.value(), 26.0);
        let g = tape.gradient(f, &[a, b]);
        assert_eq!(g[0], 23.0);
        assert_eq!(g[1], 4.0);
    }

    #[test]
    fn constants_stay_off_the_tape() {
        let tape = Tape::new();
        let a = tape.var(1.5);
        let before = tape.len();
        let c = Var::constant(2.0) * Var::constant(4.0) + Var::constant(1.0);
        let z = a * Var::constant(0.0);
        assert_eq!(tape.len(), before);
        assert_eq!(c.value(), 9.0);
        assert_eq!(tape.gradient(z, &[a])[0], 0.0);
    }

    #[test]
    fn unused_variable_has_zero_gradient() {
        let tape = Tape::new();
        let a = tape.var(0.4);
        let b = tape.var(0.9);
        let f = a.tanh();
        let g = tape.gradient(f, &[a, b]);
        let t = 0.4_f64.tanh();
        assert!((g[0] - (1.0 - t * t)).abs() < 1e-15);
        assert_eq!(g[1], 0.0);
    }
}
