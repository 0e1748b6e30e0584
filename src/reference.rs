//! Synthetic reference solutions from a finite-difference integrator.
//!
//! Inviscid Boussinesq convection in vorticity–streamfunction form on the
//! periodic square, starting from rest with the analytic density bump:
//!
//! ```text
//! ∇²ψ = −ω,  u = ∂ψ/∂y,  v = −∂ψ/∂x
//! ω_t = −u ω_x − v ω_y + ρ_x
//! ρ_t = −u ρ_x − v ρ_y
//! ```

use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2, Array3, Axis};
use ndarray_npy::write_npy;

use crate::data::{boussinesq_initial_density, periodic_grid, DOMAIN_LENGTH};
use crate::error::{PinnError, Result};

/// Parameters for a reference run.
#[derive(Debug, Clone)]
pub struct RefParameters {
    /// Grid points per axis.
    pub n: usize,
    /// Upper bound on the time step; shortened to land on snapshot times.
    pub dt: f64,
    /// Number of snapshots, evenly spaced over `[0, time_end]`.
    pub nt: usize,
    pub time_end: f64,
    /// Jacobi sweeps per Poisson solve, warm-started from the last ψ.
    pub jacobi_iters: usize,
}

/// Fields at one instant, indexed `[j, k]` for `(x[j], y[k])`.
#[derive(Debug, Clone)]
pub struct RefState {
    pub rho: Array2<f64>,
    pub vort: Array2<f64>,
    pub stream: Array2<f64>,
    pub u: Array2<f64>,
    pub v: Array2<f64>,
}

impl RefState {
    pub fn at_rest(rho: Array2<f64>) -> Self {
        let dim = rho.dim();
        Self {
            rho,
            vort: Array2::zeros(dim),
            stream: Array2::zeros(dim),
            u: Array2::zeros(dim),
            v: Array2::zeros(dim),
        }
    }
}

/// Snapshot series of a reference run, `(nt, n, n)` per field.
#[derive(Debug, Clone)]
pub struct RefSolution {
    pub t: Array1<f64>,
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub u: Array3<f64>,
    pub v: Array3<f64>,
    pub w: Array3<f64>,
    pub rho: Array3<f64>,
}

pub struct RefSimulation {
    pub params: RefParameters,
    pub state: RefState,
    h: f64,
}

impl RefSimulation {
    pub fn new(params: RefParameters) -> Result<Self> {
        if params.n < 3 {
            return Err(PinnError::Reference(format!("grid needs at least 3 points, got {}", params.n)));
        }
        if params.dt.is_nan() || params.dt <= 0.0 || params.nt == 0 || params.time_end < 0.0 {
            return Err(PinnError::Reference(format!(
                "invalid time stepping: dt = {}, nt = {}, time_end = {}",
                params.dt, params.nt, params.time_end
            )));
        }
        let x = periodic_grid(params.n);
        let rho = Array2::from_shape_fn((params.n, params.n), |(j, k)| boussinesq_initial_density(x[j], x[k]));
        Ok(Self {
            h: DOMAIN_LENGTH / params.n as f64,
            state: RefState::at_rest(rho),
            params,
        })
    }

    // Solve ∇²ψ = −ω with Jacobi sweeps, then update u and v.
    fn solve_stream(&mut self) {
        let n = self.params.n;
        let h2 = self.h * self.h;
        let w_mean = self.state.vort.mean().unwrap_or(0.0);
        for _ in 0..self.params.jacobi_iters {
            let old = self.state.stream.clone();
            for j in 0..n {
                for k in 0..n {
                    let (jp, jm, kp, km) = neighbours(j, k, n);
                    self.state.stream[[j, k]] = (old[[jp, k]] + old[[jm, k]] + old[[j, kp]] + old[[j, km]]
                        + h2 * (self.state.vort[[j, k]] - w_mean))
                        / 4.0;
                }
            }
        }
        // ψ is only defined up to a constant.
        let psi_mean = self.state.stream.mean().unwrap_or(0.0);
        self.state.stream -= psi_mean;

        let psi = &self.state.stream;
        for j in 0..n {
            for k in 0..n {
                let (jp, jm, kp, km) = neighbours(j, k, n);
                self.state.u[[j, k]] = (psi[[j, kp]] - psi[[j, km]]) / (2.0 * self.h);
                self.state.v[[j, k]] = -(psi[[jp, k]] - psi[[jm, k]]) / (2.0 * self.h);
            }
        }
    }

    /// One forward-Euler step with first-order upwind advection.
    pub fn step(&mut self, dt: f64) {
        self.solve_stream();
        let n = self.params.n;
        let h = self.h;
        let s = &self.state;
        let upwind = |f: &Array2<f64>, j: usize, k: usize| {
            let (jp, jm, kp, km) = neighbours(j, k, n);
            let (u, v) = (s.u[[j, k]], s.v[[j, k]]);
            let adv_x = if u > 0.0 { u * (f[[j, k]] - f[[jm, k]]) } else { u * (f[[jp, k]] - f[[j, k]]) };
            let adv_y = if v > 0.0 { v * (f[[j, k]] - f[[j, km]]) } else { v * (f[[j, kp]] - f[[j, k]]) };
            (adv_x + adv_y) / h
        };
        let vort_new = Array2::from_shape_fn((n, n), |(j, k)| {
            let (jp, jm, _, _) = neighbours(j, k, n);
            let buoyancy = (s.rho[[jp, k]] - s.rho[[jm, k]]) / (2.0 * h);
            s.vort[[j, k]] + dt * (buoyancy - upwind(&s.vort, j, k))
        });
        let rho_new = Array2::from_shape_fn((n, n), |(j, k)| s.rho[[j, k]] - dt * upwind(&s.rho, j, k));
        self.state.vort = vort_new;
        self.state.rho = rho_new;
    }

    /// Integrate to `time_end`, recording `nt` snapshots including `t = 0`.
    pub fn run(&mut self) -> RefSolution {
        let RefParameters { n, nt, time_end, .. } = self.params;
        let t = if nt == 1 {
            Array1::zeros(1)
        } else {
            Array1::linspace(0.0, time_end, nt)
        };
        let mut u = Array3::zeros((nt, n, n));
        let mut v = Array3::zeros((nt, n, n));
        let mut w = Array3::zeros((nt, n, n));
        let mut rho = Array3::zeros((nt, n, n));

        let mut now = 0.0;
        for (i, &target) in t.iter().enumerate() {
            let span = target - now;
            let steps = (span / self.params.dt).ceil() as usize;
            for _ in 0..steps {
                self.step(span / steps as f64);
            }
            now = target;
            self.solve_stream();
            u.index_axis_mut(Axis(0), i).assign(&self.state.u);
            v.index_axis_mut(Axis(0), i).assign(&self.state.v);
            w.index_axis_mut(Axis(0), i).assign(&self.state.vort);
            rho.index_axis_mut(Axis(0), i).assign(&self.state.rho);
            log::info!("reference snapshot {}/{} at t = {target:.4}", i + 1, nt);
        }
        let x = periodic_grid(n);
        RefSolution {
            t,
            y: x.clone(),
            x,
            u,
            v,
            w,
            rho,
        }
    }
}

fn neighbours(j: usize, k: usize, n: usize) -> (usize, usize, usize, usize) {
    ((j + 1) % n, (j + n - 1) % n, (k + 1) % n, (k + n - 1) % n)
}

impl RefSolution {
    /// Write `t, x, y, u, v, w, rho` as `.npy` files into `dir`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| PinnError::io(dir, e))?;
        for (name, axis) in [("t.npy", &self.t), ("x.npy", &self.x), ("y.npy", &self.y)] {
            let path = dir.join(name);
            write_npy(&path, axis).map_err(|e| PinnError::npy(&path, e))?;
        }
        for (name, field) in [("u.npy", &self.u), ("v.npy", &self.v), ("w.npy", &self.w), ("rho.npy", &self.rho)] {
            let path = dir.join(name);
            write_npy(&path, field).map_err(|e| PinnError::npy(&path, e))?;
        }
        log::info!("reference data saved to {}", dir.display());
        Ok(())
    }
}
