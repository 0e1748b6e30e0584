//! Collocation points, initial conditions and reference data.
//!
//! The spatial domain is the periodic square `[0, 2π)²`. Grids sample it
//! without the right endpoint, which coincides with the left one.

use std::f64::consts::PI;
use std::fs::File;
use std::path::Path;

use ndarray::{Array1, Array2, Array3, Axis, Ix1, Ix2, OwnedRepr};
use ndarray_npy::{read_npy, NpzReader, NpzWriter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::autodiff::Coords;
use crate::error::{PinnError, Result};
use crate::loss::InitialCondition;
use crate::network::Surrogate;
use crate::vorticity::vorticity;

pub const DOMAIN_LENGTH: f64 = 2.0 * PI;

/// Tolerance used when selecting reference times inside a window.
pub const TIME_TOLERANCE: f64 = 1e-9;

/// `n` stratified samples of `[lo, hi)`: one per cell, shifted by `delta`
/// cell widths from each cell's left edge.
pub fn stratified(lo: f64, hi: f64, n: usize, delta: f64) -> Array1<f64> {
    let width = (hi - lo) / n as f64;
    Array1::from_shape_fn(n, |i| lo + (i as f64 + delta) * width)
}

/// Uniform periodic grid of `n` points on `[0, 2π)`.
pub fn periodic_grid(n: usize) -> Array1<f64> {
    stratified(0.0, DOMAIN_LENGTH, n, 0.0)
}

/// Pre-generated interior batches, all of one shape.
///
/// Set 0 is the one trained on unless offset cycling is enabled.
pub fn interior_sets(seed: u64, t_span: (f64, f64), nt: usize, nxy: usize, offset_num: usize) -> Vec<Coords<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..offset_num.max(1))
        .map(|_| {
            let (dt, dx, dy): (f64, f64, f64) = (rng.gen(), rng.gen(), rng.gen());
            Coords::new(
                stratified(t_span.0, t_span.1, nt, dt),
                stratified(0.0, DOMAIN_LENGTH, nxy, dx),
                stratified(0.0, DOMAIN_LENGTH, nxy, dy),
            )
        })
        .collect()
}

/// Initial density of the convection problem: a smooth bump centred at
/// `(0, π)` multiplied by a cutoff around `x = 2π`.
pub fn boussinesq_initial_density(x: f64, y: f64) -> f64 {
    let r1 = (x * x + (y - PI).powi(2)).sqrt();
    let rho1 = if r1 < PI {
        (1.0 - PI * PI / (PI * PI - r1 * r1)).exp()
    } else {
        0.0
    };
    let r2 = (x - DOMAIN_LENGTH).abs();
    let r3 = 1.95 * PI;
    let rho2 = if r2 < r3 {
        (1.0 - r3 * r3 / (r3 * r3 - r2 * r2)).exp()
    } else {
        0.0
    };
    50.0 * rho1 * rho2 * (1.0 - rho1)
}

/// Fluid at rest with the analytic density bump on an `nxy × nxy` grid at `t0`.
pub fn analytic_initial_condition(nxy: usize, t0: f64) -> InitialCondition {
    let x = periodic_grid(nxy);
    let y = periodic_grid(nxy);
    let rho0 = Array2::from_shape_fn((nxy, nxy), |(j, k)| boussinesq_initial_density(x[j], y[k]));
    InitialCondition {
        coords: Coords::new(Array1::from_elem(1, t0), x, y),
        w0: Array2::zeros((nxy, nxy)),
        u0: Array2::zeros((nxy, nxy)),
        v0: Array2::zeros((nxy, nxy)),
        rho0,
    }
}

/// Predict `(ω, u, v, ρ)` at `t_end` on the given grid and store it as the
/// next window's initial condition.
pub fn export_next_ic<N: Surrogate>(
    net: &N,
    params: &[f64],
    x: &Array1<f64>,
    y: &Array1<f64>,
    t_end: f64,
    path: &Path,
) -> Result<()> {
    let coords = Coords::new(Array1::from_elem(1, t_end), x.clone(), y.clone());
    let w = vorticity(net, params, &coords).index_axis_move(Axis(0), 0);
    let fields = net.forward(params, &coords);
    let slice = |a: Array3<f64>| a.index_axis_move(Axis(0), 0);

    let file = File::create(path).map_err(|e| PinnError::io(path, e))?;
    let mut npz = NpzWriter::new(file);
    npz.add_array("x.npy", x).map_err(|e| PinnError::npy(path, e))?;
    npz.add_array("y.npy", y).map_err(|e| PinnError::npy(path, e))?;
    for (key, array) in [
        ("w.npy", w),
        ("u.npy", slice(fields.u)),
        ("v.npy", slice(fields.v)),
        ("rho.npy", slice(fields.rho)),
    ] {
        npz.add_array(key, &array).map_err(|e| PinnError::npy(path, e))?;
    }
    npz.finish().map_err(|e| PinnError::npy(path, e))?;
    log::info!("next initial condition saved to {}", path.display());
    Ok(())
}

/// Initial condition handed over by the previous window, placed at `t0`.
pub fn load_next_ic(path: &Path, t0: f64) -> Result<InitialCondition> {
    let file = File::open(path).map_err(|e| PinnError::io(path, e))?;
    let mut npz = NpzReader::new(file).map_err(|e| PinnError::npy(path, e))?;
    let ic = InitialCondition {
        coords: Coords::new(
            Array1::from_elem(1, t0),
            read_npz_1d(&mut npz, path, "x")?,
            read_npz_1d(&mut npz, path, "y")?,
        ),
        w0: read_npz_2d(&mut npz, path, "w")?,
        u0: read_npz_2d(&mut npz, path, "u")?,
        v0: read_npz_2d(&mut npz, path, "v")?,
        rho0: read_npz_2d(&mut npz, path, "rho")?,
    };
    ic.validate()?;
    Ok(ic)
}

fn read_npz_1d(npz: &mut NpzReader<File>, path: &Path, key: &str) -> Result<Array1<f64>> {
    npz.by_name::<OwnedRepr<f64>, Ix1>(&format!("{key}.npy"))
        .or_else(|_| npz.by_name::<OwnedRepr<f64>, Ix1>(key))
        .map_err(|e| PinnError::npy(path, format!("key '{key}': {e}")))
}

fn read_npz_2d(npz: &mut NpzReader<File>, path: &Path, key: &str) -> Result<Array2<f64>> {
    npz.by_name::<OwnedRepr<f64>, Ix2>(&format!("{key}.npy"))
        .or_else(|_| npz.by_name::<OwnedRepr<f64>, Ix2>(key))
        .map_err(|e| PinnError::npy(path, format!("key '{key}': {e}")))
}

/// Reference density on a `(t, x, y)` product grid.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    pub coords: Coords<f64>,
    pub rho: Array3<f64>,
}

impl ReferenceData {
    /// Read `t.npy`, `x.npy`, `y.npy` and `rho.npy` from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let read1 = |name: &str| -> Result<Array1<f64>> {
            let path = dir.join(name);
            read_npy::<_, Array1<f64>>(&path).map_err(|e| PinnError::npy(&path, e))
        };
        let coords = Coords::new(read1("t.npy")?, read1("x.npy")?, read1("y.npy")?);
        let rho_path = dir.join("rho.npy");
        let rho = read_npy::<_, Array3<f64>>(&rho_path)
            .map_err(|e| PinnError::npy(&rho_path, e))?;
        let (nt, nx, ny) = coords.shape();
        if rho.dim() != (nt, nx, ny) {
            return Err(PinnError::shape("reference rho", &[nt, nx, ny], rho.shape()));
        }
        Ok(Self { coords, rho })
    }

    /// Snapshots with `t0 ≤ t ≤ t1` (inclusive, with a small tolerance).
    pub fn window(&self, t0: f64, t1: f64) -> Result<Self> {
        let keep: Vec<usize> = self
            .coords
            .t
            .iter()
            .enumerate()
            .filter(|&(_, &t)| t >= t0 - TIME_TOLERANCE && t <= t1 + TIME_TOLERANCE)
            .map(|(i, _)| i)
            .collect();
        if keep.is_empty() {
            return Err(PinnError::Reference(format!(
                "no reference snapshots inside the window [{t0}, {t1}]"
            )));
        }
        Ok(Self {
            coords: Coords::new(
                self.coords.t.select(Axis(0), &keep),
                self.coords.x.clone(),
                self.coords.y.clone(),
            ),
            rho: self.rho.select(Axis(0), &keep),
        })
    }
}
