#![allow(dead_code)]

use std::path::Path;

use clap::Parser;
use convection_pinn::config::TrainArgs;
use convection_pinn::reference::{RefParameters, RefSimulation};

#[derive(Parser)]
struct Wrapper {
    #[command(flatten)]
    args: TrainArgs,
}

/// Small reference data set: 4×4 grid, 5 snapshots over [0, 0.3].
pub fn write_reference(dir: &Path) {
    let mut sim = RefSimulation::new(RefParameters {
        n: 4,
        dt: 0.01,
        nt: 5,
        time_end: 0.3,
        jacobi_iters: 10,
    })
    .unwrap();
    sim.run().save(dir).unwrap();
}

/// Tiny SPINN configuration on a 4×4×4 grid.
pub fn tiny_args(data_dir: &Path, results_dir: &Path, extra: &[&str]) -> TrainArgs {
    let mut argv = vec![
        "test".to_string(),
        "--data-dir".into(),
        data_dir.display().to_string(),
        "--results-dir".into(),
        results_dir.display().to_string(),
    ];
    let base = [
        "--nt", "4", "--nxy", "4", "--features", "4", "--r", "2", "--n-layers", "1", "--pos-enc", "1",
        "--offset-num", "2", "--time-end", "0.3", "--lr", "1e-3", "--plot-iter", "1000",
    ];
    argv.extend(base.iter().chain(extra).map(|s| s.to_string()));
    Wrapper::parse_from(argv).args
}
