//! Command-line configuration of a training run.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use crate::error::{PinnError, Result};
use crate::loss::LossWeights;
use crate::network::{MlpKind, ModelKind, NetworkConfig};
use crate::residuals::Equation;

#[derive(Args, Debug, Clone, Serialize)]
pub struct TrainArgs {
    /// Directory holding the reference t/x/y/rho .npy files
    #[arg(long, default_value = "./data/Boussinesq_convection_flow_3d")]
    pub data_dir: PathBuf,
    /// Root of the results tree
    #[arg(long, default_value = "results")]
    pub results_dir: PathBuf,
    #[arg(long, value_enum, default_value_t = ModelKind::Spinn)]
    pub model: ModelKind,
    #[arg(long, value_enum, default_value_t = Equation::BoussinesqConvection)]
    pub equation: Equation,

    /// Interior time samples per window
    #[arg(long, default_value_t = 32)]
    pub nt: usize,
    /// Interior and initial-condition samples per spatial axis
    #[arg(long, default_value_t = 128)]
    pub nxy: usize,
    #[arg(long, default_value_t = 111)]
    pub seed: u64,
    #[arg(long, default_value_t = 2e-3)]
    pub lr: f64,
    #[arg(long, default_value_t = 100_000)]
    pub epochs: usize,
    /// Number of pre-generated interior offset sets
    #[arg(long, default_value_t = 8)]
    pub offset_num: usize,
    #[arg(long, default_value_t = 100)]
    pub offset_iter: usize,
    /// Switch interior offset set every --offset-iter epochs
    #[arg(long)]
    pub cycle_offsets: bool,

    #[arg(long, default_value_t = 5000.0)]
    pub lbda_c: f64,
    #[arg(long, default_value_t = 1000.0)]
    pub lbda_rho: f64,
    #[arg(long, default_value_t = 1.0)]
    pub lbda_w: f64,
    #[arg(long, default_value_t = 10000.0)]
    pub lbda_ic: f64,

    #[arg(long, value_enum, default_value_t = MlpKind::ModifiedMlp)]
    pub mlp: MlpKind,
    #[arg(long, default_value_t = 3)]
    pub n_layers: usize,
    #[arg(long, default_value_t = 128)]
    pub features: usize,
    /// Rank of the separable representation
    #[arg(long, default_value_t = 128)]
    pub r: usize,
    #[arg(long, default_value_t = 3)]
    pub out_dim: usize,
    #[arg(long, default_value_t = 5)]
    pub pos_enc: usize,

    /// Number of time windows
    #[arg(long, default_value_t = 10)]
    pub marching_steps: usize,
    /// Window trained by `train`
    #[arg(long, default_value_t = 0)]
    pub step_idx: usize,
    #[arg(long, default_value_t = 3.0)]
    pub time_end: f64,

    #[arg(long, default_value_t = 1000)]
    pub log_iter: usize,
    #[arg(long, default_value_t = 50_000)]
    pub plot_iter: usize,
}

impl TrainArgs {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("log-iter", self.log_iter),
            ("plot-iter", self.plot_iter),
            ("offset-iter", self.offset_iter),
            ("marching-steps", self.marching_steps),
            ("nt", self.nt),
            ("nxy", self.nxy),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(PinnError::Config(format!("--{name} must be at least 1")));
        }
        if self.step_idx >= self.marching_steps {
            return Err(PinnError::Config(format!(
                "--step-idx {} is outside 0..{}",
                self.step_idx, self.marching_steps
            )));
        }
        if self.time_end.is_nan() || self.time_end <= 0.0 {
            return Err(PinnError::Config(format!("--time-end must be positive, got {}", self.time_end)));
        }
        let weights = [self.lbda_c, self.lbda_rho, self.lbda_w, self.lbda_ic];
        if weights.iter().any(|w| w.is_nan() || *w < 0.0) {
            return Err(PinnError::Config("loss weights must be non-negative".into()));
        }
        Ok(())
    }

    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            model: self.model,
            mlp: self.mlp,
            n_layers: self.n_layers,
            features: self.features,
            rank: self.r,
            out_dim: self.out_dim,
            pos_enc: self.pos_enc,
        }
    }

    pub fn weights(&self) -> LossWeights {
        LossWeights {
            continuity: self.lbda_c,
            density: self.lbda_rho,
            vorticity: self.lbda_w,
            initial: self.lbda_ic,
        }
    }

    /// Run name shared by every window of one marching sequence.
    pub fn name_model(&self) -> String {
        format!(
            "{}_nl{}_f{}_r{}_pe{}_lr{}_e{}_nt{}_nxy{}_s{}_k{}",
            self.mlp.name(),
            self.n_layers,
            self.features,
            self.r,
            self.pos_enc,
            self.lr,
            self.epochs,
            self.nt,
            self.nxy,
            self.seed,
            self.marching_steps
        )
    }

    /// `{results}/{equation}/{model}/{name}`
    pub fn run_dir(&self) -> PathBuf {
        self.results_dir
            .join(self.equation.name())
            .join(self.model.name())
            .join(self.name_model())
    }
}

#[derive(Args, Debug, Clone)]
pub struct ReferenceArgs {
    /// Output directory for the reference .npy files
    #[arg(long, default_value = "./data/Boussinesq_convection_flow_3d")]
    pub data_dir: PathBuf,
    /// Grid points per spatial axis
    #[arg(long, default_value_t = 128)]
    pub n: usize,
    /// Number of snapshots over [0, time-end]
    #[arg(long, default_value_t = 101)]
    pub nt: usize,
    #[arg(long, default_value_t = 3.0)]
    pub time_end: f64,
    /// Largest integration time step
    #[arg(long, default_value_t = 1e-3)]
    pub dt: f64,
    #[arg(long, default_value_t = 50)]
    pub jacobi_iters: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: TrainArgs,
    }

    fn parse(extra: &[&str]) -> TrainArgs {
        let argv = std::iter::once("test").chain(extra.iter().copied());
        Wrapper::parse_from(argv).args
    }

    #[test]
    fn defaults_match_the_reference_setup() {
        let args = parse(&[]);
        assert_eq!(args.model, ModelKind::Spinn);
        assert_eq!(args.mlp, MlpKind::ModifiedMlp);
        assert_eq!((args.nt, args.nxy, args.seed), (32, 128, 111));
        assert_eq!(args.weights().continuity, 5000.0);
        assert_eq!(args.weights().initial, 10000.0);
        assert!(!args.cycle_offsets);
        args.validate().unwrap();
    }

    #[test]
    fn run_dir_is_shared_by_windows() {
        let a = parse(&["--step-idx", "0", "--results-dir", "out"]);
        let b = parse(&["--step-idx", "3", "--results-dir", "out"]);
        assert_eq!(a.run_dir(), b.run_dir());
        assert!(a.run_dir().starts_with("out/Boussinesq_convection_flow_3d/spinn"));
        let c = parse(&["--results-dir", "out", "--features", "64"]);
        assert_ne!(a.run_dir(), c.run_dir());
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let args = parse(&["--log-iter", "0"]);
        assert!(matches!(args.validate(), Err(PinnError::Config(_))));
        let args = parse(&["--marching-steps", "2", "--step-idx", "2"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn resolved_config_serializes() {
        let json = serde_json::to_value(parse(&["--model", "pinn", "--mlp", "mlp"])).unwrap();
        assert_eq!(json["model"], "pinn");
        assert_eq!(json["mlp"], "mlp");
        assert_eq!(json["equation"], "Boussinesq_convection_flow_3d");
    }
}
