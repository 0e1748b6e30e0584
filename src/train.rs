//! Training loop of one time window.
//!
//! ```text
//! Initializing ─► Stepping ─┬─► Logging ─┬─► Visualizing ─┐
//!                   ▲       │            │                │
//!                   │       └────────────┴────────────────┤
//!                   └──────────── epoch < epochs ◄────────┤
//!                                              Finalizing ◄┘
//! ```
//!
//! All mutable state of a run lives in [`RunContext`], which every phase
//! receives by reference, so phases can be driven one at a time.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use ndarray::Array1;

use crate::artifacts::{self, BEST_ERROR_FILE, LOG_FILE, NEXT_IC_FILE, PARAMS_FILE, RUNTIME_FILE};
use crate::autodiff::Coords;
use crate::data::{self, ReferenceData};
use crate::error::{PinnError, Result};
use crate::eval::relative_l2_error;
use crate::loss::{InitialCondition, LossKernel, LossWeights};
use crate::network::Surrogate;
use crate::optim::Optimizer;
use crate::residuals::{residual_magnitudes, Equation};
use crate::visualization;

/// Fraction of the epochs after which log rows carry the best error.
pub const BEST_ERROR_PHASE: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Stepping,
    Logging,
    Visualizing,
    Finalizing,
}

/// Epoch counts and intervals of one run.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub epochs: usize,
    pub log_iter: usize,
    pub plot_iter: usize,
    pub offset_iter: usize,
    pub cycle_offsets: bool,
    pub step_idx: usize,
}

/// Everything a window trains and evaluates on.
#[derive(Debug, Clone)]
pub struct WindowData {
    /// Interior offset sets; all share one shape.
    pub interior: Vec<Coords<f64>>,
    pub ic: InitialCondition,
    pub test: ReferenceData,
    /// Terminal time at which the next initial condition is predicted.
    pub t_end: f64,
}

/// Where the run-level error aggregate goes once the last window is done.
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub run_dir: PathBuf,
    pub windows: usize,
}

/// Mutable state of a training run.
#[derive(Debug, Clone)]
pub struct RunContext<S> {
    /// Epochs completed so far; the next step is epoch `epoch + 1`.
    pub epoch: usize,
    pub params: Array1<f64>,
    pub opt_state: S,
    pub best_error: Option<f64>,
    pub last_error: Option<f64>,
    pub last_loss: f64,
    pub offset_idx: usize,
    /// Set once the first epoch has finished, if more epochs follow.
    pub started: Option<Instant>,
}

impl<S> RunContext<S> {
    pub fn new(params: Array1<f64>, opt_state: S) -> Self {
        Self {
            epoch: 0,
            params,
            opt_state,
            best_error: None,
            last_error: None,
            last_loss: f64::NAN,
            offset_idx: 0,
            started: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub params: Array1<f64>,
    pub final_loss: f64,
    pub final_error: Option<f64>,
    pub best_error: Option<f64>,
    /// Wall-clock seconds from the end of epoch 1 to the end of training.
    pub runtime: f64,
    /// Mean error over all windows, present only for the last window.
    pub aggregate_error: Option<f64>,
}

pub struct TrainingRun<'a, N, O> {
    net: &'a N,
    optimizer: O,
    kernel: LossKernel<'a, N>,
    data: &'a WindowData,
    schedule: Schedule,
    dir: PathBuf,
    aggregation: Option<Aggregation>,
}

impl<'a, N, O> TrainingRun<'a, N, O>
where
    N: Surrogate,
    O: Optimizer,
    O::State: Default,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        net: &'a N,
        optimizer: O,
        equation: Equation,
        weights: LossWeights,
        data: &'a WindowData,
        schedule: Schedule,
        dir: impl Into<PathBuf>,
        aggregation: Option<Aggregation>,
    ) -> Result<Self> {
        if schedule.log_iter == 0 || schedule.plot_iter == 0 || schedule.offset_iter == 0 {
            return Err(PinnError::Config("log, plot and offset intervals must be at least 1".into()));
        }
        let first = data
            .interior
            .first()
            .ok_or_else(|| PinnError::Config("no interior collocation sets".into()))?;
        let kernel = LossKernel::specialize(net, equation, weights, first, &data.ic)?;
        Ok(Self {
            net,
            optimizer,
            kernel,
            data,
            schedule,
            dir: dir.into(),
            aggregation,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fresh context with optimizer state for `params`.
    pub fn context(&self, params: Array1<f64>) -> RunContext<O::State> {
        let opt_state = self.optimizer.init(&params);
        RunContext::new(params, opt_state)
    }

    /// Drive every phase until the run finalizes.
    pub fn run(&self, params: Array1<f64>) -> Result<RunSummary> {
        let mut ctx = self.context(params);
        let mut phase = Phase::Initializing;
        loop {
            phase = match phase {
                Phase::Initializing => self.initialize(&mut ctx)?,
                Phase::Stepping => self.step(&mut ctx)?,
                Phase::Logging => self.log(&mut ctx)?,
                Phase::Visualizing => self.visualize(&mut ctx)?,
                Phase::Finalizing => return self.finalize(&mut ctx),
            };
            log::trace!("epoch {} -> {:?}", ctx.epoch, phase);
        }
    }

    /// Prepare the window directory and drop logs of a previous run.
    pub fn initialize(&self, ctx: &mut RunContext<O::State>) -> Result<Phase> {
        fs::create_dir_all(&self.dir).map_err(|e| PinnError::io(&self.dir, e))?;
        let log_path = self.dir.join(LOG_FILE);
        let best_path = self.parent_dir().join(BEST_ERROR_FILE);
        artifacts::clear_stale(&[&log_path, &best_path])?;
        ctx.epoch = 0;
        ctx.best_error = None;
        ctx.last_error = None;
        ctx.offset_idx = 0;
        ctx.started = None;
        log::debug!("window {} initialized in {}", self.schedule.step_idx, self.dir.display());
        Ok(self.after_epoch(ctx.epoch))
    }

    /// One optimizer update on the current interior set.
    pub fn step(&self, ctx: &mut RunContext<O::State>) -> Result<Phase> {
        let e = ctx.epoch + 1;
        let sets = &self.data.interior;
        if self.schedule.cycle_offsets && e % self.schedule.offset_iter == 0 {
            ctx.offset_idx = (e / self.schedule.offset_iter) % sets.len();
            log::debug!("epoch {e}: switching to interior offset set {}", ctx.offset_idx);
        }
        let (loss, grad) = self
            .kernel
            .value_and_grad(&ctx.params, &sets[ctx.offset_idx], &self.data.ic)?;
        let params = std::mem::take(&mut ctx.params);
        let state = std::mem::take(&mut ctx.opt_state);
        (ctx.params, ctx.opt_state) = self.optimizer.update(&grad, params, state);
        ctx.last_loss = loss;
        ctx.epoch = e;
        if e == 1 && self.schedule.epochs > 1 {
            ctx.started = Some(Instant::now());
        }

        Ok(if e % self.schedule.log_iter == 0 {
            Phase::Logging
        } else if e % self.schedule.plot_iter == 0 {
            Phase::Visualizing
        } else {
            self.after_epoch(e)
        })
    }

    /// Evaluate the held-out error and append a log row.
    pub fn log(&self, ctx: &mut RunContext<O::State>) -> Result<Phase> {
        let e = ctx.epoch;
        let epochs = self.schedule.epochs;
        let error = relative_l2_error(self.net, &ctx.params.to_vec(), &self.data.test);
        // Once NaN, the best error stays NaN.
        let best = match ctx.best_error {
            Some(best) if best.is_nan() || error.is_nan() => f64::NAN,
            Some(best) => best.min(error),
            None => error,
        };
        ctx.best_error = Some(best);
        ctx.last_error = Some(error);

        let log_path = self.dir.join(LOG_FILE);
        if e as f64 <= BEST_ERROR_PHASE * epochs as f64 {
            log::info!(
                "Epoch: {e}/{epochs} --> total loss: {:.8}, error: {error:.8}, step_idx: {}",
                ctx.last_loss,
                self.schedule.step_idx
            );
            artifacts::append_log(&log_path, ctx.last_loss, error, None)?;
        } else {
            log::info!(
                "Epoch: {e}/{epochs} --> total loss: {:.8}, error: {error:.8}, best error {best:.8}, step_idx: {}",
                ctx.last_loss,
                self.schedule.step_idx
            );
            artifacts::append_log(&log_path, ctx.last_loss, error, Some(best))?;
        }

        Ok(if e % self.schedule.plot_iter == 0 {
            Phase::Visualizing
        } else {
            self.after_epoch(e)
        })
    }

    pub fn visualize(&self, ctx: &mut RunContext<O::State>) -> Result<Phase> {
        visualization::draw_density_maps(self.net, &ctx.params.to_vec(), &self.data.test, &self.dir, ctx.epoch)?;
        Ok(self.after_epoch(ctx.epoch))
    }

    /// Persist parameters and runtime, hand the terminal state to the next
    /// window and, for the last window, aggregate errors across windows.
    pub fn finalize(&self, ctx: &mut RunContext<O::State>) -> Result<RunSummary> {
        let runtime = ctx.started.map_or(0.0, |start| start.elapsed().as_secs_f64());
        let per_iter = if self.schedule.epochs > 1 {
            runtime / (self.schedule.epochs - 1) as f64 * 1000.0
        } else {
            0.0
        };
        log::info!("Runtime --> total: {runtime:.2}sec ({per_iter:.2}ms/iter.)");

        let params = ctx.params.to_vec();
        artifacts::save_params(&self.dir.join(PARAMS_FILE), &ctx.params)?;
        artifacts::save_runtime(&self.dir.join(RUNTIME_FILE), runtime)?;

        let residuals = residual_magnitudes(
            self.equation(),
            self.net,
            &params,
            &self.data.interior[ctx.offset_idx],
        );
        log::info!(
            "mean |residual| --> vorticity: {:.3e}, density: {:.3e}, continuity: {:.3e}",
            residuals.vorticity.mean().unwrap_or(f64::NAN),
            residuals.density.mean().unwrap_or(f64::NAN),
            residuals.continuity.mean().unwrap_or(f64::NAN)
        );

        let ic = &self.data.ic.coords;
        data::export_next_ic(self.net, &params, &ic.x, &ic.y, self.data.t_end, &self.dir.join(NEXT_IC_FILE))?;

        let aggregate_error = match &self.aggregation {
            Some(agg) => Some(crate::marching::aggregate_errors(&agg.run_dir, agg.windows)?),
            None => None,
        };

        Ok(RunSummary {
            params: ctx.params.clone(),
            final_loss: ctx.last_loss,
            final_error: ctx.last_error,
            best_error: ctx.best_error,
            runtime,
            aggregate_error,
        })
    }

    fn after_epoch(&self, epoch: usize) -> Phase {
        if epoch >= self.schedule.epochs {
            Phase::Finalizing
        } else {
            Phase::Stepping
        }
    }

    fn equation(&self) -> Equation {
        self.kernel.equation()
    }

    fn parent_dir(&self) -> &Path {
        self.dir.parent().unwrap_or(&self.dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{MlpKind, ModelKind, Network, NetworkConfig};
    use crate::optim::Adam;
    use ndarray::{array, Array3};

    fn tiny_net() -> Network {
        Network::build(&NetworkConfig {
            model: ModelKind::Spinn,
            mlp: MlpKind::Mlp,
            n_layers: 1,
            features: 4,
            rank: 2,
            out_dim: 3,
            pos_enc: 1,
        })
        .unwrap()
    }

    fn window_data() -> WindowData {
        let ic = data::analytic_initial_condition(3, 0.0);
        let coords = Coords::new(array![0.0, 0.1], ic.coords.x.clone(), ic.coords.y.clone());
        let rho = Array3::from_shape_fn((2, 3, 3), |(_, j, k)| ic.rho0[[j, k]] + 0.1);
        WindowData {
            interior: data::interior_sets(3, (0.0, 0.1), 2, 3, 2),
            ic,
            test: ReferenceData { coords, rho },
            t_end: 0.1,
        }
    }

    fn schedule(epochs: usize) -> Schedule {
        Schedule {
            epochs,
            log_iter: 2,
            plot_iter: 1000,
            offset_iter: 1,
            cycle_offsets: false,
            step_idx: 0,
        }
    }

    #[test]
    fn phases_follow_the_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let net = tiny_net();
        let data = window_data();
        let weights = LossWeights {
            continuity: 1.0,
            density: 1.0,
            vorticity: 1.0,
            initial: 1.0,
        };
        let run = TrainingRun::new(
            &net,
            Adam::new(1e-3),
            Equation::BoussinesqConvection,
            weights,
            &data,
            schedule(3),
            dir.path().join("0"),
            None,
        )
        .unwrap();
        let mut ctx = run.context(net.init_params(1));
        assert_eq!(run.initialize(&mut ctx).unwrap(), Phase::Stepping);
        assert_eq!(run.step(&mut ctx).unwrap(), Phase::Stepping);
        assert!(ctx.started.is_some());
        assert_eq!(run.step(&mut ctx).unwrap(), Phase::Logging);
        assert_eq!(run.log(&mut ctx).unwrap(), Phase::Stepping);
        assert_eq!(ctx.best_error, ctx.last_error);
        assert_eq!(run.step(&mut ctx).unwrap(), Phase::Finalizing);
        assert_eq!(ctx.epoch, 3);
        assert_eq!(ctx.opt_state.step, 3);

        let summary = run.finalize(&mut ctx).unwrap();
        assert!(summary.final_loss.is_finite());
        assert!(summary.aggregate_error.is_none());
        for file in [PARAMS_FILE, RUNTIME_FILE, NEXT_IC_FILE, LOG_FILE] {
            assert!(run.dir().join(file).exists(), "{file} missing");
        }
    }

    #[test]
    fn best_error_column_appears_late() {
        let dir = tempfile::tempdir().unwrap();
        let net = tiny_net();
        let data = window_data();
        let weights = LossWeights {
            continuity: 1.0,
            density: 1.0,
            vorticity: 1.0,
            initial: 10.0,
        };
        let mut sched = schedule(10);
        sched.log_iter = 1;
        let run = TrainingRun::new(
            &net,
            Adam::new(1e-2),
            Equation::BoussinesqConvection,
            weights,
            &data,
            sched,
            dir.path().join("0"),
            None,
        )
        .unwrap();
        let summary = run.run(net.init_params(2)).unwrap();
        let text = fs::read_to_string(run.dir().join(LOG_FILE)).unwrap();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows.len(), 10);
        assert!(rows[..7].iter().all(|r| r.split(", ").count() == 2));
        assert!(rows[7..].iter().all(|r| r.split(", ").count() == 3));
        let best = summary.best_error.unwrap();
        let logged: Vec<f64> = rows.iter().map(|r| r.split(", ").nth(1).unwrap().parse().unwrap()).collect();
        assert_eq!(best, logged.iter().copied().fold(f64::INFINITY, f64::min));
    }

    #[test]
    fn cycling_switches_offset_sets() {
        let dir = tempfile::tempdir().unwrap();
        let net = tiny_net();
        let data = window_data();
        let weights = LossWeights {
            continuity: 1.0,
            density: 1.0,
            vorticity: 1.0,
            initial: 1.0,
        };
        let mut sched = schedule(4);
        sched.cycle_offsets = true;
        let run = TrainingRun::new(
            &net,
            Adam::new(1e-3),
            Equation::BoussinesqConvection,
            weights,
            &data,
            sched,
            dir.path().join("0"),
            None,
        )
        .unwrap();
        let mut ctx = run.context(net.init_params(1));
        run.initialize(&mut ctx).unwrap();
        run.step(&mut ctx).unwrap();
        assert_eq!(ctx.offset_idx, 1);
        run.step(&mut ctx).unwrap();
        assert_eq!(ctx.offset_idx, 0);
    }

    #[test]
    fn changed_interior_shape_aborts_the_step() {
        let dir = tempfile::tempdir().unwrap();
        let net = tiny_net();
        let mut data = window_data();
        data.interior.push(data::interior_sets(4, (0.0, 0.1), 3, 3, 1).remove(0));
        let weights = LossWeights {
            continuity: 1.0,
            density: 1.0,
            vorticity: 1.0,
            initial: 1.0,
        };
        let mut sched = schedule(4);
        sched.cycle_offsets = true;
        sched.offset_iter = 1;
        let run = TrainingRun::new(
            &net,
            Adam::new(1e-3),
            Equation::BoussinesqConvection,
            weights,
            &data,
            sched,
            dir.path().join("0"),
            None,
        )
        .unwrap();
        // Epoch 2 selects set 2 % 3 = 2, which has more time samples.
        let mut ctx = run.context(net.init_params(1));
        run.initialize(&mut ctx).unwrap();
        run.step(&mut ctx).unwrap();
        assert!(matches!(run.step(&mut ctx), Err(PinnError::ShapeMismatch { .. })));
    }

    #[test]
    fn zero_epochs_finalizes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let net = tiny_net();
        let data = window_data();
        let weights = LossWeights {
            continuity: 1.0,
            density: 1.0,
            vorticity: 1.0,
            initial: 1.0,
        };
        let run = TrainingRun::new(
            &net,
            Adam::new(1e-3),
            Equation::BoussinesqConvection,
            weights,
            &data,
            schedule(0),
            dir.path().join("0"),
            None,
        )
        .unwrap();
        let summary = run.run(net.init_params(1)).unwrap();
        assert_eq!(summary.runtime, 0.0);
        assert!(summary.final_error.is_none());
        assert!(!run.dir().join(LOG_FILE).exists());
    }

    #[test]
    fn single_epoch_reports_zero_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let net = tiny_net();
        let data = window_data();
        let weights = LossWeights {
            continuity: 1.0,
            density: 1.0,
            vorticity: 1.0,
            initial: 1.0,
        };
        let run = TrainingRun::new(
            &net,
            Adam::new(1e-3),
            Equation::BoussinesqConvection,
            weights,
            &data,
            schedule(1),
            dir.path().join("0"),
            None,
        )
        .unwrap();
        let mut ctx = run.context(net.init_params(1));
        run.initialize(&mut ctx).unwrap();
        assert_eq!(run.step(&mut ctx).unwrap(), Phase::Finalizing);
        assert!(ctx.started.is_none());
        let summary = run.finalize(&mut ctx).unwrap();
        assert_eq!(summary.runtime, 0.0);
        let text = fs::read_to_string(run.dir().join(RUNTIME_FILE)).unwrap();
        assert_eq!(text.trim(), artifacts::savetxt_repr(0.0));
    }

    #[test]
    fn nan_error_poisons_best_error_and_aggregate() {
        let dir = tempfile::tempdir().unwrap();
        let net = tiny_net();
        let data = window_data();
        let weights = LossWeights {
            continuity: 1.0,
            density: 1.0,
            vorticity: 1.0,
            initial: 1.0,
        };
        let mut sched = schedule(3);
        sched.log_iter = 1;
        let run = TrainingRun::new(
            &net,
            Adam::new(1e-3),
            Equation::BoussinesqConvection,
            weights,
            &data,
            sched,
            dir.path().join("0"),
            None,
        )
        .unwrap();
        let finite = net.init_params(1);
        let mut ctx = run.context(finite.clone());
        run.initialize(&mut ctx).unwrap();

        // Epoch 1 diverges, later epochs recover finite parameters.
        ctx.epoch = 1;
        ctx.last_loss = 1.0;
        ctx.params = finite.mapv(|_| f64::NAN);
        run.log(&mut ctx).unwrap();
        assert!(ctx.last_error.unwrap().is_nan());
        for epoch in [2, 3] {
            ctx.epoch = epoch;
            ctx.params = finite.clone();
            run.log(&mut ctx).unwrap();
            assert!(ctx.last_error.unwrap().is_finite());
        }
        assert!(ctx.best_error.unwrap().is_nan());

        let text = fs::read_to_string(run.dir().join(LOG_FILE)).unwrap();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows[0], "1.0, nan");
        assert_eq!(rows[1].split(", ").count(), 2);
        assert!(!rows[1].contains("nan"));
        assert_eq!(rows[2].split(", ").count(), 3);
        assert!(rows[2].ends_with(", nan"));
        assert!(artifacts::read_final_error(&run.dir().join(LOG_FILE)).unwrap().is_nan());
        assert!(crate::marching::aggregate_errors(dir.path(), 1).unwrap().is_nan());
        let best = fs::read_to_string(dir.path().join(BEST_ERROR_FILE)).unwrap();
        assert_eq!(best.lines().nth(1), Some("total error: nan"));
    }
}
