//! Time marching: one independently trained surrogate per time window.
//!
//! `[0, T]` is split into `K` equal windows. Window `i > 0` starts from
//! the terminal prediction of window `i − 1`; parameters and optimizer
//! state are never carried over. After the last window, the final logged
//! error of every window is averaged into `best_error.csv`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::artifacts::{self, BEST_ERROR_FILE, CONFIG_FILE, LOG_FILE, NEXT_IC_FILE};
use crate::config::TrainArgs;
use crate::data::{self, ReferenceData};
use crate::error::{PinnError, Result};
use crate::network::{Network, Surrogate};
use crate::optim::Adam;
use crate::train::{Aggregation, RunSummary, Schedule, TrainingRun, WindowData};

/// Equal partition of `[0, time_end]` into `count` windows.
#[derive(Debug, Clone, Copy)]
pub struct TimeWindows {
    pub time_end: f64,
    pub count: usize,
}

impl TimeWindows {
    pub fn new(time_end: f64, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(PinnError::Config("at least one time window is required".into()));
        }
        if time_end.is_nan() || time_end <= 0.0 {
            return Err(PinnError::Config(format!("final time must be positive, got {time_end}")));
        }
        Ok(Self { time_end, count })
    }

    /// `i·T/K` for `i = 0..=K`.
    pub fn boundaries(&self) -> Vec<f64> {
        (0..=self.count).map(|i| self.boundary(i)).collect()
    }

    fn boundary(&self, i: usize) -> f64 {
        i as f64 * self.time_end / self.count as f64
    }

    /// `(t_i, t_{i+1})` of window `i`.
    pub fn window(&self, i: usize) -> Result<(f64, f64)> {
        if i >= self.count {
            return Err(PinnError::Config(format!("window {i} is outside 0..{}", self.count)));
        }
        Ok((self.boundary(i), self.boundary(i + 1)))
    }
}

/// `{run_dir}/{i}`
pub fn window_dir(run_dir: &Path, i: usize) -> PathBuf {
    run_dir.join(i.to_string())
}

/// Read each window's final logged error, append the list and its mean to
/// `{run_dir}/best_error.csv`, and return the mean.
pub fn aggregate_errors(run_dir: &Path, windows: usize) -> Result<f64> {
    let errors = (0..windows)
        .map(|i| artifacts::read_final_error(&window_dir(run_dir, i).join(LOG_FILE)))
        .collect::<Result<Vec<f64>>>()?;
    let mean = artifacts::write_best_error(&run_dir.join(BEST_ERROR_FILE), &errors)?;
    log::info!("test error for each time window: {errors:?}");
    log::info!("total error: {mean}");
    Ok(mean)
}

/// Train the window `args.step_idx` against `reference`.
pub fn run_window(args: &TrainArgs, reference: &ReferenceData) -> Result<RunSummary> {
    args.validate()?;
    let windows = TimeWindows::new(args.time_end, args.marching_steps)?;
    let (t0, t1) = windows.window(args.step_idx)?;
    let run_dir = args.run_dir();
    let dir = window_dir(&run_dir, args.step_idx);
    fs::create_dir_all(&dir).map_err(|e| PinnError::io(&dir, e))?;
    artifacts::save_config(&dir.join(CONFIG_FILE), args)?;
    log::info!("window {} of {}: t in [{t0}, {t1}], results in {}", args.step_idx, windows.count, dir.display());

    let net = Network::build(&args.network_config())?;
    let params = net.init_params(args.seed);
    log::info!("{} surrogate with {} parameters", args.model.name(), net.num_params());

    let ic = if args.step_idx == 0 {
        data::analytic_initial_condition(args.nxy, t0)
    } else {
        let previous = window_dir(&run_dir, args.step_idx - 1).join(NEXT_IC_FILE);
        data::load_next_ic(&previous, t0)?
    };
    let window_data = WindowData {
        interior: data::interior_sets(args.seed, (t0, t1), args.nt, args.nxy, args.offset_num),
        ic,
        test: reference.window(t0, t1)?,
        t_end: t1,
    };
    let schedule = Schedule {
        epochs: args.epochs,
        log_iter: args.log_iter,
        plot_iter: args.plot_iter,
        offset_iter: args.offset_iter,
        cycle_offsets: args.cycle_offsets,
        step_idx: args.step_idx,
    };
    let aggregation = (args.step_idx + 1 == windows.count).then(|| Aggregation {
        run_dir: run_dir.clone(),
        windows: windows.count,
    });

    let run = TrainingRun::new(
        &net,
        Adam::new(args.lr),
        args.equation,
        args.weights(),
        &window_data,
        schedule,
        dir,
        aggregation,
    )?;
    run.run(params)
}

/// Train every window in order, each seeded by its predecessor.
pub fn march(args: &TrainArgs) -> Result<Vec<RunSummary>> {
    let reference = ReferenceData::load(&args.data_dir)?;
    (0..args.marching_steps)
        .map(|i| {
            let mut window_args = args.clone();
            window_args.step_idx = i;
            run_window(&window_args, &reference)
        })
        .collect()
}
