use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use convection_pinn::config::{ReferenceArgs, TrainArgs};
use convection_pinn::data::ReferenceData;
use convection_pinn::marching;
use convection_pinn::reference::{RefParameters, RefSimulation};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the surrogate of a single time window
    Train(TrainArgs),
    /// Train every time window in sequence
    March(TrainArgs),
    /// Generate synthetic reference data
    Reference(ReferenceArgs),
    /// Re-aggregate the per-window errors of a finished run
    Summary(TrainArgs),
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Train(args) => {
            let reference = ReferenceData::load(&args.data_dir)
                .with_context(|| format!("loading reference data from {}", args.data_dir.display()))?;
            let summary = marching::run_window(args, &reference)?;
            if let Some(total) = summary.aggregate_error {
                log::info!("aggregate error over {} windows: {total}", args.marching_steps);
            }
        }
        Commands::March(args) => {
            args.validate()?;
            let summaries = marching::march(args)?;
            if let Some(total) = summaries.last().and_then(|s| s.aggregate_error) {
                log::info!("aggregate error over {} windows: {total}", summaries.len());
            }
        }
        Commands::Reference(args) => {
            let mut sim = RefSimulation::new(RefParameters {
                n: args.n,
                dt: args.dt,
                nt: args.nt,
                time_end: args.time_end,
                jacobi_iters: args.jacobi_iters,
            })?;
            log::info!("integrating reference solution on a {0}x{0} grid", args.n);
            sim.run().save(&args.data_dir)?;
        }
        Commands::Summary(args) => {
            let run_dir = args.run_dir();
            let total = marching::aggregate_errors(&run_dir, args.marching_steps)
                .with_context(|| format!("aggregating errors under {}", run_dir.display()))?;
            println!("total error: {total}");
        }
    }

    Ok(())
}
