mod common;

use std::fs;

use convection_pinn::artifacts::{self, BEST_ERROR_FILE, LOG_FILE, NEXT_IC_FILE};
use convection_pinn::autodiff::Coords;
use convection_pinn::data;
use convection_pinn::marching::{self, window_dir, TimeWindows};
use convection_pinn::network::{Network, Surrogate};
use ndarray::{Array1, Axis};

#[test]
fn windows_hand_over_terminal_state_and_aggregate() {
    let tmp = tempfile::tempdir().unwrap();
    let data_dir = tmp.path().join("data");
    common::write_reference(&data_dir);
    let args = common::tiny_args(
        &data_dir,
        &tmp.path().join("results"),
        &["--epochs", "3", "--log-iter", "1", "--marching-steps", "2"],
    );

    let summaries = marching::march(&args).unwrap();
    assert_eq!(summaries.len(), 2);
    assert!(summaries[0].aggregate_error.is_none());

    // Window 1 starts from window 0's prediction at t = T/2.
    let run_dir = args.run_dir();
    let (_, t_mid) = TimeWindows::new(0.3, 2).unwrap().window(0).unwrap();
    let ic = data::load_next_ic(&window_dir(&run_dir, 0).join(NEXT_IC_FILE), t_mid).unwrap();
    let net = Network::build(&args.network_config()).unwrap();
    let coords = Coords::new(Array1::from_elem(1, t_mid), ic.coords.x.clone(), ic.coords.y.clone());
    let rho = net
        .forward(summaries[0].params.as_slice().unwrap(), &coords)
        .rho
        .index_axis_move(Axis(0), 0);
    assert!(rho.iter().zip(ic.rho0.iter()).all(|(a, b)| (a - b).abs() < 1e-12));

    let finals: Vec<f64> = (0..2)
        .map(|i| artifacts::read_final_error(&window_dir(&run_dir, i).join(LOG_FILE)).unwrap())
        .collect();
    let expected = (finals[0] + finals[1]) / 2.0;
    assert_eq!(summaries[1].aggregate_error, Some(expected));
    let best = fs::read_to_string(run_dir.join(BEST_ERROR_FILE)).unwrap();
    assert_eq!(best.lines().count(), 2);
    assert!(best.lines().nth(1).unwrap().starts_with("total error: "));
}

#[test]
fn later_window_needs_its_predecessor() {
    let tmp = tempfile::tempdir().unwrap();
    let data_dir = tmp.path().join("data");
    common::write_reference(&data_dir);
    let args = common::tiny_args(
        &data_dir,
        &tmp.path().join("results"),
        &["--epochs", "1", "--marching-steps", "2", "--step-idx", "1"],
    );
    let reference = data::ReferenceData::load(&data_dir).unwrap();
    assert!(marching::run_window(&args, &reference).is_err());
}

#[test]
fn rerunning_a_sequence_replaces_the_summary() {
    let tmp = tempfile::tempdir().unwrap();
    let data_dir = tmp.path().join("data");
    common::write_reference(&data_dir);
    let args = common::tiny_args(
        &data_dir,
        &tmp.path().join("results"),
        &["--epochs", "2", "--log-iter", "1", "--marching-steps", "2"],
    );

    marching::march(&args).unwrap();
    let summaries = marching::march(&args).unwrap();

    let best = fs::read_to_string(args.run_dir().join(BEST_ERROR_FILE)).unwrap();
    let lines: Vec<&str> = best.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("test error for each time window: ["));
    assert!(lines[1].starts_with("total error: "));
    assert!(summaries[1].aggregate_error.is_some());
    let rows = fs::read_to_string(window_dir(&args.run_dir(), 0).join(LOG_FILE)).unwrap();
    assert_eq!(rows.lines().count(), 2);
}
