use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{ArrayView2, Axis};
use plotters::prelude::*;

use crate::data::ReferenceData;
use crate::error::{PinnError, Result};
use crate::network::Surrogate;

const PANEL: u32 = 240;

/// Time indices shown in a figure: first, one third, two thirds, last.
pub fn snapshot_indices(nt: usize) -> [usize; 4] {
    [0, nt / 3, 2 * nt / 3, nt.saturating_sub(1)]
}

/// Draw predicted density (top row) over reference density (bottom row)
/// at four test times into `{dir}/vis/{epoch:05}/pred.png`.
pub fn draw_density_maps<N: Surrogate>(
    net: &N,
    params: &[f64],
    reference: &ReferenceData,
    dir: &Path,
    epoch: usize,
) -> Result<PathBuf> {
    let out_dir = dir.join("vis").join(format!("{epoch:05}"));
    fs::create_dir_all(&out_dir).map_err(|e| PinnError::io(&out_dir, e))?;
    let output_path = out_dir.join("pred.png");

    let pred = net.forward(params, &reference.coords).rho;
    let (lo, hi) = reference
        .rho
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| (lo.min(r), hi.max(r)));

    let root = BitMapBackend::new(&output_path, (4 * PANEL, 2 * PANEL)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let panels = root.split_evenly((2, 4));
    let times = snapshot_indices(reference.coords.t.len());
    for (col, &i) in times.iter().enumerate() {
        heatmap(&panels[col], pred.index_axis(Axis(0), i), lo, hi)?;
        heatmap(&panels[4 + col], reference.rho.index_axis(Axis(0), i), lo, hi)?;
    }
    root.present().map_err(plot_err)?;
    log::info!("visualization saved to {}", output_path.display());
    Ok(output_path.clone())
}

// Field indexed [j, k] for (x_j, y_k); x runs right, y runs up.
fn heatmap<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    field: ArrayView2<f64>,
    lo: f64,
    hi: f64,
) -> Result<()> {
    let (nx, ny) = field.dim();
    let mut chart = ChartBuilder::on(area)
        .margin(4)
        .build_cartesian_2d(0..nx, 0..ny)
        .map_err(plot_err)?;
    let span = if hi > lo { hi - lo } else { 1.0 };
    chart
        .draw_series((0..nx).flat_map(|j| (0..ny).map(move |k| (j, k))).map(|(j, k)| {
            let s = ((field[[j, k]] - lo) / span).clamp(0.0, 1.0);
            // blue (low) to red (high)
            let color = HSLColor(2.0 / 3.0 * (1.0 - s), 0.7, 0.5);
            Rectangle::new([(j, k), (j + 1, k + 1)], color.filled())
        }))
        .map_err(plot_err)?;
    Ok(())
}

fn plot_err(e: impl std::fmt::Display) -> PinnError {
    PinnError::Plot(e.to_string())
}
