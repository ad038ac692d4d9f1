//! Visualization of tilt-corrected drop lines.
//!
//! Renders a label's rotated drops as a 2D scatter plot using the plotters
//! library, colored by how each drop was classified.

use std::collections::HashMap;
use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::processors::aggregation::LabelFit;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("No points to plot")]
    EmptyPointSet,
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Default plot width in pixels.
const DEFAULT_WIDTH: u32 = 1920;

/// Default plot height in pixels.
const DEFAULT_HEIGHT: u32 = 480;

/// Extreme drops that calibrate the grid.
const CALIBRATION_COLOR: RGBColor = RGBColor(55, 126, 184);
/// Drops matched to a nozzle.
const IN_RANGE_COLOR: RGBColor = RGBColor(77, 175, 74);
/// Drops rejected by the tolerance band.
const OUT_OF_RANGE_COLOR: RGBColor = RGBColor(228, 26, 28);

/// How a plotted drop was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropClass {
    Calibration,
    InRange,
    OutOfRange,
}

impl DropClass {
    fn color(self) -> RGBColor {
        match self {
            DropClass::Calibration => CALIBRATION_COLOR,
            DropClass::InRange => IN_RANGE_COLOR,
            DropClass::OutOfRange => OUT_OF_RANGE_COLOR,
        }
    }
}

/// Pair every rotated drop of a label with its classification.
pub fn classify_drops(fit: &LabelFit) -> Vec<(f64, f64, DropClass)> {
    let by_coord: HashMap<u64, bool> = fit
        .fit
        .assignments
        .iter()
        .map(|a| (a.coord.to_bits(), a.is_in_range()))
        .collect();

    fit.rotated
        .iter()
        .map(|p| {
            let class = match by_coord.get(&p.x.to_bits()) {
                Some(true) => DropClass::InRange,
                Some(false) => DropClass::OutOfRange,
                None => DropClass::Calibration,
            };
            (p.x, p.y, class)
        })
        .collect()
}

/// Plot a label's tilt-corrected drops and save as PNG.
///
/// The horizontal axis runs along the nozzle row. Calibration extremes are
/// blue, matched drops green and rejected drops red.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `fit` - Result of processing one label
/// * `_title` - Title for the plot (unused, the bitmap backend is built without fonts)
pub fn plot_label_fit(output_path: &Path, fit: &LabelFit, _title: &str) -> Result<()> {
    let points = classify_drops(fit);
    if points.is_empty() {
        return Err(VisualizationError::EmptyPointSet);
    }

    let (x_min, x_max, y_min, y_max) = compute_bounds(&points);
    let x_padding = (x_max - x_min) * 0.02;
    let y_padding = (y_max - y_min) * 0.1;

    let root = BitMapBackend::new(output_path, (DEFAULT_WIDTH, DEFAULT_HEIGHT))
        .into_drawing_area();

    root.fill(&WHITE).map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(
            (x_min - x_padding)..(x_max + x_padding),
            (y_min - y_padding)..(y_max + y_padding),
        )
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .draw()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .draw_series(points.iter().map(|(x, y, class)| {
            Circle::new((*x, *y), 3, class.color().filled())
        }))
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    root.present().map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    Ok(())
}

/// Compute the bounds (min/max) for x and y coordinates.
fn compute_bounds(points: &[(f64, f64, DropClass)]) -> (f64, f64, f64, f64) {
    let mut x_min = f64::MAX;
    let mut x_max = f64::MIN;
    let mut y_min = f64::MAX;
    let mut y_max = f64::MIN;

    for (x, y, _) in points {
        x_min = x_min.min(*x);
        x_max = x_max.max(*x);
        y_min = y_min.min(*y);
        y_max = y_max.max(*y);
    }

    // A corrected line is flat, so the y range usually collapses.
    if (x_max - x_min).abs() < 1e-9 {
        x_min -= 1.0;
        x_max += 1.0;
    }
    if (y_max - y_min).abs() < 1e-9 {
        y_min -= 1.0;
        y_max += 1.0;
    }

    (x_min, x_max, y_min, y_max)
}
