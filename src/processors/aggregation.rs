//! Per-label processing and merging into one flaw list.

use std::collections::BTreeSet;

use log::{debug, warn};

use crate::config::{ConfigError, NozzleConfig};
use crate::core::loaders::{DropTable, LabelGroup, Point, PointSet};
use crate::core::transforms::rotate_to_vertical;
use crate::core::PipelineError;

use super::nozzles::{assign_indices, NozzleFit};

/// Successful tilt correction and index assignment for one label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelFit {
    /// Unique points in the label.
    pub point_count: usize,
    /// Estimated tilt, in radians.
    pub angle_rad: f64,
    /// Tilt-corrected points, ordered by original x.
    pub rotated: Vec<Point>,
    pub fit: NozzleFit,
}

impl LabelFit {
    #[inline]
    pub fn angle_deg(&self) -> f64 {
        self.angle_rad.to_degrees()
    }

    pub fn indices(&self) -> Vec<u32> {
        self.fit.indices()
    }
}

/// What happened to one label.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelOutcome {
    Mapped(LabelFit),
    /// The label was expected but has no rows.
    Missing,
    /// The label's points cannot calibrate a nozzle grid.
    Degenerate(PipelineError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelResult {
    pub label: String,
    pub outcome: LabelOutcome,
}

impl LabelResult {
    /// Valid nozzle indices contributed by this label.
    pub fn indices(&self) -> Vec<u32> {
        match &self.outcome {
            LabelOutcome::Mapped(fit) => fit.indices(),
            LabelOutcome::Missing | LabelOutcome::Degenerate(_) => Vec::new(),
        }
    }

    pub fn fit(&self) -> Option<&LabelFit> {
        match &self.outcome {
            LabelOutcome::Mapped(fit) => Some(fit),
            _ => None,
        }
    }

    pub fn out_of_range_count(&self) -> usize {
        self.fit().map_or(0, |f| f.fit.out_of_range_count())
    }
}

/// Merged flaw list plus the per-label results it was built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlawReport {
    /// Unique nozzle indices, ascending.
    pub flaws: Vec<u32>,
    /// One entry per processed label, in processing order.
    pub labels: Vec<LabelResult>,
}

impl FlawReport {
    pub fn has_out_of_range(&self) -> bool {
        self.labels.iter().any(|l| l.out_of_range_count() > 0)
    }

    pub fn missing_labels(&self) -> impl Iterator<Item = &str> {
        self.labels
            .iter()
            .filter(|l| matches!(l.outcome, LabelOutcome::Missing))
            .map(|l| l.label.as_str())
    }

    pub fn degenerate_labels(&self) -> impl Iterator<Item = &str> {
        self.labels
            .iter()
            .filter(|l| matches!(l.outcome, LabelOutcome::Degenerate(_)))
            .map(|l| l.label.as_str())
    }
}

/// Rotate one point set and map its drops to nozzle indices.
pub fn process_label(
    set: &PointSet,
    nozzle_count: u32,
    tolerance: f64,
) -> Result<LabelFit, PipelineError> {
    let rotation = rotate_to_vertical(set)?;
    let fit = assign_indices(&rotation.along_axis(), nozzle_count, tolerance)?;

    Ok(LabelFit {
        point_count: set.len(),
        angle_rad: rotation.angle_rad,
        rotated: rotation.points,
        fit,
    })
}

/// Running state of an aggregation pass.
#[derive(Debug, Default)]
struct Accumulator {
    flaws: BTreeSet<u32>,
    labels: Vec<LabelResult>,
}

impl Accumulator {
    fn add(mut self, result: LabelResult) -> Self {
        self.flaws.extend(result.indices());
        self.labels.push(result);
        self
    }

    fn finish(self) -> FlawReport {
        FlawReport {
            flaws: self.flaws.into_iter().collect(),
            labels: self.labels,
        }
    }
}

fn evaluate(group: LabelGroup<'_>, config: &NozzleConfig) -> LabelResult {
    let outcome = match group {
        LabelGroup::Absent(label) => {
            debug!("{}: no data, skipping", label);
            LabelOutcome::Missing
        }
        LabelGroup::Present(set) if set.is_empty() => LabelOutcome::Missing,
        LabelGroup::Present(set) => {
            match process_label(set, config.nozzle_count, config.tolerance) {
                Ok(fit) => {
                    debug!(
                        "{}: {} points, tilt {:.4} deg, step {:.4}, indices {:?}",
                        set.label(),
                        fit.point_count,
                        fit.angle_deg(),
                        fit.fit.step,
                        fit.indices()
                    );
                    LabelOutcome::Mapped(fit)
                }
                Err(e) => {
                    warn!("{}: {}", set.label(), e);
                    LabelOutcome::Degenerate(e)
                }
            }
        }
    };

    LabelResult {
        label: group.label().to_string(),
        outcome,
    }
}

/// Compute the combined flaw list over a set of label groups.
///
/// Missing and degenerate labels contribute nothing and never stop the other
/// labels from being processed. The returned flaw list is sorted and free of
/// duplicates.
///
/// # Errors
///
/// Only an invalid configuration is fatal; it is reported before any label
/// is touched.
pub fn compute_flaws<'a, I>(groups: I, config: &NozzleConfig) -> Result<FlawReport, ConfigError>
where
    I: IntoIterator<Item = LabelGroup<'a>>,
{
    config.validate()?;

    let report = groups
        .into_iter()
        .map(|group| evaluate(group, config))
        .fold(Accumulator::default(), Accumulator::add)
        .finish();

    Ok(report)
}

/// Compute the flaw list for a loaded table, using the configured label list.
pub fn compute_table_flaws(
    table: &DropTable,
    config: &NozzleConfig,
) -> Result<FlawReport, ConfigError> {
    compute_flaws(table.groups(&config.labels), config)
}
