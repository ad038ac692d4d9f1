//! Nozzle index assignment along a tilt-corrected drop line.
//!
//! The two extreme drops are taken to be the first and last nozzle of the
//! array, which fixes the grid spacing for the label. Every interior drop is
//! then snapped to its nearest grid position, or rejected when it sits
//! further than `tolerance` steps from any nozzle.

use crate::core::{PipelineError, Result};

/// Classification of one interior coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// Matched nozzle, 1-based.
    InRange(u32),
    /// Too far from every grid position.
    OutOfRange,
}

/// Detail for one interior coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointAssignment {
    /// Position along the nozzle axis.
    pub coord: f64,
    /// Continuous 1-based nozzle position, `(coord - start) / step + 1`.
    pub raw_index: f64,
    /// Nearest integer nozzle position, regardless of tolerance.
    pub nearest: i64,
    pub assignment: Assignment,
}

impl PointAssignment {
    /// Signed distance to the nearest grid position, in nozzle steps.
    #[inline]
    pub fn offset(&self) -> f64 {
        self.raw_index - self.nearest as f64
    }

    #[inline]
    pub fn index(&self) -> Option<u32> {
        match self.assignment {
            Assignment::InRange(index) => Some(index),
            Assignment::OutOfRange => None,
        }
    }

    #[inline]
    pub fn is_in_range(&self) -> bool {
        matches!(self.assignment, Assignment::InRange(_))
    }
}

/// Grid calibration and classification for one label.
#[derive(Debug, Clone, PartialEq)]
pub struct NozzleFit {
    /// Smallest coordinate, nozzle 1.
    pub start: f64,
    /// Largest coordinate, nozzle `nozzle_count`.
    pub end: f64,
    /// Expected spacing between adjacent nozzles.
    pub step: f64,
    /// Interior coordinates in ascending order.
    pub assignments: Vec<PointAssignment>,
}

impl NozzleFit {
    /// Matched nozzle indices, in coordinate order.
    pub fn indices(&self) -> Vec<u32> {
        self.assignments.iter().filter_map(PointAssignment::index).collect()
    }

    pub fn out_of_range(&self) -> impl Iterator<Item = &PointAssignment> {
        self.assignments.iter().filter(|a| !a.is_in_range())
    }

    pub fn out_of_range_count(&self) -> usize {
        self.out_of_range().count()
    }
}

/// Map coordinates along the nozzle axis to 1-based nozzle indices.
///
/// The minimum and maximum coordinates calibrate the grid and are not
/// classified themselves. `tolerance` is a fraction of one step, so the
/// acceptance band scales with the observed extent of the label.
///
/// # Errors
///
/// * [`PipelineError::NozzleCount`] if `nozzle_count < 2`.
/// * [`PipelineError::DegeneratePointSet`] if there are fewer than two
///   coordinates or they all coincide, leaving the step undefined.
pub fn assign_indices(coords: &[f64], nozzle_count: u32, tolerance: f64) -> Result<NozzleFit> {
    if nozzle_count < 2 {
        return Err(PipelineError::NozzleCount(nozzle_count));
    }

    let mut sorted = coords.to_vec();
    sorted.sort_by(f64::total_cmp);

    let (start, end, interior) = match sorted.as_slice() {
        [start, interior @ .., end] => (*start, *end, interior),
        _ => {
            return Err(PipelineError::DegeneratePointSet {
                points: sorted.len(),
            })
        }
    };

    let step = (end - start) / f64::from(nozzle_count - 1);
    if step <= 0.0 || !step.is_finite() {
        return Err(PipelineError::DegeneratePointSet {
            points: sorted.len(),
        });
    }

    let assignments = interior
        .iter()
        .map(|&coord| classify(coord, start, step, nozzle_count, tolerance))
        .collect();

    Ok(NozzleFit {
        start,
        end,
        step,
        assignments,
    })
}

fn classify(coord: f64, start: f64, step: f64, nozzle_count: u32, tolerance: f64) -> PointAssignment {
    let raw_index = (coord - start) / step + 1.0;
    let rounded = raw_index.round();
    let nearest = rounded as i64;

    let within = (rounded - raw_index).abs() < tolerance;
    let assignment = if within && (1..=i64::from(nozzle_count)).contains(&nearest) {
        Assignment::InRange(nearest as u32)
    } else {
        Assignment::OutOfRange
    };

    PointAssignment {
        coord,
        raw_index,
        nearest,
        assignment,
    }
}
