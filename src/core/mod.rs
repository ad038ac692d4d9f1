//! Core data types, geometry and I/O operations.

pub mod loaders;
pub mod transforms;
pub mod writers;

use thiserror::Error;

pub use loaders::{load_drop_csv, DropTable, LabelGroup, LoaderError, Point, PointSet};
pub use transforms::{rotate_to_vertical, Rotation};
pub use writers::{
    flaw_list_file_name, flaw_list_path, write_flaw_list, write_label_report, WriteError,
};

/// Per-label failures of the geometric pipeline.
///
/// These never abort a run; the aggregator records them and moves on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Too few distinct points, or all points coincide along the nozzle axis.
    #[error("degenerate point set: {points} point(s) do not span a nozzle row")]
    DegeneratePointSet { points: usize },

    #[error("nozzle count must be at least 2, got {0}")]
    NozzleCount(u32),
}

/// Result type for pipeline stages.
pub type Result<T> = std::result::Result<T, PipelineError>;
