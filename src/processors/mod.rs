//! Nozzle inference stages.

pub mod aggregation;
pub mod nozzles;

// Re-export key types for convenience
pub use aggregation::{
    compute_flaws, compute_table_flaws, process_label, FlawReport, LabelFit, LabelOutcome,
    LabelResult,
};
pub use nozzles::{assign_indices, Assignment, NozzleFit, PointAssignment};
