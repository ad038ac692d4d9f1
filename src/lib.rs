//! Flawed print-head nozzle inference from imaged drop coordinates.
//!
//! This crate provides tools for:
//! - Loading labeled drop coordinates from CSV into deduplicated point sets
//! - Correcting the imaging tilt of each label's drop line
//! - Matching corrected drops to nozzle indices within a tolerance band
//! - Merging per-label results into one sorted flaw list
//!
//! # Example
//!
//! ```no_run
//! use flaw_nozzle::{core::loaders::load_drop_csv, processors::compute_table_flaws, NozzleConfig};
//!
//! let table = load_drop_csv("drops.csv").unwrap();
//! let report = compute_table_flaws(&table, &NozzleConfig::default()).unwrap();
//! println!("{:?}", report.flaws);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{ConfigError, NozzleConfig, OutputConfig, PipelineConfig};
pub use core::loaders::{DropTable, LabelGroup, Point, PointSet};
pub use processors::{compute_flaws, FlawReport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
