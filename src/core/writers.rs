//! Writers for the exported flaw list and per-point reports.
//!
//! - Plain text flaw list, one nozzle index per line
//! - CSV report with the classification of every interior drop

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use thiserror::Error;

use crate::config::OutputConfig;
use crate::processors::aggregation::FlawReport;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a buffered writer for the given path.
fn create_buffered_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(BufWriter::new(file))
}

/// File name of an exported flaw list.
///
/// The layout is `{prefix}_{YYYYMMDD}_{model_tag}_{machine}.txt`, e.g.
/// `flaw_nozzle_20260117_680k_04.txt`.
pub fn flaw_list_file_name(date: NaiveDate, output: &OutputConfig, machine: &str) -> String {
    format!(
        "{}_{}_{}_{}.txt",
        output.prefix,
        date.format("%Y%m%d"),
        output.model_tag,
        machine.trim()
    )
}

/// Full output path, placed in `dir`.
pub fn flaw_list_path(dir: &Path, date: NaiveDate, output: &OutputConfig, machine: &str) -> PathBuf {
    dir.join(flaw_list_file_name(date, output, machine))
}

/// Write nozzle indices as plain text, one per line.
///
/// # Errors
///
/// Returns an error if:
/// - Parent directories cannot be created
/// - File cannot be created or written to
///
/// # Example
///
/// ```no_run
/// use flaw_nozzle::core::writers::write_flaw_list;
/// use std::path::Path;
///
/// write_flaw_list(Path::new("flaws.txt"), &[12, 87, 403]).unwrap();
/// ```
pub fn write_flaw_list(path: &Path, indices: &[u32]) -> Result<()> {
    ensure_parent_dirs(path)?;
    let mut writer = create_buffered_writer(path)?;

    let path_str = path.display().to_string();

    for idx in indices {
        writeln!(writer, "{}", idx).map_err(|e| WriteError::WriteFile {
            path: path_str.clone(),
            source: e,
        })?;
    }

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write the classification of every interior drop to CSV.
///
/// Columns are `label,coord,raw_index,nearest,offset,in_range`. Labels that
/// were missing or degenerate produce no rows.
pub fn write_label_report(path: &Path, report: &FlawReport) -> Result<()> {
    ensure_parent_dirs(path)?;

    let buf_writer = create_buffered_writer(path)?;
    let mut csv_writer = csv::Writer::from_writer(buf_writer);

    let path_str = path.display().to_string();

    csv_writer
        .write_record(["label", "coord", "raw_index", "nearest", "offset", "in_range"])
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for result in &report.labels {
        let Some(fit) = result.fit() else { continue };

        for a in &fit.fit.assignments {
            csv_writer
                .write_record(&[
                    result.label.clone(),
                    format!("{:.6}", a.coord),
                    format!("{:.4}", a.raw_index),
                    a.nearest.to_string(),
                    format!("{:.4}", a.offset()),
                    a.is_in_range().to_string(),
                ])
                .map_err(|e| WriteError::CsvError {
                    path: path_str.clone(),
                    source: e,
                })?;
        }
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}
