//! Command-line interface for the flaw nozzle finder.

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::NozzleConfig;
use crate::core::loaders::{self, DropTable};
use crate::core::writers;
use crate::processors::aggregation::{self, FlawReport, LabelOutcome};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "flaw-nozzle")]
#[command(about = "Find flawed print-head nozzles from drop coordinates", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the nozzle matching parameters.
#[derive(clap::Args, Debug, Clone, Default)]
struct NozzleArgs {
    /// Total nozzle count
    #[arg(long)]
    nozzles: Option<u32>,

    /// Tolerance in nozzle steps for matching
    #[arg(long)]
    tolerance: Option<f64>,

    /// Expected label (repeatable); defaults to every label in the file
    #[arg(short, long = "label")]
    labels: Vec<String>,
}

impl NozzleArgs {
    /// Command-line values take precedence over the config file.
    fn apply(&self, base: &NozzleConfig) -> NozzleConfig {
        NozzleConfig {
            nozzle_count: self.nozzles.unwrap_or(base.nozzle_count),
            tolerance: self.tolerance.unwrap_or(base.tolerance),
            labels: if self.labels.is_empty() {
                base.labels.clone()
            } else {
                self.labels.clone()
            },
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the combined flaw list and export it
    Find {
        /// Input CSV file with Label, X, Y columns
        csv_path: PathBuf,
        /// Machine identifier suffix for the output file name (e.g. 04)
        #[arg(short, long)]
        machine: Option<String>,
        #[command(flatten)]
        nozzle: NozzleArgs,
        /// Output directory (defaults to the CSV's directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Also write a per-drop classification CSV
        #[arg(long)]
        report: Option<PathBuf>,
        /// Date stamp for the output name as YYYYMMDD (defaults to today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
        /// Compute and print without writing any file
        #[arg(long)]
        dry_run: bool,
    },

    /// List labels and per-drop matching details
    Inspect {
        /// Input CSV file with Label, X, Y columns
        csv_path: PathBuf,
        #[command(flatten)]
        nozzle: NozzleArgs,
    },

    /// Plot one label's tilt-corrected drops (PNG)
    Plot {
        /// Input CSV file with Label, X, Y columns
        csv_path: PathBuf,
        /// Label to plot (e.g. A.tif)
        #[arg(value_name = "LABEL")]
        target: String,
        /// Output PNG file path (defaults to the CSV name with the label appended)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        nozzle: NozzleArgs,
    },
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y%m%d").map_err(|e| format!("expected YYYYMMDD: {}", e))
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    let result = match cli.command {
        Commands::Find {
            csv_path,
            machine,
            nozzle,
            output_dir,
            report,
            date,
            dry_run,
        } => cmd_find(
            &csv_path,
            machine,
            &nozzle,
            output_dir,
            report,
            date,
            dry_run,
            &config,
        ),
        Commands::Inspect { csv_path, nozzle } => cmd_inspect(&csv_path, &nozzle, &config),
        Commands::Plot {
            csv_path,
            target,
            output,
            nozzle,
        } => cmd_plot(&csv_path, &target, output, &nozzle, &config),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Load the table and compute the report behind a spinner.
fn load_and_compute(csv_path: &Path, nozzles: &NozzleConfig) -> Result<(DropTable, FlawReport)> {
    // Reject bad parameters before touching the file.
    nozzles.validate()?;

    let spinner = create_spinner("Loading drop coordinates...");
    let table = loaders::load_drop_csv(csv_path)
        .with_context(|| format!("failed to load {}", csv_path.display()));
    let table = match table {
        Ok(t) => t,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e);
        }
    };

    spinner.set_message("Computing rotations and nozzle indices...");
    let report = aggregation::compute_table_flaws(&table, nozzles);
    spinner.finish_and_clear();

    Ok((table, report?))
}

fn print_labels(table: &DropTable) {
    println!("Labels found and point counts:");
    for set in table.sets() {
        println!("  {}: {} points", set.label(), set.len());
    }
}

fn print_debug(table: &DropTable, report: &FlawReport) {
    println!(
        "Loaded {} points across {} labels.",
        table.total_points(),
        table.len()
    );
    for result in &report.labels {
        match &result.outcome {
            LabelOutcome::Mapped(fit) => {
                let out_cnt = fit.fit.out_of_range_count();
                let out_msg = if out_cnt > 0 {
                    format!(", {} out-of-range", out_cnt)
                } else {
                    String::new()
                };
                println!(
                    "- {}: {} points, indices={:?}{}",
                    result.label,
                    fit.point_count,
                    fit.indices(),
                    out_msg
                );
            }
            LabelOutcome::Missing => println!("- {}: no data", result.label),
            LabelOutcome::Degenerate(e) => println!("- {}: skipped ({})", result.label, e),
        }
    }
    println!(
        "Combined nozzle list ({} unique): {:?}",
        report.flaws.len(),
        report.flaws
    );
}

/// Ask for a machine identifier on stdin. `None` on EOF or an empty answer.
fn prompt_machine() -> Result<Option<String>> {
    print!("Enter machine identifier (e.g., 04): ");
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }

    let machine = line.trim();
    Ok((!machine.is_empty()).then(|| machine.to_string()))
}

#[allow(clippy::too_many_arguments)]
fn cmd_find(
    csv_path: &Path,
    machine: Option<String>,
    nozzle: &NozzleArgs,
    output_dir: Option<PathBuf>,
    report_path: Option<PathBuf>,
    date: Option<NaiveDate>,
    dry_run: bool,
    config: &PipelineConfig,
) -> Result<()> {
    let start = Instant::now();
    let nozzles = nozzle.apply(&config.nozzles);

    println!("Selected file: {}", csv_path.display());

    let (table, report) = load_and_compute(csv_path, &nozzles)?;

    print_labels(&table);
    print_debug(&table, &report);

    if report.has_out_of_range() {
        warn!("Some points were out of range. See details above.");
    }

    if dry_run {
        println!("DRY RUN: No files will be written");
        return Ok(());
    }

    let machine = match machine.or_else(|| config.output.machine.clone()) {
        Some(m) if !m.trim().is_empty() => m,
        _ => match prompt_machine()? {
            Some(m) => m,
            None => {
                println!("No machine identifier provided. Exiting without export.");
                return Ok(());
            }
        },
    };

    let dir = output_dir.unwrap_or_else(|| {
        csv_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let output_path = writers::flaw_list_path(&dir, date, &config.output, &machine);

    writers::write_flaw_list(&output_path, &report.flaws)
        .with_context(|| format!("failed to export {}", output_path.display()))?;
    info!("Output written to: {}", output_path.display());

    if let Some(path) = &report_path {
        writers::write_label_report(path, &report)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        info!("Report written to: {}", path.display());
    }

    let missing: Vec<&str> = report.missing_labels().collect();
    let degenerate: Vec<&str> = report.degenerate_labels().collect();

    print_summary(
        "Flaw Nozzle Export Complete",
        &[
            ("Input file", csv_path.display().to_string()),
            ("Output file", output_path.display().to_string()),
            ("Labels", report.labels.len().to_string()),
            ("Flawed nozzles", report.flaws.len().to_string()),
            ("Missing labels", format!("{:?}", missing)),
            ("Degenerate labels", format!("{:?}", degenerate)),
            ("Nozzle count", nozzles.nozzle_count.to_string()),
            ("Tolerance", nozzles.tolerance.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    Ok(())
}

fn cmd_inspect(csv_path: &Path, nozzle: &NozzleArgs, config: &PipelineConfig) -> Result<()> {
    let nozzles = nozzle.apply(&config.nozzles);
    let (table, report) = load_and_compute(csv_path, &nozzles)?;

    print_labels(&table);

    for result in &report.labels {
        println!();
        let fit = match &result.outcome {
            LabelOutcome::Mapped(fit) => fit,
            LabelOutcome::Missing => {
                println!("{}: no data", result.label);
                continue;
            }
            LabelOutcome::Degenerate(e) => {
                println!("{}: {}", result.label, e);
                continue;
            }
        };

        println!(
            "{}: tilt {:.4} deg, start {:.3}, end {:.3}, step {:.4}",
            result.label,
            fit.angle_deg(),
            fit.fit.start,
            fit.fit.end,
            fit.fit.step
        );
        for a in &fit.fit.assignments {
            let status = match a.index() {
                Some(index) => format!("nozzle {}", index),
                None => "out of range".to_string(),
            };
            println!(
                "    x'={:>12.4}  pos={:>9.4}  offset={:>+7.4}  {}",
                a.coord,
                a.raw_index,
                a.offset(),
                status
            );
        }
    }

    println!();
    println!(
        "Combined nozzle list ({} unique): {:?}",
        report.flaws.len(),
        report.flaws
    );

    Ok(())
}

fn cmd_plot(
    csv_path: &Path,
    target: &str,
    output: Option<PathBuf>,
    nozzle: &NozzleArgs,
    config: &PipelineConfig,
) -> Result<()> {
    use crate::visualization;

    let start = Instant::now();
    let nozzles = nozzle.apply(&config.nozzles);
    nozzles.validate()?;

    let table = loaders::load_drop_csv(csv_path)
        .with_context(|| format!("failed to load {}", csv_path.display()))?;

    let set = match table.get(target) {
        Some(set) => set,
        None => bail!("label '{}' not found in {}", target, csv_path.display()),
    };

    let fit = aggregation::process_label(set, nozzles.nozzle_count, nozzles.tolerance)
        .with_context(|| format!("cannot fit label '{}'", target))?;

    // Default output path: CSV stem plus the label, as PNG
    let output_path = output.unwrap_or_else(|| {
        let stem = csv_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "drops".to_string());
        csv_path.with_file_name(format!("{}_{}.png", stem, target.replace('.', "_")))
    });

    let spinner = create_spinner("Generating plot...");
    let plotted = visualization::plot_label_fit(&output_path, &fit, target);
    spinner.finish_and_clear();
    plotted.with_context(|| format!("failed to plot {}", output_path.display()))?;

    print_summary(
        "Visualization Complete",
        &[
            ("Input file", csv_path.display().to_string()),
            ("Label", target.to_string()),
            ("Output PNG", output_path.display().to_string()),
            ("Points", fit.point_count.to_string()),
            ("Tilt (deg)", format!("{:.4}", fit.angle_deg())),
            ("Out of range", fit.fit.out_of_range_count().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    Ok(())
}
