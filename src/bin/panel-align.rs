//! panel-align CLI - build labeled datasets from factor and return panels
//!
//! ## Example Usage
//!
//! ```bash
//! # Merge factors with next-period returns
//! panel-align merge -f combined_factors.parquet -r returns.parquet -o total.parquet
//!
//! # Keep rows whose label is missing and save a JSON report
//! panel-align merge --keep-missing --report merge_report.json
//!
//! # Look at the stored tables in a directory
//! panel-align inspect ./data --rows 10
//! ```

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use panel_align::config::{KeySchema, MergeConfig};
use panel_align::io::{list_table_files, load_panel};
use panel_align::pipeline::{merge_files, MergeReport};
use panel_align::table::CombinedTable;
use panel_align::types::DuplicateKeys;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

const DEFAULT_FACTORS_FILE: &str = "combined_factors.parquet";
const DEFAULT_RETURNS_FILE: &str = "returns.parquet";
const DEFAULT_OUTPUT_FILE: &str = "new_total_data.parquet";

/// panel-align: label factor panels with next-period returns
#[derive(Parser)]
#[command(name = "panel-align")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Label factor panels with next-period returns", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge a factor panel with a return panel
    Merge {
        /// Factor (feature) table
        #[arg(short = 'f', long)]
        factors_file: Option<PathBuf>,

        /// Return (label) table
        #[arg(short = 'r', long)]
        returns_file: Option<PathBuf>,

        /// Output table, overwritten if it exists
        #[arg(short = 'o', long)]
        output_file: Option<PathBuf>,

        /// Keep rows that contain missing values
        #[arg(long)]
        keep_missing: bool,

        /// Align entities in parallel
        #[arg(short = 'p', long)]
        parallel: bool,

        #[command(flatten)]
        schema: SchemaArgs,

        /// Number of sample rows to print
        #[arg(short = 'n', long, default_value = "5")]
        rows: usize,

        /// Save a JSON report of the run
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Print shape, columns and first rows of stored tables
    Inspect {
        /// Table file, or a directory of .csv/.parquet tables
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Number of rows to print
        #[arg(short = 'n', long, default_value = "5")]
        rows: usize,

        #[command(flatten)]
        schema: SchemaArgs,
    },

    /// Show build and configuration information
    Info,
}

/// Key column overrides shared by all table-reading commands
#[derive(clap::Args, Default)]
struct SchemaArgs {
    /// Entity key column name
    #[arg(long)]
    entity_column: Option<String>,

    /// Date key column name
    #[arg(long)]
    date_column: Option<String>,

    /// Date format for text dates (chrono syntax)
    #[arg(long)]
    date_format: Option<String>,

    /// Fail on duplicate (entity, date) keys instead of keeping the last one
    #[arg(long)]
    reject_duplicates: bool,
}

impl SchemaArgs {
    fn apply(&self, mut schema: KeySchema) -> KeySchema {
        if let Some(ref c) = self.entity_column {
            schema.entity_column = c.clone();
        }
        if let Some(ref c) = self.date_column {
            schema.date_column = c.clone();
        }
        if let Some(ref f) = self.date_format {
            schema.date_format = f.clone();
        }
        if self.reject_duplicates {
            schema.duplicates = DuplicateKeys::Reject;
        }
        schema
    }
}

/// Configuration file structure; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
    factors_file: Option<PathBuf>,
    returns_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
    drop_missing: Option<bool>,
    parallel: Option<bool>,
    #[serde(default)]
    schema: KeySchema,
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".panel-align").join("config.toml"))
}

impl FileConfig {
    /// Load an explicit config file, or the default one if it exists
    fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(config_path) = path {
            let contents = fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config {}", config_path.display()))?;
            return toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config {}", config_path.display()));
        }

        if let Some(default_config) = default_config_path() {
            if default_config.exists() {
                match fs::read_to_string(&default_config)
                    .map_err(anyhow::Error::from)
                    .and_then(|contents| {
                        toml::from_str::<FileConfig>(&contents).map_err(anyhow::Error::from)
                    })
                {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        eprintln!(
                            "{} Ignoring {}: {}",
                            "Warning:".yellow(),
                            default_config.display(),
                            e
                        );
                    }
                }
            }
        }

        Ok(FileConfig::default())
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let result = FileConfig::load(cli.config.as_deref()).and_then(|file_config| {
        match cli.command {
            Commands::Merge {
                factors_file,
                returns_file,
                output_file,
                keep_missing,
                parallel,
                schema,
                rows,
                report,
            } => {
                let config = MergeConfig {
                    factors_file: factors_file
                        .or(file_config.factors_file)
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_FACTORS_FILE)),
                    returns_file: returns_file
                        .or(file_config.returns_file)
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_RETURNS_FILE)),
                    output_file: output_file
                        .or(file_config.output_file)
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_FILE)),
                    drop_missing: !keep_missing && file_config.drop_missing.unwrap_or(true),
                    parallel: parallel || file_config.parallel.unwrap_or(false),
                    schema: schema.apply(file_config.schema),
                };
                run_merge(&config, rows, report.as_deref(), cli.verbose)
            }

            Commands::Inspect { path, rows, schema } => {
                inspect(&path, rows, &schema.apply(file_config.schema))
            }

            Commands::Info => show_info(),
        }
    });

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn spinner(message: &str) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn run_merge(
    config: &MergeConfig,
    rows: usize,
    report_path: Option<&Path>,
    verbose: bool,
) -> anyhow::Result<()> {
    println!("{}", "Merging factor and return panels...".cyan().bold());
    println!();

    if verbose {
        println!("  {} {}", "Factors:".bold(), config.factors_file.display());
        println!("  {} {}", "Returns:".bold(), config.returns_file.display());
        println!("  {} {}", "Output:".bold(), config.output_file.display());
        println!("  {} {}", "Drop missing:".bold(), config.drop_missing);
        println!("  {} {}", "Parallel:".bold(), config.parallel);
        println!();
    }

    let pb = spinner("Loading, aligning and writing...")?;
    let merged = merge_files(config);
    pb.finish_and_clear();
    let (table, report) = merged?;

    print_summary(&table, &report, rows);

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        println!("{} Report saved to: {}", "✓".green().bold(), path.display());
    }

    Ok(())
}

fn print_summary(table: &CombinedTable, report: &MergeReport, rows: usize) {
    let stats = &report.stats;

    println!("{}", "Merge Summary".green().bold());
    println!("{}", "=============".green());
    println!("  {} {}", "Factor data shape:".bold(), report.factors_shape);
    println!("  {} {}", "Return data shape:".bold(), report.returns_shape);
    println!("  {} {}", "Entities:".bold(), stats.entities);
    if stats.skipped_entities > 0 {
        println!(
            "  {} {}",
            "Without returns:".bold(),
            stats.skipped_entities.to_string().yellow()
        );
    }
    println!("  {} {}", "Rows before filter:".bold(), stats.rows_before_filter);
    println!("  {} {}", "Missing values:".bold(), stats.missing_values);
    println!("  {} {}", "Rows with missing:".bold(), stats.rows_with_missing);
    if report.drop_missing {
        println!("  {} {}", "Rows dropped:".bold(), stats.rows_dropped.to_string().red());
    }
    println!(
        "  {} {}",
        "Output shape:".bold(),
        report.output_shape.to_string().bright_green().bold()
    );
    println!("  {} {}", "Columns:".bold(), report.columns.join(", ").dimmed());
    println!("  {} {} ms", "Elapsed:".bold(), report.elapsed_ms);
    println!();

    if rows > 0 {
        println!("{}", format!("Sample (first {} rows)", rows).bold());
        print!("{}", table.head(rows));
        println!();
    }

    println!(
        "{} Data saved to {}",
        "✓".green().bold(),
        report.output_file.display()
    );
}

fn inspect(path: &Path, rows: usize, schema: &KeySchema) -> anyhow::Result<()> {
    if path.is_dir() {
        let files = list_table_files(path)?;
        if files.is_empty() {
            bail!("No .csv or .parquet tables found in {}", path.display());
        }

        println!("{}", "Found tables:".cyan().bold());
        for (idx, file) in files.iter().enumerate() {
            println!("  {}. {}", idx + 1, file_name(file).bright_green());
        }
        println!();

        for file in &files {
            if let Err(e) = inspect_file(file, rows, schema) {
                eprintln!("{} {}: {:#}", "Error reading".red().bold(), file_name(file), e);
            }
        }
        Ok(())
    } else {
        inspect_file(path, rows, schema)
    }
}

fn inspect_file(path: &Path, rows: usize, schema: &KeySchema) -> anyhow::Result<()> {
    let panel = load_panel(path, schema)?;

    println!("{} {}", "File:".bold(), file_name(path).bright_green().bold());
    println!("{} {}", "Shape:".bold(), panel.shape());
    println!("{} {}", "Entities:".bold(), panel.entity_count());
    println!("{} {}", "Columns:".bold(), panel.columns().join(", "));
    println!();
    println!("{}", format!("First {} rows:", rows).bold());
    print!("{}", panel.preview(rows));
    println!("{}", "=".repeat(100).dimmed());
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn show_info() -> anyhow::Result<()> {
    println!(
        "{} {}",
        "panel-align".cyan().bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("{}", env!("CARGO_PKG_DESCRIPTION"));
    println!();

    println!("{}", "System Information".bold());
    println!("{}", "==================".dimmed());
    println!("  {} {}", "Platform:".bold(), std::env::consts::OS);
    println!("  {} {}", "Architecture:".bold(), std::env::consts::ARCH);
    println!("  {} {}", "Threads:".bold(), rayon::current_num_threads());
    println!();

    let schema = KeySchema::default();
    println!("{}", "Defaults".bold());
    println!("{}", "========".dimmed());
    println!("  {} {}", "Formats:".bold(), "csv, parquet");
    println!("  {} {}", "Entity column:".bold(), schema.entity_column);
    println!("  {} {}", "Date column:".bold(), schema.date_column);
    println!("  {} {}", "Date format:".bold(), schema.date_format);
    match default_config_path() {
        Some(path) => {
            let status = if path.exists() { "found".green() } else { "not found".dimmed() };
            println!("  {} {} ({})", "Config file:".bold(), path.display(), status);
        }
        None => println!("  {} {}", "Config file:".bold(), "no home directory".dimmed()),
    }
    println!();

    Ok(())
}
