//! File-level merge: load both panels, align, write the combined table

use crate::align::{merge_with, MergeStats};
use crate::config::MergeConfig;
use crate::error::{AlignError, Result};
use crate::io::{load_panel, write_table};
use crate::table::CombinedTable;
use crate::types::Shape;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

/// Summary of a completed merge run
#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub factors_file: PathBuf,
    pub returns_file: PathBuf,
    pub output_file: PathBuf,
    pub factors_shape: Shape,
    pub returns_shape: Shape,
    pub output_shape: Shape,
    pub columns: Vec<String>,
    pub drop_missing: bool,
    pub stats: MergeStats,
    pub elapsed_ms: u64,
}

/// Run a merge end to end
///
/// Both inputs are checked before anything is read; if either is missing
/// the run fails with `AlignError::DataUnavailable` and no output is
/// written. The combined table is returned along with the report.
pub fn merge_files(config: &MergeConfig) -> Result<(CombinedTable, MergeReport)> {
    config.validate()?;
    let start = Instant::now();

    for path in [&config.factors_file, &config.returns_file] {
        if !path.is_file() {
            log::error!("Input file not found: {}", path.display());
            return Err(AlignError::DataUnavailable { path: path.clone() });
        }
    }

    let factors = load_panel(&config.factors_file, &config.schema)?;
    let returns = load_panel(&config.returns_file, &config.schema)?;

    let outcome = merge_with(&factors, &returns, &config.merge_options())?;

    log::info!("Saving to {}...", config.output_file.display());
    write_table(&outcome.table, &config.output_file, &config.schema)?;
    log::info!("Saved {} rows to {}", outcome.table.len(), config.output_file.display());

    let report = MergeReport {
        factors_file: config.factors_file.clone(),
        returns_file: config.returns_file.clone(),
        output_file: config.output_file.clone(),
        factors_shape: factors.shape(),
        returns_shape: returns.shape(),
        output_shape: outcome.table.shape(),
        columns: outcome.table.columns().to_vec(),
        drop_missing: config.drop_missing,
        stats: outcome.stats,
        elapsed_ms: start.elapsed().as_millis() as u64,
    };

    Ok((outcome.table, report))
}
