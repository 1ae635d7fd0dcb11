//! Table loading and writing
//!
//! Stored tables have one entity column, one date column and any number of
//! numeric value columns. The file extension selects the format.

pub mod csv_table;
pub mod parquet_table;

use crate::config::KeySchema;
use crate::error::{AlignError, Result};
use crate::panel::Panel;
use crate::table::CombinedTable;
use crate::types::Date;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use hashbrown::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Days between 0001-01-01 (CE) and 1970-01-01
pub(crate) const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// On-disk table format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Parquet,
}

impl TableFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Ok(TableFormat::Csv),
            "parquet" | "pq" => Ok(TableFormat::Parquet),
            _ => Err(AlignError::UnsupportedFormat(format!(
                "{} (expected .csv or .parquet)",
                path.display()
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TableFormat::Csv => "csv",
            TableFormat::Parquet => "parquet",
        }
    }
}

/// Load a stored table as a panel
///
/// Fails with `AlignError::DataUnavailable` if `path` does not exist.
pub fn load_panel(path: &Path, schema: &KeySchema) -> Result<Panel> {
    if !path.is_file() {
        return Err(AlignError::DataUnavailable {
            path: path.to_path_buf(),
        });
    }

    let panel = match TableFormat::from_path(path)? {
        TableFormat::Csv => csv_table::read_panel(path, schema)?,
        TableFormat::Parquet => parquet_table::read_panel(path, schema)?,
    };

    log::debug!("Loaded {} with shape {}", path.display(), panel.shape());
    Ok(panel)
}

/// Write a combined table, replacing any existing file at `path`
///
/// The table is first written next to the destination and then renamed into
/// place, so a failed write never leaves a truncated output behind.
pub fn write_table(table: &CombinedTable, path: &Path, schema: &KeySchema) -> Result<()> {
    let format = TableFormat::from_path(path)?;
    let staging = staging_path(path);

    let written = match format {
        TableFormat::Csv => csv_table::write_table(table, &staging, schema),
        TableFormat::Parquet => parquet_table::write_table(table, &staging, schema),
    };

    if let Err(e) = written {
        let _ = fs::remove_file(&staging);
        return Err(e);
    }

    if let Err(e) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(e.into());
    }
    log::debug!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

/// Supported table files directly inside `dir`, sorted by name
pub fn list_table_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(AlignError::DataUnavailable {
            path: dir.to_path_buf(),
        });
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && TableFormat::from_path(p).is_ok())
        .collect();
    files.sort();
    Ok(files)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Reject value column names that repeat or shadow a key column
pub(crate) fn check_value_columns(names: &[String], schema: &KeySchema, source: &str) -> Result<()> {
    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if schema.is_key_column(name) {
            return Err(AlignError::Schema(format!(
                "{}: key column '{}' appears more than once",
                source, name
            )));
        }
        if !seen.insert(name.as_str()) {
            return Err(AlignError::Schema(format!(
                "{}: duplicate column '{}'",
                source, name
            )));
        }
    }
    Ok(())
}

/// Parse a text-encoded key into a calendar date
///
/// A trailing time component is accepted only when it is midnight. The error
/// is a short reason meant to be prefixed with the file and row.
pub(crate) fn parse_date(text: &str, format: &str) -> std::result::Result<Date, String> {
    let text = text.trim();
    let timestamp = NaiveDateTime::parse_from_str(text, format)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .or_else(|| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").ok())
        .or_else(|| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S").ok())
        .ok_or_else(|| format!("invalid date '{}' (format {})", text, format))?;

    calendar_date(timestamp)
}

/// Date of a midnight timestamp
pub(crate) fn calendar_date(timestamp: NaiveDateTime) -> std::result::Result<Date, String> {
    if timestamp.num_seconds_from_midnight() != 0 || timestamp.nanosecond() != 0 {
        return Err(format!(
            "intraday timestamp '{}'; keys must be calendar dates",
            timestamp
        ));
    }
    Ok(timestamp.date())
}

/// Date from a day count relative to 1970-01-01
pub(crate) fn date_from_epoch_days(days: i64) -> Option<Date> {
    let days = i32::try_from(days).ok()?.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?;
    NaiveDate::from_num_days_from_ce_opt(days)
}

/// Day count relative to 1970-01-01
pub(crate) fn epoch_days(date: &Date) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Parse a numeric cell; empty and NaN-like cells are missing values
pub(crate) fn parse_value(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("nan") || text.eq_ignore_ascii_case("null") {
        return Some(f64::NAN);
    }
    text.parse().ok()
}
