//! Entity-wise, date-shifted join of a feature panel with an outcome panel
//!
//! Each feature observation at `(entity, d)` is labeled with the outcome
//! observed at `(entity, d')`, where `d'` is the next date recorded for that
//! entity *in the feature panel*. Gaps in the feature panel therefore skip
//! any outcome observations in between, and `d'` is never derived from the
//! outcome panel or from a calendar offset.
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use panel_align::align::merge;
//! use panel_align::panel::Panel;
//!
//! let day = |d| NaiveDate::from_ymd_opt(2020, 1, d).unwrap();
//!
//! let mut factors = Panel::new(["f1"]);
//! factors.insert("A", day(1), vec![1.0]).unwrap();
//! factors.insert("A", day(2), vec![2.0]).unwrap();
//!
//! let mut returns = Panel::new(["r"]);
//! returns.insert("A", day(2), vec![0.1]).unwrap();
//!
//! let outcome = merge(&factors, &returns, true).unwrap();
//! assert_eq!(outcome.table.len(), 1);
//! assert_eq!(outcome.table.row(0), Some(&[1.0, 0.1][..]));
//! ```

use crate::error::{AlignError, Result};
use crate::panel::{EntityRows, Panel};
use crate::table::CombinedTable;
use crate::types::{Date, Entity, PanelKey, Shape};
use hashbrown::HashSet;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Default number of rows between progress messages
pub const DEFAULT_PROGRESS_INTERVAL: usize = 10_000;

/// Merge behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOptions {
    /// Remove rows with a NaN in any column after assembly
    pub drop_missing: bool,
    /// Compute per-entity batches on the rayon thread pool
    pub parallel: bool,
    /// Rows between progress log messages (0 disables them)
    pub progress_interval: usize,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            drop_missing: true,
            parallel: false,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

/// Counters collected while merging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MergeStats {
    /// Distinct entities in the feature panel
    pub entities: usize,
    /// Feature entities absent from the outcome panel
    pub skipped_entities: usize,
    /// Rows emitted before the missing-value filter
    pub rows_before_filter: usize,
    /// NaN cells before the missing-value filter
    pub missing_values: usize,
    /// Rows with at least one NaN before the filter
    pub rows_with_missing: usize,
    /// Rows removed by the filter
    pub rows_dropped: usize,
}

/// Result of a merge: the combined table plus diagnostics
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub table: CombinedTable,
    pub stats: MergeStats,
}

impl MergeOutcome {
    pub fn shape(&self) -> Shape {
        self.table.shape()
    }
}

/// Rows generated for a single entity
///
/// `values` is row-major with `dates.len()` rows of `F + R` cells.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityBatch {
    pub dates: Vec<Date>,
    pub values: Vec<f64>,
}

impl EntityBatch {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Align one entity's features with its outcomes
///
/// For every pair of consecutive feature dates `(current, next)` the row is
/// `features[current] ++ outcomes[next]`, or `features[current] ++ NaN × R`
/// when the outcome panel has no observation at `next`. The last feature
/// date never produces a row.
pub fn align_entity(features: &EntityRows, outcomes: &EntityRows, outcome_width: usize) -> EntityBatch {
    let rows = features.len().saturating_sub(1);
    let feature_width = features.values().next().map_or(0, Vec::len);
    let mut batch = EntityBatch {
        dates: Vec::with_capacity(rows),
        values: Vec::with_capacity(rows * (feature_width + outcome_width)),
    };

    for ((current, feature_row), (next, _)) in features.iter().zip(features.iter().skip(1)) {
        batch.dates.push(*current);
        batch.values.extend_from_slice(feature_row);
        match outcomes.get(next) {
            Some(outcome_row) => batch.values.extend_from_slice(outcome_row),
            None => batch
                .values
                .extend(std::iter::repeat(f64::NAN).take(outcome_width)),
        }
    }

    batch
}

/// Merge features with next-date outcomes
///
/// Uses `MergeOptions::default()` apart from `drop_missing`.
pub fn merge(features: &Panel, outcomes: &Panel, drop_missing: bool) -> Result<MergeOutcome> {
    let options = MergeOptions {
        drop_missing,
        ..MergeOptions::default()
    };
    merge_with(features, outcomes, &options)
}

/// Merge features with next-date outcomes using explicit options
pub fn merge_with(features: &Panel, outcomes: &Panel, options: &MergeOptions) -> Result<MergeOutcome> {
    let columns = combined_columns(features, outcomes)?;
    let outcome_width = outcomes.width();

    log::info!("Feature panel shape: {}", features.shape());
    log::info!("Outcome panel shape: {}", outcomes.shape());
    log::info!("{} distinct entities", features.entity_count());

    // Entities are already sorted; skip those the outcome panel never mentions
    let work: Vec<(&Entity, &EntityRows, &EntityRows)> = features
        .iter_entities()
        .filter_map(|(entity, rows)| outcomes.entity(entity).map(|o| (entity, rows, o)))
        .collect();
    let skipped = features.entity_count() - work.len();
    if skipped > 0 {
        log::debug!("{} entities have no outcome observations and were skipped", skipped);
    }

    let batches: Vec<(&Entity, EntityBatch)> = if options.parallel {
        work.par_iter()
            .map(|(entity, f, o)| (*entity, align_entity(f, o, outcome_width)))
            .collect()
    } else {
        work.iter()
            .map(|(entity, f, o)| (*entity, align_entity(f, o, outcome_width)))
            .collect()
    };

    let total: usize = batches.iter().map(|(_, b)| b.len()).sum();
    let mut table = CombinedTable::with_capacity(columns, features.width(), total);
    let width = table.width();
    for (entity, batch) in &batches {
        for (i, date) in batch.dates.iter().enumerate() {
            table.push_row(
                PanelKey::new(entity.as_str(), *date),
                &batch.values[i * width..(i + 1) * width],
            );
            if options.progress_interval > 0 && table.len() % options.progress_interval == 0 {
                log::info!("Processed {} rows...", table.len());
            }
        }
    }

    let mut stats = MergeStats {
        entities: features.entity_count(),
        skipped_entities: skipped,
        rows_before_filter: table.len(),
        missing_values: table.missing_count(),
        rows_with_missing: table.rows_with_missing(),
        rows_dropped: 0,
    };

    log::info!("Combined table shape: {}", table.shape());
    log::info!(
        "{} missing values in {} rows",
        stats.missing_values,
        stats.rows_with_missing
    );

    if options.drop_missing && stats.rows_with_missing > 0 {
        let before = table.shape();
        stats.rows_dropped = table.drop_missing();
        log::info!(
            "Dropped rows with missing values, shape {} -> {}",
            before,
            table.shape()
        );
    }

    Ok(MergeOutcome { table, stats })
}

/// Feature columns followed by outcome columns, rejecting repeated names
fn combined_columns(features: &Panel, outcomes: &Panel) -> Result<Vec<String>> {
    for panel in [features, outcomes] {
        let mut seen = HashSet::with_capacity(panel.width());
        if let Some(repeat) = panel.columns().iter().find(|c| !seen.insert(c.as_str())) {
            return Err(AlignError::Schema(format!(
                "column '{}' appears more than once in {}",
                repeat,
                panel.name()
            )));
        }
    }

    let feature_names: HashSet<&str> = features.columns().iter().map(String::as_str).collect();
    if let Some(clash) = outcomes
        .columns()
        .iter()
        .find(|c| feature_names.contains(c.as_str()))
    {
        return Err(AlignError::Schema(format!(
            "column '{}' exists in both {} and {}",
            clash,
            features.name(),
            outcomes.name()
        )));
    }

    Ok(features
        .columns()
        .iter()
        .chain(outcomes.columns())
        .cloned()
        .collect())
}
