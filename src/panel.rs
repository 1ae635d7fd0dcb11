//! Keyed panels: (entity, date) → fixed-width numeric row

use crate::error::{AlignError, Result};
use crate::table::format_rows;
use crate::types::{Date, DuplicateKeys, Entity, PanelKey, Shape};
use std::collections::BTreeMap;
use std::fmt;

/// Date-indexed rows of a single entity, sorted ascending by date
pub type EntityRows = BTreeMap<Date, Vec<f64>>;

/// A panel of per-entity, per-date numeric vectors
///
/// Every row has exactly `columns.len()` values. Entities and dates are kept
/// in ascending order, so iteration is deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    /// Value column names in declared order
    columns: Vec<String>,
    /// Entity → (date → row)
    rows: BTreeMap<Entity, EntityRows>,
    /// Duplicate key handling on insert
    duplicates: DuplicateKeys,
    /// Label used in error messages (usually the source file)
    name: String,
    /// Number of stored observations
    len: usize,
}

impl Panel {
    /// Create a new empty panel with the given value columns
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: BTreeMap::new(),
            duplicates: DuplicateKeys::default(),
            name: "panel".to_string(),
            len: 0,
        }
    }

    /// Set the duplicate key policy
    pub fn with_duplicates(mut self, duplicates: DuplicateKeys) -> Self {
        self.duplicates = duplicates;
        self
    }

    /// Set the name reported in errors
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Insert one observation
    ///
    /// Fails if the row width does not match the panel's column count, or if
    /// the key already exists under `DuplicateKeys::Reject`.
    pub fn insert(&mut self, entity: impl Into<Entity>, date: Date, values: Vec<f64>) -> Result<()> {
        let entity = entity.into();
        if values.len() != self.columns.len() {
            return Err(AlignError::Schema(format!(
                "{}: row ({}, {}) has {} values, expected {}",
                self.name,
                entity,
                date,
                values.len(),
                self.columns.len()
            )));
        }

        let dates = self.rows.entry(entity.clone()).or_default();
        if dates.contains_key(&date) {
            if self.duplicates == DuplicateKeys::Reject {
                return Err(AlignError::DuplicateKey {
                    entity,
                    date,
                    source_name: self.name.clone(),
                });
            }
            log::debug!("{}: duplicate key ({}, {}) overwritten", self.name, entity, date);
        } else {
            self.len += 1;
        }
        dates.insert(date, values);
        Ok(())
    }

    /// Value column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Row width
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Number of observations
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Shape as (observations, value columns)
    pub fn shape(&self) -> Shape {
        Shape::new(self.len, self.columns.len())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of distinct entities
    pub fn entity_count(&self) -> usize {
        self.rows.len()
    }

    /// Distinct entities in ascending order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.rows.keys()
    }

    /// Date-indexed rows of one entity
    pub fn entity(&self, entity: &str) -> Option<&EntityRows> {
        self.rows.get(entity)
    }

    /// Iterate entities with their rows, in ascending entity order
    pub fn iter_entities(&self) -> impl Iterator<Item = (&Entity, &EntityRows)> {
        self.rows.iter()
    }

    /// Single-key lookup
    pub fn get(&self, entity: &str, date: &Date) -> Option<&[f64]> {
        self.rows
            .get(entity)
            .and_then(|dates| dates.get(date))
            .map(|v| v.as_slice())
    }

    /// Iterate all observations in (entity, date) order
    pub fn iter(&self) -> impl Iterator<Item = (PanelKey, &[f64])> {
        self.rows.iter().flat_map(|(entity, dates)| {
            dates
                .iter()
                .map(move |(date, values)| (PanelKey::new(entity.clone(), *date), values.as_slice()))
        })
    }

    /// First `n` observations in (entity, date) order
    pub fn head(&self, n: usize) -> Vec<(PanelKey, &[f64])> {
        self.iter().take(n).collect()
    }

    /// Text grid of the first `n` observations
    pub fn preview(&self, n: usize) -> String {
        struct Preview<'a>(&'a Panel, usize);

        impl fmt::Display for Preview<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let head = self.0.head(self.1);
                let rows: Vec<(&PanelKey, &[f64])> = head.iter().map(|(k, v)| (k, *v)).collect();
                format_rows(f, &self.0.columns, &rows)
            }
        }

        Preview(self, n).to_string()
    }
}
