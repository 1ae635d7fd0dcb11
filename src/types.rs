//! Core types and constants

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity identifier (instrument code), the outer key of a panel
pub type Entity = String;

/// Observation date, the inner key of a panel
///
/// Panels are daily; loaders reject timestamps that are not at midnight.
pub type Date = NaiveDate;

/// Default name of the entity key column
pub const DEFAULT_ENTITY_COLUMN: &str = "instrument";

/// Default name of the date key column
pub const DEFAULT_DATE_COLUMN: &str = "datetime";

/// Default date format for text-encoded dates
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Composite (entity, date) row key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PanelKey {
    pub entity: Entity,
    pub date: Date,
}

impl PanelKey {
    /// Create a new key
    pub fn new(entity: impl Into<Entity>, date: Date) -> Self {
        Self {
            entity: entity.into(),
            date,
        }
    }
}

impl fmt::Display for PanelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.entity, self.date)
    }
}

/// Table shape as (rows, columns), key columns excluded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Shape {
    pub rows: usize,
    pub columns: usize,
}

impl Shape {
    pub fn new(rows: usize, columns: usize) -> Self {
        Self { rows, columns }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.rows, self.columns)
    }
}

/// What to do when a panel contains the same (entity, date) key twice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeys {
    /// A later row overwrites the earlier one
    #[default]
    KeepLast,
    /// Loading fails with `AlignError::DuplicateKey`
    Reject,
}
