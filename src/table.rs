//! Combined feature/label table

use crate::types::{PanelKey, Shape};
use std::fmt;

/// Labeled dataset keyed by (entity, feature date)
///
/// Values are stored row-major in one flat buffer of `rows × width` cells.
/// Keys are unique and kept in (entity, date) ascending order as assembled.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedTable {
    columns: Vec<String>,
    /// Number of leading columns that come from the feature panel
    feature_width: usize,
    keys: Vec<PanelKey>,
    values: Vec<f64>,
}

impl CombinedTable {
    /// Create an empty table with buffers sized for `rows` rows
    pub fn with_capacity(columns: Vec<String>, feature_width: usize, rows: usize) -> Self {
        let width = columns.len();
        Self {
            columns,
            feature_width,
            keys: Vec::with_capacity(rows),
            values: Vec::with_capacity(rows * width),
        }
    }

    /// Append one row
    ///
    /// # Panics
    /// Panics if `row.len()` differs from the column count. Callers build rows
    /// from width-checked panels.
    pub fn push_row(&mut self, key: PanelKey, row: &[f64]) {
        assert_eq!(row.len(), self.columns.len(), "row width mismatch for {}", key);
        self.keys.push(key);
        self.values.extend_from_slice(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Feature column names
    pub fn feature_columns(&self) -> &[String] {
        &self.columns[..self.feature_width]
    }

    /// Outcome (label) column names
    pub fn outcome_columns(&self) -> &[String] {
        &self.columns[self.feature_width..]
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn shape(&self) -> Shape {
        Shape::new(self.len(), self.width())
    }

    pub fn keys(&self) -> &[PanelKey] {
        &self.keys
    }

    /// Values of row `idx`
    pub fn row(&self, idx: usize) -> Option<&[f64]> {
        let width = self.width();
        if idx >= self.len() {
            return None;
        }
        Some(&self.values[idx * width..(idx + 1) * width])
    }

    /// Row lookup by key
    pub fn get(&self, key: &PanelKey) -> Option<&[f64]> {
        self.keys
            .binary_search(key)
            .ok()
            .and_then(|idx| self.row(idx))
    }

    /// Iterate rows in stored order
    pub fn iter(&self) -> impl Iterator<Item = (&PanelKey, &[f64])> {
        let width = self.width();
        (0..self.len()).map(move |i| (&self.keys[i], &self.values[i * width..(i + 1) * width]))
    }

    /// Total number of NaN cells
    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_nan()).count()
    }

    /// Number of rows containing at least one NaN cell
    pub fn rows_with_missing(&self) -> usize {
        self.iter().filter(|(_, row)| row.iter().any(|v| v.is_nan())).count()
    }

    /// Remove every row with a NaN in any column, returning the number removed
    pub fn drop_missing(&mut self) -> usize {
        let width = self.width();
        let before = self.len();
        if width == 0 {
            return 0;
        }

        let mut keys = Vec::with_capacity(before);
        let mut values = Vec::with_capacity(self.values.len());
        for (key, row) in self.keys.drain(..).zip(self.values.chunks(width)) {
            if row.iter().all(|v| !v.is_nan()) {
                keys.push(key);
                values.extend_from_slice(row);
            }
        }

        self.keys = keys;
        self.values = values;
        before - self.len()
    }

    /// Copy of the first `n` rows
    pub fn head(&self, n: usize) -> CombinedTable {
        let n = n.min(self.len());
        Self {
            columns: self.columns.clone(),
            feature_width: self.feature_width,
            keys: self.keys[..n].to_vec(),
            values: self.values[..n * self.width()].to_vec(),
        }
    }
}

impl fmt::Display for CombinedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: Vec<(&PanelKey, &[f64])> = self.iter().collect();
        format_rows(f, &self.columns, &rows)
    }
}

/// Render keyed rows as an aligned text grid
pub(crate) fn format_rows(
    f: &mut fmt::Formatter<'_>,
    columns: &[String],
    rows: &[(&PanelKey, &[f64])],
) -> fmt::Result {
    let entity_w = rows
        .iter()
        .map(|(k, _)| k.entity.len())
        .max()
        .unwrap_or(0)
        .max("entity".len());
    let date_w = 10;

    write!(f, "{:<entity_w$}  {:<date_w$}", "entity", "date")?;
    let widths: Vec<usize> = columns.iter().map(|c| c.len().max(10)).collect();
    for (col, w) in columns.iter().zip(&widths) {
        write!(f, "  {:>w$}", col, w = *w)?;
    }
    writeln!(f)?;

    for (key, row) in rows {
        write!(f, "{:<entity_w$}  {:<date_w$}", key.entity, key.date.to_string())?;
        for (value, w) in row.iter().zip(&widths) {
            write!(f, "  {:>w$.6}", value, w = *w)?;
        }
        writeln!(f)?;
    }
    Ok(())
}
