//! Merge configuration
//!
//! Configuration is plain data with serde defaults, so it can be built in
//! code or read from a TOML file:
//!
//! ```toml
//! factors_file = "combined_factors.parquet"
//! returns_file = "returns.parquet"
//! output_file = "total_data.parquet"
//! drop_missing = true
//!
//! [schema]
//! entity_column = "instrument"
//! date_column = "datetime"
//! duplicates = "keep_last"
//! ```

use crate::align::MergeOptions;
use crate::error::{AlignError, Result};
use crate::types::{
    DuplicateKeys, DEFAULT_DATE_COLUMN, DEFAULT_DATE_FORMAT, DEFAULT_ENTITY_COLUMN,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Names and encodings of the two key columns of every stored table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeySchema {
    /// Entity key column name
    pub entity_column: String,
    /// Date key column name
    pub date_column: String,
    /// chrono format for text-encoded dates
    pub date_format: String,
    /// Duplicate (entity, date) handling when loading
    pub duplicates: DuplicateKeys,
}

impl Default for KeySchema {
    fn default() -> Self {
        Self {
            entity_column: DEFAULT_ENTITY_COLUMN.to_string(),
            date_column: DEFAULT_DATE_COLUMN.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            duplicates: DuplicateKeys::default(),
        }
    }
}

impl KeySchema {
    /// True if `name` is one of the key columns (case-insensitive)
    pub fn is_key_column(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case(&self.entity_column) || name.eq_ignore_ascii_case(&self.date_column)
    }
}

/// Parameters of one merge run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Feature (factor) panel path
    pub factors_file: PathBuf,
    /// Outcome (return) panel path
    pub returns_file: PathBuf,
    /// Destination of the combined table, overwritten if present
    pub output_file: PathBuf,
    #[serde(default = "default_drop_missing")]
    pub drop_missing: bool,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub schema: KeySchema,
}

fn default_drop_missing() -> bool {
    true
}

impl MergeConfig {
    /// Create a config with default policy for the given paths
    pub fn new(
        factors_file: impl Into<PathBuf>,
        returns_file: impl Into<PathBuf>,
        output_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            factors_file: factors_file.into(),
            returns_file: returns_file.into(),
            output_file: output_file.into(),
            drop_missing: default_drop_missing(),
            parallel: false,
            schema: KeySchema::default(),
        }
    }

    /// Parse from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            AlignError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Check the config for contradictions
    pub fn validate(&self) -> Result<()> {
        if self.schema.entity_column.is_empty() || self.schema.date_column.is_empty() {
            return Err(AlignError::Config("key column names must not be empty".to_string()));
        }
        if self.schema.entity_column.eq_ignore_ascii_case(&self.schema.date_column) {
            return Err(AlignError::Config(format!(
                "entity and date columns are both '{}'",
                self.schema.entity_column
            )));
        }
        if same_file(&self.output_file, &self.factors_file)
            || same_file(&self.output_file, &self.returns_file)
        {
            return Err(AlignError::Config(format!(
                "output file {} would overwrite an input",
                self.output_file.display()
            )));
        }
        Ok(())
    }

    /// Aligner options derived from this config
    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            drop_missing: self.drop_missing,
            parallel: self.parallel,
            ..MergeOptions::default()
        }
    }
}

/// Whether two paths name the same file, resolving the parent directories
fn same_file(a: &Path, b: &Path) -> bool {
    match (resolved(a), resolved(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

/// Canonical parent joined with the file name; the file itself may not exist
fn resolved(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    Some(fs::canonicalize(parent).ok()?.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_defaults() {
        let config = MergeConfig::new("f.csv", "r.csv", "out.csv");
        assert!(config.drop_missing);
        assert!(!config.parallel);
        assert_eq!(config.schema.entity_column, "instrument");
        assert_eq!(config.schema.date_column, "datetime");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_minimal() {
        let config = MergeConfig::from_toml_str(
            r#"
            factors_file = "combined_factors.parquet"
            returns_file = "returns.parquet"
            output_file = "total.parquet"
            "#,
        )
        .unwrap();

        assert_eq!(config.factors_file, PathBuf::from("combined_factors.parquet"));
        assert!(config.drop_missing);
        assert_eq!(config.schema, KeySchema::default());
    }

    #[test]
    fn test_from_toml_full() {
        let config = MergeConfig::from_toml_str(
            r#"
            factors_file = "f.csv"
            returns_file = "r.csv"
            output_file = "o.csv"
            drop_missing = false
            parallel = true

            [schema]
            entity_column = "ticker"
            date_format = "%Y/%m/%d"
            duplicates = "reject"
            "#,
        )
        .unwrap();

        assert!(!config.drop_missing);
        assert!(config.parallel);
        assert_eq!(config.schema.entity_column, "ticker");
        assert_eq!(config.schema.date_column, "datetime");
        assert_eq!(config.schema.date_format, "%Y/%m/%d");
        assert_eq!(config.schema.duplicates, DuplicateKeys::Reject);
        assert!(!config.merge_options().drop_missing);
        assert!(config.merge_options().parallel);
    }

    #[test]
    fn test_missing_required_field() {
        let result = MergeConfig::from_toml_str(r#"factors_file = "f.csv""#);
        assert!(matches!(result, Err(AlignError::Toml(_))));
    }

    #[test]
    fn test_output_overwrites_input_rejected() {
        let config = MergeConfig::new("f.csv", "r.csv", "f.csv");
        assert!(matches!(config.validate(), Err(AlignError::Config(_))));
    }

    #[test]
    fn test_output_aliasing_input_rejected() {
        let config = MergeConfig::new("f.csv", "r.csv", "./f.csv");
        assert!(matches!(config.validate(), Err(AlignError::Config(_))));

        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let factors = dir.path().join("factors.csv");
        let output = dir.path().join("sub").join("..").join("factors.csv");
        let config = MergeConfig::new(&factors, dir.path().join("returns.csv"), &output);
        assert!(matches!(config.validate(), Err(AlignError::Config(_))));

        let config = MergeConfig::new(&factors, "r.csv", dir.path().join("sub").join("factors.csv"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_key_column_match() {
        let schema = KeySchema::default();
        assert!(schema.is_key_column("Instrument"));
        assert!(schema.is_key_column("datetime"));
        assert!(!schema.is_key_column("f1"));
    }
}
