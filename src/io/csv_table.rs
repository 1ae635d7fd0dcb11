//! CSV panels
//!
//! Layout: a header row naming the entity column, the date column and every
//! value column. Value columns are all non-key columns in header order.

use crate::config::KeySchema;
use crate::error::{AlignError, Result};
use crate::io::{check_value_columns, parse_date, parse_value};
use crate::panel::Panel;
use crate::table::CombinedTable;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::path::Path;

/// Read a CSV file into a panel
pub fn read_panel(path: &Path, schema: &KeySchema) -> Result<Panel> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| AlignError::Schema(format!("Failed to open CSV {}: {}", name, e)))?;

    let headers = rdr.headers()?.clone();
    let entity_idx = find_column(&headers, &schema.entity_column, &name)?;
    let date_idx = find_column(&headers, &schema.date_column, &name)?;
    let value_idx: Vec<usize> = (0..headers.len())
        .filter(|&i| i != entity_idx && i != date_idx)
        .collect();

    let value_names: Vec<String> = value_idx
        .iter()
        .map(|&i| headers[i].trim().to_string())
        .collect();
    check_value_columns(&value_names, schema, &name)?;

    let mut panel = Panel::new(value_names)
        .with_duplicates(schema.duplicates)
        .with_name(name.clone());

    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        // Header is line 1
        let line = row + 2;

        if record.len() != headers.len() {
            return Err(AlignError::Schema(format!(
                "{}: line {} has {} fields, expected {}",
                name,
                line,
                record.len(),
                headers.len()
            )));
        }

        let entity = record[entity_idx].trim();
        if entity.is_empty() {
            return Err(AlignError::Parse(format!("{}: line {} has no entity", name, line)));
        }

        let date = parse_date(&record[date_idx], &schema.date_format)
            .map_err(|reason| AlignError::Parse(format!("{}: line {} has {}", name, line, reason)))?;

        let values = value_idx
            .iter()
            .map(|&i| {
                parse_value(&record[i]).ok_or_else(|| {
                    AlignError::Parse(format!(
                        "{}: line {} column '{}' is not numeric: '{}'",
                        name,
                        line,
                        headers[i].trim(),
                        &record[i]
                    ))
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        panel.insert(entity, date, values)?;
    }

    Ok(panel)
}

/// Write a combined table as CSV, truncating any existing file
pub fn write_table(table: &CombinedTable, path: &Path, schema: &KeySchema) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_path(path)?;

    let mut header = Vec::with_capacity(table.width() + 2);
    header.push(schema.entity_column.as_str());
    header.push(schema.date_column.as_str());
    header.extend(table.columns().iter().map(String::as_str));
    wtr.write_record(&header)?;

    let mut record = Vec::with_capacity(table.width() + 2);
    for (key, row) in table.iter() {
        record.clear();
        record.push(key.entity.clone());
        record.push(key.date.format(&schema.date_format).to_string());
        record.extend(row.iter().map(|v| v.to_string()));
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Find column index by name
fn find_column(headers: &StringRecord, name: &str, source: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| AlignError::Schema(format!("{}: column '{}' not found", source, name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DuplicateKeys, PanelKey};
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, day).unwrap()
    }

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "{}", contents).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_read_panel() {
        let file = csv_file(
            "instrument,datetime,f1,f2\n\
             SH600000,2020-01-02,1.5,2.5\n\
             SH600000,2020-01-01,0.5,\n\
             SZ000001,2020-01-01,3.0,NaN\n",
        );

        let panel = read_panel(file.path(), &KeySchema::default()).unwrap();
        assert_eq!(panel.columns(), &["f1".to_string(), "f2".to_string()]);
        assert_eq!(panel.len(), 3);
        assert_eq!(panel.entity_count(), 2);
        assert_eq!(panel.get("SH600000", &d(2)), Some(&[1.5, 2.5][..]));
        assert!(panel.get("SH600000", &d(1)).unwrap()[1].is_nan());
        assert!(panel.get("SZ000001", &d(1)).unwrap()[1].is_nan());
    }

    #[test]
    fn test_key_columns_anywhere_in_header() {
        let file = csv_file("r,DateTime,Instrument\n0.1,2020-01-03,A\n");

        let panel = read_panel(file.path(), &KeySchema::default()).unwrap();
        assert_eq!(panel.columns(), &["r".to_string()]);
        assert_eq!(panel.get("A", &d(3)), Some(&[0.1][..]));
    }

    #[test]
    fn test_missing_key_column() {
        let file = csv_file("ticker,datetime,f1\nA,2020-01-01,1.0\n");
        let err = read_panel(file.path(), &KeySchema::default()).unwrap_err();
        assert!(err.to_string().contains("'instrument' not found"));
    }

    #[test]
    fn test_ragged_row_is_schema_error() {
        let file = csv_file("instrument,datetime,f1,f2\nA,2020-01-01,1.0\n");
        let err = read_panel(file.path(), &KeySchema::default()).unwrap_err();
        assert!(matches!(err, AlignError::Schema(_)));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_non_numeric_value() {
        let file = csv_file("instrument,datetime,f1\nA,2020-01-01,abc\n");
        let err = read_panel(file.path(), &KeySchema::default()).unwrap_err();
        assert!(matches!(err, AlignError::Parse(_)));
        assert!(err.to_string().contains("'f1'"));
    }

    #[test]
    fn test_invalid_date() {
        let file = csv_file("instrument,datetime,f1\nA,01/02/2020,1.0\n");
        let err = read_panel(file.path(), &KeySchema::default()).unwrap_err();
        assert!(err.to_string().contains("invalid date"));
    }

    #[test]
    fn test_value_headers_trimmed() {
        let file = csv_file("instrument, datetime, f1 , r\nA,2020-01-01,1.0,0.5\n");

        let panel = read_panel(file.path(), &KeySchema::default()).unwrap();
        assert_eq!(panel.columns(), &["f1".to_string(), "r".to_string()]);
        assert_eq!(panel.get("A", &d(1)), Some(&[1.0, 0.5][..]));
    }

    #[test]
    fn test_duplicate_value_columns_rejected() {
        let file = csv_file("instrument,datetime,f1,f1\nA,2020-01-01,1.0,2.0\n");
        let err = read_panel(file.path(), &KeySchema::default()).unwrap_err();
        assert!(matches!(err, AlignError::Schema(_)));
        assert!(err.to_string().contains("duplicate column 'f1'"));

        // Repeats that only differ by padding are the same column
        let file = csv_file("instrument,datetime,f1, f1\nA,2020-01-01,1.0,2.0\n");
        let err = read_panel(file.path(), &KeySchema::default()).unwrap_err();
        assert!(matches!(err, AlignError::Schema(_)));
    }

    #[test]
    fn test_intraday_keys_rejected() {
        let file = csv_file(
            "instrument,datetime,f1\n\
             A,2020-01-01 09:30:00,1.0\n\
             A,2020-01-01 15:00:00,2.0\n",
        );
        let err = read_panel(file.path(), &KeySchema::default()).unwrap_err();
        assert!(matches!(err, AlignError::Parse(_)));
        assert!(err.to_string().contains("line 2"));
        assert!(err.to_string().contains("intraday"));
    }

    #[test]
    fn test_midnight_timestamps_accepted() {
        let file = csv_file("instrument,datetime,f1\nA,2020-01-01 00:00:00,1.0\n");
        let panel = read_panel(file.path(), &KeySchema::default()).unwrap();
        assert_eq!(panel.get("A", &d(1)), Some(&[1.0][..]));
    }

    #[test]
    fn test_custom_schema() {
        let file = csv_file("ticker,day,f1\nA,02/01/2020,1.0\nA,02/01/2020,2.0\n");
        let schema = KeySchema {
            entity_column: "ticker".to_string(),
            date_column: "day".to_string(),
            date_format: "%d/%m/%Y".to_string(),
            duplicates: DuplicateKeys::KeepLast,
        };

        let panel = read_panel(file.path(), &schema).unwrap();
        assert_eq!(panel.len(), 1);
        assert_eq!(panel.get("A", &d(2)), Some(&[2.0][..]));

        let strict = KeySchema {
            duplicates: DuplicateKeys::Reject,
            ..schema
        };
        let err = read_panel(file.path(), &strict).unwrap_err();
        assert!(matches!(err, AlignError::DuplicateKey { .. }));
    }

    #[test]
    fn test_write_table() {
        let mut table = CombinedTable::with_capacity(vec!["f1".into(), "r".into()], 1, 2);
        table.push_row(PanelKey::new("A", d(1)), &[1.0, 0.1]);
        table.push_row(PanelKey::new("A", d(2)), &[2.0, f64::NAN]);

        let out = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write_table(&table, out.path(), &KeySchema::default()).unwrap();

        let text = std::fs::read_to_string(out.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "instrument,datetime,f1,r");
        assert_eq!(lines[1], "A,2020-01-01,1,0.1");
        assert_eq!(lines[2], "A,2020-01-02,2,NaN");
    }
}
