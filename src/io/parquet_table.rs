//! Parquet panels via polars
//!
//! The date column may be stored as `Date`, `Datetime` or text. Written
//! tables always use a `Date` column.

use crate::config::KeySchema;
use crate::error::{AlignError, Result};
use crate::io::{check_value_columns, date_from_epoch_days, epoch_days, parse_date};
use crate::panel::Panel;
use crate::table::CombinedTable;
use crate::types::Date;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

const SECONDS_PER_DAY: i64 = 86_400;

/// Read a Parquet file into a panel
pub fn read_panel(path: &Path, schema: &KeySchema) -> Result<Panel> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let file = File::open(path)?;
    let df = ParquetReader::new(file).finish()?;
    panel_from_frame(&df, schema, &name)
}

/// Convert a frame with key and value columns into a panel
pub fn panel_from_frame(df: &DataFrame, schema: &KeySchema, name: &str) -> Result<Panel> {
    let column_names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    let entity_col = find_column(&column_names, &schema.entity_column, name)?;
    let date_col = find_column(&column_names, &schema.date_column, name)?;

    let entity_series = df.column(entity_col)?.cast(&DataType::String)?;
    let entities = entity_series.str()?;
    let dates = date_values(df.column(date_col)?, schema, name)?;

    let value_names: Vec<String> = column_names
        .iter()
        .filter(|c| !schema.is_key_column(c))
        .cloned()
        .collect();
    check_value_columns(&value_names, schema, name)?;

    let mut value_columns: Vec<Vec<f64>> = Vec::with_capacity(value_names.len());
    for col in &value_names {
        let series = df
            .column(col.as_str())?
            .strict_cast(&DataType::Float64)
            .map_err(|e| {
                AlignError::Schema(format!("{}: column '{}' is not numeric: {}", name, col, e))
            })?;
        let values: Vec<f64> = series
            .f64()?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        value_columns.push(values);
    }

    let mut panel = Panel::new(value_names)
        .with_duplicates(schema.duplicates)
        .with_name(name);

    for (row, (entity, date)) in entities.into_iter().zip(dates).enumerate() {
        let entity = entity.filter(|e| !e.trim().is_empty()).ok_or_else(|| {
            AlignError::Parse(format!("{}: row {} has no entity", name, row))
        })?;
        let values = value_columns.iter().map(|col| col[row]).collect();
        panel.insert(entity.trim(), date, values)?;
    }

    Ok(panel)
}

/// Write a combined table as Parquet, truncating any existing file
pub fn write_table(table: &CombinedTable, path: &Path, schema: &KeySchema) -> Result<()> {
    let mut df = frame_from_table(table, schema)?;
    let mut file = File::create(path)?;
    ParquetWriter::new(&mut file).finish(&mut df)?;
    Ok(())
}

/// Convert a combined table into a frame with key columns first
pub fn frame_from_table(table: &CombinedTable, schema: &KeySchema) -> Result<DataFrame> {
    let width = table.width();
    let mut columns: Vec<Series> = Vec::with_capacity(width + 2);

    let entities: Vec<&str> = table.keys().iter().map(|k| k.entity.as_str()).collect();
    columns.push(Series::new(&schema.entity_column, entities));

    let days: Vec<i32> = table.keys().iter().map(|k| epoch_days(&k.date)).collect();
    columns.push(Series::new(&schema.date_column, days).cast(&DataType::Date)?);

    for (j, col) in table.columns().iter().enumerate() {
        let values: Vec<f64> = table.iter().map(|(_, row)| row[j]).collect();
        columns.push(Series::new(col, values));
    }

    Ok(DataFrame::new(columns)?)
}

/// Decode the date column whatever its physical type
///
/// Datetime values must fall on midnight; anything else is a parse error
/// rather than a silent truncation to the calendar date.
fn date_values(series: &Series, schema: &KeySchema, name: &str) -> Result<Vec<Date>> {
    let invalid = |row: usize, reason: String| {
        AlignError::Parse(format!("{}: row {} has {}", name, row, reason))
    };

    match series.dtype() {
        DataType::Date => {
            let days = series.cast(&DataType::Int32)?;
            days.i32()?
                .into_iter()
                .enumerate()
                .map(|(row, v)| {
                    v.and_then(|d| date_from_epoch_days(i64::from(d)))
                        .ok_or_else(|| invalid(row, format!("invalid date {:?}", v)))
                })
                .collect()
        }
        DataType::Datetime(unit, _) => {
            let per_second = match unit {
                TimeUnit::Nanoseconds => 1_000_000_000,
                TimeUnit::Microseconds => 1_000_000,
                TimeUnit::Milliseconds => 1_000,
            };
            let ticks = series.cast(&DataType::Int64)?;
            ticks
                .i64()?
                .into_iter()
                .enumerate()
                .map(|(row, v)| {
                    let ticks = v.ok_or_else(|| invalid(row, "invalid date None".to_string()))?;
                    date_from_ticks(ticks, per_second).map_err(|reason| invalid(row, reason))
                })
                .collect()
        }
        _ => {
            let text = series.cast(&DataType::String)?;
            text.str()?
                .into_iter()
                .enumerate()
                .map(|(row, v)| {
                    let text = v.ok_or_else(|| invalid(row, "invalid date None".to_string()))?;
                    parse_date(text, &schema.date_format).map_err(|reason| invalid(row, reason))
                })
                .collect()
        }
    }
}

/// Calendar date of a midnight epoch timestamp
fn date_from_ticks(ticks: i64, per_second: i64) -> std::result::Result<Date, String> {
    let per_day = per_second * SECONDS_PER_DAY;
    let days = ticks.div_euclid(per_day);
    let date = date_from_epoch_days(days).ok_or_else(|| format!("invalid date {}", ticks))?;

    let into_day = ticks.rem_euclid(per_day);
    if into_day != 0 {
        return Err(format!(
            "intraday timestamp {} + {}s; keys must be calendar dates",
            date,
            into_day / per_second
        ));
    }
    Ok(date)
}

fn find_column<'a>(columns: &'a [String], wanted: &str, source: &str) -> Result<&'a str> {
    columns
        .iter()
        .find(|c| c.eq_ignore_ascii_case(wanted))
        .map(String::as_str)
        .ok_or_else(|| AlignError::Schema(format!("{}: column '{}' not found", source, wanted)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PanelKey;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, day).unwrap()
    }

    #[test]
    fn test_panel_from_text_dates() {
        let df = df! {
            "instrument" => ["A", "A", "B"],
            "datetime" => ["2020-01-02", "2020-01-01", "2020-01-01"],
            "f1" => [Some(1.0), None, Some(3.0)],
            "f2" => [1i64, 2, 3],
        }
        .unwrap();

        let panel = panel_from_frame(&df, &KeySchema::default(), "mem").unwrap();
        assert_eq!(panel.columns(), &["f1".to_string(), "f2".to_string()]);
        assert_eq!(panel.len(), 3);
        assert_eq!(panel.get("A", &d(2)), Some(&[1.0, 1.0][..]));
        assert!(panel.get("A", &d(1)).unwrap()[0].is_nan());
        assert_eq!(panel.get("B", &d(1)), Some(&[3.0, 3.0][..]));
    }

    #[test]
    fn test_non_numeric_column_rejected() {
        let df = df! {
            "instrument" => ["A"],
            "datetime" => ["2020-01-02"],
            "label" => ["up"],
        }
        .unwrap();

        let err = panel_from_frame(&df, &KeySchema::default(), "mem").unwrap_err();
        assert!(matches!(err, AlignError::Schema(_)));
    }

    fn datetime_frame(millis: &[i64]) -> DataFrame {
        let stamps = Series::new("datetime", millis.to_vec())
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .unwrap();
        let values: Vec<f64> = (1..=millis.len()).map(|i| i as f64).collect();
        DataFrame::new(vec![
            Series::new("instrument", vec!["A"; millis.len()]),
            stamps,
            Series::new("f1", values),
        ])
        .unwrap()
    }

    #[test]
    fn test_datetime_column_at_midnight() {
        let df = datetime_frame(&[0, 86_400_000]);

        let panel = panel_from_frame(&df, &KeySchema::default(), "mem").unwrap();
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(panel.get("A", &epoch), Some(&[1.0][..]));
        assert_eq!(panel.get("A", &epoch.succ_opt().unwrap()), Some(&[2.0][..]));
    }

    #[test]
    fn test_intraday_datetime_rejected() {
        // 09:30 and 15:00 on 1970-01-01 must not collapse onto one key
        let df = datetime_frame(&[34_200_000, 54_000_000]);

        let err = panel_from_frame(&df, &KeySchema::default(), "mem").unwrap_err();
        assert!(matches!(err, AlignError::Parse(_)));
        assert!(err.to_string().contains("row 0"));
        assert!(err.to_string().contains("intraday"));
    }

    #[test]
    fn test_date_from_ticks() {
        let day_ms = 86_400_000;
        let d0 = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(date_from_ticks(0, 1_000), Ok(d0));
        assert_eq!(
            date_from_ticks(-day_ms, 1_000),
            Ok(NaiveDate::from_ymd_opt(1969, 12, 31).unwrap())
        );
        assert!(date_from_ticks(day_ms + 1, 1_000).is_err());
        assert!(date_from_ticks(-1, 1_000).is_err());
    }

    #[test]
    fn test_text_intraday_rejected() {
        let df = df! {
            "instrument" => ["A"],
            "datetime" => ["2020-01-01 09:30:00"],
            "f1" => [1.0],
        }
        .unwrap();

        let err = panel_from_frame(&df, &KeySchema::default(), "mem").unwrap_err();
        assert!(err.to_string().contains("intraday"));
    }

    #[test]
    fn test_roundtrip_through_file() {
        let mut table = CombinedTable::with_capacity(vec!["f1".into(), "r".into()], 1, 2);
        table.push_row(PanelKey::new("A", d(1)), &[1.0, 0.1]);
        table.push_row(PanelKey::new("B", d(3)), &[2.0, f64::NAN]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.parquet");
        write_table(&table, &path, &KeySchema::default()).unwrap();

        let panel = read_panel(&path, &KeySchema::default()).unwrap();
        assert_eq!(panel.columns(), &["f1".to_string(), "r".to_string()]);
        assert_eq!(panel.get("A", &d(1)), Some(&[1.0, 0.1][..]));
        assert!(panel.get("B", &d(3)).unwrap()[1].is_nan());
    }

    #[test]
    fn test_frame_uses_date_dtype() {
        let mut table = CombinedTable::with_capacity(vec!["f1".into()], 1, 1);
        table.push_row(PanelKey::new("A", d(1)), &[1.0]);

        let df = frame_from_table(&table, &KeySchema::default()).unwrap();
        assert_eq!(df.shape(), (1, 3));
        assert_eq!(df.column("datetime").unwrap().dtype(), &DataType::Date);
    }
}
