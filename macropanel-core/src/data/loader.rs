//! Source loader: per-series CSV files into `SeriesFrame`s, and panel
//! snapshots back into a `Panel`.
//!
//! Files are read with Polars with every column as text, then parsed here so
//! that placeholder cells ("", ".", "NA", "nan") become nulls instead of
//! failing type inference. Dates keep their first ten characters. Series
//! files may carry daily or weekly readings; those collapse to monthly means
//! before the frame is built.
//!
//! Value column resolution, in order: a column named after the series, a
//! column named `value`, or the single remaining column.

use super::provider::DataError;
use crate::domain::{month_start, Observation, Scope, SeriesFrame, StateCode};
use crate::panel::frame::{Panel, PanelColumn, PanelKey, DATE_COLUMN, STATE_COLUMN};
use crate::panel::harmonize::collapse_to_monthly;
use chrono::NaiveDate;
use polars::prelude::*;
use std::path::Path;
use tracing::{info, warn};

/// Raw text columns of a CSV file.
struct TextTable {
    names: Vec<String>,
    frame: DataFrame,
}

impl TextTable {
    fn read(path: &Path) -> Result<Self, DataError> {
        let ingest = |e: PolarsError| DataError::Ingest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        let frame = LazyCsvReader::new(path)
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .finish()
            .map_err(ingest)?
            .collect()
            .map_err(ingest)?;
        let names = frame
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        Ok(Self { names, frame })
    }

    fn has(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    fn text(&self, path: &Path, name: &str) -> Result<Vec<Option<String>>, DataError> {
        let column = self.frame.column(name).map_err(|e| DataError::Ingest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let strings = column.str().map_err(|e| DataError::Ingest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(strings
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect())
    }
}

fn ingest_err(path: &Path, reason: impl Into<String>) -> DataError {
    DataError::Ingest {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Parse the leading `YYYY-MM-DD` of a cell.
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let head = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Parse the leading `YYYY-MM-DD` of a cell and truncate to month start.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    parse_day(raw).map(month_start)
}

/// Parse a numeric cell; placeholders and non-finite values are null.
pub fn parse_cell(raw: Option<&str>) -> Option<f64> {
    let trimmed = raw?.trim();
    match trimmed {
        "" | "." | "NA" | "N/A" | "nan" | "NaN" | "null" => None,
        _ => trimmed.parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}

fn value_column(table: &TextTable, path: &Path, name: &str) -> Result<String, DataError> {
    if table.has(name) {
        return Ok(name.to_string());
    }
    if table.has("value") {
        return Ok("value".to_string());
    }
    let rest: Vec<&String> = table
        .names
        .iter()
        .filter(|n| n.as_str() != DATE_COLUMN && n.as_str() != STATE_COLUMN)
        .collect();
    match rest.as_slice() {
        [only] => Ok((*only).clone()),
        [] => Err(ingest_err(path, "no value column")),
        _ => Err(ingest_err(
            path,
            format!("cannot tell which column holds '{name}' among {rest:?}"),
        )),
    }
}

/// Load one series file. The resulting frame is named `name`.
pub fn read_series(path: &Path, name: &str, scope: Scope) -> Result<SeriesFrame, DataError> {
    if !path.exists() {
        return Err(DataError::MissingSource {
            path: path.to_path_buf(),
        });
    }

    let table = TextTable::read(path)?;
    if !table.has(DATE_COLUMN) {
        return Err(ingest_err(path, "missing 'date' column"));
    }
    if scope == Scope::State && !table.has(STATE_COLUMN) {
        return Err(ingest_err(path, "missing 'state' column"));
    }

    let value_name = value_column(&table, path, name)?;
    let dates = table.text(path, DATE_COLUMN)?;
    let values = table.text(path, &value_name)?;
    let states = match scope {
        Scope::State => Some(table.text(path, STATE_COLUMN)?),
        Scope::National => None,
    };

    let mut observations = Vec::with_capacity(dates.len());
    for (row, raw_date) in dates.iter().enumerate() {
        let raw_date = raw_date.as_deref().unwrap_or("");
        let date = parse_day(raw_date)
            .ok_or_else(|| ingest_err(path, format!("row {}: invalid date '{raw_date}'", row + 1)))?;
        let value = parse_cell(values[row].as_deref());
        let state = match &states {
            Some(states) => {
                let raw = states[row].as_deref().unwrap_or("");
                let code: StateCode = raw.parse().map_err(|_| {
                    ingest_err(path, format!("row {}: invalid state '{raw}'", row + 1))
                })?;
                Some(code)
            }
            None => None,
        };
        observations.push(Observation { date, state, value });
    }

    let frame = collapse_to_monthly(name, scope, observations)?;
    info!(
        path = %path.display(),
        series = name,
        rows = frame.len(),
        "loaded series"
    );
    Ok(frame)
}

/// Load a series that must exist. Absence is `DataError::MissingSource`.
pub fn load_required(path: &Path, name: &str, scope: Scope) -> Result<SeriesFrame, DataError> {
    read_series(path, name, scope)
}

/// Load a series that may be absent or unreadable. Either case is logged
/// and yields `None`.
pub fn load_optional(path: &Path, name: &str, scope: Scope) -> Option<SeriesFrame> {
    match read_series(path, name, scope) {
        Ok(frame) => Some(frame),
        Err(DataError::MissingSource { .. }) => {
            warn!(path = %path.display(), series = name, "optional source not found, skipping");
            None
        }
        Err(error) => {
            warn!(path = %path.display(), series = name, %error, "optional source unreadable, skipping");
            None
        }
    }
}

/// Load a panel snapshot written by `Panel::write_csv`.
pub fn read_panel(path: &Path) -> Result<Panel, DataError> {
    if !path.exists() {
        return Err(DataError::MissingSource {
            path: path.to_path_buf(),
        });
    }
    let table = TextTable::read(path)?;
    if !table.has(DATE_COLUMN) || !table.has(STATE_COLUMN) {
        return Err(ingest_err(path, "panel needs 'date' and 'state' columns"));
    }

    let dates = table.text(path, DATE_COLUMN)?;
    let states = table.text(path, STATE_COLUMN)?;
    let mut keys = Vec::with_capacity(dates.len());
    for (row, (date, state)) in dates.iter().zip(&states).enumerate() {
        let raw_date = date.as_deref().unwrap_or("");
        let raw_state = state.as_deref().unwrap_or("");
        let date = parse_date(raw_date)
            .ok_or_else(|| ingest_err(path, format!("row {}: invalid date '{raw_date}'", row + 1)))?;
        let state: StateCode = raw_state
            .parse()
            .map_err(|_| ingest_err(path, format!("row {}: invalid state '{raw_state}'", row + 1)))?;
        keys.push(PanelKey::new(date, state));
    }

    let mut columns = Vec::new();
    for name in &table.names {
        if name == DATE_COLUMN || name == STATE_COLUMN {
            continue;
        }
        let values = table
            .text(path, name)?
            .iter()
            .map(|v| parse_cell(v.as_deref()))
            .collect();
        columns.push(PanelColumn::new(name.clone(), values));
    }

    Panel::from_parts(keys, columns).map_err(|e| ingest_err(path, e.to_string()))
}
