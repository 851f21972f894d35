//! The long-format panel: one row per (date, state), one column per variable.
//!
//! Storage is columnar. Keys live in their own vector and every data column
//! has exactly one value per key. `date` and `state` are not data columns;
//! they are emitted first when writing.

use super::PanelError;
use crate::domain::StateCode;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io::Write;

pub const DATE_COLUMN: &str = "date";
pub const STATE_COLUMN: &str = "state";

/// Candidate key of a panel row. Orders by date, then state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PanelKey {
    pub date: NaiveDate,
    pub state: StateCode,
}

impl PanelKey {
    pub fn new(date: NaiveDate, state: StateCode) -> Self {
        Self { date, state }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl PanelColumn {
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    /// Non-null values in row order.
    pub fn present(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().flatten().copied()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Panel {
    keys: Vec<PanelKey>,
    columns: Vec<PanelColumn>,
    synthesized: BTreeSet<String>,
}

impl Panel {
    /// Panel with the given rows and no data columns. Keys must be unique.
    pub fn new(keys: Vec<PanelKey>) -> Result<Self, PanelError> {
        let mut seen = HashSet::with_capacity(keys.len());
        for key in &keys {
            if !seen.insert(*key) {
                return Err(PanelError::DuplicateKey {
                    date: key.date,
                    state: key.state.to_string(),
                });
            }
        }
        Ok(Self {
            keys,
            columns: Vec::new(),
            synthesized: BTreeSet::new(),
        })
    }

    /// Build from keys and columns, then sort rows canonically.
    pub fn from_parts(keys: Vec<PanelKey>, columns: Vec<PanelColumn>) -> Result<Self, PanelError> {
        let mut panel = Self::new(keys)?;
        for column in columns {
            panel.push_column(column.name, column.values)?;
        }
        panel.sort_canonical();
        Ok(panel)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[PanelKey] {
        &self.keys
    }

    pub fn columns(&self) -> &[PanelColumn] {
        &self.columns
    }

    /// Data column names in order (excludes `date` and `state`).
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Header as written: `date`, `state`, then data columns.
    pub fn header(&self) -> Vec<&str> {
        let mut header = vec![DATE_COLUMN, STATE_COLUMN];
        header.extend(self.column_names());
        header
    }

    pub fn column(&self, name: &str) -> Option<&PanelColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn values(&self, name: &str) -> Result<&[Option<f64>], PanelError> {
        self.column(name)
            .map(|c| c.values.as_slice())
            .ok_or_else(|| PanelError::MissingColumn(name.to_string()))
    }

    /// Append a new column. Fails on a name clash or length mismatch.
    pub fn push_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Result<(), PanelError> {
        let name = name.into();
        if name == DATE_COLUMN || name == STATE_COLUMN || self.has_column(&name) {
            return Err(PanelError::DuplicateColumn(name));
        }
        self.check_length(&name, values.len())?;
        self.columns.push(PanelColumn { name, values });
        Ok(())
    }

    /// Replace an existing column in place, or append it.
    pub fn set_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Result<(), PanelError> {
        let name = name.into();
        self.check_length(&name, values.len())?;
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.push_column(name, values)?,
        }
        Ok(())
    }

    fn check_length(&self, name: &str, actual: usize) -> Result<(), PanelError> {
        if actual != self.keys.len() {
            return Err(PanelError::ColumnLength {
                name: name.to_string(),
                expected: self.keys.len(),
                actual,
            });
        }
        Ok(())
    }

    /// Record that a column was filled by upsampling a coarser series.
    pub fn mark_synthesized(&mut self, name: impl Into<String>) {
        self.synthesized.insert(name.into());
    }

    pub fn synthesized(&self) -> &BTreeSet<String> {
        &self.synthesized
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.keys.iter().map(|k| k.date).min()?;
        let max = self.keys.iter().map(|k| k.date).max()?;
        Some((min, max))
    }

    pub fn dates(&self) -> BTreeSet<NaiveDate> {
        self.keys.iter().map(|k| k.date).collect()
    }

    pub fn states(&self) -> BTreeSet<StateCode> {
        self.keys.iter().map(|k| k.state).collect()
    }

    /// Row indices per state, each list in chronological order.
    pub fn state_groups(&self) -> BTreeMap<StateCode, Vec<usize>> {
        let mut groups: BTreeMap<StateCode, Vec<usize>> = BTreeMap::new();
        for (row, key) in self.keys.iter().enumerate() {
            groups.entry(key.state).or_default().push(row);
        }
        for rows in groups.values_mut() {
            rows.sort_by_key(|&r| self.keys[r].date);
        }
        groups
    }

    /// Row count per state.
    pub fn rows_per_state(&self) -> BTreeMap<StateCode, usize> {
        let mut counts = BTreeMap::new();
        for key in &self.keys {
            *counts.entry(key.state).or_insert(0) += 1;
        }
        counts
    }

    pub fn row_index(&self) -> HashMap<PanelKey, usize> {
        self.keys.iter().enumerate().map(|(i, k)| (*k, i)).collect()
    }

    /// Sort rows by (date, state) ascending.
    pub fn sort_canonical(&mut self) {
        if self.keys.windows(2).all(|w| w[0] < w[1]) {
            return;
        }
        let mut order: Vec<usize> = (0..self.keys.len()).collect();
        order.sort_by_key(|&i| self.keys[i]);
        self.permute(&order);
    }

    /// Keep only rows whose date falls in `[start, end]`.
    pub fn retain_dates(&mut self, start: NaiveDate, end: NaiveDate) {
        let order: Vec<usize> = (0..self.keys.len())
            .filter(|&i| self.keys[i].date >= start && self.keys[i].date <= end)
            .collect();
        if order.len() != self.keys.len() {
            self.permute(&order);
        }
    }

    fn permute(&mut self, order: &[usize]) {
        self.keys = order.iter().map(|&i| self.keys[i]).collect();
        for column in &mut self.columns {
            column.values = order.iter().map(|&i| column.values[i]).collect();
        }
    }

    /// Write as CSV with a header row. Dates are `YYYY-MM-DD`, nulls are empty.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), PanelError> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.header())
            .map_err(|e| PanelError::Csv(e.to_string()))?;

        let mut record: Vec<String> = Vec::with_capacity(self.columns.len() + 2);
        for (row, key) in self.keys.iter().enumerate() {
            record.clear();
            record.push(key.date.format("%Y-%m-%d").to_string());
            record.push(key.state.to_string());
            for column in &self.columns {
                record.push(format_value(column.values[row]));
            }
            wtr.write_record(&record)
                .map_err(|e| PanelError::Csv(e.to_string()))?;
        }
        wtr.flush().map_err(|e| PanelError::Csv(e.to_string()))?;
        Ok(())
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, PanelError> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(buf)
    }

    /// BLAKE3 of the CSV rendering, for reports and manifests.
    pub fn content_hash(&self) -> Result<String, PanelError> {
        let bytes = self.to_csv_bytes()?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }
}

/// Shortest round-trip decimal, empty for null.
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v}"),
        None => String::new(),
    }
}
