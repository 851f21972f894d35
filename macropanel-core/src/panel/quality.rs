//! Quality reporter: completeness, descriptive statistics, panel balance.
//!
//! Reports carry no timestamps so that re-running a stage on unchanged
//! inputs reproduces them byte for byte. The BLAKE3 hash of the panel CSV
//! identifies the snapshot instead.

use super::frame::{Panel, DATE_COLUMN, STATE_COLUMN};
use super::PanelError;
use crate::catalog::column_label;
use crate::domain::StateCode;
use chrono::NaiveDate;
use serde::Serialize;

/// Per-column completeness and statistics. Statistics are `None` when the
/// column has no non-null values (std also needs at least two).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub name: String,
    pub missing: usize,
    pub missing_pct: f64,
    pub count: usize,
    pub min: Option<f64>,
    pub mean: Option<f64>,
    pub max: Option<f64>,
    pub std: Option<f64>,
}

impl ColumnStats {
    fn from_values(name: &str, values: &[Option<f64>]) -> Self {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        let missing = values.len() - present.len();
        let missing_pct = if values.is_empty() {
            0.0
        } else {
            missing as f64 / values.len() as f64 * 100.0
        };

        let count = present.len();
        let (min, mean, max, std) = if count == 0 {
            (None, None, None, None)
        } else {
            let min = present.iter().copied().fold(f64::INFINITY, f64::min);
            let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = present.iter().sum::<f64>() / count as f64;
            let std = (count >= 2).then(|| {
                let ss: f64 = present.iter().map(|x| (x - mean).powi(2)).sum();
                (ss / (count - 1) as f64).sqrt()
            });
            (Some(min), Some(mean), Some(max), std)
        };

        Self {
            name: name.to_string(),
            missing,
            missing_pct,
            count,
            min,
            mean,
            max,
            std,
        }
    }
}

/// Group-by-state row counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Balance {
    Balanced {
        rows_per_state: usize,
    },
    Unbalanced {
        min_rows: usize,
        min_state: String,
        max_rows: usize,
        max_state: String,
    },
}

impl Balance {
    pub fn of(panel: &Panel) -> Self {
        let counts = panel.rows_per_state();
        let min = counts.iter().min_by_key(|(_, n)| **n);
        let max = counts.iter().max_by_key(|(_, n)| **n);
        match (min, max) {
            (Some((min_state, &min_rows)), Some((max_state, &max_rows))) if min_rows != max_rows => {
                Balance::Unbalanced {
                    min_rows,
                    min_state: min_state.to_string(),
                    max_rows,
                    max_state: max_state.to_string(),
                }
            }
            (Some((_, &rows)), _) => Balance::Balanced {
                rows_per_state: rows,
            },
            _ => Balance::Balanced { rows_per_state: 0 },
        }
    }

    pub fn is_balanced(&self) -> bool {
        matches!(self, Balance::Balanced { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub title: String,
    pub rows: usize,
    pub states: usize,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub columns: Vec<ColumnStats>,
    pub missing_cells: usize,
    pub balance: Balance,
    pub synthesized: Vec<String>,
    pub panel_hash: String,
}

impl QualityReport {
    pub fn analyze(panel: &Panel, title: impl Into<String>) -> Result<Self, PanelError> {
        let columns: Vec<ColumnStats> = panel
            .columns()
            .iter()
            .map(|c| ColumnStats::from_values(&c.name, &c.values))
            .collect();
        let missing_cells = columns.iter().map(|c| c.missing).sum();
        let range = panel.date_range();

        Ok(Self {
            title: title.into(),
            rows: panel.len(),
            states: panel.states().len(),
            start: range.map(|r| r.0),
            end: range.map(|r| r.1),
            columns,
            missing_cells,
            balance: Balance::of(panel),
            synthesized: panel.synthesized().iter().cloned().collect(),
            panel_hash: panel.content_hash()?,
        })
    }

    pub fn column(&self, name: &str) -> Option<&ColumnStats> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn write_summary(&self, out: &mut String) {
        out.push_str("## Panel Summary\n\n");
        out.push_str(&format!("- **Observations:** {}\n", self.rows));
        out.push_str(&format!("- **States:** {}\n", self.states));
        match (self.start, self.end) {
            (Some(start), Some(end)) => {
                out.push_str(&format!("- **Time Period:** {start} to {end}\n"));
            }
            _ => {
                out.push_str("- **Time Period:** (empty)\n");
            }
        }
        out.push_str(&format!("- **Variables:** {}\n", self.columns.len() + 2));
        out.push_str(&format!("- **Panel hash (BLAKE3):** `{}`\n\n", self.panel_hash));
    }

    fn write_balance(&self, out: &mut String) {
        out.push_str("## Panel Balance\n\n");
        match &self.balance {
            Balance::Balanced { rows_per_state } => {
                out.push_str(&format!(
                    "Balanced: every state has {rows_per_state} observations.\n\n"
                ));
            }
            Balance::Unbalanced {
                min_rows,
                min_state,
                max_rows,
                max_state,
            } => {
                out.push_str(&format!(
                    "Unbalanced: observations per state range from {min_rows} ({min_state}) \
                     to {max_rows} ({max_state}).\n\n"
                ));
            }
        }
    }

    fn write_synthesized(&self, out: &mut String) {
        out.push_str("## Synthesized Columns\n\n");
        if self.synthesized.is_empty() {
            out.push_str("None.\n");
        } else {
            for name in &self.synthesized {
                out.push_str(&format!(
                    "- `{name}`: annual readings carried forward to monthly\n"
                ));
            }
        }
    }

    /// Markdown data-quality report.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", self.title));
        self.write_summary(&mut out);

        out.push_str("## Missing Values\n\n");
        out.push_str("| Column | Missing | Missing % |\n");
        out.push_str("|---|---:|---:|\n");
        for key in [DATE_COLUMN, STATE_COLUMN] {
            out.push_str(&format!("| {key} | 0 | 0.00% |\n"));
        }
        for c in &self.columns {
            out.push_str(&format!("| {} | {} | {:.2}% |\n", c.name, c.missing, c.missing_pct));
        }
        out.push_str(&format!("\nTotal missing cells: {}\n\n", self.missing_cells));

        out.push_str("## Summary Statistics\n\n");
        out.push_str("| Column | Count | Min | Mean | Max | Std |\n");
        out.push_str("|---|---:|---:|---:|---:|---:|\n");
        for c in &self.columns {
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                c.name,
                c.count,
                fmt_stat(c.min),
                fmt_stat(c.mean),
                fmt_stat(c.max),
                fmt_stat(c.std)
            ));
        }
        out.push('\n');

        self.write_balance(&mut out);
        self.write_synthesized(&mut out);
        out
    }

    /// Markdown data dictionary: one entry per variable with its label,
    /// description, completeness and range.
    pub fn to_data_dictionary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", self.title));
        self.write_summary(&mut out);

        out.push_str("## Variables\n\n");
        out.push_str("| # | Column | Label | Description | Non-null | Range |\n");
        out.push_str("|---:|---|---|---|---:|---|\n");
        let (start, end) = match (self.start, self.end) {
            (Some(s), Some(e)) => (s.to_string(), e.to_string()),
            _ => (String::new(), String::new()),
        };
        let mut index = 1;
        for key in [DATE_COLUMN, STATE_COLUMN] {
            let (label, description) = column_label(key).unwrap_or((key, ""));
            let range = if key == DATE_COLUMN {
                format!("{start} to {end}")
            } else {
                format!("{} states", self.states)
            };
            out.push_str(&format!(
                "| {index} | {key} | {label} | {description} | {} | {range} |\n",
                self.rows
            ));
            index += 1;
        }
        for c in &self.columns {
            let (label, description) = column_label(&c.name).unwrap_or((c.name.as_str(), ""));
            let range = match (c.min, c.max) {
                (Some(lo), Some(hi)) => format!("{} to {}", fmt_stat(Some(lo)), fmt_stat(Some(hi))),
                _ => "all null".to_string(),
            };
            out.push_str(&format!(
                "| {index} | {} | {label} | {description} | {} | {range} |\n",
                c.name, c.count
            ));
            index += 1;
        }
        out.push('\n');

        self.write_balance(&mut out);
        self.write_synthesized(&mut out);
        out
    }
}

fn fmt_stat(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.4}"),
        None => "-".to_string(),
    }
}

/// States missing from a panel relative to the full 50.
pub fn missing_states(panel: &Panel) -> Vec<StateCode> {
    let present = panel.states();
    StateCode::all()
        .into_iter()
        .filter(|s| !present.contains(s))
        .collect()
}
