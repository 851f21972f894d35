//! Descriptive summaries for a finished panel: per-state statistics of one
//! column and the pairwise correlation matrix of numeric columns.

use super::frame::Panel;
use super::PanelError;
use crate::domain::StateCode;

#[derive(Debug, Clone, PartialEq)]
pub struct StateSummary {
    pub state: StateCode,
    pub count: usize,
    pub mean: f64,
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
}

/// Statistics of `column` per state, sorted by state. States whose values
/// are all null are omitted.
pub fn state_summaries(panel: &Panel, column: &str) -> Result<Vec<StateSummary>, PanelError> {
    let values = panel.values(column)?;
    let mut out = Vec::new();
    for (state, rows) in panel.state_groups() {
        let sample: Vec<f64> = rows.iter().filter_map(|&r| values[r]).collect();
        if sample.is_empty() {
            continue;
        }
        let n = sample.len();
        let mean = sample.iter().sum::<f64>() / n as f64;
        let std = (n >= 2).then(|| {
            let ss: f64 = sample.iter().map(|x| (x - mean).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        });
        out.push(StateSummary {
            state,
            count: n,
            mean,
            std,
            min: sample.iter().copied().fold(f64::INFINITY, f64::min),
            max: sample.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        });
    }
    Ok(out)
}

/// Pearson correlation over rows where both columns are non-null.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some(sxy / (sxx.sqrt() * syy.sqrt()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// Row-major, `columns.len()` squared.
    pub values: Vec<Option<f64>>,
}

impl CorrelationMatrix {
    pub fn of(panel: &Panel, columns: &[&str]) -> Result<Self, PanelError> {
        let data: Vec<&[Option<f64>]> = columns
            .iter()
            .map(|c| panel.values(c))
            .collect::<Result<_, _>>()?;
        let k = columns.len();
        let mut values = vec![None; k * k];
        for i in 0..k {
            for j in i..k {
                let r = if i == j {
                    Some(1.0)
                } else {
                    pearson(data[i], data[j])
                };
                values[i * k + j] = r;
                values[j * k + i] = r;
            }
        }
        Ok(Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            values,
        })
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i * self.columns.len() + j]
    }

    /// Plain-text table for terminal output.
    pub fn render(&self) -> String {
        let width = self.columns.iter().map(|c| c.len()).max().unwrap_or(0).max(8);
        let mut out = String::new();
        out.push_str(&format!("{:width$}", ""));
        for c in &self.columns {
            out.push_str(&format!(" {c:>width$}"));
        }
        out.push('\n');
        let k = self.columns.len();
        for (i, row_name) in self.columns.iter().enumerate() {
            out.push_str(&format!("{row_name:width$}"));
            for j in 0..k {
                match self.values[i * k + j] {
                    Some(v) => out.push_str(&format!(" {v:>width$.3}")),
                    None => out.push_str(&format!(" {:>width$}", "-")),
                }
            }
            out.push('\n');
        }
        out
    }
}
