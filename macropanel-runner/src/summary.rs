//! `summary` stage: descriptive statistics printed to stdout.
//!
//! Reads the enhanced panel when it exists, else the analysis panel. Writes
//! nothing.

use crate::config::PipelineConfig;
use crate::stage::{StageError, ANALYSIS_PANEL, ENHANCED_PANEL};
use macropanel_core::data::read_panel;
use macropanel_core::panel::derive::UNEMPLOYMENT_RATE;
use macropanel_core::panel::describe::{state_summaries, CorrelationMatrix, StateSummary};
use macropanel_core::panel::Panel;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug)]
pub struct PanelSummary {
    pub source: PathBuf,
    pub rows: usize,
    pub states: Vec<StateSummary>,
    pub correlations: CorrelationMatrix,
}

impl PanelSummary {
    pub fn of(panel: &Panel, source: PathBuf) -> Result<Self, StageError> {
        // Columns with fewer than two readings carry no correlation.
        let numeric: Vec<&str> = panel
            .columns()
            .iter()
            .filter(|c| c.present().nth(1).is_some())
            .map(|c| c.name.as_str())
            .collect();
        Ok(Self {
            source,
            rows: panel.len(),
            states: state_summaries(panel, UNEMPLOYMENT_RATE)?,
            correlations: CorrelationMatrix::of(panel, &numeric)?,
        })
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Panel: {} ({} rows)\n\n", self.source.display(), self.rows));
        out.push_str("Unemployment rate by state:\n");
        out.push_str(&format!(
            "{:<6} {:>6} {:>8} {:>8} {:>8} {:>8}\n",
            "state", "n", "mean", "std", "min", "max"
        ));
        for s in &self.states {
            let std = s.std.map_or_else(|| "-".to_string(), |v| format!("{v:.3}"));
            out.push_str(&format!(
                "{:<6} {:>6} {:>8.3} {:>8} {:>8.3} {:>8.3}\n",
                s.state.as_str(),
                s.count,
                s.mean,
                std,
                s.min,
                s.max
            ));
        }
        out.push_str("\nCorrelation matrix:\n");
        out.push_str(&self.correlations.render());
        out
    }
}

pub fn run_summary(config: &PipelineConfig) -> Result<PanelSummary, StageError> {
    let enhanced = config.final_path(ENHANCED_PANEL);
    let source = if enhanced.is_file() {
        enhanced
    } else {
        config.final_path(ANALYSIS_PANEL)
    };
    let panel = read_panel(&source)?;
    info!(path = %source.display(), rows = panel.len(), "summarizing panel");
    PanelSummary::of(&panel, source)
}
