//! `merge` stage: raw series into the analysis panel.
//!
//! Writes the processed snapshot, the analysis-ready panel, its quality
//! report and the list of synthesized columns. They appear together or not
//! at all.

use crate::config::PipelineConfig;
use crate::stage::{
    synthesized_sidecar, StageError, ANALYSIS_PANEL, PROCESSED_PANEL, QUALITY_REPORT,
    SYNTHESIZED_COLUMNS,
};
use chrono::NaiveDate;
use macropanel_core::catalog::{
    SeriesSpec, FEDERAL_FUNDS_RATE, NATIONAL_UNEMPLOYMENT_RATE, OPTIONAL_NATIONAL, OPTIONAL_STATE,
    STATE_UNEMPLOYMENT_RATE,
};
use macropanel_core::data::{load_optional, load_required, StagedWrite};
use macropanel_core::domain::SeriesFrame;
use macropanel_core::panel::{
    assemble, AssemblyInputs, OptionalSeries, Panel, PanelError, QualityReport,
};
use std::path::PathBuf;
use tracing::info;

/// Result of the merge stage.
#[derive(Debug)]
pub struct MergeOutcome {
    pub panel: Panel,
    pub report: QualityReport,
    pub common_start: NaiveDate,
    pub common_end: NaiveDate,
    pub written: Vec<PathBuf>,
}

fn required(config: &PipelineConfig, spec: &SeriesSpec) -> Result<SeriesFrame, StageError> {
    Ok(load_required(
        &config.raw_path(spec.file_name),
        spec.column,
        spec.scope,
    )?)
}

fn optional(config: &PipelineConfig, spec: &SeriesSpec) -> OptionalSeries {
    OptionalSeries::new(
        spec.column,
        load_optional(&config.raw_path(spec.file_name), spec.column, spec.scope),
    )
}

/// Load the raw series and assemble the panel. `start` clips the panel start
/// but never extends it below the common start.
pub fn build_panel(
    config: &PipelineConfig,
    start: Option<NaiveDate>,
) -> Result<(Panel, NaiveDate, NaiveDate), StageError> {
    let inputs = AssemblyInputs {
        state_unemployment: required(config, &STATE_UNEMPLOYMENT_RATE)?,
        national_unemployment: required(config, &NATIONAL_UNEMPLOYMENT_RATE)?,
        federal_funds: required(config, &FEDERAL_FUNDS_RATE)?,
        optional_national: OPTIONAL_NATIONAL.iter().map(|s| optional(config, s)).collect(),
        optional_state: OPTIONAL_STATE.iter().map(|s| optional(config, s)).collect(),
    };

    let assembly = assemble(inputs)?;
    let mut panel = assembly.panel;
    if let Some(start) = start {
        if start > assembly.common_start {
            info!(%start, "clipping panel start");
            panel.retain_dates(start, assembly.common_end);
            if panel.is_empty() {
                return Err(PanelError::EmptyPanel.into());
            }
        }
    }
    Ok((panel, assembly.common_start, assembly.common_end))
}

pub fn run_merge(
    config: &PipelineConfig,
    start: Option<NaiveDate>,
) -> Result<MergeOutcome, StageError> {
    let (panel, common_start, common_end) = build_panel(config, start)?;
    let report = QualityReport::analyze(&panel, "Data Quality Report: Analysis Panel")?;
    let csv = panel.to_csv_bytes()?;

    let mut batch = StagedWrite::new();
    batch.stage(config.processed_path(PROCESSED_PANEL), &csv)?;
    batch.stage(config.final_path(ANALYSIS_PANEL), &csv)?;
    batch.stage(config.final_path(QUALITY_REPORT), report.to_markdown().as_bytes())?;
    batch.stage(config.final_path(SYNTHESIZED_COLUMNS), &synthesized_sidecar(&panel)?)?;
    let written = batch.commit()?;

    info!(
        rows = panel.len(),
        states = report.states,
        hash = %report.panel_hash,
        "merge complete"
    );
    Ok(MergeOutcome {
        panel,
        report,
        common_start,
        common_end,
        written,
    })
}
