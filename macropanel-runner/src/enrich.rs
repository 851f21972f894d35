//! `enrich` stage: employment shares, participation rate and derived
//! variables on top of the analysis panel.
//!
//! Share inputs that are absent leave their share column all-null, matching
//! how the merge stage treats optional series.

use crate::config::PipelineConfig;
use crate::stage::{
    restore_synthesized, StageError, ANALYSIS_PANEL, DATA_DICTIONARY, ENHANCED_PANEL,
    SYNTHESIZED_COLUMNS,
};
use macropanel_core::catalog::{
    SeriesSpec, CONSTRUCTION_EMPLOYMENT, LABOR_FORCE_PARTICIPATION, MANUFACTURING_EMPLOYMENT,
    TOTAL_NONFARM_EMPLOYMENT,
};
use macropanel_core::data::{load_optional, read_panel, StagedWrite};
use macropanel_core::domain::SeriesFrame;
use macropanel_core::panel::{
    add_derived_variables, left_join_national, share_of_total, Panel, PanelError, QualityReport,
};
use std::path::PathBuf;
use tracing::{info, warn};

pub const MANUFACTURING_SHARE: &str = "manufacturing_employment_share";
pub const CONSTRUCTION_SHARE: &str = "construction_employment_share";

/// Result of the enrich stage.
#[derive(Debug)]
pub struct EnrichOutcome {
    pub panel: Panel,
    pub report: QualityReport,
    pub written: Vec<PathBuf>,
}

fn load(config: &PipelineConfig, spec: &SeriesSpec) -> Option<SeriesFrame> {
    load_optional(&config.raw_path(spec.file_name), spec.column, spec.scope)
}

/// Join `frame` onto every state row by date, or add an all-null column
/// named `column` when the input is unavailable.
fn join_or_null(
    panel: &mut Panel,
    column: &str,
    frame: Option<SeriesFrame>,
) -> Result<(), PanelError> {
    match frame {
        Some(frame) => left_join_national(panel, &frame.renamed(column)),
        None => {
            warn!(column, "input unavailable, column left null");
            panel.push_column(column, vec![None; panel.len()])
        }
    }
}

/// Add share and participation columns, then the derived variables.
pub fn enrich_panel(config: &PipelineConfig, panel: &mut Panel) -> Result<(), StageError> {
    let total = load(config, &TOTAL_NONFARM_EMPLOYMENT);
    for (name, part_spec) in [
        (MANUFACTURING_SHARE, &MANUFACTURING_EMPLOYMENT),
        (CONSTRUCTION_SHARE, &CONSTRUCTION_EMPLOYMENT),
    ] {
        let share = match (load(config, part_spec), &total) {
            (Some(part), Some(total)) => Some(share_of_total(name, &part, total)?),
            _ => None,
        };
        join_or_null(panel, name, share)?;
    }
    join_or_null(
        panel,
        LABOR_FORCE_PARTICIPATION.column,
        load(config, &LABOR_FORCE_PARTICIPATION),
    )?;

    add_derived_variables(panel)?;
    Ok(())
}

pub fn run_enrich(config: &PipelineConfig) -> Result<EnrichOutcome, StageError> {
    let mut panel = read_panel(&config.final_path(ANALYSIS_PANEL))?;
    restore_synthesized(&mut panel, &config.final_path(SYNTHESIZED_COLUMNS))?;
    info!(rows = panel.len(), columns = panel.columns().len(), "analysis panel loaded");

    enrich_panel(config, &mut panel)?;
    let report = QualityReport::analyze(&panel, "Enhanced Panel Data Dictionary")?;

    let mut batch = StagedWrite::new();
    batch.stage(config.final_path(ENHANCED_PANEL), &panel.to_csv_bytes()?)?;
    batch.stage(
        config.final_path(DATA_DICTIONARY),
        report.to_data_dictionary().as_bytes(),
    )?;
    let written = batch.commit()?;

    info!(
        rows = panel.len(),
        columns = panel.columns().len(),
        hash = %report.panel_hash,
        "enrich complete"
    );
    Ok(EnrichOutcome {
        panel,
        report,
        written,
    })
}
