//! Shared stage plumbing: the stage error type, output file names, the
//! fetch manifest and the synthesized-column sidecar.

use crate::config::ConfigError;
use chrono::{DateTime, NaiveDate, Utc};
use macropanel_core::data::{content_hash, series_to_csv, DataError, FetchSummary, StagedWrite};
use macropanel_core::panel::{Panel, PanelError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const FETCH_MANIFEST: &str = "fetch_manifest.json";
pub const BACKFILL_MANIFEST: &str = "backfill_manifest.json";
pub const PROCESSED_PANEL: &str = "panel_processed.csv";
pub const ANALYSIS_PANEL: &str = "analysis_panel.csv";
pub const QUALITY_REPORT: &str = "data_quality_report.md";
pub const ENHANCED_PANEL: &str = "analysis_panel_enhanced.csv";
pub const DATA_DICTIONARY: &str = "enhanced_panel_data_dictionary.md";
/// Names of analysis-panel columns upsampled from annual readings.
pub const SYNTHESIZED_COLUMNS: &str = "analysis_panel_synthesized.json";

/// Errors from running a pipeline stage.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Panel(#[from] PanelError),

    #[error("required series unavailable: {}", .0.join(", "))]
    MissingRequired(Vec<String>),

    #[error("manifest serialization failed: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl StageError {
    /// Configuration problems get their own exit code.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            StageError::Config(_)
                | StageError::Data(DataError::MissingCredential(_))
                | StageError::Data(DataError::MissingSource { .. })
        )
    }
}

/// Serialize the panel's synthesized-column set as a sorted JSON array.
pub fn synthesized_sidecar(panel: &Panel) -> Result<Vec<u8>, StageError> {
    let names: Vec<&String> = panel.synthesized().iter().collect();
    Ok(serde_json::to_vec_pretty(&names)?)
}

/// Re-apply synthesized flags recorded next to a panel snapshot. A missing
/// sidecar leaves the panel unflagged; names without a column are ignored.
pub fn restore_synthesized(panel: &mut Panel, path: &Path) -> Result<(), StageError> {
    if !path.is_file() {
        return Ok(());
    }
    let bytes = std::fs::read(path).map_err(|e| DataError::io(path, e))?;
    let names: Vec<String> = serde_json::from_slice(&bytes)?;
    for name in names {
        if panel.has_column(&name) {
            panel.mark_synthesized(name);
        }
    }
    Ok(())
}

/// One raw file written by a fetch stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub file: String,
    pub column: String,
    pub series_ids: Vec<String>,
    pub rows: usize,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub blake3: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestFailure {
    pub label: String,
    pub series_id: String,
    pub error: String,
}

/// Provenance record written next to the raw files of a fetch stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchManifest {
    pub provider: String,
    pub fetched_at: DateTime<Utc>,
    pub start_date: NaiveDate,
    pub requests: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub files: Vec<ManifestEntry>,
    pub failures: Vec<ManifestFailure>,
    pub missing_required: Vec<String>,
    /// Raw files already on disk that were left untouched.
    #[serde(default)]
    pub skipped: Vec<String>,
}

impl FetchManifest {
    pub fn read(path: &Path) -> Result<Self, StageError> {
        let bytes = std::fs::read(path).map_err(|e| DataError::io(path, e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Result of a fetch stage.
#[derive(Debug)]
pub struct FetchOutcome {
    pub summary: FetchSummary,
    pub manifest: FetchManifest,
    pub written: Vec<PathBuf>,
}

/// Stage every fetched series plus the manifest (named `manifest_file`)
/// under `dir` and commit them together.
pub(crate) fn write_fetch_outputs(
    dir: &Path,
    manifest_file: &str,
    provider: &str,
    start: NaiveDate,
    summary: FetchSummary,
    skipped: Vec<String>,
) -> Result<FetchOutcome, StageError> {
    let mut batch = StagedWrite::new();
    let mut files = Vec::with_capacity(summary.fetched.len());

    for fetched in &summary.fetched {
        let bytes = series_to_csv(&fetched.frame)?;
        let (start, end) = match fetched.frame.date_range() {
            Some((s, e)) => (Some(s), Some(e)),
            None => (None, None),
        };
        files.push(ManifestEntry {
            file: fetched.file_name.clone(),
            column: fetched.column.clone(),
            series_ids: fetched.series_ids.clone(),
            rows: fetched.frame.len(),
            start,
            end,
            blake3: content_hash(&bytes),
        });
        batch.stage(dir.join(&fetched.file_name), &bytes)?;
    }

    let manifest = FetchManifest {
        provider: provider.to_string(),
        fetched_at: Utc::now(),
        start_date: start,
        requests: summary.total,
        succeeded: summary.succeeded,
        failed: summary.failed,
        files,
        failures: summary
            .failures
            .iter()
            .map(|f| ManifestFailure {
                label: f.label.clone(),
                series_id: f.series_id.clone(),
                error: f.error.to_string(),
            })
            .collect(),
        missing_required: summary.missing_required.clone(),
        skipped,
    };
    batch.stage(dir.join(manifest_file), &serde_json::to_vec_pretty(&manifest)?)?;

    let written = batch.commit()?;
    Ok(FetchOutcome {
        summary,
        manifest,
        written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_inputs_and_credentials_are_config_errors() {
        let missing = StageError::from(DataError::MissingSource {
            path: PathBuf::from("data/raw/fed_funds_rate.csv"),
        });
        assert!(missing.is_config());
        assert!(StageError::from(DataError::MissingCredential("FRED_API_KEY".into())).is_config());
        assert!(StageError::from(ConfigError::InvalidDate {
            value: "1990-13-01".into()
        })
        .is_config());
    }

    #[test]
    fn transform_failures_are_not_config_errors() {
        assert!(!StageError::from(PanelError::EmptyPanel).is_config());
        assert!(!StageError::MissingRequired(vec!["FEDFUNDS".into()]).is_config());
        assert!(!StageError::from(DataError::RateLimited).is_config());
    }
}
