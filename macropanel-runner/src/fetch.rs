//! `fetch`, `fetch-bls` and `fetch-missing` stages.
//!
//! Every series in the catalog is requested in turn. Failures are logged and
//! skipped; whatever arrived is written along with a manifest. The stage
//! fails only afterwards, and only when a required series is wholly missing.
//!
//! `fetch-missing` is the keyless backfill: it requests only the catalog
//! files that are absent from the raw directory and never rewrites a file
//! that is already there.

use crate::config::{Credentials, PipelineConfig};
use crate::stage::{
    write_fetch_outputs, FetchOutcome, StageError, BACKFILL_MANIFEST, FETCH_MANIFEST,
};
use chrono::NaiveDate;
use macropanel_core::catalog::{SeriesSpec, BLS_SERIES, FRED_SERIES};
use macropanel_core::data::{
    fetch_bls_series, fetch_catalog, BlsProvider, FetchProgress, FredGraphProvider, FredProvider,
    RequestPacer, SeriesProvider,
};
use tracing::{error, info};

/// Build the FRED client from config and a resolved credential.
pub fn fred_provider(
    config: &PipelineConfig,
    credentials: &Credentials,
) -> Result<FredProvider, StageError> {
    Ok(
        FredProvider::new(credentials.key(), RequestPacer::new(config.request_delay()))?
            .with_base_url(config.fred_base_url.clone()),
    )
}

/// Build the BLS client from config and a resolved credential.
pub fn bls_provider(
    config: &PipelineConfig,
    credentials: &Credentials,
) -> Result<BlsProvider, StageError> {
    Ok(
        BlsProvider::new(credentials.key(), RequestPacer::new(config.request_delay()))?
            .with_base_url(config.bls_base_url.clone()),
    )
}

/// Build the keyless FRED graph client used by the backfill.
pub fn fredgraph_provider(config: &PipelineConfig) -> Result<FredGraphProvider, StageError> {
    Ok(
        FredGraphProvider::new(RequestPacer::new(config.request_delay()))?
            .with_base_url(config.fredgraph_base_url.clone()),
    )
}

fn fail_on_missing(missing: Vec<String>, outcome: FetchOutcome) -> Result<FetchOutcome, StageError> {
    if missing.is_empty() {
        return Ok(outcome);
    }
    error!(missing = ?missing, "required series could not be fetched");
    Err(StageError::MissingRequired(missing))
}

/// Fetch the FRED catalog into `raw_dir`.
pub fn run_fetch(
    config: &PipelineConfig,
    provider: &dyn SeriesProvider,
    start: Option<NaiveDate>,
    progress: &dyn FetchProgress,
) -> Result<FetchOutcome, StageError> {
    let start = start.unwrap_or(config.start_date);
    info!(provider = provider.name(), %start, series = FRED_SERIES.len(), "fetch started");

    let summary = fetch_catalog(provider, &FRED_SERIES, start, progress);
    let missing = summary.missing_required.clone();
    let outcome = write_fetch_outputs(
        &config.raw_dir,
        FETCH_MANIFEST,
        provider.name(),
        start,
        summary,
        Vec::new(),
    )?;
    info!(
        files = outcome.written.len(),
        dir = %config.raw_dir.display(),
        "raw series written"
    );
    fail_on_missing(missing, outcome)
}

/// Fetch only the catalog series whose raw file does not exist yet.
///
/// Existing files are skipped and listed in the backfill manifest. A
/// required series that is absent and cannot be fetched fails the stage
/// after everything else has been written.
pub fn run_fetch_missing(
    config: &PipelineConfig,
    provider: &dyn SeriesProvider,
    start: Option<NaiveDate>,
    progress: &dyn FetchProgress,
) -> Result<FetchOutcome, StageError> {
    let start = start.unwrap_or(config.start_date);
    let (present, absent): (Vec<SeriesSpec>, Vec<SeriesSpec>) = FRED_SERIES
        .iter()
        .copied()
        .partition(|spec| config.raw_path(spec.file_name).exists());

    let skipped: Vec<String> = present.iter().map(|s| s.file_name.to_string()).collect();
    for file in &skipped {
        info!(file = %file, "already present, skipping");
    }
    info!(
        provider = provider.name(),
        %start,
        missing = absent.len(),
        present = skipped.len(),
        "backfill started"
    );

    let summary = fetch_catalog(provider, &absent, start, progress);
    let missing = summary.missing_required.clone();
    let outcome = write_fetch_outputs(
        &config.raw_dir,
        BACKFILL_MANIFEST,
        provider.name(),
        start,
        summary,
        skipped,
    )?;
    info!(
        files = outcome.written.len(),
        dir = %config.raw_dir.display(),
        "backfill written"
    );
    fail_on_missing(missing, outcome)
}

/// Fetch the BLS series into `raw_dir/bls`.
pub fn run_fetch_bls(
    config: &PipelineConfig,
    provider: &dyn SeriesProvider,
    start: Option<NaiveDate>,
    progress: &dyn FetchProgress,
) -> Result<FetchOutcome, StageError> {
    let start = start.unwrap_or(config.start_date);
    info!(provider = provider.name(), %start, series = BLS_SERIES.len(), "BLS fetch started");

    let summary = fetch_bls_series(provider, &BLS_SERIES, start, progress);
    let dir = config.bls_dir();
    let outcome = write_fetch_outputs(
        &dir,
        FETCH_MANIFEST,
        provider.name(),
        start,
        summary,
        Vec::new(),
    )?;
    info!(files = outcome.written.len(), dir = %dir.display(), "BLS series written");
    Ok(outcome)
}
