//! Fetch orchestrator: walks the catalog with progress reporting.
//!
//! A failing request never aborts the batch: the failure is logged, counted,
//! and that series (or that state within a state group) is left out. Callers
//! inspect `FetchSummary::missing_required` to decide whether the run failed.

use super::provider::{DataError, DatedValue, FetchProgress, SeriesProvider, SeriesRequest};
use crate::catalog::{BlsSeries, Role, SeriesId, SeriesSpec};
use crate::domain::{Observation, Scope, SeriesFrame, StateCode};
use crate::panel::harmonize::collapse_to_monthly;
use chrono::NaiveDate;
use tracing::{info, warn};

/// A series that came back with data and is ready to be stored.
#[derive(Debug, Clone)]
pub struct FetchedSeries {
    pub column: String,
    pub file_name: String,
    pub role: Role,
    /// Provider ids that contributed observations.
    pub series_ids: Vec<String>,
    pub frame: SeriesFrame,
}

/// One failed request.
#[derive(Debug)]
pub struct FetchFailure {
    /// Series column, with the state appended for state groups (`unemployment_rate/FL`).
    pub label: String,
    pub series_id: String,
    pub error: DataError,
}

/// Summary of a batch fetch.
#[derive(Debug, Default)]
pub struct FetchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub fetched: Vec<FetchedSeries>,
    pub failures: Vec<FetchFailure>,
    /// Required series for which nothing at all could be fetched.
    pub missing_required: Vec<String>,
}

impl FetchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    pub fn required_complete(&self) -> bool {
        self.missing_required.is_empty()
    }
}

/// Result of fetching one state-scoped series across its states.
#[derive(Debug)]
pub struct StateFetch {
    pub frame: Option<SeriesFrame>,
    pub series_ids: Vec<String>,
    pub failures: Vec<FetchFailure>,
    pub attempted: usize,
}

/// Number of individual requests a spec expands to.
pub fn request_count(spec: &SeriesSpec) -> usize {
    match spec.id {
        SeriesId::National(_) => 1,
        SeriesId::PerState { .. } => spec.id.states().len(),
    }
}

/// Fetch a single national series.
pub fn fetch_national(
    provider: &dyn SeriesProvider,
    spec: &SeriesSpec,
    start: NaiveDate,
) -> Result<SeriesFrame, DataError> {
    let SeriesId::National(series_id) = spec.id else {
        return Err(DataError::Other(format!(
            "'{}' is not a national series",
            spec.column
        )));
    };
    let request = SeriesRequest::new(series_id, start).with_frequency(spec.aggregate_to);
    let values = provider.fetch(&request)?;
    national_frame(spec.column, values)
}

/// Fetch every state of a state-scoped series, continuing past failures.
///
/// `offset` and `total` position these requests inside a larger batch for
/// progress reporting.
pub fn fetch_state_group(
    provider: &dyn SeriesProvider,
    spec: &SeriesSpec,
    start: NaiveDate,
    progress: &dyn FetchProgress,
    offset: usize,
    total: usize,
) -> StateFetch {
    let states = spec.id.states();
    let mut observations = Vec::new();
    let mut series_ids = Vec::new();
    let mut failures = Vec::new();

    for (i, state) in states.iter().enumerate() {
        let label = format!("{}/{state}", spec.column);
        progress.on_start(&label, offset + i, total);

        let Some(series_id) = state.info().and_then(|info| spec.id.for_state(info)) else {
            continue;
        };
        let request = SeriesRequest::new(series_id.clone(), start).with_frequency(spec.aggregate_to);

        match provider.fetch(&request) {
            Ok(values) => {
                progress.on_complete(&label, offset + i, total, &Ok(values.len()));
                observations.extend(state_observations(*state, values));
                series_ids.push(series_id);
            }
            Err(error) => {
                warn!(series = %spec.column, state = %state, %series_id, %error, "state fetch failed");
                let outcome = Err(error);
                progress.on_complete(&label, offset + i, total, &outcome);
                if let Err(error) = outcome {
                    failures.push(FetchFailure {
                        label,
                        series_id,
                        error,
                    });
                }
            }
        }
    }

    let frame = if observations.is_empty() {
        None
    } else {
        match collapse_to_monthly(spec.column, Scope::State, observations) {
            Ok(frame) => Some(frame),
            Err(e) => {
                failures.push(FetchFailure {
                    label: spec.column.to_string(),
                    series_id: spec.column.to_string(),
                    error: DataError::from(e),
                });
                None
            }
        }
    };

    StateFetch {
        frame,
        series_ids,
        failures,
        attempted: states.len(),
    }
}

/// Fetch every series in `specs`, reporting per-request progress.
pub fn fetch_catalog(
    provider: &dyn SeriesProvider,
    specs: &[SeriesSpec],
    start: NaiveDate,
    progress: &dyn FetchProgress,
) -> FetchSummary {
    let total: usize = specs.iter().map(request_count).sum();
    let mut summary = FetchSummary {
        total,
        ..FetchSummary::default()
    };
    let mut index = 0;

    for spec in specs {
        match spec.scope {
            Scope::National => {
                let label = spec.column;
                let series_id = match spec.id {
                    SeriesId::National(id) => id.to_string(),
                    SeriesId::PerState { template, .. } => template.to_string(),
                };
                progress.on_start(label, index, total);
                let result = fetch_national(provider, spec, start);
                match result {
                    Ok(frame) => {
                        progress.on_complete(label, index, total, &Ok(frame.len()));
                        summary.succeeded += 1;
                        summary.fetched.push(FetchedSeries {
                            column: spec.column.to_string(),
                            file_name: spec.file_name.to_string(),
                            role: spec.role,
                            series_ids: vec![series_id],
                            frame,
                        });
                    }
                    Err(error) => {
                        warn!(series = %spec.column, %series_id, %error, "fetch failed");
                        let outcome = Err(error);
                        progress.on_complete(label, index, total, &outcome);
                        summary.failed += 1;
                        if let Err(error) = outcome {
                            summary.failures.push(FetchFailure {
                                label: label.to_string(),
                                series_id,
                                error,
                            });
                        }
                        if spec.is_required() {
                            summary.missing_required.push(spec.column.to_string());
                        }
                    }
                }
                index += 1;
            }
            Scope::State => {
                let group = fetch_state_group(provider, spec, start, progress, index, total);
                index += group.attempted;
                summary.succeeded += group.series_ids.len();
                summary.failed += group.attempted - group.series_ids.len();
                summary.failures.extend(group.failures);

                match group.frame {
                    Some(frame) => {
                        info!(
                            series = %spec.column,
                            states = group.series_ids.len(),
                            attempted = group.attempted,
                            "state group fetched"
                        );
                        summary.fetched.push(FetchedSeries {
                            column: spec.column.to_string(),
                            file_name: spec.file_name.to_string(),
                            role: spec.role,
                            series_ids: group.series_ids,
                            frame,
                        });
                    }
                    None => {
                        if spec.is_required() {
                            summary.missing_required.push(spec.column.to_string());
                        }
                    }
                }
            }
        }
    }

    progress.on_batch_complete(summary.succeeded, summary.failed, summary.total);
    summary
}

/// Fetch a list of BLS national series with the same partial-failure rules.
pub fn fetch_bls_series(
    provider: &dyn SeriesProvider,
    series: &[BlsSeries],
    start: NaiveDate,
    progress: &dyn FetchProgress,
) -> FetchSummary {
    let total = series.len();
    let mut summary = FetchSummary {
        total,
        ..FetchSummary::default()
    };

    for (i, entry) in series.iter().enumerate() {
        progress.on_start(entry.name, i, total);
        let request = SeriesRequest::new(entry.id, start);
        let result = provider
            .fetch(&request)
            .and_then(|values| national_frame(entry.name, values));

        match result {
            Ok(frame) => {
                progress.on_complete(entry.name, i, total, &Ok(frame.len()));
                summary.succeeded += 1;
                summary.fetched.push(FetchedSeries {
                    column: entry.name.to_string(),
                    file_name: entry.file_name(),
                    role: Role::Optional,
                    series_ids: vec![entry.id.to_string()],
                    frame,
                });
            }
            Err(error) => {
                warn!(series = %entry.name, series_id = %entry.id, %error, "BLS fetch failed");
                let outcome = Err(error);
                progress.on_complete(entry.name, i, total, &outcome);
                summary.failed += 1;
                if let Err(error) = outcome {
                    summary.failures.push(FetchFailure {
                        label: entry.name.to_string(),
                        series_id: entry.id.to_string(),
                        error,
                    });
                }
            }
        }
    }

    progress.on_batch_complete(summary.succeeded, summary.failed, summary.total);
    summary
}

fn national_frame(column: &str, values: Vec<DatedValue>) -> Result<SeriesFrame, DataError> {
    let observations = values
        .into_iter()
        .map(|(date, value)| Observation::national(date, Some(value)))
        .collect();
    Ok(collapse_to_monthly(column, Scope::National, observations)?)
}

fn state_observations(state: StateCode, values: Vec<DatedValue>) -> Vec<Observation> {
    values
        .into_iter()
        .map(|(date, value)| Observation::for_state(date, state, Some(value)))
        .collect()
}
