//! FRED (Federal Reserve Economic Data) provider.
//!
//! One GET per series against `series/observations`. Missing readings are
//! published as "." and are dropped here. No retries: a failed request is
//! reported to the caller, which decides whether the series was mandatory.

use super::pacer::RequestPacer;
use super::provider::{DataError, DatedValue, SeriesProvider, SeriesRequest};
use chrono::NaiveDate;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const FRED_BASE_URL: &str = "https://api.stlouisfed.org/fred";

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<FredObservation>,
}

#[derive(Debug, Deserialize)]
struct FredObservation {
    date: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct FredErrorBody {
    error_message: Option<String>,
}

pub struct FredProvider {
    client: Client,
    api_key: String,
    base_url: String,
    pacer: RequestPacer,
}

impl FredProvider {
    pub fn new(api_key: impl Into<String>, pacer: RequestPacer) -> Result<Self, DataError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(DataError::MissingCredential(
                "FRED API key is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: FRED_BASE_URL.to_string(),
            pacer,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn observations_url(&self) -> String {
        format!("{}/series/observations", self.base_url.trim_end_matches('/'))
    }
}

impl SeriesProvider for FredProvider {
    fn name(&self) -> &str {
        "fred"
    }

    fn fetch(&self, request: &SeriesRequest) -> Result<Vec<DatedValue>, DataError> {
        let start = request.start.format("%Y-%m-%d").to_string();
        let mut query: Vec<(&str, &str)> = vec![
            ("series_id", request.series_id.as_str()),
            ("api_key", self.api_key.as_str()),
            ("file_type", "json"),
            ("observation_start", start.as_str()),
        ];
        if let Some(freq) = request.frequency {
            query.push(("frequency", freq.fred_code()));
            query.push(("aggregation_method", "avg"));
        }

        self.pacer.wait();
        debug!(series_id = %request.series_id, "FRED request");

        let resp = self
            .client
            .get(self.observations_url())
            .query(&query)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_status(&request.series_id, status, &body));
        }

        parse_observations(&request.series_id, &body)
    }
}

/// Map a non-success status to a structured error.
fn classify_status(series_id: &str, status: StatusCode, body: &str) -> DataError {
    let message = serde_json::from_str::<FredErrorBody>(body)
        .ok()
        .and_then(|b| b.error_message)
        .unwrap_or_else(|| body.chars().take(200).collect());

    match status {
        // FRED answers 400 for unknown series ids.
        StatusCode::BAD_REQUEST if message.to_lowercase().contains("series does not exist") => {
            DataError::SeriesNotFound {
                series_id: series_id.to_string(),
            }
        }
        StatusCode::NOT_FOUND => DataError::SeriesNotFound {
            series_id: series_id.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => DataError::RateLimited,
        _ => DataError::HttpStatus {
            status: status.as_u16(),
            body: message,
        },
    }
}

/// Parse an observations payload into dated values, skipping placeholders.
fn parse_observations(series_id: &str, body: &str) -> Result<Vec<DatedValue>, DataError> {
    let parsed: ObservationsResponse = serde_json::from_str(body).map_err(|e| {
        DataError::ResponseFormatChanged(format!("FRED payload for {series_id}: {e}"))
    })?;

    let mut out = Vec::with_capacity(parsed.observations.len());
    for obs in parsed.observations {
        let Some(value) = parse_value(&obs.value) else {
            continue;
        };
        let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d").map_err(|e| {
            DataError::ResponseFormatChanged(format!("invalid FRED date '{}': {e}", obs.date))
        })?;
        out.push((date, value));
    }

    if out.is_empty() {
        return Err(DataError::EmptySeries {
            series_id: series_id.to_string(),
        });
    }

    out.sort_by_key(|(d, _)| *d);
    Ok(out)
}

fn parse_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "." {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}
