//! BLS public data API (v2) provider.
//!
//! The API accepts at most 20 years per request, so long ranges are split
//! into consecutive windows, each paced like any other request. Only monthly
//! periods `M01`..`M12` are kept; `M13` carries annual averages.

use super::pacer::RequestPacer;
use super::provider::{DataError, DatedValue, SeriesProvider, SeriesRequest};
use chrono::{Datelike, NaiveDate};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const BLS_BASE_URL: &str = "https://api.bls.gov/publicAPI/v2/timeseries/data/";

const MAX_YEARS_PER_REQUEST: i32 = 20;

#[derive(Debug, Serialize)]
struct BlsRequestBody<'a> {
    seriesid: Vec<&'a str>,
    startyear: String,
    endyear: String,
    registrationkey: &'a str,
}

#[derive(Debug, Deserialize)]
struct BlsResponse {
    status: String,
    #[serde(default)]
    message: Vec<String>,
    #[serde(rename = "Results")]
    results: Option<BlsResults>,
}

#[derive(Debug, Deserialize)]
struct BlsResults {
    series: Vec<BlsSeriesData>,
}

#[derive(Debug, Deserialize)]
struct BlsSeriesData {
    #[serde(default)]
    data: Vec<BlsDatum>,
}

#[derive(Debug, Deserialize)]
struct BlsDatum {
    year: String,
    period: String,
    value: String,
}

pub struct BlsProvider {
    client: Client,
    api_key: String,
    base_url: String,
    end_year: i32,
    pacer: RequestPacer,
}

impl BlsProvider {
    pub fn new(api_key: impl Into<String>, pacer: RequestPacer) -> Result<Self, DataError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(DataError::MissingCredential("BLS API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: BLS_BASE_URL.to_string(),
            end_year: chrono::Local::now().year(),
            pacer,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Last year requested (defaults to the current year).
    pub fn with_end_year(mut self, end_year: i32) -> Self {
        self.end_year = end_year;
        self
    }

    fn fetch_window(
        &self,
        series_id: &str,
        start_year: i32,
        end_year: i32,
    ) -> Result<Vec<DatedValue>, DataError> {
        let body = BlsRequestBody {
            seriesid: vec![series_id],
            startyear: start_year.to_string(),
            endyear: end_year.to_string(),
            registrationkey: &self.api_key,
        };

        self.pacer.wait();
        debug!(series_id, start_year, end_year, "BLS request");

        let resp = self
            .client
            .post(&self.base_url)
            .json(&body)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited);
        }
        if !status.is_success() {
            return Err(DataError::HttpStatus {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }

        parse_response(series_id, &text)
    }
}

impl SeriesProvider for BlsProvider {
    fn name(&self) -> &str {
        "bls"
    }

    fn fetch(&self, request: &SeriesRequest) -> Result<Vec<DatedValue>, DataError> {
        let mut out = Vec::new();
        for (from, to) in year_windows(request.start.year(), self.end_year) {
            out.extend(self.fetch_window(&request.series_id, from, to)?);
        }

        out.retain(|(date, _)| *date >= request.start);
        if out.is_empty() {
            return Err(DataError::EmptySeries {
                series_id: request.series_id.clone(),
            });
        }
        out.sort_by_key(|(d, _)| *d);
        out.dedup_by_key(|(d, _)| *d);
        Ok(out)
    }
}

/// Split `[start, end]` into inclusive windows of at most 20 years.
fn year_windows(start: i32, end: i32) -> Vec<(i32, i32)> {
    let mut windows = Vec::new();
    let mut from = start;
    while from <= end {
        let to = (from + MAX_YEARS_PER_REQUEST - 1).min(end);
        windows.push((from, to));
        from = to + 1;
    }
    windows
}

fn parse_response(series_id: &str, body: &str) -> Result<Vec<DatedValue>, DataError> {
    let parsed: BlsResponse = serde_json::from_str(body).map_err(|e| {
        DataError::ResponseFormatChanged(format!("BLS payload for {series_id}: {e}"))
    })?;

    if parsed.status != "REQUEST_SUCCEEDED" {
        let reason = if parsed.message.is_empty() {
            parsed.status
        } else {
            parsed.message.join("; ")
        };
        if reason.to_lowercase().contains("threshold") {
            return Err(DataError::RateLimited);
        }
        return Err(DataError::Other(format!("BLS request for {series_id} failed: {reason}")));
    }

    let series = parsed
        .results
        .and_then(|r| r.series.into_iter().next())
        .ok_or_else(|| DataError::SeriesNotFound {
            series_id: series_id.to_string(),
        })?;

    let mut out = Vec::with_capacity(series.data.len());
    for datum in series.data {
        let Some(month) = monthly_period(&datum.period) else {
            continue;
        };
        let year: i32 = datum.year.trim().parse().map_err(|_| {
            DataError::ResponseFormatChanged(format!("invalid BLS year '{}'", datum.year))
        })?;
        let Ok(value) = datum.value.trim().parse::<f64>() else {
            // "-" marks a reading that is not available.
            continue;
        };
        let date = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            DataError::ResponseFormatChanged(format!("invalid BLS period {year}-{}", datum.period))
        })?;
        out.push((date, value));
    }
    Ok(out)
}

/// `M01`..`M12` to month number; anything else (including `M13`) is `None`.
fn monthly_period(period: &str) -> Option<u32> {
    let month: u32 = period.strip_prefix('M')?.parse().ok()?;
    (1..=12).contains(&month).then_some(month)
}
