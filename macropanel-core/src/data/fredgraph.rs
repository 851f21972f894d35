//! Keyless FRED graph CSV download (`fredgraph.csv?id=...`).
//!
//! Serves the same series ids as the API client without a credential, at the
//! series' native frequency: daily series come back daily and are collapsed
//! to monthly means downstream. The endpoint ignores the start date, so rows
//! before `request.start` are filtered here.

use super::pacer::RequestPacer;
use super::provider::{DataError, DatedValue, SeriesProvider, SeriesRequest};
use chrono::NaiveDate;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

pub const FREDGRAPH_BASE_URL: &str = "https://fred.stlouisfed.org/graph";

const USER_AGENT: &str = concat!("macropanel/", env!("CARGO_PKG_VERSION"));

pub struct FredGraphProvider {
    client: Client,
    base_url: String,
    pacer: RequestPacer,
}

impl FredGraphProvider {
    pub fn new(pacer: RequestPacer) -> Result<Self, DataError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: FREDGRAPH_BASE_URL.to_string(),
            pacer,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn csv_url(&self) -> String {
        format!("{}/fredgraph.csv", self.base_url.trim_end_matches('/'))
    }
}

impl SeriesProvider for FredGraphProvider {
    fn name(&self) -> &str {
        "fredgraph"
    }

    fn fetch(&self, request: &SeriesRequest) -> Result<Vec<DatedValue>, DataError> {
        self.pacer.wait();
        debug!(series_id = %request.series_id, "FRED graph request");

        let resp = self
            .client
            .get(self.csv_url())
            .query(&[("id", request.series_id.as_str())])
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        match status {
            s if s.is_success() => parse_graph_csv(&request.series_id, &body, request.start),
            StatusCode::NOT_FOUND => Err(DataError::SeriesNotFound {
                series_id: request.series_id.clone(),
            }),
            StatusCode::TOO_MANY_REQUESTS => Err(DataError::RateLimited),
            _ => Err(DataError::HttpStatus {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            }),
        }
    }
}

/// Parse a two-column graph CSV (`DATE,<ID>` or `observation_date,<ID>`),
/// keeping rows on or after `start` and skipping "." placeholders.
fn parse_graph_csv(
    series_id: &str,
    body: &str,
    start: NaiveDate,
) -> Result<Vec<DatedValue>, DataError> {
    let format_changed = |detail: String| {
        DataError::ResponseFormatChanged(format!("FRED graph CSV for {series_id}: {detail}"))
    };

    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let headers = reader.headers().map_err(|e| format_changed(e.to_string()))?;
    let date_header = headers.get(0).unwrap_or("").trim().to_ascii_lowercase();
    if headers.len() != 2 || !matches!(date_header.as_str(), "date" | "observation_date") {
        return Err(format_changed(format!("unexpected header {headers:?}")));
    }

    let mut out = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| format_changed(e.to_string()))?;
        let raw_date = record.get(0).unwrap_or("").trim();
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
            .map_err(|e| format_changed(format!("invalid date '{raw_date}': {e}")))?;
        if date < start {
            continue;
        }
        let raw_value = record.get(1).unwrap_or("").trim();
        if raw_value.is_empty() || raw_value == "." {
            continue;
        }
        if let Some(value) = raw_value.parse::<f64>().ok().filter(|v| v.is_finite()) {
            out.push((date, value));
        }
    }

    if out.is_empty() {
        return Err(DataError::EmptySeries {
            series_id: series_id.to_string(),
        });
    }
    out.sort_by_key(|(d, _)| *d);
    Ok(out)
}
