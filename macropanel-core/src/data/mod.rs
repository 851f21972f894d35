//! Data acquisition and storage: provider clients, fetch orchestration,
//! source loading and atomic CSV snapshots.

pub mod bls;
pub mod download;
pub mod fred;
pub mod fredgraph;
pub mod loader;
pub mod pacer;
pub mod provider;
pub mod store;

pub use bls::BlsProvider;
pub use download::{
    fetch_bls_series, fetch_catalog, FetchFailure, FetchSummary, FetchedSeries,
};
pub use fred::FredProvider;
pub use fredgraph::FredGraphProvider;
pub use loader::{load_optional, load_required, read_panel, read_series};
pub use pacer::RequestPacer;
pub use provider::{
    DataError, FetchProgress, SeriesProvider, SeriesRequest, SilentProgress, StdoutProgress,
};
pub use store::{content_hash, series_to_csv, write_atomic, StagedWrite};
