//! Macropanel Runner: pipeline configuration and stage orchestration.
//!
//! This crate builds on `macropanel-core` to provide:
//! - TOML configuration with lookup order and defaults
//! - Credential resolution from overrides, the environment and `.env`
//! - One entry point per pipeline stage (fetch, fetch-bls, fetch-missing,
//!   merge, enrich, summary), each committing its outputs all-or-nothing
//! - Fetch manifests with content hashes and failure records

pub mod config;
pub mod enrich;
pub mod fetch;
pub mod merge;
pub mod stage;
pub mod summary;

pub use config::{parse_date, ConfigError, Credentials, PipelineConfig};
pub use enrich::{enrich_panel, run_enrich, EnrichOutcome};
pub use fetch::{
    bls_provider, fred_provider, fredgraph_provider, run_fetch, run_fetch_bls, run_fetch_missing,
};
pub use merge::{build_panel, run_merge, MergeOutcome};
pub use stage::{FetchManifest, FetchOutcome, StageError};
pub use summary::{run_summary, PanelSummary};
