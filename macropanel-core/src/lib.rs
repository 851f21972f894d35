//! Macropanel Core: state-by-month macroeconomic panel construction.
//!
//! This crate contains:
//! - Domain types (state codes, observations, series frames)
//! - The series catalog (FRED and BLS identifiers, roles, raw file names)
//! - Provider clients for FRED and BLS with request pacing
//! - A fetch orchestrator that tolerates per-series failures
//! - Source loading and atomic CSV snapshots
//! - Panel assembly, frequency harmonization and derived variables
//! - Quality reports, data dictionaries and descriptive summaries

pub mod catalog;
pub mod data;
pub mod domain;
pub mod panel;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types handed between pipeline stages are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::StateCode>();
        require_sync::<domain::StateCode>();
        require_send::<domain::SeriesFrame>();
        require_sync::<domain::SeriesFrame>();
        require_send::<panel::Panel>();
        require_sync::<panel::Panel>();
        require_send::<panel::QualityReport>();
        require_sync::<panel::QualityReport>();
        require_send::<data::FetchSummary>();
        require_send::<data::DataError>();
        require_sync::<data::DataError>();
        require_send::<data::FredProvider>();
        require_sync::<data::FredProvider>();
        require_send::<data::BlsProvider>();
        require_sync::<data::BlsProvider>();
    }

    /// Providers are used behind `&dyn SeriesProvider`.
    #[test]
    fn provider_trait_is_object_safe() {
        fn _takes(provider: &dyn data::SeriesProvider) -> &str {
            provider.name()
        }
    }
}
