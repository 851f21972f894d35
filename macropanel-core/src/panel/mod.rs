//! Panel construction: frame type, frequency harmonizer, assembler,
//! derived-variable engine, employment shares, quality reporting.

pub mod assemble;
pub mod derive;
pub mod describe;
pub mod frame;
pub mod harmonize;
pub mod quality;
pub mod shares;

use crate::domain::{Scope, SeriesError};
use chrono::NaiveDate;
use thiserror::Error;

pub use assemble::{
    assemble, common_date_range, left_join_national, left_join_state, Assembly, AssemblyInputs,
    OptionalSeries,
};
pub use derive::add_derived_variables;
pub use frame::{Panel, PanelColumn, PanelKey};
pub use harmonize::{collapse_to_monthly, detect_frequency, harmonize, Harmonized};
pub use quality::{Balance, ColumnStats, QualityReport};
pub use shares::share_of_total;

/// Errors from panel construction and transformation.
#[derive(Debug, Error)]
pub enum PanelError {
    #[error(
        "no common date range across required series (latest start {start} is after earliest end {end})"
    )]
    NoCommonDateRange { start: NaiveDate, end: NaiveDate },

    #[error("assembled panel is empty")]
    EmptyPanel,

    #[error("series '{0}' has no observations")]
    EmptySeries(String),

    #[error("column '{0}' not found in panel")]
    MissingColumn(String),

    #[error("column '{0}' already exists in panel")]
    DuplicateColumn(String),

    #[error("duplicate panel row for {date} / {state}")]
    DuplicateKey { date: NaiveDate, state: String },

    #[error("column '{name}' has {actual} values but panel has {expected} rows")]
    ColumnLength {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("series '{series}' has {actual:?} scope, expected {expected:?}")]
    ScopeMismatch {
        series: String,
        expected: Scope,
        actual: Scope,
    },

    #[error("column '{column}' differs across states on {date}")]
    NotBroadcast { column: String, date: NaiveDate },

    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error("CSV error: {0}")]
    Csv(String),
}
