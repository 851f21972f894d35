//! Domain types for macropanel

pub mod series;
pub mod state;

pub use series::{
    month_start, months_between_inclusive, next_month, prev_month, Frequency, Observation, Scope,
    SeriesError, SeriesFrame,
};
pub use state::{InvalidStateCode, StateCode, StateInfo, STATES};
