//! Series and observations.
//!
//! A `SeriesFrame` is the in-memory form of one economic indicator after
//! loading: a semantic name, a scope, and observations sorted by
//! (date, state). Construction enforces that each (date[, state]) appears
//! at most once and that state codes are present exactly when the scope is
//! per-state.

use super::state::StateCode;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Whether a series has one value per date or one per (date, state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    National,
    State,
}

/// Native observation cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Monthly,
    Annual,
}

impl Frequency {
    /// FRED `frequency` query code.
    pub fn fred_code(&self) -> &'static str {
        match self {
            Frequency::Monthly => "m",
            Frequency::Annual => "a",
        }
    }
}

/// One dated reading. `value` is `None` when the source had a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub state: Option<StateCode>,
    pub value: Option<f64>,
}

impl Observation {
    pub fn national(date: NaiveDate, value: Option<f64>) -> Self {
        Self { date, state: None, value }
    }

    pub fn for_state(date: NaiveDate, state: StateCode, value: Option<f64>) -> Self {
        Self { date, state: Some(state), value }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("series '{series}': duplicate observation for {date} {state:?}")]
    Duplicate {
        series: String,
        date: NaiveDate,
        state: Option<StateCode>,
    },

    #[error("series '{series}': {scope:?} scope but observation on {date} has_state={has_state}")]
    ScopeMismatch {
        series: String,
        scope: Scope,
        date: NaiveDate,
        has_state: bool,
    },
}

/// A loaded series, sorted by (date, state) with unique keys.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesFrame {
    name: String,
    scope: Scope,
    observations: Vec<Observation>,
}

impl SeriesFrame {
    /// Validate and canonicalize: sort by (date, state), reject duplicates
    /// and scope violations.
    pub fn new(
        name: impl Into<String>,
        scope: Scope,
        mut observations: Vec<Observation>,
    ) -> Result<Self, SeriesError> {
        let name = name.into();

        for obs in &observations {
            let has_state = obs.state.is_some();
            if has_state != (scope == Scope::State) {
                return Err(SeriesError::ScopeMismatch {
                    series: name,
                    scope,
                    date: obs.date,
                    has_state,
                });
            }
        }

        observations.sort_by_key(|o| (o.date, o.state));
        if let Some(dup) = observations
            .windows(2)
            .find(|w| w[0].date == w[1].date && w[0].state == w[1].state)
        {
            return Err(SeriesError::Duplicate {
                series: name,
                date: dup[1].date,
                state: dup[1].state,
            });
        }

        Ok(Self {
            name,
            scope,
            observations,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn into_observations(self) -> Vec<Observation> {
        self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Rename the series, keeping its observations.
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Earliest and latest observation dates.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        // Sorted by date first, so the ends are the bounds.
        let first = self.observations.first()?.date;
        let last = self.observations.last()?.date;
        Some((first, last))
    }

    /// Distinct states present (empty for national series).
    pub fn states(&self) -> BTreeSet<StateCode> {
        self.observations.iter().filter_map(|o| o.state).collect()
    }

    /// Observations for one state (or all, for national series) in date order.
    pub fn group(&self, state: Option<StateCode>) -> impl Iterator<Item = &Observation> {
        self.observations.iter().filter(move |o| o.state == state)
    }
}

/// Truncate a date to the first day of its month.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First day of the following month.
pub fn next_month(date: NaiveDate) -> NaiveDate {
    let (y, m) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1).unwrap_or(date)
}

/// First day of the preceding month.
pub fn prev_month(date: NaiveDate) -> NaiveDate {
    let (y, m) = if date.month() == 1 {
        (date.year() - 1, 12)
    } else {
        (date.year(), date.month() - 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1).unwrap_or(date)
}

/// Number of month starts in `[start, end]`, both truncated to month start.
pub fn months_between_inclusive(start: NaiveDate, end: NaiveDate) -> usize {
    let (s, e) = (month_start(start), month_start(end));
    if e < s {
        return 0;
    }
    let span = (e.year() - s.year()) * 12 + e.month() as i32 - s.month() as i32;
    span as usize + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    #[test]
    fn new_sorts_by_date_then_state() {
        let ca: StateCode = "CA".parse().unwrap();
        let al: StateCode = "AL".parse().unwrap();
        let frame = SeriesFrame::new(
            "unemployment_rate",
            Scope::State,
            vec![
                Observation::for_state(d(2020, 2), ca, Some(5.0)),
                Observation::for_state(d(2020, 1), ca, Some(4.0)),
                Observation::for_state(d(2020, 1), al, Some(3.0)),
            ],
        )
        .unwrap();
        let keys: Vec<_> = frame
            .observations()
            .iter()
            .map(|o| (o.date, o.state.unwrap().to_string()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (d(2020, 1), "AL".to_string()),
                (d(2020, 1), "CA".to_string()),
                (d(2020, 2), "CA".to_string()),
            ]
        );
        assert_eq!(frame.date_range(), Some((d(2020, 1), d(2020, 2))));
    }

    #[test]
    fn duplicate_observation_rejected() {
        let err = SeriesFrame::new(
            "federal_funds_rate",
            Scope::National,
            vec![
                Observation::national(d(2020, 1), Some(1.5)),
                Observation::national(d(2020, 1), Some(1.6)),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, SeriesError::Duplicate { .. }));
    }

    #[test]
    fn scope_mismatch_rejected() {
        let ca: StateCode = "CA".parse().unwrap();
        let err = SeriesFrame::new(
            "federal_funds_rate",
            Scope::National,
            vec![Observation::for_state(d(2020, 1), ca, Some(1.5))],
        )
        .unwrap_err();
        assert!(matches!(err, SeriesError::ScopeMismatch { .. }));
    }

    #[test]
    fn month_arithmetic() {
        assert_eq!(month_start(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()), d(2024, 2));
        assert_eq!(next_month(d(2024, 12)), d(2025, 1));
        assert_eq!(prev_month(d(2024, 1)), d(2023, 12));
        assert_eq!(months_between_inclusive(d(1990, 2), d(2025, 6)), 425);
        assert_eq!(months_between_inclusive(d(2025, 6), d(1990, 2)), 0);
    }
}
