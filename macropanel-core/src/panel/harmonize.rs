//! Frequency harmonizer.
//!
//! Two directions onto the monthly grid:
//! - Sub-monthly readings (daily or weekly files) collapse to the mean of
//!   each month's non-null readings, dated at month start.
//! - A series is treated as annual when it spans at least two distinct dates
//!   and every observation falls in the same calendar month. Annual series
//!   are re-indexed onto a monthly grid covering each group's own date range
//!   and filled by carrying the last known reading forward.
//!
//! Monthly series pass through untouched.

use crate::domain::{
    month_start, next_month, Frequency, Observation, Scope, SeriesError, SeriesFrame, StateCode,
};
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Output of harmonization.
#[derive(Debug, Clone)]
pub struct Harmonized {
    pub frame: SeriesFrame,
    /// True when values were synthesized by upsampling.
    pub upsampled: bool,
}

/// Build a monthly frame from observations carrying their original dates.
///
/// Readings that share a month (and state) are averaged over their non-null
/// values; a month whose readings are all null stays null. Two readings on
/// the same calendar day for the same key are a duplicate.
pub fn collapse_to_monthly(
    name: &str,
    scope: Scope,
    mut observations: Vec<Observation>,
) -> Result<SeriesFrame, SeriesError> {
    observations.sort_by_key(|o| (o.date, o.state));
    if let Some(dup) = observations
        .windows(2)
        .find(|w| w[0].date == w[1].date && w[0].state == w[1].state)
    {
        return Err(SeriesError::Duplicate {
            series: name.to_string(),
            date: dup[1].date,
            state: dup[1].state,
        });
    }

    let before = observations.len();
    let mut months: BTreeMap<(NaiveDate, Option<StateCode>), Vec<f64>> = BTreeMap::new();
    for obs in &observations {
        months
            .entry((month_start(obs.date), obs.state))
            .or_default()
            .extend(obs.value);
    }

    let after = months.len();
    if after < before {
        info!(series = name, before, after, "collapsed sub-monthly readings to monthly means");
    }
    let monthly = months
        .into_iter()
        .map(|((date, state), readings)| Observation {
            date,
            state,
            value: (!readings.is_empty())
                .then(|| readings.iter().sum::<f64>() / readings.len() as f64),
        })
        .collect();
    SeriesFrame::new(name, scope, monthly)
}

pub fn detect_frequency(frame: &SeriesFrame) -> Frequency {
    let dates: BTreeSet<NaiveDate> = frame.observations().iter().map(|o| o.date).collect();
    if dates.len() < 2 {
        return Frequency::Monthly;
    }
    let mut months = dates.iter().map(|d| d.month());
    let first = months.next();
    if months.all(|m| Some(m) == first) {
        Frequency::Annual
    } else {
        Frequency::Monthly
    }
}

/// Upsample annual series to monthly; pass monthly series through.
pub fn harmonize(frame: SeriesFrame) -> Harmonized {
    if detect_frequency(&frame) == Frequency::Monthly {
        return Harmonized {
            frame,
            upsampled: false,
        };
    }

    let name = frame.name().to_string();
    let scope = frame.scope();
    let before = frame.len();

    let groups: BTreeSet<_> = frame.observations().iter().map(|o| o.state).collect();
    let mut filled = Vec::new();
    for state in groups {
        let group: Vec<&Observation> = frame.group(state).collect();
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let end = last.date;
        let mut cursor = first.date;
        let mut next = 0;
        let mut carried: Option<f64> = None;

        while cursor <= end {
            // Advance over every reading dated on or before this month.
            while next < group.len() && group[next].date <= cursor {
                if let Some(v) = group[next].value {
                    carried = Some(v);
                }
                next += 1;
            }
            filled.push(Observation {
                date: cursor,
                state,
                value: carried,
            });
            cursor = next_month(cursor);
        }
    }

    // Keys come from a strictly increasing monthly grid per group, so they
    // are unique and consistent with the original scope.
    match SeriesFrame::new(name.clone(), scope, filled) {
        Ok(upsampled) => {
            info!(
                series = %name,
                before,
                after = upsampled.len(),
                "upsampled annual series to monthly"
            );
            Harmonized {
                frame: upsampled,
                upsampled: true,
            }
        }
        Err(_) => Harmonized {
            frame,
            upsampled: false,
        },
    }
}
