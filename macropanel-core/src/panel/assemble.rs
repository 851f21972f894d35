//! Panel assembler.
//!
//! 1. Common range: latest start and earliest end across the three required
//!    series. An empty intersection is fatal.
//! 2. Federal funds ⨝ national unemployment, inner join on date.
//! 3. State unemployment ⨝ that result on date (broadcast to every state).
//! 4. Optional national series left-joined on date, optional state series
//!    left-joined on (date, state). Absent optional series become all-null
//!    columns so the schema never depends on which files were present.
//! 5. Rows outside the common range are dropped, then rows are sorted by
//!    (date, state).

use super::frame::{Panel, PanelKey};
use super::harmonize::harmonize;
use super::PanelError;
use crate::domain::{Scope, SeriesFrame, StateCode};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

/// An optional input that may be missing.
#[derive(Debug, Clone)]
pub struct OptionalSeries {
    pub column: String,
    pub frame: Option<SeriesFrame>,
}

impl OptionalSeries {
    pub fn new(column: impl Into<String>, frame: Option<SeriesFrame>) -> Self {
        Self {
            column: column.into(),
            frame,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssemblyInputs {
    pub state_unemployment: SeriesFrame,
    pub national_unemployment: SeriesFrame,
    pub federal_funds: SeriesFrame,
    pub optional_national: Vec<OptionalSeries>,
    pub optional_state: Vec<OptionalSeries>,
}

#[derive(Debug, Clone)]
pub struct Assembly {
    pub panel: Panel,
    pub common_start: NaiveDate,
    pub common_end: NaiveDate,
}

/// Intersection of the date ranges: `(max of starts, min of ends)`.
pub fn common_date_range(frames: &[&SeriesFrame]) -> Result<(NaiveDate, NaiveDate), PanelError> {
    let mut start: Option<NaiveDate> = None;
    let mut end: Option<NaiveDate> = None;
    for frame in frames {
        let (lo, hi) = frame
            .date_range()
            .ok_or_else(|| PanelError::EmptySeries(frame.name().to_string()))?;
        start = Some(start.map_or(lo, |s| s.max(lo)));
        end = Some(end.map_or(hi, |e| e.min(hi)));
    }
    match (start, end) {
        (Some(start), Some(end)) if start <= end => Ok((start, end)),
        (Some(start), Some(end)) => Err(PanelError::NoCommonDateRange { start, end }),
        _ => Err(PanelError::EmptyPanel),
    }
}

fn expect_scope(frame: &SeriesFrame, expected: Scope) -> Result<(), PanelError> {
    if frame.scope() != expected {
        return Err(PanelError::ScopeMismatch {
            series: frame.name().to_string(),
            expected,
            actual: frame.scope(),
        });
    }
    Ok(())
}

pub fn assemble(inputs: AssemblyInputs) -> Result<Assembly, PanelError> {
    let AssemblyInputs {
        state_unemployment,
        national_unemployment,
        federal_funds,
        optional_national,
        optional_state,
    } = inputs;

    expect_scope(&state_unemployment, Scope::State)?;
    expect_scope(&national_unemployment, Scope::National)?;
    expect_scope(&federal_funds, Scope::National)?;

    let (common_start, common_end) =
        common_date_range(&[&state_unemployment, &national_unemployment, &federal_funds])?;
    info!(%common_start, %common_end, "common date range");

    // Federal funds ⨝ national unemployment (inner, on date).
    let ff: BTreeMap<NaiveDate, Option<f64>> = federal_funds
        .observations()
        .iter()
        .map(|o| (o.date, o.value))
        .collect();
    let national: BTreeMap<NaiveDate, (Option<f64>, Option<f64>)> = national_unemployment
        .observations()
        .iter()
        .filter_map(|o| ff.get(&o.date).map(|f| (o.date, (*f, o.value))))
        .collect();

    // State unemployment ⨝ national (inner, on date), restricted to the common range.
    let mut keys = Vec::new();
    let mut unemployment = Vec::new();
    let mut national_unemp = Vec::new();
    let mut fed_funds = Vec::new();
    for obs in state_unemployment.observations() {
        if obs.date < common_start || obs.date > common_end {
            continue;
        }
        let (Some(state), Some((ff_value, nu_value))) = (obs.state, national.get(&obs.date)) else {
            continue;
        };
        keys.push(PanelKey::new(obs.date, state));
        unemployment.push(obs.value);
        national_unemp.push(*nu_value);
        fed_funds.push(*ff_value);
    }

    if keys.is_empty() {
        return Err(PanelError::EmptyPanel);
    }

    let mut panel = Panel::new(keys)?;
    panel.push_column(state_unemployment.name(), unemployment)?;
    panel.push_column(national_unemployment.name(), national_unemp)?;
    panel.push_column(federal_funds.name(), fed_funds)?;

    for optional in optional_national {
        join_optional(&mut panel, optional, Scope::National)?;
    }
    for optional in optional_state {
        join_optional(&mut panel, optional, Scope::State)?;
    }

    panel.retain_dates(common_start, common_end);
    panel.sort_canonical();
    if panel.is_empty() {
        return Err(PanelError::EmptyPanel);
    }

    info!(
        rows = panel.len(),
        states = panel.states().len(),
        columns = panel.columns().len() + 2,
        "panel assembled"
    );

    Ok(Assembly {
        panel,
        common_start,
        common_end,
    })
}

fn join_optional(panel: &mut Panel, optional: OptionalSeries, scope: Scope) -> Result<(), PanelError> {
    let OptionalSeries { column, frame } = optional;
    let Some(frame) = frame else {
        warn!(series = %column, "optional series unavailable, column left null");
        return panel.push_column(column, vec![None; panel.len()]);
    };

    expect_scope(&frame, scope)?;
    let harmonized = harmonize(frame.renamed(column.clone()));
    match scope {
        Scope::National => left_join_national(panel, &harmonized.frame)?,
        Scope::State => left_join_state(panel, &harmonized.frame)?,
    }
    if harmonized.upsampled {
        panel.mark_synthesized(column);
    }
    Ok(())
}

/// Broadcast a national series onto every state row with the same date.
pub fn left_join_national(panel: &mut Panel, frame: &SeriesFrame) -> Result<(), PanelError> {
    expect_scope(frame, Scope::National)?;
    let by_date: HashMap<NaiveDate, Option<f64>> = frame
        .observations()
        .iter()
        .map(|o| (o.date, o.value))
        .collect();
    let values = panel
        .keys()
        .iter()
        .map(|k| by_date.get(&k.date).copied().flatten())
        .collect();
    panel.push_column(frame.name(), values)
}

/// Join a state series on (date, state); rows without a match get null.
pub fn left_join_state(panel: &mut Panel, frame: &SeriesFrame) -> Result<(), PanelError> {
    expect_scope(frame, Scope::State)?;
    let by_key: HashMap<(NaiveDate, StateCode), Option<f64>> = frame
        .observations()
        .iter()
        .filter_map(|o| o.state.map(|s| ((o.date, s), o.value)))
        .collect();
    let values = panel
        .keys()
        .iter()
        .map(|k| by_key.get(&(k.date, k.state)).copied().flatten())
        .collect();
    panel.push_column(frame.name(), values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Observation;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn s(code: &str) -> StateCode {
        code.parse().unwrap()
    }

    fn national(name: &str, points: &[(NaiveDate, f64)]) -> SeriesFrame {
        SeriesFrame::new(
            name,
            Scope::National,
            points.iter().map(|(d, v)| Observation::national(*d, Some(*v))).collect(),
        )
        .unwrap()
    }

    fn by_state(name: &str, states: &[&str], dates: &[NaiveDate]) -> SeriesFrame {
        let mut obs = Vec::new();
        for (i, code) in states.iter().enumerate() {
            for (j, date) in dates.iter().enumerate() {
                obs.push(Observation::for_state(*date, s(code), Some((i * 100 + j) as f64)));
            }
        }
        SeriesFrame::new(name, Scope::State, obs).unwrap()
    }

    fn inputs() -> AssemblyInputs {
        AssemblyInputs {
            state_unemployment: by_state(
                "unemployment_rate",
                &["CA", "AL"],
                &[d(2020, 2), d(2020, 3), d(2020, 4)],
            ),
            national_unemployment: national(
                "national_unemployment_rate",
                &[(d(2020, 1), 3.5), (d(2020, 2), 3.6), (d(2020, 3), 4.4), (d(2020, 4), 14.7)],
            ),
            federal_funds: national(
                "federal_funds_rate",
                &[(d(2020, 1), 1.55), (d(2020, 2), 1.58), (d(2020, 3), 0.65)],
            ),
            optional_national: vec![],
            optional_state: vec![],
        }
    }

    #[test]
    fn common_range_is_max_of_mins_min_of_maxes() {
        let i = inputs();
        let range =
            common_date_range(&[&i.state_unemployment, &i.national_unemployment, &i.federal_funds])
                .unwrap();
        assert_eq!(range, (d(2020, 2), d(2020, 3)));
    }

    #[test]
    fn disjoint_ranges_fail() {
        let a = national("a", &[(d(2000, 1), 1.0), (d(2000, 2), 1.0)]);
        let b = national("b", &[(d(2010, 1), 1.0)]);
        assert!(matches!(
            common_date_range(&[&a, &b]),
            Err(PanelError::NoCommonDateRange { .. })
        ));
    }

    #[test]
    fn assembles_broadcast_panel_in_canonical_order() {
        let assembly = assemble(inputs()).unwrap();
        let panel = &assembly.panel;
        assert_eq!(panel.len(), 4);
        assert_eq!(
            panel.header(),
            vec![
                "date",
                "state",
                "unemployment_rate",
                "national_unemployment_rate",
                "federal_funds_rate"
            ]
        );
        assert_eq!(panel.keys()[0], PanelKey::new(d(2020, 2), s("AL")));
        assert_eq!(panel.keys()[1], PanelKey::new(d(2020, 2), s("CA")));
        let ff = panel.values("federal_funds_rate").unwrap();
        assert_eq!(ff[0], ff[1]);
        assert_eq!(ff[2], Some(0.65));
    }

    #[test]
    fn absent_optional_series_is_null_column() {
        let mut i = inputs();
        i.optional_national = vec![OptionalSeries::new("recession_indicator", None)];
        let panel = assemble(i).unwrap().panel;
        assert_eq!(panel.len(), 4);
        assert_eq!(panel.column("recession_indicator").unwrap().null_count(), 4);
    }

    #[test]
    fn partial_state_coverage_leaves_nulls() {
        let mut i = inputs();
        i.optional_state = vec![OptionalSeries::new(
            "private_employment",
            Some(by_state("raw", &["CA"], &[d(2020, 2), d(2020, 3)])),
        )];
        let panel = assemble(i).unwrap().panel;
        let col = panel.values("private_employment").unwrap();
        for (key, value) in panel.keys().iter().zip(col) {
            assert_eq!(value.is_some(), key.state == s("CA"));
        }
    }

    #[test]
    fn annual_optional_series_is_flagged() {
        let mut i = inputs();
        i.optional_national = vec![OptionalSeries::new(
            "annual_thing",
            Some(national("annual_thing", &[(d(2019, 1), 1.0), (d(2020, 1), 2.0), (d(2021, 1), 3.0)])),
        )];
        let panel = assemble(i).unwrap().panel;
        assert!(panel.synthesized().contains("annual_thing"));
        assert!(panel.values("annual_thing").unwrap().iter().all(|v| *v == Some(2.0)));
    }

    #[test]
    fn wrong_scope_rejected() {
        let mut i = inputs();
        i.federal_funds = by_state("federal_funds_rate", &["CA"], &[d(2020, 2)]);
        assert!(matches!(assemble(i), Err(PanelError::ScopeMismatch { .. })));
    }
}
