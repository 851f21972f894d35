//! Derived-variable engine.
//!
//! State-varying columns are transformed per state: the panel is partitioned
//! into each state's chronologically ordered rows, the operation runs inside
//! each partition, and results are written back to the original row
//! positions. Nothing crosses a state boundary.
//!
//! National columns (identical across states on a date) are differenced and
//! lagged once per date, between consecutive calendar months, then
//! broadcast back onto every state row.

use super::frame::Panel;
use super::PanelError;
use crate::domain::prev_month;
use chrono::NaiveDate;
use std::collections::BTreeMap;

pub const UNEMPLOYMENT_RATE: &str = "unemployment_rate";
pub const FEDERAL_FUNDS_RATE: &str = "federal_funds_rate";

pub const UNEMPLOYMENT_YOY_CHANGE: &str = "unemployment_yoy_change";
pub const FED_RATE_CHANGE: &str = "fed_rate_change";
pub const UNEMPLOYMENT_LAGGED_1MO: &str = "unemployment_lagged_1mo";
pub const FED_RATE_LAGGED_1MO: &str = "fed_rate_lagged_1mo";
pub const UNEMPLOYMENT_VOLATILITY_12MO: &str = "unemployment_volatility_12mo";

pub const VOLATILITY_WINDOW: usize = 12;
pub const VOLATILITY_MIN_PERIODS: usize = 1;

/// Value `k` rows earlier within the same state; the first `k` rows of each
/// state are null.
pub fn grouped_lag(panel: &Panel, column: &str, k: usize) -> Result<Vec<Option<f64>>, PanelError> {
    let values = panel.values(column)?;
    let mut out = vec![None; panel.len()];
    for rows in panel.state_groups().values() {
        for (pos, &row) in rows.iter().enumerate() {
            if pos >= k {
                out[row] = values[rows[pos - k]];
            }
        }
    }
    Ok(out)
}

/// `lag(1) - lag(13)` within state.
///
/// This is the change between one month ago and thirteen months ago, not
/// `value - lag(12)`. Downstream regressions were fitted against this exact
/// definition.
pub fn yoy_change(panel: &Panel, column: &str) -> Result<Vec<Option<f64>>, PanelError> {
    let lag1 = grouped_lag(panel, column, 1)?;
    let lag13 = grouped_lag(panel, column, 13)?;
    Ok(lag1
        .into_iter()
        .zip(lag13)
        .map(|(a, b)| Some(a? - b?))
        .collect())
}

/// Trailing rolling sample standard deviation within state.
///
/// The window holds the current row and up to `window - 1` earlier rows of
/// the same state. Nulls are skipped. With fewer than `min_periods` non-null
/// values the result is null; with exactly one it is 0.0; otherwise the
/// n-1 sample estimate.
pub fn grouped_rolling_std(
    panel: &Panel,
    column: &str,
    window: usize,
    min_periods: usize,
) -> Result<Vec<Option<f64>>, PanelError> {
    let values = panel.values(column)?;
    let mut out = vec![None; panel.len()];
    let window = window.max(1);
    for rows in panel.state_groups().values() {
        for (pos, &row) in rows.iter().enumerate() {
            let from = (pos + 1).saturating_sub(window);
            let sample: Vec<f64> = rows[from..=pos].iter().filter_map(|&r| values[r]).collect();
            if sample.len() < min_periods.max(1) {
                continue;
            }
            out[row] = Some(sample_std(&sample));
        }
    }
    Ok(out)
}

fn sample_std(sample: &[f64]) -> f64 {
    let n = sample.len();
    if n < 2 {
        return 0.0;
    }
    let mean = sample.iter().sum::<f64>() / n as f64;
    let ss: f64 = sample.iter().map(|x| (x - mean).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// One value per date for a column that must be identical across states.
fn per_date_values(
    panel: &Panel,
    column: &str,
) -> Result<BTreeMap<NaiveDate, Option<f64>>, PanelError> {
    let values = panel.values(column)?;
    let mut by_date: BTreeMap<NaiveDate, Option<f64>> = BTreeMap::new();
    for (key, value) in panel.keys().iter().zip(values) {
        match by_date.get(&key.date) {
            Some(existing) if existing != value => {
                return Err(PanelError::NotBroadcast {
                    column: column.to_string(),
                    date: key.date,
                });
            }
            Some(_) => {}
            None => {
                by_date.insert(key.date, *value);
            }
        }
    }
    Ok(by_date)
}

/// Previous-month value and month-over-month change of a national column,
/// broadcast to every row. Null when the previous calendar month is not in
/// the panel or either reading is null.
pub fn national_lag_and_change(
    panel: &Panel,
    column: &str,
) -> Result<(Vec<Option<f64>>, Vec<Option<f64>>), PanelError> {
    let by_date = per_date_values(panel, column)?;
    let mut lagged = Vec::with_capacity(panel.len());
    let mut change = Vec::with_capacity(panel.len());
    for key in panel.keys() {
        let current = by_date.get(&key.date).copied().flatten();
        let previous = by_date.get(&prev_month(key.date)).copied().flatten();
        lagged.push(previous);
        change.push(current.zip(previous).map(|(c, p)| c - p));
    }
    Ok((lagged, change))
}

/// Add the standard derived columns to an assembled panel.
pub fn add_derived_variables(panel: &mut Panel) -> Result<(), PanelError> {
    let yoy = yoy_change(panel, UNEMPLOYMENT_RATE)?;
    let (fed_lagged, fed_change) = national_lag_and_change(panel, FEDERAL_FUNDS_RATE)?;
    let unemp_lagged = grouped_lag(panel, UNEMPLOYMENT_RATE, 1)?;
    let volatility = grouped_rolling_std(
        panel,
        UNEMPLOYMENT_RATE,
        VOLATILITY_WINDOW,
        VOLATILITY_MIN_PERIODS,
    )?;

    panel.set_column(UNEMPLOYMENT_YOY_CHANGE, yoy)?;
    panel.set_column(FED_RATE_CHANGE, fed_change)?;
    panel.set_column(UNEMPLOYMENT_LAGGED_1MO, unemp_lagged)?;
    panel.set_column(FED_RATE_LAGGED_1MO, fed_lagged)?;
    panel.set_column(UNEMPLOYMENT_VOLATILITY_12MO, volatility)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StateCode;
    use crate::panel::frame::{PanelColumn, PanelKey};

    fn month(i: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2000 + (i / 12) as i32, i % 12 + 1, 1).unwrap()
    }

    fn s(code: &str) -> StateCode {
        code.parse().unwrap()
    }

    /// Two states over `n` months. CA's unemployment is `i`, TX's is `100 + i`.
    fn two_state_panel(n: u32) -> Panel {
        let mut keys = Vec::new();
        let mut unemp = Vec::new();
        let mut ff = Vec::new();
        for i in 0..n {
            for (code, base) in [("CA", 0.0), ("TX", 100.0)] {
                keys.push(PanelKey::new(month(i), s(code)));
                unemp.push(Some(base + i as f64));
                ff.push(Some(i as f64 * 0.25));
            }
        }
        Panel::from_parts(
            keys,
            vec![
                PanelColumn::new(UNEMPLOYMENT_RATE, unemp),
                PanelColumn::new(FEDERAL_FUNDS_RATE, ff),
            ],
        )
        .unwrap()
    }

    fn value_at(panel: &Panel, column: &str, i: u32, code: &str) -> Option<f64> {
        let row = panel.row_index()[&PanelKey::new(month(i), s(code))];
        panel.values(column).unwrap()[row]
    }

    #[test]
    fn lag_never_crosses_states() {
        let panel = two_state_panel(5);
        let lag = grouped_lag(&panel, UNEMPLOYMENT_RATE, 1).unwrap();
        for (key, value) in panel.keys().iter().zip(&lag) {
            if key.date == month(0) {
                assert_eq!(*value, None);
            }
        }
        let row = panel.row_index()[&PanelKey::new(month(3), s("TX"))];
        assert_eq!(lag[row], Some(102.0));
    }

    #[test]
    fn yoy_change_is_lag1_minus_lag13() {
        let mut panel = two_state_panel(20);
        add_derived_variables(&mut panel).unwrap();
        // Rows 0..=12 of each state have no lag-13.
        for i in 0..13 {
            assert_eq!(value_at(&panel, UNEMPLOYMENT_YOY_CHANGE, i, "CA"), None);
        }
        // At t: (t-1) - (t-13) = 12 for a unit-slope series.
        assert_eq!(value_at(&panel, UNEMPLOYMENT_YOY_CHANGE, 13, "CA"), Some(12.0));
        assert_eq!(value_at(&panel, UNEMPLOYMENT_YOY_CHANGE, 19, "TX"), Some(12.0));
    }

    #[test]
    fn yoy_offsets_are_pinned() {
        // Distinct values per month so any other offset pair gives a different answer.
        let keys: Vec<_> = (0..15).map(|i| PanelKey::new(month(i), s("CA"))).collect();
        let values: Vec<_> = (0..15).map(|i| Some(2f64.powi(i as i32))).collect();
        let panel =
            Panel::from_parts(keys, vec![PanelColumn::new(UNEMPLOYMENT_RATE, values)]).unwrap();
        let yoy = yoy_change(&panel, UNEMPLOYMENT_RATE).unwrap();
        assert_eq!(yoy[13], Some(2f64.powi(12) - 1.0));
        assert_eq!(yoy[14], Some(2f64.powi(13) - 2.0));
    }

    #[test]
    fn fed_rate_change_and_lag_are_per_month() {
        let mut panel = two_state_panel(4);
        add_derived_variables(&mut panel).unwrap();
        assert_eq!(value_at(&panel, FED_RATE_CHANGE, 0, "CA"), None);
        assert_eq!(value_at(&panel, FED_RATE_CHANGE, 0, "TX"), None);
        assert_eq!(value_at(&panel, FED_RATE_CHANGE, 2, "TX"), Some(0.25));
        assert_eq!(value_at(&panel, FED_RATE_LAGGED_1MO, 3, "CA"), Some(0.5));
    }

    #[test]
    fn fed_rate_change_null_across_calendar_gap() {
        let keys = vec![
            PanelKey::new(month(0), s("CA")),
            PanelKey::new(month(2), s("CA")),
        ];
        let mut panel = Panel::from_parts(
            keys,
            vec![
                PanelColumn::new(UNEMPLOYMENT_RATE, vec![Some(1.0), Some(2.0)]),
                PanelColumn::new(FEDERAL_FUNDS_RATE, vec![Some(1.0), Some(2.0)]),
            ],
        )
        .unwrap();
        add_derived_variables(&mut panel).unwrap();
        assert_eq!(panel.values(FED_RATE_CHANGE).unwrap(), &[None, None]);
        // The grouped lag is positional and still sees the earlier row.
        assert_eq!(panel.values(UNEMPLOYMENT_LAGGED_1MO).unwrap(), &[None, Some(1.0)]);
    }

    #[test]
    fn non_broadcast_national_column_rejected() {
        let keys = vec![PanelKey::new(month(0), s("CA")), PanelKey::new(month(0), s("TX"))];
        let panel = Panel::from_parts(
            keys,
            vec![PanelColumn::new(FEDERAL_FUNDS_RATE, vec![Some(1.0), Some(2.0)])],
        )
        .unwrap();
        assert!(matches!(
            national_lag_and_change(&panel, FEDERAL_FUNDS_RATE),
            Err(PanelError::NotBroadcast { .. })
        ));
    }

    #[test]
    fn rolling_std_first_row_is_zero() {
        let panel = two_state_panel(3);
        let vol = grouped_rolling_std(&panel, UNEMPLOYMENT_RATE, 12, 1).unwrap();
        assert_eq!(vol[panel.row_index()[&PanelKey::new(month(0), s("CA"))]], Some(0.0));
        assert_eq!(vol[panel.row_index()[&PanelKey::new(month(0), s("TX"))]], Some(0.0));
        // {0, 1}: sample std = sqrt(0.5)
        let second = vol[panel.row_index()[&PanelKey::new(month(1), s("CA"))]].unwrap();
        assert!((second - 0.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn rolling_std_window_is_trailing_twelve() {
        let panel = two_state_panel(30);
        let vol = grouped_rolling_std(&panel, UNEMPLOYMENT_RATE, 12, 1).unwrap();
        // Any 12 consecutive integers share the same sample std.
        let expected = sample_std(&(0..12).map(|i| i as f64).collect::<Vec<_>>());
        for i in 11..30 {
            let row = panel.row_index()[&PanelKey::new(month(i), s("TX"))];
            assert!((vol[row].unwrap() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn rolling_std_all_null_window_is_null() {
        let keys: Vec<_> = (0..3).map(|i| PanelKey::new(month(i), s("CA"))).collect();
        let panel = Panel::from_parts(
            keys,
            vec![PanelColumn::new(UNEMPLOYMENT_RATE, vec![None, None, Some(4.0)])],
        )
        .unwrap();
        let vol = grouped_rolling_std(&panel, UNEMPLOYMENT_RATE, 12, 1).unwrap();
        assert_eq!(vol, vec![None, None, Some(0.0)]);
    }

    #[test]
    fn missing_column_is_error() {
        let panel = Panel::new(vec![PanelKey::new(month(0), s("CA"))]).unwrap();
        assert!(matches!(
            grouped_lag(&panel, "nope", 1),
            Err(PanelError::MissingColumn(_))
        ));
    }
}
