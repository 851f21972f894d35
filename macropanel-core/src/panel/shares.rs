//! Employment shares: a component series as a percentage of a total.

use crate::domain::{Observation, Scope, SeriesFrame};
use super::PanelError;
use chrono::NaiveDate;
use std::collections::HashMap;

/// `part / total * 100` on dates present in both (inner join). A null or
/// zero total yields a null share.
pub fn share_of_total(
    name: &str,
    part: &SeriesFrame,
    total: &SeriesFrame,
) -> Result<SeriesFrame, PanelError> {
    for frame in [part, total] {
        if frame.scope() != Scope::National {
            return Err(PanelError::ScopeMismatch {
                series: frame.name().to_string(),
                expected: Scope::National,
                actual: frame.scope(),
            });
        }
    }

    let totals: HashMap<NaiveDate, Option<f64>> = total
        .observations()
        .iter()
        .map(|o| (o.date, o.value))
        .collect();

    let observations = part
        .observations()
        .iter()
        .filter_map(|o| {
            let t = totals.get(&o.date)?;
            let share = match (o.value, *t) {
                (Some(p), Some(t)) if t != 0.0 => Some(p / t * 100.0),
                _ => None,
            };
            Some(Observation::national(o.date, share))
        })
        .collect();

    Ok(SeriesFrame::new(name, Scope::National, observations)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, 1).unwrap()
    }

    fn national(name: &str, points: &[(u32, Option<f64>)]) -> SeriesFrame {
        SeriesFrame::new(
            name,
            Scope::National,
            points.iter().map(|(m, v)| Observation::national(d(*m), *v)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn share_is_percentage_on_common_dates() {
        let part = national("mfg", &[(1, Some(12.0)), (2, Some(13.0)), (3, Some(14.0))]);
        let total = national("total", &[(2, Some(130.0)), (3, Some(0.0)), (4, Some(150.0))]);
        let share = share_of_total("manufacturing_employment_share", &part, &total).unwrap();
        let obs = share.observations();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].date, d(2));
        assert!((obs[0].value.unwrap() - 10.0).abs() < 1e-12);
        assert_eq!(obs[1].value, None);
        assert_eq!(share.name(), "manufacturing_employment_share");
    }
}
