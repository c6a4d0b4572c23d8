//! Daily-calendar series operations.
//!
//! Real-world observations arrive irregular: unsorted, with duplicate days
//! and missing days. `reindex_daily` forces one slot per calendar day over
//! the observed span, `fill_forward_backward` propagates the nearest known
//! value into the synthesized gaps, and `pct_change` derives the lagged
//! change features on the filled series.

use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

/// A gap-free daily grid: one slot per calendar day from `start`.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyGrid<T> {
    pub start: NaiveDate,
    pub slots: Vec<Option<T>>,
}

impl<T> DailyGrid<T> {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Calendar day of slot `index`.
    pub fn date_at(&self, index: usize) -> NaiveDate {
        self.start + Duration::days(index as i64)
    }

    /// The last calendar day of the grid.
    pub fn end(&self) -> NaiveDate {
        self.date_at(self.len().saturating_sub(1))
    }
}

/// Reindex observations onto a strictly daily calendar spanning min→max.
///
/// Input need not be sorted; duplicate dates keep the first occurrence.
/// Returns `None` for empty input.
pub fn reindex_daily<T>(observations: Vec<(NaiveDate, T)>) -> Option<DailyGrid<T>> {
    let mut by_date: BTreeMap<NaiveDate, T> = BTreeMap::new();
    for (date, value) in observations {
        by_date.entry(date).or_insert(value);
    }

    let start = *by_date.keys().next()?;
    let end = *by_date.keys().next_back()?;
    let days = (end - start).num_days() as usize + 1;

    let mut slots = Vec::with_capacity(days);
    for i in 0..days {
        let date = start + Duration::days(i as i64);
        slots.push(by_date.remove(&date));
    }

    Some(DailyGrid { start, slots })
}

/// Forward-fill then backward-fill, so every slot inherits the nearest
/// preceding known value and leading gaps take the first observation.
///
/// Returns `None` when no slot holds a value at all.
pub fn fill_forward_backward<T: Clone>(slots: &[Option<T>]) -> Option<Vec<T>> {
    let mut filled: Vec<Option<T>> = slots.to_vec();

    let mut last: Option<T> = None;
    for slot in filled.iter_mut() {
        match slot {
            Some(v) => last = Some(v.clone()),
            None => *slot = last.clone(),
        }
    }

    let mut next: Option<T> = None;
    for slot in filled.iter_mut().rev() {
        match slot {
            Some(v) => next = Some(v.clone()),
            None => *slot = next.clone(),
        }
    }

    filled.into_iter().collect()
}

/// Percentage change over `lag` slots: `(x[i] - x[i-lag]) / x[i-lag] * 100`.
///
/// The first `lag` slots have no history and are `None`; so is any slot
/// whose base value is zero or non-finite, where the change is undefined.
pub fn pct_change(values: &[f64], lag: usize) -> Vec<Option<f64>> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            if lag == 0 || i < lag {
                return None;
            }
            let base = values[i - lag];
            if base == 0.0 || !base.is_finite() || !v.is_finite() {
                return None;
            }
            Some((v - base) / base * 100.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn reindex_spans_min_to_max_with_gap_slots() {
        let grid = reindex_daily(vec![
            (d("2024-01-01"), 1.0),
            (d("2024-01-04"), 4.0),
            (d("2024-01-02"), 2.0),
        ])
        .unwrap();

        assert_eq!(grid.start, d("2024-01-01"));
        assert_eq!(grid.end(), d("2024-01-04"));
        assert_eq!(grid.slots, vec![Some(1.0), Some(2.0), None, Some(4.0)]);
    }

    #[test]
    fn reindex_keeps_first_duplicate() {
        let grid = reindex_daily(vec![
            (d("2024-01-01"), 1.0),
            (d("2024-01-01"), 99.0),
        ])
        .unwrap();

        assert_eq!(grid.slots, vec![Some(1.0)]);
    }

    #[test]
    fn reindex_empty_input_is_none() {
        assert!(reindex_daily::<f64>(vec![]).is_none());
    }

    #[test]
    fn fill_covers_interior_and_edges() {
        let filled =
            fill_forward_backward(&[None, Some(2.0), None, None, Some(5.0), None]).unwrap();
        // Leading gap takes the first observation, interior and trailing
        // gaps take the last preceding one.
        assert_eq!(filled, vec![2.0, 2.0, 2.0, 2.0, 5.0, 5.0]);
    }

    #[test]
    fn fill_all_missing_is_none() {
        assert!(fill_forward_backward::<f64>(&[None, None]).is_none());
    }

    #[test]
    fn pct_change_matches_definition() {
        let changes = pct_change(&[100.0, 110.0, 99.0], 1);
        assert_eq!(changes[0], None);
        assert!((changes[1].unwrap() - 10.0).abs() < 1e-12);
        assert!((changes[2].unwrap() - (-10.0)).abs() < 1e-12);
    }

    #[test]
    fn pct_change_lag_window_is_undefined() {
        let values = vec![1.0; 10];
        let weekly = pct_change(&values, 7);
        assert!(weekly[..7].iter().all(|c| c.is_none()));
        assert!(weekly[7..].iter().all(|c| *c == Some(0.0)));
    }

    #[test]
    fn pct_change_zero_base_is_undefined() {
        let changes = pct_change(&[0.0, 5.0], 1);
        assert_eq!(changes[1], None);
    }
}
