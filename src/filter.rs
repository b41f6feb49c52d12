use std::collections::HashSet;

use crate::domain::{DateRange, Observation};

/// Rows of a base table that passed the species and month predicates, in
/// their source order. Borrowed, so the base table is never copied or
/// touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredView<'a> {
    rows: Vec<&'a Observation>,
}

impl<'a> FilteredView<'a> {
    pub fn rows(&self) -> &[&'a Observation] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Observation> + '_ {
        self.rows.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<'a> FromIterator<&'a Observation> for FilteredView<'a> {
    fn from_iter<T: IntoIterator<Item = &'a Observation>>(iter: T) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

/// Keeps rows whose species is in `selected` and whose period lies in
/// `range`, inclusive.
///
/// An empty `selected` keeps nothing. Rows without a species never match.
/// `range: None` disables the month predicate.
pub fn filter<'a, I>(rows: I, selected: &HashSet<&str>, range: Option<DateRange>) -> FilteredView<'a>
where
    I: IntoIterator<Item = &'a Observation>,
{
    if selected.is_empty() {
        return FilteredView::default();
    }
    rows.into_iter()
        .filter(|row| {
            row.species()
                .map(|species| selected.contains(species))
                .unwrap_or(false)
        })
        .filter(|row| range.map(|range| range.contains(row.period)).unwrap_or(true))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Dataset;
    use crate::testutil::observation;

    fn dataset() -> Dataset {
        Dataset::from_observations(vec![
            observation(Some("A"), "2019-01-15", None),
            observation(Some("B"), "2019-03-02", None),
            observation(Some("A"), "2019-06-30", None),
            observation(None, "2019-06-30", None),
            observation(Some("C"), "2020-01-01", None),
            observation(Some("A"), "2020-02-01", None),
        ])
    }

    fn range(start: &str, end: &str) -> Option<DateRange> {
        Some(DateRange::new(start.parse().unwrap(), end.parse().unwrap()).unwrap())
    }

    #[test]
    fn applies_both_predicates_in_source_order() {
        let dataset = dataset();
        let selected = HashSet::from(["A", "C"]);
        let view = filter(dataset.observations(), &selected, range("2019-06", "2020-01"));
        let dates = view
            .iter()
            .map(|row| row.event_date.date().to_string())
            .collect::<Vec<_>>();
        assert_eq!(dates, ["2019-06-30", "2020-01-01"]);
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let dataset = dataset();
        let selected = HashSet::from(["A"]);
        let view = filter(dataset.observations(), &selected, range("2019-01", "2019-01"));
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn empty_selection_yields_nothing() {
        let dataset = dataset();
        let view = filter(dataset.observations(), &HashSet::new(), None);
        assert!(view.is_empty());
    }

    #[test]
    fn missing_range_skips_date_predicate() {
        let dataset = dataset();
        let selected = HashSet::from(["A", "B", "C"]);
        let view = filter(dataset.observations(), &selected, None);
        assert_eq!(view.len(), 5);
    }

    #[test]
    fn filtering_is_idempotent_and_never_adds_rows() {
        let dataset = dataset();
        let selected = HashSet::from(["A", "B"]);
        let window = range("2019-02", "2020-12");
        let once = filter(dataset.observations(), &selected, window);
        let twice = filter(once.iter(), &selected, window);
        assert_eq!(once, twice);
        assert!(once.iter().all(|row| {
            dataset
                .observations()
                .iter()
                .any(|base| std::ptr::eq(base, row))
        }));
    }

    #[test]
    fn empty_month_yields_empty_view() {
        let dataset = dataset();
        let selected = HashSet::from(["A", "B", "C"]);
        let view = filter(dataset.observations(), &selected, range("2019-04", "2019-04"));
        assert!(view.is_empty());
    }
}
