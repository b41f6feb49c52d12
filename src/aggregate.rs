//! Chart summaries over a filtered view. All counting here is done on the
//! rows passed in, never on the global per-species counts.

use std::collections::HashMap;

use serde::Serialize;

use crate::domain::Observation;

pub const OTHER_LABEL: &str = "Other";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountEntry {
    pub key: String,
    pub count: usize,
}

pub fn top_categories<'a, I>(rows: I, n: usize) -> Vec<CountEntry>
where
    I: IntoIterator<Item = &'a Observation>,
{
    top_n(rows.into_iter().filter_map(Observation::species), n)
}

/// Rows without a region are not counted.
pub fn top_regions<'a, I>(rows: I, n: usize) -> Vec<CountEntry>
where
    I: IntoIterator<Item = &'a Observation>,
{
    top_n(rows.into_iter().filter_map(Observation::region), n)
}

/// Counts keys, sorts by count descending then key ascending, keeps `n`.
fn top_n<'a>(keys: impl Iterator<Item = &'a str>, n: usize) -> Vec<CountEntry> {
    let mut counts = HashMap::<&str, usize>::new();
    for key in keys {
        *counts.entry(key).or_default() += 1;
    }
    let mut entries = counts
        .into_iter()
        .map(|(key, count)| CountEntry {
            key: key.to_string(),
            count,
        })
        .collect::<Vec<_>>();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    entries.truncate(n);
    entries
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Group {
    Category(String),
    Other,
}

impl Group {
    pub fn label(&self) -> &str {
        match self {
            Group::Category(name) => name,
            Group::Other => OTHER_LABEL,
        }
    }
}

/// Observation counts indexed by (year, group). Years are contiguous from the
/// first to the last year present; groups are the top-N species by rank,
/// followed by `Other` when anything falls outside the top-N.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct YearlyStack {
    years: Vec<i32>,
    groups: Vec<Group>,
    /// `counts[year_index][group_index]`
    counts: Vec<Vec<usize>>,
}

impl YearlyStack {
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn get(&self, year: i32, group: &Group) -> usize {
        let Some(row) = self.year_row(year) else {
            return 0;
        };
        self.groups
            .iter()
            .position(|candidate| candidate == group)
            .map(|index| row[index])
            .unwrap_or(0)
    }

    /// Counts for one year, aligned with `groups()`.
    pub fn year_row(&self, year: i32) -> Option<&[usize]> {
        let first = *self.years.first()?;
        let index = usize::try_from(year - first).ok()?;
        self.counts.get(index).map(Vec::as_slice)
    }

    pub fn year_total(&self, year: i32) -> usize {
        self.year_row(year)
            .map(|row| row.iter().sum())
            .unwrap_or(0)
    }

    pub fn max_year_total(&self) -> usize {
        self.counts
            .iter()
            .map(|row| row.iter().sum::<usize>())
            .max()
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }
}

pub fn yearly_stack<'a, I>(rows: I, top_n: usize) -> YearlyStack
where
    I: IntoIterator<Item = &'a Observation>,
{
    let rows = rows.into_iter().collect::<Vec<_>>();
    let (Some(min_year), Some(max_year)) = (
        rows.iter().map(|row| row.year).min(),
        rows.iter().map(|row| row.year).max(),
    ) else {
        return YearlyStack::default();
    };

    let top = top_categories(rows.iter().copied(), top_n);
    let group_index = top
        .iter()
        .enumerate()
        .map(|(index, entry)| (entry.key.as_str(), index))
        .collect::<HashMap<_, _>>();
    let other = top.len();

    let years = (min_year..=max_year).collect::<Vec<_>>();
    let mut counts = vec![vec![0usize; top.len() + 1]; years.len()];
    for row in &rows {
        let group = row
            .species()
            .and_then(|species| group_index.get(species).copied())
            .unwrap_or(other);
        counts[(row.year - min_year) as usize][group] += 1;
    }

    let mut groups = top
        .into_iter()
        .map(|entry| Group::Category(entry.key))
        .collect::<Vec<_>>();
    if counts.iter().any(|row| row[other] > 0) {
        groups.push(Group::Other);
    } else {
        for row in &mut counts {
            row.pop();
        }
    }

    YearlyStack {
        years,
        groups,
        counts,
    }
}
