use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::domain::Rgba;
use crate::loader::Dataset;
use crate::palette::ColorMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryEntry {
    pub name: String,
    /// Rows of this species in the whole base table, not the filtered view.
    pub count: usize,
    pub color: Rgba,
}

impl CategoryEntry {
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.count)
    }
}

/// Distinct species of a base table, in sidebar display order: descending by
/// global count, ties by name.
#[derive(Debug, Clone, Default)]
pub struct CategoryRegistry {
    entries: Vec<CategoryEntry>,
    index: HashMap<String, usize>,
    colors: ColorMap,
}

impl CategoryRegistry {
    pub fn build(dataset: &Dataset) -> Self {
        let mut counts = BTreeMap::<&str, usize>::new();
        for observation in dataset.observations() {
            if let (Some(species), Some(count)) =
                (observation.species(), observation.species_count)
            {
                counts.insert(species, count);
            }
        }

        let colors = ColorMap::assign(counts.keys());
        let mut entries = counts
            .into_iter()
            .map(|(name, count)| CategoryEntry {
                name: name.to_string(),
                count,
                color: colors.get(Some(name)),
            })
            .collect::<Vec<_>>();
        entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));

        let index = entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.name.clone(), position))
            .collect();

        Self {
            entries,
            index,
            colors,
        }
    }

    pub fn entries(&self) -> &[CategoryEntry] {
        &self.entries
    }

    pub fn display_order(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&CategoryEntry> {
        self.index.get(name).map(|&position| &self.entries[position])
    }

    /// Sidebar label, `"name (count)"`.
    pub fn label(&self, name: &str) -> Option<String> {
        self.get(name).map(CategoryEntry::label)
    }

    pub fn color(&self, name: Option<&str>) -> Rgba {
        self.colors.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
