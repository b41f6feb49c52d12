use std::collections::HashMap;

use crate::error::KiraError;

/// Per-species "included" flags plus the derived list of included species.
///
/// The derived list is rebuilt inside every mutating call, so readers never
/// observe flags and list out of step. Until `initialize` runs every species
/// counts as selected; the first mutation initializes implicitly.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    order: Vec<String>,
    flags: HashMap<String, bool>,
    selected: Vec<String>,
    initialized: bool,
}

impl SelectionState {
    /// `categories` must be in display order; `selected()` reports in the
    /// same order.
    pub fn new<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let order = categories.into_iter().map(Into::into).collect::<Vec<_>>();
        Self {
            selected: order.clone(),
            order,
            flags: HashMap::new(),
            initialized: false,
        }
    }

    /// Marks every species as included. Only the first call has an effect;
    /// it returns whether this call did the initialization.
    pub fn initialize(&mut self) -> bool {
        if self.initialized {
            return false;
        }
        self.initialized = true;
        self.set_all(true);
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Flips one flag and returns its new value.
    pub fn toggle(&mut self, category: &str) -> Result<bool, KiraError> {
        self.initialize();
        let flag = self
            .flags
            .get_mut(category)
            .ok_or_else(|| KiraError::UnknownCategory(category.to_string()))?;
        *flag = !*flag;
        let value = *flag;
        self.refresh();
        Ok(value)
    }

    pub fn select_all(&mut self) {
        self.initialized = true;
        self.set_all(true);
    }

    pub fn deselect_all(&mut self) {
        self.initialized = true;
        self.set_all(false);
    }

    pub fn is_selected(&self, category: &str) -> bool {
        if !self.initialized {
            return self.order.iter().any(|known| known == category);
        }
        self.flags.get(category).copied().unwrap_or(false)
    }

    /// Included species in display order.
    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    fn set_all(&mut self, included: bool) {
        self.flags = self
            .order
            .iter()
            .map(|category| (category.clone(), included))
            .collect();
        self.refresh();
    }

    fn refresh(&mut self) {
        self.selected = self
            .order
            .iter()
            .filter(|category| self.flags.get(*category).copied().unwrap_or(false))
            .cloned()
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn state() -> SelectionState {
        SelectionState::new(["B", "C", "A"])
    }

    #[test]
    fn uninitialized_selects_everything() {
        let selection = state();
        assert!(!selection.is_initialized());
        assert_eq!(selection.selected(), ["B", "C", "A"]);
        assert!(selection.is_selected("A"));
        assert!(!selection.is_selected("Z"));
    }

    #[test]
    fn initialize_runs_once() {
        let mut selection = state();
        assert!(selection.initialize());
        selection.deselect_all();
        assert!(!selection.initialize());
        assert!(selection.selected().is_empty());
    }

    #[test]
    fn select_and_deselect_all() {
        let mut selection = state();
        selection.initialize();
        selection.deselect_all();
        assert!(selection.selected().is_empty());
        selection.select_all();
        assert_eq!(selection.selected(), ["B", "C", "A"]);
    }

    #[test]
    fn toggle_twice_restores_membership() {
        let mut selection = state();
        selection.initialize();
        assert!(!selection.toggle("C").unwrap());
        assert_eq!(selection.selected(), ["B", "A"]);
        assert!(selection.toggle("C").unwrap());
        assert_eq!(selection.selected(), ["B", "C", "A"]);
    }

    #[test]
    fn toggle_keeps_display_order() {
        let mut selection = state();
        selection.deselect_all();
        selection.toggle("A").unwrap();
        selection.toggle("B").unwrap();
        assert_eq!(selection.selected(), ["B", "A"]);
        assert_eq!(selection.selected_count(), 2);
    }

    #[test]
    fn toggle_unknown_is_an_error() {
        let mut selection = state();
        let err = selection.toggle("Z").unwrap_err();
        assert_matches!(err, KiraError::UnknownCategory(name) if name == "Z");
        assert_eq!(selection.selected_count(), 3);
    }
}
