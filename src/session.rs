use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::config::DashboardSettings;
use crate::dashboard::{Dashboard, DashboardInput};
use crate::domain::{DateRange, Period};
use crate::error::KiraError;
use crate::filter::{self, FilteredView};
use crate::loader::{Dataset, LoadReport, LoadedDataset};
use crate::registry::{CategoryEntry, CategoryRegistry};
use crate::selection::SelectionState;

/// One user interaction. Every frontend funnels its input through these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Toggle(String),
    SelectAll,
    DeselectAll,
    SetRange { start: Period, end: Period },
    ResetRange,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeciesList {
    pub species: Vec<CategoryEntry>,
}

/// Per-viewer state over a shared, read-only base table.
#[derive(Debug)]
pub struct Session {
    loaded: Arc<LoadedDataset>,
    registry: CategoryRegistry,
    selection: SelectionState,
    bounds: Option<DateRange>,
    range: Option<DateRange>,
    settings: DashboardSettings,
}

impl Session {
    pub fn start(loaded: Arc<LoadedDataset>, settings: DashboardSettings) -> Result<Self, KiraError> {
        if loaded.dataset.is_empty() {
            return Err(KiraError::EmptyDataset);
        }
        let registry = CategoryRegistry::build(&loaded.dataset);
        let mut selection = SelectionState::new(registry.display_order());
        selection.initialize();
        let bounds = loaded.dataset.period_bounds();

        tracing::debug!(
            rows = loaded.dataset.len(),
            species = registry.len(),
            bounds = ?bounds.map(|b| b.to_string()),
            "session started"
        );

        Ok(Self {
            loaded,
            registry,
            selection,
            bounds,
            range: bounds,
            settings,
        })
    }

    pub fn apply(&mut self, action: Action) -> Result<(), KiraError> {
        tracing::debug!(?action, "apply");
        match action {
            Action::Toggle(name) => {
                self.selection.toggle(&name)?;
            }
            Action::SelectAll => self.selection.select_all(),
            Action::DeselectAll => self.selection.deselect_all(),
            Action::SetRange { start, end } => {
                let requested = DateRange::new(start, end)?;
                self.range = Some(match &self.bounds {
                    Some(bounds) => requested.clamp_to(bounds),
                    None => requested,
                });
            }
            Action::ResetRange => self.range = self.bounds,
        }
        Ok(())
    }

    pub fn dataset(&self) -> &Dataset {
        &self.loaded.dataset
    }

    pub fn report(&self) -> &LoadReport {
        &self.loaded.report
    }

    pub fn loaded(&self) -> &Arc<LoadedDataset> {
        &self.loaded
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    /// Included species in display order.
    pub fn selected(&self) -> &[String] {
        self.selection.selected()
    }

    pub fn date_range(&self) -> Option<DateRange> {
        self.range
    }

    /// Earliest and latest month present in the base table.
    pub fn bounds(&self) -> Option<DateRange> {
        self.bounds
    }

    pub fn settings(&self) -> &DashboardSettings {
        &self.settings
    }

    pub fn filtered(&self) -> FilteredView<'_> {
        let selected = self
            .selection
            .selected()
            .iter()
            .map(String::as_str)
            .collect::<HashSet<_>>();
        filter::filter(self.loaded.dataset.observations(), &selected, self.range)
    }

    pub fn dashboard(&self) -> Dashboard {
        let view = self.filtered();
        Dashboard::build(DashboardInput {
            view: &view,
            registry: &self.registry,
            settings: &self.settings,
            selected_species: self.selection.selected_count(),
            date_range: self.range,
            report: &self.loaded.report,
        })
    }

    pub fn species(&self) -> SpeciesList {
        SpeciesList {
            species: self.registry.entries().to_vec(),
        }
    }
}
