use chrono::NaiveDateTime;
use serde::Serialize;

use crate::aggregate::{self, CountEntry, YearlyStack};
use crate::config::{DashboardSettings, MapSettings};
use crate::domain::{DateRange, Observation, Rgba};
use crate::filter::FilteredView;
use crate::loader::LoadReport;
use crate::registry::CategoryRegistry;

pub const NO_MATCHES: &str =
    "No observations match the selected filters. Try adjusting the filters.";
pub const NO_SPECIES: &str = "No species recorded in the filtered data.";
pub const NO_REGIONS: &str = "No regions recorded in the filtered data.";
pub const NO_YEARS: &str = "No valid years in the selected range for the yearly histogram.";

/// A dashboard section: either data to draw or the message shown instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Panel<T> {
    Ready(T),
    NoData(String),
}

impl<T> Panel<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Panel::Ready(value) => Some(value),
            Panel::NoData(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Panel::Ready(_))
    }

    fn non_empty(value: T, is_empty: impl FnOnce(&T) -> bool, message: &str) -> Self {
        if is_empty(&value) {
            Panel::NoData(message.to_string())
        } else {
            Panel::Ready(value)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPoint {
    pub longitude: f64,
    pub latitude: f64,
    pub color: Rgba,
    pub species: String,
    pub year: i32,
}

impl MapPoint {
    pub fn tooltip(&self) -> String {
        format!("Species: {}\nYear: {}", self.species, self.year)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewState {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: f64,
    pub pitch: f64,
}

impl ViewState {
    /// Longitude and latitude spans visible at this zoom, assuming a
    /// viewport four 256px tiles wide and two tall.
    pub fn span(&self) -> (f64, f64) {
        let width = (4.0 * 360.0 / 2f64.powf(self.zoom)).min(360.0);
        (width, (width / 2.0).min(180.0))
    }

    pub fn x_bounds(&self) -> [f64; 2] {
        let (width, _) = self.span();
        [self.longitude - width / 2.0, self.longitude + width / 2.0]
    }

    pub fn y_bounds(&self) -> [f64; 2] {
        let (_, height) = self.span();
        [self.latitude - height / 2.0, self.latitude + height / 2.0]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapLayer {
    pub points: Vec<MapPoint>,
    /// Point radius in meters.
    pub radius: f64,
    pub view: ViewState,
}

impl MapLayer {
    pub fn build<'a, I>(rows: I, registry: &CategoryRegistry, settings: &MapSettings) -> Self
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        let points = rows
            .into_iter()
            .map(|row| MapPoint {
                longitude: row.longitude,
                latitude: row.latitude,
                color: registry.color(row.species()),
                species: row.species().unwrap_or_default().to_string(),
                year: row.year,
            })
            .collect::<Vec<_>>();

        let (latitude, longitude) = if points.is_empty() {
            (settings.fallback_latitude, settings.fallback_longitude)
        } else {
            let n = points.len() as f64;
            (
                points.iter().map(|p| p.latitude).sum::<f64>() / n,
                points.iter().map(|p| p.longitude).sum::<f64>() / n,
            )
        };

        Self {
            points,
            radius: settings.point_radius,
            view: ViewState {
                latitude,
                longitude,
                zoom: settings.zoom,
                pitch: settings.pitch,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub species: String,
    pub event_date: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
}

/// Raw rows for the expandable data table, newest first. Rows sharing a
/// timestamp keep their source order.
pub fn table_rows<'a, I>(rows: I) -> Vec<TableRow>
where
    I: IntoIterator<Item = &'a Observation>,
{
    let mut table = rows
        .into_iter()
        .map(|row| TableRow {
            species: row.species().unwrap_or_default().to_string(),
            event_date: row.event_date,
            latitude: row.latitude,
            longitude: row.longitude,
        })
        .collect::<Vec<_>>();
    table.sort_by(|a, b| b.event_date.cmp(&a.event_date));
    table
}

/// Everything a renderer needs for one frame, derived from the filtered
/// view. Building it never touches session state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub total: usize,
    pub selected_species: usize,
    pub species_total: usize,
    pub date_range: Option<DateRange>,
    pub map: Panel<MapLayer>,
    pub table: Panel<Vec<TableRow>>,
    pub top_species: Panel<Vec<CountEntry>>,
    pub top_regions: Panel<Vec<CountEntry>>,
    pub yearly: Panel<YearlyStack>,
    pub warnings: Vec<String>,
}

pub struct DashboardInput<'s, 'a> {
    pub view: &'s FilteredView<'a>,
    pub registry: &'s CategoryRegistry,
    pub settings: &'s DashboardSettings,
    pub selected_species: usize,
    pub date_range: Option<DateRange>,
    pub report: &'s LoadReport,
}

impl Dashboard {
    pub fn build(input: DashboardInput<'_, '_>) -> Self {
        let DashboardInput {
            view,
            registry,
            settings,
            selected_species,
            date_range,
            report,
        } = input;

        let warnings = report
            .warnings
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();

        if view.is_empty() {
            let no_data = || NO_MATCHES.to_string();
            return Self {
                total: 0,
                selected_species,
                species_total: registry.len(),
                date_range,
                map: Panel::NoData(no_data()),
                table: Panel::NoData(no_data()),
                top_species: Panel::NoData(no_data()),
                top_regions: Panel::NoData(no_data()),
                yearly: Panel::NoData(no_data()),
                warnings,
            };
        }

        Self {
            total: view.len(),
            selected_species,
            species_total: registry.len(),
            date_range,
            map: Panel::Ready(MapLayer::build(view.iter(), registry, &settings.map)),
            table: Panel::Ready(table_rows(view.iter())),
            top_species: Panel::non_empty(
                aggregate::top_categories(view.iter(), settings.top_species),
                Vec::is_empty,
                NO_SPECIES,
            ),
            top_regions: Panel::non_empty(
                aggregate::top_regions(view.iter(), settings.top_regions),
                Vec::is_empty,
                NO_REGIONS,
            ),
            yearly: Panel::non_empty(
                aggregate::yearly_stack(view.iter(), settings.histogram_top),
                YearlyStack::is_empty,
                NO_YEARS,
            ),
            warnings,
        }
    }
}
