use chrono::{Datelike, NaiveDate};

use crate::domain::{Observation, Period};

/// Builds a sighting at a fixed point. `date` is `YYYY-MM-DD`.
pub fn observation(species: Option<&str>, date: &str, region: Option<&str>) -> Observation {
    observation_at(species, date, region, 19.43, -99.13)
}

pub fn observation_at(
    species: Option<&str>,
    date: &str,
    region: Option<&str>,
    latitude: f64,
    longitude: f64,
) -> Observation {
    let event_date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    Observation {
        species: species.map(str::to_string),
        latitude,
        longitude,
        year: event_date.year(),
        period: Period::from_date(&event_date),
        event_date,
        region: region.map(str::to_string),
        species_count: None,
    }
}
