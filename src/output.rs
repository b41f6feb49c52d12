use std::io::{self, Write};

use serde::Serialize;

use crate::dashboard::{Dashboard, Panel};
use crate::session::SpeciesList;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_dashboard(dashboard: &Dashboard) -> io::Result<()> {
        Self::print_json(dashboard)
    }

    pub fn print_species(result: &SpeciesList) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

/// Plain-text rendering for `summary` and `species` outside the TUI.
pub struct TextOutput;

impl TextOutput {
    pub fn print_dashboard(dashboard: &Dashboard) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        Self::write_dashboard(&mut stdout, dashboard)
    }

    pub fn print_species(result: &SpeciesList) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        for entry in &result.species {
            writeln!(stdout, "{}  {}", entry.color, entry.label())?;
        }
        Ok(())
    }

    pub fn write_dashboard<W: Write>(out: &mut W, dashboard: &Dashboard) -> io::Result<()> {
        for warning in &dashboard.warnings {
            writeln!(out, "warning: {warning}")?;
        }
        writeln!(
            out,
            "Observations: {} ({} of {} species selected)",
            dashboard.total, dashboard.selected_species, dashboard.species_total
        )?;
        if let Some(range) = dashboard.date_range {
            writeln!(out, "Months: {range}")?;
        }

        if let Panel::NoData(message) = &dashboard.map {
            writeln!(out, "{message}")?;
            return Ok(());
        }

        writeln!(out, "\nTop species")?;
        match &dashboard.top_species {
            Panel::Ready(entries) => {
                for entry in entries {
                    writeln!(out, "  {:>6}  {}", entry.count, entry.key)?;
                }
            }
            Panel::NoData(message) => writeln!(out, "  {message}")?,
        }

        writeln!(out, "\nTop regions")?;
        match &dashboard.top_regions {
            Panel::Ready(entries) => {
                for entry in entries {
                    writeln!(out, "  {:>6}  {}", entry.count, entry.key)?;
                }
            }
            Panel::NoData(message) => writeln!(out, "  {message}")?,
        }

        writeln!(out, "\nObservations per year")?;
        match &dashboard.yearly {
            Panel::Ready(stack) => {
                for year in stack.years() {
                    writeln!(out, "  {year}  {:>6}", stack.year_total(*year))?;
                }
            }
            Panel::NoData(message) => writeln!(out, "  {message}")?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::NO_MATCHES;

    #[test]
    fn empty_dashboard_prints_message_only() {
        fn no_data<T>() -> Panel<T> {
            Panel::NoData(NO_MATCHES.to_string())
        }
        let dashboard = Dashboard {
            total: 0,
            selected_species: 0,
            species_total: 3,
            date_range: None,
            map: no_data(),
            table: no_data(),
            top_species: no_data(),
            top_regions: no_data(),
            yearly: no_data(),
            warnings: vec!["region column missing".to_string()],
        };
        let mut buffer = Vec::new();
        TextOutput::write_dashboard(&mut buffer, &dashboard).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("warning: region column missing\n"));
        assert!(text.contains("0 of 3 species selected"));
        assert!(text.trim_end().ends_with(NO_MATCHES));
        assert!(!text.contains("Top species"));
    }
}
