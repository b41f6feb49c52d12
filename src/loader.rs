use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use flate2::read::GzDecoder;
use serde::Serialize;

use crate::config::{DEFAULT_REGION_PLACEHOLDER, ResolvedConfig};
use crate::domain::{DateRange, Observation, Period};
use crate::error::KiraError;

pub const COL_SPECIES: &str = "verbatimScientificName";
pub const COL_LATITUDE: &str = "decimalLatitude";
pub const COL_LONGITUDE: &str = "decimalLongitude";
pub const COL_EVENT_DATE: &str = "eventDate";
pub const COL_REGION: &str = "stateProvince";

/// Cell values read as missing, matching what spreadsheet exports and
/// dataframe tools conventionally write for "no value".
const NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Timestamps with an offset (`Z`, `+0000`, `+00:00`, `+00`).
const OFFSET_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M%#z",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Field delimiter. `None` picks tab for `.tsv`/`.txt` and comma otherwise.
    pub delimiter: Option<u8>,
    pub region_placeholder: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            region_placeholder: DEFAULT_REGION_PLACEHOLDER.to_string(),
        }
    }
}

impl LoadOptions {
    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self {
            delimiter: config.delimiter,
            region_placeholder: config.region_placeholder.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadWarning {
    MissingRegionColumn { placeholder: String },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::MissingRegionColumn { placeholder } => write!(
                f,
                "column `{COL_REGION}` not found; every row uses region \"{placeholder}\" \
                 and the region chart will show a single bucket"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub rows_read: usize,
    pub missing_fields: usize,
    pub invalid_dates: usize,
    pub invalid_coordinates: usize,
    pub warnings: Vec<LoadWarning>,
}

impl LoadReport {
    pub fn rows_dropped(&self) -> usize {
        self.missing_fields + self.invalid_dates + self.invalid_coordinates
    }

    pub fn rows_kept(&self) -> usize {
        self.rows_read - self.rows_dropped()
    }
}

/// The cleaned base table. Rows keep their source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    observations: Vec<Observation>,
}

impl Dataset {
    pub fn from_observations(mut observations: Vec<Observation>) -> Self {
        attach_species_counts(&mut observations);
        Self { observations }
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Span of periods present, or `None` for an empty table.
    pub fn period_bounds(&self) -> Option<DateRange> {
        let min = self.observations.iter().map(|obs| obs.period).min()?;
        let max = self.observations.iter().map(|obs| obs.period).max()?;
        DateRange::new(min, max).ok()
    }
}

#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub source: Utf8PathBuf,
    pub dataset: Dataset,
    pub report: LoadReport,
}

pub fn load(path: &Utf8Path, options: &LoadOptions) -> Result<LoadedDataset, KiraError> {
    let file = File::open(path.as_std_path()).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => KiraError::DatasetNotFound(path.as_std_path().to_path_buf()),
        _ => KiraError::DatasetRead {
            path: path.as_std_path().to_path_buf(),
            message: err.to_string(),
        },
    })?;

    let delimiter = options.delimiter.unwrap_or_else(|| default_delimiter(path));
    let input: Box<dyn Read> = if is_gzip(path) {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let (dataset, report) = read_table(input, delimiter, &options.region_placeholder)?;
    tracing::debug!(
        path = %path,
        rows_read = report.rows_read,
        rows_kept = report.rows_kept(),
        missing_fields = report.missing_fields,
        invalid_dates = report.invalid_dates,
        invalid_coordinates = report.invalid_coordinates,
        "dataset loaded"
    );
    for warning in &report.warnings {
        tracing::warn!("{warning}");
    }

    Ok(LoadedDataset {
        source: path.to_path_buf(),
        dataset,
        report,
    })
}

/// Parses a delimited table from any reader. `load` is a thin wrapper that
/// opens the file and picks the delimiter.
pub fn read_table<R: Read>(
    input: R,
    delimiter: u8,
    region_placeholder: &str,
) -> Result<(Dataset, LoadReport), KiraError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader.headers().map_err(parse_error)?.clone();
    let columns = Columns::from_headers(&headers)?;

    let mut report = LoadReport::default();
    if columns.region.is_none() {
        report.warnings.push(LoadWarning::MissingRegionColumn {
            placeholder: region_placeholder.to_string(),
        });
    }

    let mut observations = Vec::new();
    for record in reader.records() {
        let record = record.map_err(parse_error)?;
        if record.len() > headers.len() {
            return Err(KiraError::DatasetParse {
                line: record.position().map(|pos| pos.line()).unwrap_or(0),
                message: format!(
                    "found record with {} fields, but the header has {}",
                    record.len(),
                    headers.len()
                ),
            });
        }
        report.rows_read += 1;
        match parse_row(&record, &columns, region_placeholder) {
            Ok(observation) => observations.push(observation),
            Err(RowRejection::MissingField) => report.missing_fields += 1,
            Err(RowRejection::InvalidDate) => report.invalid_dates += 1,
            Err(RowRejection::InvalidCoordinates) => report.invalid_coordinates += 1,
        }
    }

    Ok((Dataset::from_observations(observations), report))
}

/// Parses an `eventDate` cell into a calendar timestamp. Offsets are dropped
/// after conversion to the wall-clock time they describe.
pub fn parse_event_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_local());
    }
    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(raw, format) {
            return Some(parsed.naive_local());
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(raw, format) {
            return parsed.and_hms_opt(0, 0, 0);
        }
    }
    if raw.len() == 7 {
        if let Ok(period) = raw.parse::<Period>() {
            return period.first_day().and_hms_opt(0, 0, 0);
        }
    }
    if raw.len() == 4 && raw.chars().all(|ch| ch.is_ascii_digit()) {
        let year = raw.parse::<i32>().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0);
    }
    None
}

pub fn default_delimiter(path: &Utf8Path) -> u8 {
    let inner = if is_gzip(path) {
        path.file_stem().map(Utf8Path::new).unwrap_or(path)
    } else {
        path
    };
    match inner.extension().map(|ext| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "tsv" || ext == "txt" => b'\t',
        _ => b',',
    }
}

fn is_gzip(path: &Utf8Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

struct Columns {
    species: usize,
    latitude: usize,
    longitude: usize,
    event_date: usize,
    region: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self, KiraError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|header| header.trim_start_matches('\u{feff}') == name)
        };
        let require =
            |name: &str| find(name).ok_or_else(|| KiraError::MissingColumn(name.to_string()));

        Ok(Self {
            species: require(COL_SPECIES)?,
            latitude: require(COL_LATITUDE)?,
            longitude: require(COL_LONGITUDE)?,
            event_date: require(COL_EVENT_DATE)?,
            region: find(COL_REGION),
        })
    }
}

enum RowRejection {
    MissingField,
    InvalidDate,
    InvalidCoordinates,
}

fn parse_row(
    record: &StringRecord,
    columns: &Columns,
    region_placeholder: &str,
) -> Result<Observation, RowRejection> {
    let (Some(lat), Some(lon), Some(date)) = (
        cell(record, columns.latitude),
        cell(record, columns.longitude),
        cell(record, columns.event_date),
    ) else {
        return Err(RowRejection::MissingField);
    };

    let event_date = parse_event_date(date).ok_or(RowRejection::InvalidDate)?;
    let latitude = parse_coordinate(lat, 90.0).ok_or(RowRejection::InvalidCoordinates)?;
    let longitude = parse_coordinate(lon, 180.0).ok_or(RowRejection::InvalidCoordinates)?;

    let region = match columns.region {
        Some(index) => cell(record, index).map(str::to_string),
        None => Some(region_placeholder.to_string()),
    };

    Ok(Observation {
        species: cell(record, columns.species).map(str::to_string),
        latitude,
        longitude,
        year: event_date.year(),
        period: Period::from_date(&event_date),
        event_date,
        region,
        species_count: None,
    })
}

fn cell(record: &StringRecord, index: usize) -> Option<&str> {
    record
        .get(index)
        .map(str::trim)
        .filter(|value| !NA_VALUES.contains(value))
}

fn parse_coordinate(raw: &str, limit: f64) -> Option<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && value.abs() <= limit)
}

fn attach_species_counts(observations: &mut [Observation]) {
    let mut counts = HashMap::<String, usize>::new();
    for observation in observations.iter() {
        if let Some(species) = observation.species() {
            *counts.entry(species.to_string()).or_default() += 1;
        }
    }
    for observation in observations.iter_mut() {
        observation.species_count = observation
            .species()
            .and_then(|species| counts.get(species).copied());
    }
}

fn parse_error(err: csv::Error) -> KiraError {
    let line = err.position().map(|pos| pos.line()).unwrap_or(0);
    KiraError::DatasetParse {
        line,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Timelike;

    use super::*;

    fn read(text: &str) -> Result<(Dataset, LoadReport), KiraError> {
        read_table(text.as_bytes(), b',', "Unknown")
    }

    #[test]
    fn parses_supported_date_forms() {
        let cases = [
            ("2019-05-12T10:32:00Z", (2019, 5, 12, 10)),
            ("2019-05-12T10:32:00-06:00", (2019, 5, 12, 10)),
            ("2019-05-12T10:32Z", (2019, 5, 12, 10)),
            ("2019-05-12T10:32:00+0000", (2019, 5, 12, 10)),
            ("2019-05-12T10:32:00.5+02", (2019, 5, 12, 10)),
            ("2019-05-12T10:32-0600", (2019, 5, 12, 10)),
            ("2019-05-12T10:32:00", (2019, 5, 12, 10)),
            ("2019-05-12T10:32", (2019, 5, 12, 10)),
            ("2019-05-12 10:32:00.250", (2019, 5, 12, 10)),
            ("2019-05-12", (2019, 5, 12, 0)),
            ("2019/05/12", (2019, 5, 12, 0)),
            ("2019-05", (2019, 5, 1, 0)),
            ("2019", (2019, 1, 1, 0)),
        ];
        for (raw, (y, m, d, h)) in cases {
            let parsed = parse_event_date(raw).unwrap_or_else(|| panic!("{raw}"));
            assert_eq!(
                (parsed.year(), parsed.month(), parsed.day(), parsed.hour()),
                (y, m, d, h),
                "{raw}"
            );
        }
    }

    #[test]
    fn rejects_unparseable_dates() {
        for raw in ["2019-02-30", "2019-05/2019-06", "yesterday", "12-05", "2019-13"] {
            assert!(parse_event_date(raw).is_none(), "{raw}");
        }
    }

    #[test]
    fn drops_incomplete_and_invalid_rows() {
        let text = "\
verbatimScientificName,decimalLatitude,decimalLongitude,eventDate,stateProvince
Lynx rufus,19.4,-99.1,2020-01-03,Jalisco
Lynx rufus,,-99.1,2020-01-03,Jalisco
Lynx rufus,19.4,-99.1,,Jalisco
Lynx rufus,19.4,-99.1,not a date,Jalisco
Lynx rufus,191.4,-99.1,2020-01-03,Jalisco
Lynx rufus,NaN,-99.1,2020-01-03,Jalisco
Canis latrans,20.1,-101.0,2021-07-19T08:00:00,
";
        let (dataset, report) = read(text).unwrap();
        assert_eq!(report.rows_read, 7);
        assert_eq!(report.missing_fields, 3);
        assert_eq!(report.invalid_dates, 1);
        assert_eq!(report.invalid_coordinates, 1);
        assert_eq!(report.rows_kept(), 2);
        assert!(report.warnings.is_empty());

        let rows = dataset.observations();
        assert_eq!(rows[0].region(), Some("Jalisco"));
        assert_eq!(rows[1].region(), None);
        assert_eq!(rows[1].year, 2021);
        assert_eq!(rows[1].period.to_string(), "2021-07");
    }

    #[test]
    fn species_count_is_global_per_species() {
        let text = "\
verbatimScientificName,decimalLatitude,decimalLongitude,eventDate
A,1,1,2020-01-01
B,1,1,2020-01-01
A,1,1,2021-01-01
,1,1,2021-01-01
";
        let (dataset, _) = read(text).unwrap();
        let counts = dataset
            .observations()
            .iter()
            .map(|obs| obs.species_count)
            .collect::<Vec<_>>();
        assert_eq!(counts, vec![Some(2), Some(1), Some(2), None]);
        assert_eq!(dataset.observations()[3].species(), None);
    }

    #[test]
    fn missing_region_column_uses_placeholder() {
        let text = "\
verbatimScientificName,decimalLatitude,decimalLongitude,eventDate
A,1,1,2020-01-01
";
        let (dataset, report) = read(text).unwrap();
        assert_eq!(
            report.warnings,
            vec![LoadWarning::MissingRegionColumn {
                placeholder: "Unknown".to_string()
            }]
        );
        assert_eq!(dataset.observations()[0].region(), Some("Unknown"));
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let text = "verbatimScientificName,decimalLatitude,eventDate\nA,1,2020-01-01\n";
        let err = read(text).unwrap_err();
        assert_matches!(err, KiraError::MissingColumn(name) if name == COL_LONGITUDE);
    }

    #[test]
    fn long_row_is_a_parse_error() {
        let text = "\
verbatimScientificName,decimalLatitude,decimalLongitude,eventDate
A,1,1,2020-01-01
A,1,1,2020-01-01,extra
";
        assert_matches!(read(text), Err(KiraError::DatasetParse { line: 3, .. }));
    }

    #[test]
    fn short_rows_are_dropped_or_kept_like_missing_cells() {
        let text = "\
verbatimScientificName,decimalLatitude,decimalLongitude,eventDate,stateProvince
A,19.4,-99.1,2020-01-03,Jalisco
B,19.4,-99.1
C,20.0,-100.0,2021-02-01
";
        let (dataset, report) = read(text).unwrap();
        assert_eq!(report.rows_read, 3);
        assert_eq!(report.missing_fields, 1);
        let rows = dataset.observations();
        assert_eq!(
            rows.iter().map(|obs| obs.species()).collect::<Vec<_>>(),
            [Some("A"), Some("C")]
        );
        assert_eq!(rows[1].region(), None);
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let mut bytes =
            b"verbatimScientificName,decimalLatitude,decimalLongitude,eventDate\n".to_vec();
        bytes.extend_from_slice(b"A\xff,1,1,2020-01-01\n");
        assert_matches!(
            read_table(bytes.as_slice(), b',', "Unknown"),
            Err(KiraError::DatasetParse { .. })
        );
    }

    #[test]
    fn period_bounds_cover_all_rows() {
        let text = "\
verbatimScientificName,decimalLatitude,decimalLongitude,eventDate
A,1,1,2020-03-01
A,1,1,2018-11-20
A,1,1,2019-01-01
";
        let (dataset, _) = read(text).unwrap();
        let bounds = dataset.period_bounds().unwrap();
        assert_eq!(bounds.start().to_string(), "2018-11");
        assert_eq!(bounds.end().to_string(), "2020-03");
        assert!(Dataset::default().period_bounds().is_none());
    }

    #[test]
    fn delimiter_follows_extension() {
        assert_eq!(default_delimiter(Utf8Path::new("Data/base.csv")), b',');
        assert_eq!(default_delimiter(Utf8Path::new("occurrence.txt")), b'\t');
        assert_eq!(default_delimiter(Utf8Path::new("occurrence.tsv.gz")), b'\t');
        assert_eq!(default_delimiter(Utf8Path::new("base.csv.gz")), b',');
    }
}
