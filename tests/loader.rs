use std::io::Write;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::write::GzEncoder;

use kira_sightings::error::KiraError;
use kira_sightings::loader::{self, LoadOptions, LoadWarning};

fn temp_path(temp: &tempfile::TempDir, name: &str) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().join(name)).unwrap()
}

const BASE: &str = "\
verbatimScientificName,decimalLatitude,decimalLongitude,eventDate,stateProvince
Lynx rufus,19.43,-99.13,2019-03-04,Ciudad de México
Canis latrans,17.06,-96.72,2020-07-21T10:15:00,Oaxaca
Lynx rufus,,-96.72,2020-07-22,Oaxaca
Lynx rufus,16.75,-93.12,not a date,Chiapas
Ursus americanus,95.0,-93.12,2021-01-01,Chiapas
,20.97,-89.62,2021-05-02,Yucatán
Lynx rufus,20.97,-89.62,2021-05-02,
";

#[test]
fn load_cleans_rows_and_counts_drops() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp_path(&temp, "base.csv");
    std::fs::write(path.as_std_path(), BASE).unwrap();

    let loaded = loader::load(&path, &LoadOptions::default()).unwrap();
    let report = &loaded.report;
    assert_eq!(report.rows_read, 7);
    assert_eq!(report.missing_fields, 1);
    assert_eq!(report.invalid_dates, 1);
    assert_eq!(report.invalid_coordinates, 1);
    assert_eq!(report.rows_kept(), 4);
    assert!(report.warnings.is_empty());

    let rows = loaded.dataset.observations();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|row| {
        row.latitude.is_finite() && row.longitude.is_finite() && row.year >= 2019
    }));

    assert_eq!(rows[0].species(), Some("Lynx rufus"));
    assert_eq!(rows[0].species_count, Some(2));
    assert_eq!(rows[0].period.to_string(), "2019-03");
    assert_eq!(rows[1].event_date.to_string(), "2020-07-21 10:15:00");
    assert_eq!(rows[2].species(), None);
    assert_eq!(rows[2].species_count, None);
    assert_eq!(rows[3].region(), None);

    let bounds = loaded.dataset.period_bounds().unwrap();
    assert_eq!(bounds.to_string(), "2019-03 .. 2021-05");
}

#[test]
fn missing_region_column_uses_placeholder() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp_path(&temp, "base.csv");
    std::fs::write(
        path.as_std_path(),
        "verbatimScientificName,decimalLatitude,decimalLongitude,eventDate\n\
         Lynx rufus,19.43,-99.13,2019-03-04\n\
         Canis latrans,17.06,-96.72,2020-07-21\n",
    )
    .unwrap();

    let loaded = loader::load(&path, &LoadOptions::default()).unwrap();
    assert_eq!(
        loaded.report.warnings,
        [LoadWarning::MissingRegionColumn {
            placeholder: "Unknown".to_string()
        }]
    );
    assert!(
        loaded
            .dataset
            .observations()
            .iter()
            .all(|row| row.region() == Some("Unknown"))
    );
}

#[test]
fn tab_separated_gzip_is_detected_from_extension() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp_path(&temp, "base.tsv.gz");
    let file = std::fs::File::create(path.as_std_path()).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder
        .write_all(
            b"eventDate\tverbatimScientificName\tdecimalLongitude\tdecimalLatitude\n\
              2018-11\tPuma concolor\t-103.3\t20.6\n",
        )
        .unwrap();
    encoder.finish().unwrap();

    let loaded = loader::load(&path, &LoadOptions::default()).unwrap();
    let rows = loaded.dataset.observations();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].species(), Some("Puma concolor"));
    assert_eq!(rows[0].latitude, 20.6);
    assert_eq!(rows[0].event_date.to_string(), "2018-11-01 00:00:00");
}

#[test]
fn explicit_delimiter_overrides_extension() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp_path(&temp, "base.csv");
    std::fs::write(
        path.as_std_path(),
        "verbatimScientificName;decimalLatitude;decimalLongitude;eventDate\n\
         Lynx rufus;19.43;-99.13;2019-03-04\n",
    )
    .unwrap();

    let options = LoadOptions {
        delimiter: Some(b';'),
        ..LoadOptions::default()
    };
    let loaded = loader::load(&path, &options).unwrap();
    assert_eq!(loaded.dataset.len(), 1);
}

#[test]
fn missing_file_and_column_are_errors() {
    let temp = tempfile::tempdir().unwrap();
    let missing = temp_path(&temp, "absent.csv");
    assert_matches!(
        loader::load(&missing, &LoadOptions::default()),
        Err(KiraError::DatasetNotFound(_))
    );

    let path = temp_path(&temp, "base.csv");
    std::fs::write(
        path.as_std_path(),
        "verbatimScientificName,decimalLatitude,eventDate\nLynx rufus,19.43,2019-03-04\n",
    )
    .unwrap();
    let err = loader::load(&path, &LoadOptions::default()).unwrap_err();
    assert_matches!(err, KiraError::MissingColumn(column) if column == "decimalLongitude");
}
