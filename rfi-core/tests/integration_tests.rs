use std::{fs, path::PathBuf, sync::Arc};

use rfi_core::{
    aggregate, FileIngestor, IngestConfig, IngestError, LineError, MemoryStore, Predicate,
    RfiStore, UploadOutcome, Uploader,
};
use rfi_types::{FrequencyKey, Partition, ReceiverCatalog, NAN_FIELD, UNKNOWN_RECEIVER};
use tempfile::TempDir;

// ===========================================================================
// Helpers
// ===========================================================================

fn ingestor() -> FileIngestor {
    FileIngestor::new(IngestConfig::default(), Arc::new(ReceiverCatalog::gbt()))
}

fn uploader() -> Uploader {
    Uploader::new(
        Arc::new(ReceiverCatalog::gbt()),
        IngestConfig::default().primary_composite_key,
    )
}

fn write(
    dir: &TempDir,
    name: &str,
    body: &str,
) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, body).unwrap();
    path
}

fn key(s: &str) -> FrequencyKey {
    s.parse().unwrap()
}

const HEADERED: &str = "\
################# RFI scan #################
# projid: TRFI_052819_L1
# date: 2019-05-28 12:30:00
# frontend: Rcvr1_2
# mjd: 58631.52
# azimuth (deg): 357.0
# elevation (deg): 45.0
# polarization: XX
#Window\tChannel\tFrequency(MHz)\tIntensity(Jy)
0\t1\t1400.12345\t2.0
0\t2\t1400.12349\t4.0

0\t3\t1420.0\tNaN
0\t4\t1500.5\t1.0
1\t5\t9000.0\t7.0
";

// ===========================================================================
// Нормализация файла
// ===========================================================================

#[test]
fn test_headered_file_end_to_end() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "TRFI_052819_L1_rfiscan1_s0001.txt", HEADERED);

    let file = ingestor().ingest_path(&path).unwrap();

    assert_eq!(file.path, path);
    assert_eq!(file.header.frontend, "Rcvr1_2");
    assert_eq!(file.header.projid, "TRFI_052819_L1");
    assert_eq!(file.header.azimuth_deg, Some(357.0));
    assert!(!file.header.is_inferred());

    let merged = &file.records[&key("1400.1234")];
    assert_eq!(merged.counts, 2);
    assert_eq!(merged.intensity_jy, 3.0);
    assert_eq!(merged.window, NAN_FIELD);
    assert_eq!(merged.channel, NAN_FIELD);

    let single = &file.records[&key("1500.5")];
    assert_eq!(single.counts, 1);
    assert_eq!(single.channel, "4");

    let dirty = &file.records[&key("9000.0")];
    assert_eq!(dirty.partition, Partition::Dirty);

    assert_eq!(file.records.len(), 3);
    assert_eq!(file.stats.skipped_lines, 1);
    assert_eq!(file.stats.blank_lines, 1);
}

#[test]
fn test_headerless_file_az_el_from_name() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "TRFI_scan_az123el045_pol.txt",
        "1400.1 2.0\n1400.2 3.0\n",
    );

    let file = ingestor().ingest_path(&path).unwrap();
    let header = &file.header;

    assert!(header.is_inferred());
    assert_eq!(header.azimuth_deg, Some(123.0));
    assert_eq!(header.elevation_deg, Some(45.0));
    assert_eq!(header.column_names, vec!["Frequency (MHz)", "Intensity (Jy)"]);
    assert_eq!(header.frontend, UNKNOWN_RECEIVER);
    assert!(header.mjd.is_some());
    assert_eq!(header.projid, NAN_FIELD);

    assert_eq!(file.records.len(), 2);
    for record in file.records.values() {
        assert_eq!(record.window, NAN_FIELD);
        assert_eq!(record.channel, NAN_FIELD);
        assert_eq!(record.partition, Partition::Main);
    }
}

#[test]
fn test_column_mismatch_aborts_file() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "TRFI_bad.txt",
        "# frontend: L\n# Window Channel Frequency(MHz) Intensity(Jy)\n1 1400.0 2.0\n",
    );

    match ingestor().ingest_path(&path) {
        Err(IngestError::Schema { source, line, .. }) => {
            assert!(matches!(source, LineError::InvalidColumnValues(_)));
            assert_eq!(line, "1 1400.0 2.0");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_unrecognized_column_aborts_file() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "TRFI_cols.txt",
        "# frontend: L\n# Freq Intensity(Jy)\n1400.0 2.0\n",
    );

    let err = ingestor().ingest_path(&path).unwrap_err();

    assert!(err.is_schema());
    assert!(matches!(
        err,
        IngestError::Schema { source: LineError::UnrecognizedColumn(_), .. }
    ));
}

#[test]
fn test_merged_columns_repaired() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "TRFI_overlap.txt",
        "# frontend: L\n# Channel Frequency(MHz) Intensity(Jy)\n7 1471.456800.000\n8 1471.5 2.0\n",
    );

    let file = ingestor().ingest_path(&path).unwrap();
    let repaired = &file.records[&key("1471.456")];

    assert_eq!(repaired.intensity_jy, 800.0);
    assert_eq!(repaired.channel, "7");
    assert_eq!(file.stats.repaired_lines, 1);
}

// ===========================================================================
// Загрузка в хранилище
// ===========================================================================

#[test]
fn test_upload_is_idempotent_per_file() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "TRFI_052819_L1_rfiscan1_s0001.txt", HEADERED);
    let file = ingestor().ingest_path(&path).unwrap();

    let mut store = MemoryStore::new();

    let first = uploader().upload(&mut store, &file).unwrap();
    assert!(matches!(first, UploadOutcome::Uploaded(_)));
    assert_eq!(store.len(Partition::Main), 2);
    assert_eq!(store.len(Partition::Dirty), 1);
    assert!(store.bad_files().contains("TRFI_052819_L1_rfiscan1_s0001.txt"));
    assert_eq!(store.receiver_keys("Rcvr1_2").len(), 2);
    assert_eq!(
        store.latest_project("Rcvr1_2").unwrap().unwrap().projid,
        "TRFI_052819_L1"
    );

    let again = ingestor().ingest_path(&path).unwrap();
    assert_eq!(
        uploader().upload(&mut store, &again).unwrap(),
        UploadOutcome::AlreadyIngested
    );
    assert_eq!(store.len(Partition::Main), 2);
}

#[test]
fn test_stored_rows_feed_aggregation() {
    let dir = TempDir::new().unwrap();
    let mut store = MemoryStore::new();

    for (i, mjd) in ["58000.0", "58001.0", "58002.0"].iter().enumerate() {
        let body = format!(
            "# frontend: L\n# mjd: {mjd}\n# Frequency(MHz) Intensity(Jy)\n1400.0 {}\n1500.0 10.0\n",
            i + 1
        );
        let path = write(&dir, &format!("TRFI_{i}.txt"), &body);
        let file = ingestor().ingest_path(&path).unwrap();
        uploader().upload(&mut store, &file).unwrap();
    }

    let rows = store.query(Partition::Main, &Predicate::All).unwrap();
    let bins: Vec<_> = aggregate(
        rows.iter()
            .map(|r| (r.record.frequency.as_mhz(), r.record.intensity_jy)),
    )
    .collect();

    assert_eq!(bins.len(), 2);
    assert_eq!(bins[0].frequency_mhz, 1400.0);
    assert_eq!(bins[0].mean, 2.0);
    assert_eq!(bins[0].samples, 3);
    assert_eq!(bins[1].median, 10.0);
}
