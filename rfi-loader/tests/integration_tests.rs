use std::{fs, path::Path, sync::atomic::Ordering};

use rfi_core::{Predicate, RfiStore};
use rfi_loader::{
    aggregate_store, analyze, gather_filepaths, load_store, read_bins, save_store, IngestPipeline,
    LoaderConfig,
};
use rfi_types::{Partition, ReceiverCatalog};
use tempfile::TempDir;

// ===========================================================================
// Helpers
// ===========================================================================

fn write(
    dir: &Path,
    name: &str,
    body: &str,
) {
    fs::write(dir.join(name), body).unwrap();
}

fn headered(
    projid: &str,
    mjd: f64,
    rows: &str,
) -> String {
    format!(
        "# projid: {projid}\n# frontend: Rcvr1_2\n# mjd: {mjd}\n\
         #Window\tChannel\tFrequency(MHz)\tIntensity(Jy)\n{rows}"
    )
}

fn config_for(dir: &Path) -> LoaderConfig {
    LoaderConfig {
        input_dir: dir.to_path_buf(),
        snapshot_path: dir.join("store.json"),
        workers: 3,
        channel_capacity: 2,
        ..LoaderConfig::default()
    }
}

fn populate(dir: &Path) {
    write(
        dir,
        "TRFI_052819_L1_rfiscan1.txt",
        &headered("TRFI_052819_L1", 58631.5, "0\t1\t1400.0\t2.0\n0\t2\t1410.0\t1.0\n"),
    );
    write(
        dir,
        "TRFI_060119_L1_rfiscan1.txt",
        &headered(
            "TRFI_060119_L1",
            58635.5,
            "0\t1\t1420.0\t5.0\n0\t2\t1420.00001\t7.0\n1\t1\t2500.0\t9.0\n",
        ),
    );
    // Без заголовка: метаданные из имени файла
    write(dir, "TRFI_scan_L_x_y_z_XX_az120_el45.txt", "1400.0 4.0\n1410.0 3.0\n");
    // Колонки не совпадают с числом значений
    write(
        dir,
        "TRFI_bad_layout.txt",
        &headered("TRFI_bad", 58640.0, "0\t1\t1400.0\n"),
    );
    write(dir, "URLs.txt", "http://example.invalid\n");
    write(dir, "notes.md", "not data\n");
}

// ===========================================================================
// Загрузка каталога
// ===========================================================================

#[test]
fn test_full_ingest_run() {
    let dir = TempDir::new().unwrap();
    populate(dir.path());

    let config = config_for(dir.path());
    let files = gather_filepaths(&config.input_dir, &config.subset).unwrap();
    assert_eq!(files.len(), 4);

    let (pipeline, metrics) = IngestPipeline::new(config.clone(), ReceiverCatalog::gbt());
    let mut store = load_store(&config.snapshot_path).unwrap();
    pipeline.run(files, &mut store).unwrap();
    save_store(&config.snapshot_path, &store).unwrap();

    assert_eq!(metrics.files_seen.load(Ordering::Relaxed), 4);
    assert_eq!(metrics.files_ingested.load(Ordering::Relaxed), 3);
    assert_eq!(metrics.files_failed.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.records_dirty.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.records_merged.load(Ordering::Relaxed), 1);

    // 1400, 1410, 1420 + две строки файла без заголовка (другой MJD)
    assert_eq!(store.len(Partition::Main), 5);
    assert_eq!(store.len(Partition::Dirty), 1);
    assert!(store.bad_files().contains("TRFI_060119_L1_rfiscan1.txt"));

    let merged = store
        .query(Partition::Main, &Predicate::Merged)
        .unwrap();
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].record.intensity_jy, 6.0);

    let latest = store.latest_project("Rcvr1_2").unwrap().unwrap();
    assert_eq!(latest.projid, "TRFI_060119_L1");
}

#[test]
fn test_rerun_from_snapshot_is_idempotent() {
    let dir = TempDir::new().unwrap();
    populate(dir.path());
    let config = config_for(dir.path());

    for _ in 0..2 {
        let files = gather_filepaths(&config.input_dir, &config.subset).unwrap();
        let (pipeline, _) = IngestPipeline::new(config.clone(), ReceiverCatalog::gbt());
        let mut store = load_store(&config.snapshot_path).unwrap();
        pipeline.run(files, &mut store).unwrap();
        save_store(&config.snapshot_path, &store).unwrap();
    }

    let files = gather_filepaths(&config.input_dir, &config.subset).unwrap();
    let (pipeline, metrics) = IngestPipeline::new(config.clone(), ReceiverCatalog::gbt());
    let mut store = load_store(&config.snapshot_path).unwrap();
    pipeline.run(files, &mut store).unwrap();

    assert_eq!(metrics.files_ingested.load(Ordering::Relaxed), 0);
    assert_eq!(metrics.files_already_ingested.load(Ordering::Relaxed), 3);
    assert_eq!(store.len(Partition::Main), 5);
    assert!(store.duplicates().is_empty());
}

#[test]
fn test_subset_selects_files() {
    let dir = TempDir::new().unwrap();
    populate(dir.path());

    let subset = vec!["060119".to_string(), "az120".to_string()];
    let files = gather_filepaths(dir.path(), &subset).unwrap();

    assert_eq!(files.len(), 2);
}

// ===========================================================================
// Агрегация по хранилищу
// ===========================================================================

#[test]
fn test_store_aggregate_and_analyze() {
    let dir = TempDir::new().unwrap();
    populate(dir.path());
    let config = config_for(dir.path());

    let files = gather_filepaths(&config.input_dir, &config.subset).unwrap();
    let (pipeline, _) = IngestPipeline::new(config, ReceiverCatalog::gbt());
    let mut store = rfi_core::MemoryStore::new();
    pipeline.run(files, &mut store).unwrap();

    let mut csv = Vec::new();
    let n = aggregate_store(&store, Partition::Main, &Predicate::All, &mut csv).unwrap();
    assert_eq!(n, 3);

    // Все файлы каталога сняты на L-диапазоне
    let mut other = Vec::new();
    let rcvr4_8 = Predicate::Frontend("Rcvr4_8".into());
    assert_eq!(aggregate_store(&store, Partition::Main, &rcvr4_8, &mut other).unwrap(), 0);
    let mut l_band = Vec::new();
    let rcvr1_2 = Predicate::Frontend("Rcvr1_2".into());
    assert_eq!(aggregate_store(&store, Partition::Main, &rcvr1_2, &mut l_band).unwrap(), 3);

    let bins = read_bins(csv.as_slice()).unwrap();
    assert_eq!(bins[0].frequency_mhz, 1400.0);
    assert_eq!(bins[0].samples, 2);
    assert_eq!(bins[0].mean, 3.0);

    let analysis = analyze(bins, 1000.0, 15.0);
    assert_eq!(analysis.gaps.len(), 1);
    assert_eq!(analysis.gaps[0].from_mhz, 1000.0);
}
