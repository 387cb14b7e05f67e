use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use log::{debug, info};
use rfi_core::{MemorySnapshot, MemoryStore};

use crate::LoaderResult;

/// Читает снимок хранилища. Отсутствующий файл — пустое хранилище.
pub fn load_store(path: &Path) -> LoaderResult<MemoryStore> {
    if !path.exists() {
        info!("No snapshot at {path:?}, starting with an empty store");
        return Ok(MemoryStore::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let snapshot: MemorySnapshot = serde_json::from_reader(reader)?;
    debug!(
        "Loaded snapshot {path:?}: {} main rows, {} dirty rows",
        snapshot.main.len(),
        snapshot.dirty.len()
    );

    Ok(MemoryStore::from_snapshot(snapshot))
}

/// Пишет снимок через временный файл рядом с целевым, затем
/// переименовывает. Прерванная запись не портит предыдущий снимок.
pub fn save_store(
    path: &Path,
    store: &MemoryStore,
) -> LoaderResult<()> {
    let tmp = path.with_extension("json.tmp");

    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer_pretty(&mut writer, &store.snapshot())?;
        writer.flush()?;
    }

    fs::rename(&tmp, path)?;
    info!("Snapshot saved to {path:?}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rfi_core::{FileIngestor, IngestConfig, RfiStore, Uploader};
    use rfi_types::{Partition, ReceiverCatalog};
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_missing_snapshot_gives_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = load_store(&dir.path().join("absent.json")).unwrap();

        assert_eq!(store.len(Partition::Main), 0);
        assert_eq!(store.len(Partition::Dirty), 0);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let data = dir.path().join("TRFI_a.txt");
        fs::write(
            &data,
            "# frontend: L\n# mjd: 58000.0\n# Frequency(MHz) Intensity(Jy)\n1400.0 2.5\n",
        )
        .unwrap();

        let config = IngestConfig::default();
        let catalog = Arc::new(ReceiverCatalog::gbt());
        let file = FileIngestor::new(config.clone(), catalog.clone())
            .ingest_path(&data)
            .unwrap();
        let uploader = Uploader::new(catalog, config.primary_composite_key);

        let mut store = MemoryStore::new();
        uploader.upload(&mut store, &file).unwrap();

        save_store(&path, &store).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let restored = load_store(&path).unwrap();
        assert_eq!(restored.len(Partition::Main), 1);
        assert!(restored
            .filename_exists(Partition::Main, "TRFI_a.txt")
            .unwrap());
        assert!(uploader.already_ingested(&restored, &file).unwrap());
    }

    #[test]
    fn test_corrupt_snapshot_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(load_store(&path), Err(crate::LoaderError::Json(_))));
    }
}
