//! Запись нормализованного файла в хранилище.

use std::sync::Arc;

use log::{debug, info, warn};
use rfi_types::{DataRecord, FrequencyKey, Partition, ReceiverCatalog};

use crate::{
    ingest::IngestedFile,
    store::{
        CompositeKey, DuplicateEntry, LatestProject, RfiStore, StoreError, StoreResult, StoredRow,
    },
};

/// Что произошло с файлом.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded(UploadReport),
    /// Файл уже был загружен раньше, ничего не записано
    AlreadyIngested,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub inserted: u64,
    pub dirty: u64,
    /// Строки, слитые с уже существующими (межфайловые повторы)
    pub averaged: u64,
    pub receiver_keys: u64,
    pub project_keys: u64,
    /// Файл стал последним проектом своего приёмника
    pub latest_project: bool,
}

/// Загрузчик файлов через порт [`RfiStore`].
#[derive(Debug, Clone)]
pub struct Uploader {
    catalog: Arc<ReceiverCatalog>,
    key_fields: Vec<String>,
}

impl Uploader {
    pub fn new(
        catalog: Arc<ReceiverCatalog>,
        key_fields: Vec<String>,
    ) -> Self {
        Self {
            catalog,
            key_fields,
        }
    }

    /// Загружался ли файл раньше.
    ///
    /// `Main` проверяется по составному ключу первой чистой записи, `Dirty` —
    /// по имени файла. Без чистых записей остаётся только проверка имени.
    pub fn already_ingested<S: RfiStore + ?Sized>(
        &self,
        store: &S,
        file: &IngestedFile,
    ) -> StoreResult<bool> {
        let filename = &file.header.filename;

        if let Some(first) = &file.first_valid {
            let key = self.key_for(file, first.frequency);
            if store.record_exists(Partition::Main, &key)? {
                return Ok(true);
            }
        } else if store.filename_exists(Partition::Main, filename)? {
            return Ok(true);
        }

        store.filename_exists(Partition::Dirty, filename)
    }

    /// Записывает все записи файла, если он ещё не загружен.
    ///
    /// Файл пишется одной транзакцией: при ошибке хранилища изменения
    /// откатываются, и повторная загрузка начинается с чистого листа.
    pub fn upload<S: RfiStore + ?Sized>(
        &self,
        store: &mut S,
        file: &IngestedFile,
    ) -> StoreResult<UploadOutcome> {
        let filename = &file.header.filename;

        if self.already_ingested(store, file)? {
            info!("{filename}: already in store, skipping");
            return Ok(UploadOutcome::AlreadyIngested);
        }

        store.begin_file()?;

        let report = match self.write_records(store, file) {
            Ok(report) => report,
            Err(e) => {
                if let Err(rollback) = store.rollback_file() {
                    warn!("{filename}: rollback failed: {rollback}");
                }
                return Err(e);
            }
        };

        store.commit_file()?;

        info!(
            "{filename}: {} inserted, {} averaged, {} dirty",
            report.inserted, report.averaged, report.dirty
        );

        Ok(UploadOutcome::Uploaded(report))
    }

    fn write_records<S: RfiStore + ?Sized>(
        &self,
        store: &mut S,
        file: &IngestedFile,
    ) -> StoreResult<UploadReport> {
        let filename = &file.header.filename;
        let index_name = self.catalog.index_name(&file.header.frontend);
        let mut report = UploadReport::default();
        let mut bad_file_marked = false;

        for record in file.records.values() {
            let key = self.key_for(file, record.frequency);
            let row = StoredRow::new(key.clone(), record.clone(), &file.header);

            let duplicate = match store.insert(row) {
                Ok(()) => {
                    report.inserted += 1;
                    if record.partition == Partition::Dirty {
                        report.dirty += 1;
                        if !bad_file_marked {
                            store.mark_bad_file(filename)?;
                            bad_file_marked = true;
                        }
                    }
                    false
                }
                Err(StoreError::DuplicateKey(..)) => {
                    self.merge_into_existing(store, file, record, &key)?;
                    report.averaged += 1;
                    true
                }
                Err(e) => return Err(e),
            };

            if duplicate || record.partition != Partition::Main {
                continue;
            }

            if let Some(receiver) = index_name {
                self.update_caching_tables(store, file, receiver, record.frequency, &mut report)?;
            }
        }

        Ok(report)
    }

    fn key_for(
        &self,
        file: &IngestedFile,
        frequency: FrequencyKey,
    ) -> CompositeKey {
        CompositeKey::build(&self.key_fields, &file.header, frequency)
    }

    /// Межфайловый повтор: старая и новая точки уходят в каталог повторов,
    /// строка получает взвешенное среднее.
    fn merge_into_existing<S: RfiStore + ?Sized>(
        &self,
        store: &mut S,
        file: &IngestedFile,
        record: &DataRecord,
        key: &CompositeKey,
    ) -> StoreResult<()> {
        let existing = store
            .fetch(record.partition, key)?
            .ok_or_else(|| StoreError::MissingKey(key.clone(), record.partition))?;

        let old = &existing.record;
        let total = old.counts + record.counts;
        let mean = (old.intensity_jy * old.counts as f64
            + record.intensity_jy * record.counts as f64)
            / total as f64;

        if !existing.is_duplicate() {
            store.insert_duplicate(DuplicateEntry {
                frequency: record.frequency,
                intensity_jy: old.intensity_jy,
                filename: existing.filename.clone(),
            })?;
        }

        store.update_running_average(record.partition, key, total, mean)?;

        store.insert_duplicate(DuplicateEntry {
            frequency: record.frequency,
            intensity_jy: record.intensity_jy,
            filename: file.header.filename.clone(),
        })?;

        debug!("{key}: averaged with existing row, counts={total}");
        Ok(())
    }

    /// Индекс приёмника и таблица последнего проекта.
    fn update_caching_tables<S: RfiStore + ?Sized>(
        &self,
        store: &mut S,
        file: &IngestedFile,
        receiver: &str,
        frequency: FrequencyKey,
        report: &mut UploadReport,
    ) -> StoreResult<()> {
        let header = &file.header;
        let Some(mjd) = header.mjd else {
            return Ok(());
        };

        store.add_receiver_key(receiver, frequency, mjd)?;
        report.receiver_keys += 1;

        if !header.has_projid() {
            return Ok(());
        }

        let latest = store.latest_project(receiver)?;
        let is_newer = latest.as_ref().is_none_or(|p| p.mjd < mjd);

        let latest_projid = if is_newer {
            let project = LatestProject {
                projid: header.projid.clone(),
                mjd,
            };
            if let Some(prev) = store.replace_latest_project(receiver, project)? {
                info!("{receiver}: latest project {} -> {}", prev.projid, header.projid);
            }
            report.latest_project = true;
            header.projid.clone()
        } else {
            latest.map(|p| p.projid).unwrap_or_default()
        };

        if header.projid == latest_projid {
            store.add_project_key(&header.projid, frequency, mjd)?;
            report.project_keys += 1;
        }

        Ok(())
    }
}
