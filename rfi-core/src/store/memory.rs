use std::collections::{BTreeMap, BTreeSet};

use rfi_types::{FrequencyKey, Partition, NAN_FIELD};
use serde::{Deserialize, Serialize};

use super::{
    CompositeKey, DuplicateEntry, LatestProject, Predicate, RfiStore, StoreError, StoreResult,
    StoredRow, DUPLICATE_FILENAME,
};

/// Пара (частота, MJD) в индексе приёмника или таблице проекта.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexKey {
    pub frequency: FrequencyKey,
    pub mjd: f64,
}

/// Обратная операция для одного изменения внутри файловой транзакции.
#[derive(Debug)]
enum Undo {
    Insert(Partition, CompositeKey),
    Restore(Partition, StoredRow),
    Duplicate,
    BadFile(String),
    /// Имя индекса и был ли он создан этой вставкой
    ReceiverKey(String, bool),
    ProjectKey(String, bool),
    LatestProject {
        receiver: String,
        previous: Option<LatestProject>,
        dropped: Option<(String, Vec<IndexKey>)>,
        projid: String,
        overwritten: Option<Vec<IndexKey>>,
    },
}

/// Хранилище в памяти. Используется в тестах и как основа JSON-снимка.
#[derive(Debug, Default)]
pub struct MemoryStore {
    main: BTreeMap<CompositeKey, StoredRow>,
    dirty: BTreeMap<CompositeKey, StoredRow>,
    duplicates: Vec<DuplicateEntry>,
    bad_files: BTreeSet<String>,
    receiver_keys: BTreeMap<String, Vec<IndexKey>>,
    latest_projects: BTreeMap<String, LatestProject>,
    projects: BTreeMap<String, Vec<IndexKey>>,
    /// Журнал открытой транзакции файла
    journal: Option<Vec<Undo>>,
}

/// Сериализуемое содержимое [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub main: Vec<StoredRow>,
    pub dirty: Vec<StoredRow>,
    pub duplicates: Vec<DuplicateEntry>,
    pub bad_files: BTreeSet<String>,
    pub receiver_keys: BTreeMap<String, Vec<IndexKey>>,
    pub latest_projects: BTreeMap<String, LatestProject>,
    pub projects: BTreeMap<String, Vec<IndexKey>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(
        &self,
        partition: Partition,
    ) -> &BTreeMap<CompositeKey, StoredRow> {
        match partition {
            Partition::Main => &self.main,
            Partition::Dirty => &self.dirty,
        }
    }

    fn table_mut(
        &mut self,
        partition: Partition,
    ) -> &mut BTreeMap<CompositeKey, StoredRow> {
        match partition {
            Partition::Main => &mut self.main,
            Partition::Dirty => &mut self.dirty,
        }
    }

    fn record(
        &mut self,
        undo: Undo,
    ) {
        if let Some(journal) = &mut self.journal {
            journal.push(undo);
        }
    }

    fn undo(
        &mut self,
        undo: Undo,
    ) {
        match undo {
            Undo::Insert(partition, key) => {
                self.table_mut(partition).remove(&key);
            }
            Undo::Restore(partition, row) => {
                self.table_mut(partition).insert(row.key.clone(), row);
            }
            Undo::Duplicate => {
                self.duplicates.pop();
            }
            Undo::BadFile(filename) => {
                self.bad_files.remove(&filename);
            }
            Undo::ReceiverKey(receiver, created) => {
                pop_index(&mut self.receiver_keys, &receiver, created)
            }
            Undo::ProjectKey(projid, created) => pop_index(&mut self.projects, &projid, created),
            Undo::LatestProject {
                receiver,
                previous,
                dropped,
                projid,
                overwritten,
            } => {
                self.projects.remove(&projid);
                if let Some(keys) = overwritten {
                    self.projects.insert(projid, keys);
                }
                if let Some((old_projid, keys)) = dropped {
                    self.projects.insert(old_projid, keys);
                }
                match previous {
                    Some(project) => self.latest_projects.insert(receiver, project),
                    None => self.latest_projects.remove(&receiver),
                };
            }
        }
    }

    /// Открыта ли транзакция файла.
    pub fn in_file_transaction(&self) -> bool {
        self.journal.is_some()
    }

    pub fn len(
        &self,
        partition: Partition,
    ) -> usize {
        self.table(partition).len()
    }

    pub fn duplicates(&self) -> &[DuplicateEntry] {
        &self.duplicates
    }

    pub fn bad_files(&self) -> &BTreeSet<String> {
        &self.bad_files
    }

    pub fn receiver_keys(
        &self,
        receiver: &str,
    ) -> &[IndexKey] {
        self.receiver_keys
            .get(receiver)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Строки таблицы проекта; `None`, если таблицы нет.
    pub fn project_keys(
        &self,
        projid: &str,
    ) -> Option<&[IndexKey]> {
        self.projects.get(projid).map(Vec::as_slice)
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            main: self.main.values().cloned().collect(),
            dirty: self.dirty.values().cloned().collect(),
            duplicates: self.duplicates.clone(),
            bad_files: self.bad_files.clone(),
            receiver_keys: self.receiver_keys.clone(),
            latest_projects: self.latest_projects.clone(),
            projects: self.projects.clone(),
        }
    }

    pub fn from_snapshot(snapshot: MemorySnapshot) -> Self {
        let index = |rows: Vec<StoredRow>| {
            rows.into_iter()
                .map(|row| (row.key.clone(), row))
                .collect::<BTreeMap<_, _>>()
        };

        Self {
            main: index(snapshot.main),
            dirty: index(snapshot.dirty),
            duplicates: snapshot.duplicates,
            bad_files: snapshot.bad_files,
            receiver_keys: snapshot.receiver_keys,
            latest_projects: snapshot.latest_projects,
            projects: snapshot.projects,
            journal: None,
        }
    }
}

/// Снимает последний ключ индекса. Созданный вставкой индекс удаляется.
fn pop_index(
    index: &mut BTreeMap<String, Vec<IndexKey>>,
    name: &str,
    created: bool,
) {
    if created {
        index.remove(name);
    } else if let Some(keys) = index.get_mut(name) {
        keys.pop();
    }
}

impl RfiStore for MemoryStore {
    fn begin_file(&mut self) -> StoreResult<()> {
        if self.journal.is_some() {
            return Err(StoreError::Transaction("file transaction already open".into()));
        }
        self.journal = Some(Vec::new());
        Ok(())
    }

    fn commit_file(&mut self) -> StoreResult<()> {
        self.journal
            .take()
            .map(|_| ())
            .ok_or_else(|| StoreError::Transaction("commit without begin".into()))
    }

    fn rollback_file(&mut self) -> StoreResult<()> {
        let journal = self
            .journal
            .take()
            .ok_or_else(|| StoreError::Transaction("rollback without begin".into()))?;

        for undo in journal.into_iter().rev() {
            self.undo(undo);
        }
        Ok(())
    }

    fn record_exists(
        &self,
        partition: Partition,
        key: &CompositeKey,
    ) -> StoreResult<bool> {
        Ok(self.table(partition).contains_key(key))
    }

    fn filename_exists(
        &self,
        partition: Partition,
        filename: &str,
    ) -> StoreResult<bool> {
        Ok(self
            .table(partition)
            .values()
            .any(|row| row.filename == filename))
    }

    fn insert(
        &mut self,
        row: StoredRow,
    ) -> StoreResult<()> {
        let partition = row.partition();
        let table = self.table_mut(partition);

        if table.contains_key(&row.key) {
            return Err(StoreError::DuplicateKey(row.key, partition));
        }

        let key = row.key.clone();
        table.insert(key.clone(), row);
        self.record(Undo::Insert(partition, key));
        Ok(())
    }

    fn fetch(
        &self,
        partition: Partition,
        key: &CompositeKey,
    ) -> StoreResult<Option<StoredRow>> {
        Ok(self.table(partition).get(key).cloned())
    }

    fn update_running_average(
        &mut self,
        partition: Partition,
        key: &CompositeKey,
        new_count: u32,
        new_intensity: f64,
    ) -> StoreResult<()> {
        let row = self
            .table_mut(partition)
            .get_mut(key)
            .ok_or_else(|| StoreError::MissingKey(key.clone(), partition))?;
        let before = row.clone();

        row.record.counts = new_count;
        row.record.intensity_jy = new_intensity;
        row.record.window = NAN_FIELD.to_string();
        row.record.channel = NAN_FIELD.to_string();
        row.filename = DUPLICATE_FILENAME.to_string();

        self.record(Undo::Restore(partition, before));
        Ok(())
    }

    fn query(
        &self,
        partition: Partition,
        predicate: &Predicate,
    ) -> StoreResult<Vec<StoredRow>> {
        let mut rows: Vec<StoredRow> = self
            .table(partition)
            .values()
            .filter(|row| predicate.matches(row))
            .cloned()
            .collect();

        rows.sort_by_key(|row| row.record.frequency);
        Ok(rows)
    }

    fn insert_duplicate(
        &mut self,
        entry: DuplicateEntry,
    ) -> StoreResult<()> {
        self.duplicates.push(entry);
        self.record(Undo::Duplicate);
        Ok(())
    }

    fn mark_bad_file(
        &mut self,
        filename: &str,
    ) -> StoreResult<()> {
        if self.bad_files.insert(filename.to_string()) {
            self.record(Undo::BadFile(filename.to_string()));
        }
        Ok(())
    }

    fn add_receiver_key(
        &mut self,
        receiver: &str,
        frequency: FrequencyKey,
        mjd: f64,
    ) -> StoreResult<()> {
        let created = !self.receiver_keys.contains_key(receiver);
        self.receiver_keys
            .entry(receiver.to_string())
            .or_default()
            .push(IndexKey { frequency, mjd });
        self.record(Undo::ReceiverKey(receiver.to_string(), created));
        Ok(())
    }

    fn latest_project(
        &self,
        receiver: &str,
    ) -> StoreResult<Option<LatestProject>> {
        Ok(self.latest_projects.get(receiver).cloned())
    }

    fn replace_latest_project(
        &mut self,
        receiver: &str,
        project: LatestProject,
    ) -> StoreResult<Option<LatestProject>> {
        let previous = self
            .latest_projects
            .insert(receiver.to_string(), project.clone());

        let dropped = previous.as_ref().and_then(|prev| {
            self.projects
                .remove(&prev.projid)
                .map(|keys| (prev.projid.clone(), keys))
        });
        let overwritten = self.projects.insert(project.projid.clone(), Vec::new());

        self.record(Undo::LatestProject {
            receiver: receiver.to_string(),
            previous: previous.clone(),
            dropped,
            projid: project.projid,
            overwritten,
        });

        Ok(previous)
    }

    fn add_project_key(
        &mut self,
        projid: &str,
        frequency: FrequencyKey,
        mjd: f64,
    ) -> StoreResult<()> {
        let created = !self.projects.contains_key(projid);
        self.projects
            .entry(projid.to_string())
            .or_default()
            .push(IndexKey { frequency, mjd });
        self.record(Undo::ProjectKey(projid.to_string(), created));
        Ok(())
    }
}
