//! Порт хранилища: типизированные операции вместо текста запросов.

mod memory;

pub use memory::*;

use rfi_types::{DataRecord, FileHeader, FrequencyKey, Partition};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::FREQUENCY_KEY_FIELD;

/// Имя файла у строки, усреднённой из нескольких файлов.
pub const DUPLICATE_FILENAME: &str = "Duplicate";

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Строка с таким составным ключом уже есть
    #[error("Duplicate key {0} in {1} partition")]
    DuplicateKey(CompositeKey, Partition),

    /// Ожидаемой строки нет
    #[error("No row with key {0} in {1} partition")]
    MissingKey(CompositeKey, Partition),

    /// Сбой конкретного хранилища
    #[error("Store backend error: {0}")]
    Backend(String),

    /// Нарушен порядок begin/commit/rollback
    #[error("File transaction error: {0}")]
    Transaction(String),
}

impl StoreError {
    pub fn backend<S: Into<String>>(s: S) -> Self {
        StoreError::Backend(s.into())
    }
}

/// Составной первичный ключ: пары «поле = значение» в порядке конфигурации.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CompositeKey(Vec<(String, String)>);

impl CompositeKey {
    /// Строит ключ из частоты записи и полей заголовка. Неизвестное поле
    /// даёт `"NaN"` (имена проверяются при загрузке конфигурации).
    pub fn build(
        fields: &[String],
        header: &FileHeader,
        frequency: FrequencyKey,
    ) -> Self {
        let pairs = fields
            .iter()
            .map(|name| {
                let value = if name == FREQUENCY_KEY_FIELD {
                    frequency.to_string()
                } else {
                    header
                        .field(name)
                        .unwrap_or_else(|| rfi_types::NAN_FIELD.to_string())
                };
                (name.clone(), value)
            })
            .collect();

        CompositeKey(pairs)
    }

    pub fn get(
        &self,
        field: &str,
    ) -> Option<&str> {
        self.0
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }
}

impl std::fmt::Display for CompositeKey {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

/// Строка раздела `Main` или `Dirty`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRow {
    pub key: CompositeKey,
    pub record: DataRecord,
    /// Исходный файл или [`DUPLICATE_FILENAME`]
    pub filename: String,
    pub frontend: String,
    pub projid: String,
    pub mjd: Option<f64>,
}

impl StoredRow {
    pub fn new(
        key: CompositeKey,
        record: DataRecord,
        header: &FileHeader,
    ) -> Self {
        Self {
            key,
            record,
            filename: header.filename.clone(),
            frontend: header.frontend.clone(),
            projid: header.projid.clone(),
            mjd: header.mjd,
        }
    }

    pub fn partition(&self) -> Partition {
        self.record.partition
    }

    pub fn is_duplicate(&self) -> bool {
        self.filename == DUPLICATE_FILENAME
    }
}

/// Исходное измерение, вошедшее в усреднённую строку.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateEntry {
    pub frequency: FrequencyKey,
    pub intensity_jy: f64,
    pub filename: String,
}

/// Последний проект, наблюдавший на приёмнике.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestProject {
    pub projid: String,
    pub mjd: f64,
}

/// Условие выборки строк.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    All,
    /// Строки одного приёмника (каноническое имя)
    Frontend(String),
    /// Частота в `[lo, hi]`
    FrequencyBetween(FrequencyKey, FrequencyKey),
    /// Строки, усреднённые из нескольких измерений
    Merged,
}

impl Predicate {
    pub fn matches(
        &self,
        row: &StoredRow,
    ) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Frontend(name) => &row.frontend == name,
            Predicate::FrequencyBetween(lo, hi) => {
                (*lo..=*hi).contains(&row.record.frequency)
            }
            Predicate::Merged => row.record.is_merged(),
        }
    }
}

/// Хранилище нормализованных записей.
///
/// Последовательности «проверить, затем записать» не атомарны: вызывающая
/// сторона работает с хранилищем из одного потока. Записи одного файла
/// оборачиваются в `begin_file`/`commit_file`; после `rollback_file`
/// от файла в хранилище не остаётся ничего.
pub trait RfiStore {
    /// Открывает запись файла. Вложенные транзакции не поддерживаются.
    fn begin_file(&mut self) -> StoreResult<()>;

    /// Фиксирует все изменения с момента `begin_file`.
    fn commit_file(&mut self) -> StoreResult<()>;

    /// Отменяет все изменения с момента `begin_file`.
    fn rollback_file(&mut self) -> StoreResult<()>;

    /// Есть ли строка с таким ключом.
    fn record_exists(
        &self,
        partition: Partition,
        key: &CompositeKey,
    ) -> StoreResult<bool>;

    /// Есть ли в разделе хоть одна строка этого файла.
    fn filename_exists(
        &self,
        partition: Partition,
        filename: &str,
    ) -> StoreResult<bool>;

    /// Вставка. Совпадение ключа — [`StoreError::DuplicateKey`].
    fn insert(
        &mut self,
        row: StoredRow,
    ) -> StoreResult<()>;

    fn fetch(
        &self,
        partition: Partition,
        key: &CompositeKey,
    ) -> StoreResult<Option<StoredRow>>;

    /// Записывает новое среднее и число измерений. Окно и канал становятся
    /// `"NaN"`, имя файла — [`DUPLICATE_FILENAME`].
    fn update_running_average(
        &mut self,
        partition: Partition,
        key: &CompositeKey,
        new_count: u32,
        new_intensity: f64,
    ) -> StoreResult<()>;

    /// Строки раздела, отсортированные по частоте.
    fn query(
        &self,
        partition: Partition,
        predicate: &Predicate,
    ) -> StoreResult<Vec<StoredRow>>;

    fn insert_duplicate(
        &mut self,
        entry: DuplicateEntry,
    ) -> StoreResult<()>;

    /// Регистрирует файл, давший записи вне диапазона.
    fn mark_bad_file(
        &mut self,
        filename: &str,
    ) -> StoreResult<()>;

    fn add_receiver_key(
        &mut self,
        receiver: &str,
        frequency: FrequencyKey,
        mjd: f64,
    ) -> StoreResult<()>;

    fn latest_project(
        &self,
        receiver: &str,
    ) -> StoreResult<Option<LatestProject>>;

    /// Заменяет последний проект приёмника: таблица прежнего проекта
    /// удаляется, для нового создаётся пустая. Возвращает прежний.
    fn replace_latest_project(
        &mut self,
        receiver: &str,
        project: LatestProject,
    ) -> StoreResult<Option<LatestProject>>;

    fn add_project_key(
        &mut self,
        projid: &str,
        frequency: FrequencyKey,
        mjd: f64,
    ) -> StoreResult<()>;
}
