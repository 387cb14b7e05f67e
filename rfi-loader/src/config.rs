use std::{fs, path::{Path, PathBuf}};

use rfi_core::IngestConfig;
use rfi_types::{ColumnSchema, ReceiverCatalog};
use serde::{Deserialize, Serialize};

use crate::{LoaderError, LoaderResult};

/// Конфигурация пакетной загрузки.
///
/// Читается один раз при старте из JSON (`--config`), флаги CLI
/// переопределяют отдельные поля.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Параметры нормализации файлов
    pub ingest: IngestConfig,
    /// Каталог с архивными файлами
    pub input_dir: PathBuf,
    /// Подстроки имён файлов. Пусто — стандартный отбор по префиксам
    pub subset: Vec<String>,
    /// JSON справочника приёмников. `None` — встроенная таблица GBT
    pub receiver_catalog: Option<PathBuf>,
    /// JSON таблицы написаний колонок. `None` — стандартная таблица
    pub column_schema: Option<PathBuf>,
    /// JSON снимок хранилища (читается и перезаписывается)
    pub snapshot_path: PathBuf,
    /// Потоков разбора файлов
    pub workers: usize,
    /// Ёмкость канала разобранных файлов
    pub channel_capacity: usize,
    /// Сообщать о ходе загрузки каждые N файлов
    pub progress_every: usize,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl LoaderConfig {
    /// Читает JSON. Отсутствующие поля берутся из [`Default`].
    pub fn from_json_file(path: &Path) -> LoaderResult<Self> {
        let text = fs::read_to_string(path)?;
        let config: LoaderConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    pub fn validate(&self) -> LoaderResult<()> {
        self.ingest.validate()?;

        if self.workers == 0 {
            return Err(LoaderError::config("workers must be > 0"));
        }
        if self.channel_capacity == 0 {
            return Err(LoaderError::config("channel_capacity must be > 0"));
        }
        if self.progress_every == 0 {
            return Err(LoaderError::config("progress_every must be > 0"));
        }

        Ok(())
    }

    /// Справочник приёмников: из файла (с проверкой замкнутости таблиц) или
    /// встроенный.
    pub fn load_catalog(&self) -> LoaderResult<ReceiverCatalog> {
        match &self.receiver_catalog {
            Some(path) => {
                let text = fs::read_to_string(path)?;
                Ok(serde_json::from_str(&text)?)
            }
            None => Ok(ReceiverCatalog::gbt()),
        }
    }

    /// Таблица написаний колонок из файла. Обязательные поля всё равно
    /// берутся из `ingest.mandatory_fields`.
    pub fn load_schema(&self) -> LoaderResult<Option<ColumnSchema>> {
        let Some(path) = &self.column_schema else {
            return Ok(None);
        };

        let text = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            ingest: IngestConfig::default(),
            input_dir: PathBuf::from("."),
            subset: Vec::new(),
            receiver_catalog: None,
            column_schema: None,
            snapshot_path: PathBuf::from("rfi_store.json"),
            workers: 4,
            channel_capacity: 16,
            progress_every: 50,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
