use rfi_core::{ConfigError, IngestError, StoreError};
use thiserror::Error;

pub type LoaderResult<T> = std::result::Result<T, LoaderError>;

#[derive(Debug, Error)]
pub enum LoaderError {
    /// Ошибка чтения каталога или файла
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Неверный JSON конфигурации или снимка
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ошибка CSV при выгрузке агрегатов
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Недопустимые параметры
    #[error("Config error: {0}")]
    Config(String),

    /// Недопустимые параметры нормализации
    #[error("Ingest config error: {0}")]
    IngestConfig(#[from] ConfigError),

    /// Файл не удалось нормализовать
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Ошибка хранилища
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Ошибка пайплайна (inter-thread)
    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

impl LoaderError {
    pub fn config<S: Into<String>>(s: S) -> Self {
        LoaderError::Config(s.into())
    }
}
