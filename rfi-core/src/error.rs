use std::path::PathBuf;

use rfi_types::RfiError;
use thiserror::Error;

/// Результат обработки одного файла.
pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Ошибки разбора строки данных.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LineError {
    /// Число значений не совпадает с раскладкой колонок или раскладка не
    /// содержит обязательных полей. Фатально для всего файла.
    #[error("Invalid column values: {0}")]
    InvalidColumnValues(String),

    /// Неизвестное имя колонки. Фатально для всего файла.
    #[error("Unrecognized column name '{0}'")]
    UnrecognizedColumn(String),

    /// Интенсивность NaN или не число. Пропускается только строка.
    #[error("Invalid intensity '{0}'")]
    InvalidIntensity(String),
}

/// Частота вне диапазона приёмника (с учётом допуска).
///
/// Не фатально: запись уходит в раздел `Dirty`. Несёт уже приведённое к МГц
/// значение, чтобы вызывающая сторона могла построить ключ.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "Frequency {frequency_mhz} MHz outside receiver '{receiver}' bounds [{lower}, {upper}]"
)]
pub struct FreqOutsideRcvrBoundsError {
    pub frequency_mhz: f64,
    pub receiver: String,
    pub lower: f64,
    pub upper: f64,
}

/// Ошибки валидатора частоты.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    OutOfBounds(#[from] FreqOutsideRcvrBoundsError),

    /// Частота не число или справочник не знает приёмник
    #[error(transparent)]
    Rfi(#[from] RfiError),
}

/// Недопустимые параметры нормализации.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("primary_composite_key must not be empty")]
    EmptyCompositeKey,

    #[error("Unknown primary_composite_key field '{field}'. Use: {known}")]
    UnknownKeyField { field: String, known: String },

    #[error("overlap_split_offset must be > 0")]
    ZeroSplitOffset,

    #[error("bound_buffer_factor {0} must be in [0, 1)")]
    BoundBufferOutOfRange(f64),
}

/// Ошибки уровня файла. Прерывают обработку только текущего файла.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Ошибки ввода/вывода (автоконвертируются из std::io::Error)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Не удалось получить метаданные файла
    #[error("Header error in {path:?}: {reason}")]
    Header { path: PathBuf, reason: String },

    /// Схема файла не распознана (колонки, раскладка)
    #[error("Schema error in {path:?}: {source}; line={line:?} layout={layout:?}")]
    Schema {
        path: PathBuf,
        line: String,
        layout: Vec<String>,
        source: LineError,
    },

    /// Нарушение целостности справочника
    #[error("Catalog error: {0}")]
    Catalog(#[from] RfiError),
}

impl LineError {
    /// Ошибка схемы (весь файл) или качества данных (одна строка).
    pub fn is_fatal(&self) -> bool {
        !matches!(self, LineError::InvalidIntensity(_))
    }
}

impl IngestError {
    pub fn header<S: Into<String>>(
        path: impl Into<PathBuf>,
        reason: S,
    ) -> Self {
        Self::Header {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Ошибка схемы (колонки/раскладка), а не ввода-вывода.
    pub fn is_schema(&self) -> bool {
        matches!(self, IngestError::Schema { .. } | IngestError::Header { .. })
    }
}
