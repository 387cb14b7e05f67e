use thiserror::Error;

/// Результат для операций над справочниками и типами RFI.
pub type RfiResult<T> = std::result::Result<T, RfiError>;

/// Ошибки справочников и базовых типов.
#[derive(Debug, Error)]
pub enum RfiError {
    /// Каноническое имя приёмника отсутствует в таблице диапазонов.
    /// Это ошибка целостности справочника, а не пользовательских данных.
    #[error("Unknown receiver: '{0}' has no frequency range entry")]
    UnknownReceiver(String),

    /// Имя колонки не найдено в таблице соответствий
    #[error("Unrecognized column name: '{0}'")]
    UnrecognizedColumn(String),

    /// Справочник нарушает собственные инварианты
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    /// Значение частоты не является десятичным числом
    #[error("Invalid frequency value: '{0}'")]
    InvalidFrequency(String),
}

impl RfiError {
    pub fn invalid_catalog<S: Into<String>>(s: S) -> Self {
        Self::InvalidCatalog(s.into())
    }

    pub fn invalid_frequency<S: Into<String>>(s: S) -> Self {
        Self::InvalidFrequency(s.into())
    }
}
