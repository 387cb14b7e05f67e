use rfi_types::{CanonicalField, ColumnSchema, FileHeader};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Имя поля частоты в составном ключе.
pub const FREQUENCY_KEY_FIELD: &str = "Frequency_MHz";

/// Параметры нормализации, читаются один раз при старте.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Символ, с которого начинаются строки заголовка
    pub header_marker: char,
    /// Поля, без которых файл не обрабатывается
    pub mandatory_fields: Vec<CanonicalField>,
    /// Поля составного первичного ключа (частота + время наблюдения)
    pub primary_composite_key: Vec<String>,
    /// Позиция разреза слипшихся колонок (символов слева)
    pub overlap_split_offset: usize,
    /// Допуск за границами приёмника (доля ширины диапазона)
    pub bound_buffer_factor: f64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            header_marker: '#',
            mandatory_fields: vec![CanonicalField::FrequencyMhz, CanonicalField::IntensityJy],
            primary_composite_key: vec![FREQUENCY_KEY_FIELD.to_string(), "mjd".to_string()],
            overlap_split_offset: 8,
            bound_buffer_factor: 0.1,
        }
    }
}

impl IngestConfig {
    /// Проверяет, что составной ключ ссылается только на известные поля.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.primary_composite_key.is_empty() {
            return Err(ConfigError::EmptyCompositeKey);
        }

        for name in &self.primary_composite_key {
            if name != FREQUENCY_KEY_FIELD && !FileHeader::FIELD_NAMES.contains(&name.as_str()) {
                return Err(ConfigError::UnknownKeyField {
                    field: name.clone(),
                    known: format!(
                        "{FREQUENCY_KEY_FIELD}, {}",
                        FileHeader::FIELD_NAMES.join(", ")
                    ),
                });
            }
        }

        if self.overlap_split_offset == 0 {
            return Err(ConfigError::ZeroSplitOffset);
        }

        if !(0.0..1.0).contains(&self.bound_buffer_factor) {
            return Err(ConfigError::BoundBufferOutOfRange(self.bound_buffer_factor));
        }

        Ok(())
    }

    /// Таблица колонок с обязательными полями из конфигурации.
    pub fn column_schema(&self) -> ColumnSchema {
        ColumnSchema::standard().with_mandatory(self.mandatory_fields.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        IngestConfig::default().validate().unwrap();
    }

    #[test]
    fn test_unknown_key_field_rejected() {
        let config = IngestConfig {
            primary_composite_key: vec!["Frequency_MHz".into(), "moon_phase".into()],
            ..IngestConfig::default()
        };

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownKeyField { ref field, .. } if field == "moon_phase"
        ));
        assert!(err.to_string().contains("Frequency_MHz"));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let empty = IngestConfig {
            primary_composite_key: Vec::new(),
            ..IngestConfig::default()
        };
        assert_eq!(empty.validate(), Err(ConfigError::EmptyCompositeKey));

        let zero = IngestConfig {
            overlap_split_offset: 0,
            ..IngestConfig::default()
        };
        assert_eq!(zero.validate(), Err(ConfigError::ZeroSplitOffset));

        let wide = IngestConfig {
            bound_buffer_factor: 1.5,
            ..IngestConfig::default()
        };
        assert_eq!(wide.validate(), Err(ConfigError::BoundBufferOutOfRange(1.5)));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: IngestConfig =
            serde_json::from_str(r#"{"mandatory_fields": ["Frequency_MHz"]}"#).unwrap();

        assert_eq!(config.mandatory_fields, vec![CanonicalField::FrequencyMhz]);
        assert_eq!(config.overlap_split_offset, 8);
        assert_eq!(config.header_marker, '#');
        assert_eq!(config.column_schema().mandatory_fields().len(), 1);
    }
}
