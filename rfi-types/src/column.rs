use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{RfiError, RfiResult};

/// Каноническое имя колонки данных.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CanonicalField {
    /// Номер IF окна
    Window,
    /// Номер канала
    Channel,
    /// Частота (МГц после нормализации)
    #[serde(rename = "Frequency_MHz")]
    FrequencyMhz,
    /// Интенсивность (Ян)
    #[serde(rename = "Intensity_Jy")]
    IntensityJy,
}

/// Таблица соответствий исторических написаний колонок каноническим именам
/// плюс набор обязательных полей.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSchema {
    corrections: BTreeMap<String, CanonicalField>,
    #[serde(default)]
    mandatory: BTreeSet<CanonicalField>,
}

impl CanonicalField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::Window => "Window",
            CanonicalField::Channel => "Channel",
            CanonicalField::FrequencyMhz => "Frequency_MHz",
            CanonicalField::IntensityJy => "Intensity_Jy",
        }
    }
}

impl std::fmt::Display for CanonicalField {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CanonicalField {
    type Err = RfiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Window" => Ok(CanonicalField::Window),
            "Channel" => Ok(CanonicalField::Channel),
            "Frequency_MHz" => Ok(CanonicalField::FrequencyMhz),
            "Intensity_Jy" => Ok(CanonicalField::IntensityJy),
            _ => Err(RfiError::UnrecognizedColumn(s.to_string())),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы ColumnSchema
////////////////////////////////////////////////////////////////////////////////

impl ColumnSchema {
    pub fn new(
        corrections: BTreeMap<String, CanonicalField>,
        mandatory: BTreeSet<CanonicalField>,
    ) -> Self {
        Self {
            corrections,
            mandatory,
        }
    }

    /// Стандартная таблица: все встречавшиеся в архиве написания.
    pub fn standard() -> Self {
        let corrections = [
            ("Frequency(MHz)", CanonicalField::FrequencyMhz),
            ("Frequency (MHz)", CanonicalField::FrequencyMhz),
            ("Frequency(GHz)", CanonicalField::FrequencyMhz),
            ("Frequency GHz)", CanonicalField::FrequencyMhz),
            ("Intensity(Jy)", CanonicalField::IntensityJy),
            ("Intensity (Jy)", CanonicalField::IntensityJy),
            ("Window", CanonicalField::Window),
            ("IFWindow", CanonicalField::Window),
            ("Channel", CanonicalField::Channel),
        ]
        .into_iter()
        .map(|(raw, f)| (raw.to_string(), f))
        .collect();

        let mandatory = [CanonicalField::FrequencyMhz, CanonicalField::IntensityJy]
            .into_iter()
            .collect();

        Self::new(corrections, mandatory)
    }

    /// Заменяет набор обязательных полей (из конфигурации).
    pub fn with_mandatory<I>(
        mut self,
        fields: I,
    ) -> Self
    where
        I: IntoIterator<Item = CanonicalField>,
    {
        self.mandatory = fields.into_iter().collect();
        self
    }

    /// Каноническое имя для сырого написания. Неизвестное написание — ошибка,
    /// а не пропуск.
    pub fn canonicalize(
        &self,
        raw_column_name: &str,
    ) -> RfiResult<CanonicalField> {
        self.corrections
            .get(raw_column_name)
            .copied()
            .ok_or_else(|| RfiError::UnrecognizedColumn(raw_column_name.to_string()))
    }

    pub fn mandatory_fields(&self) -> &BTreeSet<CanonicalField> {
        &self.mandatory
    }

    /// Первое обязательное поле, отсутствующее в раскладке.
    pub fn missing_mandatory(
        &self,
        layout: &[CanonicalField],
    ) -> Option<CanonicalField> {
        self.mandatory.iter().copied().find(|f| !layout.contains(f))
    }
}

impl Default for ColumnSchema {
    fn default() -> Self {
        Self::standard()
    }
}
