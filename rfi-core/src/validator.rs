use std::sync::Arc;

use rfi_types::{FrequencyKey, ReceiverCatalog, RfiError, RfiResult, UNKNOWN_RECEIVER};

use crate::error::{FreqOutsideRcvrBoundsError, ValidationError};

/// Значения ниже порога считаются записанными в ГГц. Рабочие диапазоны
/// GBT ниже 245 МГц не опускаются.
pub const GHZ_THRESHOLD: f64 = 245.0;

/// Приводит частоту к МГц и проверяет её по диапазону приёмника.
#[derive(Debug, Clone)]
pub struct FrequencyValidator {
    catalog: Arc<ReceiverCatalog>,
    buffer_factor: f64,
}

impl FrequencyValidator {
    pub fn new(
        catalog: Arc<ReceiverCatalog>,
        buffer_factor: f64,
    ) -> Self {
        Self {
            catalog,
            buffer_factor,
        }
    }

    pub fn catalog(&self) -> &ReceiverCatalog {
        &self.catalog
    }

    /// Возвращает квантованную частоту (МГц, 4 знака, отбрасывание) или
    /// ошибку выхода за `[min - buffer, max + buffer]`.
    ///
    /// Для `Unknown` допуск нулевой, а диапазон не ограничен.
    pub fn validate(
        &self,
        raw_frequency: &str,
        receiver_name: &str,
    ) -> Result<FrequencyKey, ValidationError> {
        let value = parse_frequency(raw_frequency)?;
        let mhz = to_mhz(value);

        let range = self.catalog.range_for(receiver_name)?;
        let buffer = if receiver_name == UNKNOWN_RECEIVER {
            0.0
        } else {
            range.span() * self.buffer_factor
        };

        let lower = range.freq_min - buffer;
        let upper = range.freq_max + buffer;

        if mhz < lower || mhz > upper {
            return Err(FreqOutsideRcvrBoundsError {
                frequency_mhz: mhz,
                receiver: receiver_name.to_string(),
                lower,
                upper,
            }
            .into());
        }

        Ok(quantize_value(raw_frequency, value)?)
    }

    /// Ключ частоты без проверки диапазона (записи раздела `Dirty`).
    pub fn quantize(
        &self,
        raw_frequency: &str,
    ) -> RfiResult<FrequencyKey> {
        let value = parse_frequency(raw_frequency)?;
        quantize_value(raw_frequency, value)
    }
}

/// Эвристика единиц: `value < 245.0` → ГГц.
pub fn to_mhz(value: f64) -> f64 {
    if value < GHZ_THRESHOLD {
        value * 1000.0
    } else {
        value
    }
}

fn parse_frequency(raw: &str) -> RfiResult<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| RfiError::invalid_frequency(raw))
}

/// МГц-значения квантуются по исходной десятичной записи, ГГц — по
/// кратчайшему представлению произведения.
fn quantize_value(
    raw: &str,
    value: f64,
) -> RfiResult<FrequencyKey> {
    if value < GHZ_THRESHOLD {
        FrequencyKey::from_mhz(to_mhz(value))
    } else {
        FrequencyKey::from_decimal_str(raw.trim())
    }
}
