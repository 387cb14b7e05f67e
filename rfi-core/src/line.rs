//! Разбор одной строки данных в черновик записи.

use log::warn;
use rfi_types::{CanonicalField, ColumnSchema, NAN_FIELD};

use crate::error::LineError;

/// Черновик записи: значения колонок до проверки частоты.
#[derive(Debug, Clone, PartialEq)]
pub struct LineRecord {
    pub window: String,
    pub channel: String,
    /// Сырое значение частоты, единицы ещё не приведены
    pub frequency: String,
    pub intensity_jy: f64,
    /// Строка восстановлена из слипшихся колонок
    pub repaired: bool,
}

/// Итог разбора строки.
#[derive(Debug, Clone, PartialEq)]
pub enum LineParseOutcome {
    Record(LineRecord),
    /// Строка пропускается, файл продолжается
    Skip(LineError),
    /// Файл не может быть обработан
    Fatal(LineError),
}

impl From<Result<LineRecord, LineError>> for LineParseOutcome {
    fn from(result: Result<LineRecord, LineError>) -> Self {
        match result {
            Ok(record) => LineParseOutcome::Record(record),
            Err(e) if e.is_fatal() => LineParseOutcome::Fatal(e),
            Err(e) => LineParseOutcome::Skip(e),
        }
    }
}

/// Разборщик строк для одной раскладки колонок.
///
/// Канонизация раскладки выполняется один раз, но её ошибка отдаётся только
/// после проверки числа значений в строке.
#[derive(Debug, Clone)]
pub struct LineParser {
    layout: Vec<String>,
    canonical: Result<Vec<CanonicalField>, LineError>,
    split_offset: usize,
}

impl LineParser {
    pub fn new(
        layout: &[String],
        schema: &ColumnSchema,
        split_offset: usize,
    ) -> Self {
        Self {
            layout: layout.to_vec(),
            canonical: canonicalize_layout(layout, schema),
            split_offset,
        }
    }

    pub fn layout(&self) -> &[String] {
        &self.layout
    }

    /// Разбирает сырую строку: деление по пробелам, ремонт слипшихся
    /// колонок, затем разбор по раскладке.
    pub fn parse_line(
        &self,
        raw: &str,
    ) -> LineParseOutcome {
        let mut tokens: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
        let repaired = self.repair_overlap(&mut tokens);

        let result = self.parse_tokens(&tokens).map(|mut record| {
            if repaired {
                warn!("Repaired merged columns in line {raw:?} -> {tokens:?}");
                record.repaired = true;
            }
            record
        });

        result.into()
    }

    /// Строгий разбор по раскладке, порядок проверок фиксирован:
    /// число значений, имена колонок, обязательные поля, интенсивность.
    pub fn parse_tokens<S: AsRef<str>>(
        &self,
        tokens: &[S],
    ) -> Result<LineRecord, LineError> {
        if tokens.len() != self.layout.len() {
            return Err(LineError::InvalidColumnValues(format!(
                "{} values for {} columns",
                tokens.len(),
                self.layout.len()
            )));
        }

        let fields = self.canonical.as_ref().map_err(Clone::clone)?;

        let mut window = None;
        let mut channel = None;
        let mut frequency = None;
        let mut intensity = None;

        for (field, token) in fields.iter().zip(tokens) {
            let token = token.as_ref();
            match field {
                CanonicalField::Window => window = Some(token),
                CanonicalField::Channel => channel = Some(token),
                CanonicalField::FrequencyMhz => frequency = Some(token),
                CanonicalField::IntensityJy => intensity = Some(token),
            }
        }

        // Частота и интенсивность нужны всегда, даже если конфигурация
        // объявила обязательными меньше полей
        let (Some(frequency), Some(intensity)) = (frequency, intensity) else {
            return Err(LineError::InvalidColumnValues(format!(
                "layout {:?} lacks frequency or intensity",
                self.layout
            )));
        };

        let intensity_jy = intensity
            .parse::<f64>()
            .ok()
            .filter(|v| !v.is_nan())
            .ok_or_else(|| LineError::InvalidIntensity(intensity.to_string()))?;

        Ok(LineRecord {
            window: window.unwrap_or(NAN_FIELD).to_string(),
            channel: channel.unwrap_or(NAN_FIELD).to_string(),
            frequency: frequency.to_string(),
            intensity_jy,
            repaired: false,
        })
    }

    /// Ищет токен с двумя десятичными точками, когда значений на одно меньше
    /// раскладки, и режет его по смещению. Допустимы позиции 0..=2.
    fn repair_overlap(
        &self,
        tokens: &mut Vec<String>,
    ) -> bool {
        if tokens.len() + 1 != self.layout.len() {
            return false;
        }

        let Some(index) = tokens
            .iter()
            .take(3)
            .position(|t| t.matches('.').count() == 2)
        else {
            return false;
        };

        let Some((left, right)) = split_merged(&tokens[index], self.split_offset) else {
            return false;
        };

        tokens[index] = left;
        tokens.insert(index + 1, right);
        true
    }
}

fn canonicalize_layout(
    layout: &[String],
    schema: &ColumnSchema,
) -> Result<Vec<CanonicalField>, LineError> {
    let fields = layout
        .iter()
        .map(|name| {
            schema
                .canonicalize(name)
                .map_err(|_| LineError::UnrecognizedColumn(name.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(missing) = schema.missing_mandatory(&fields) {
        return Err(LineError::InvalidColumnValues(format!(
            "mandatory column {missing} missing from layout {layout:?}"
        )));
    }

    Ok(fields)
}

/// `1471.456800.000` при смещении 8 → `1471.456` и `800.000`. Обе части
/// должны читаться как числа.
fn split_merged(
    token: &str,
    offset: usize,
) -> Option<(String, String)> {
    let (at, _) = token.char_indices().nth(offset)?;
    let (left, right) = token.split_at(at);

    if left.parse::<f64>().is_err() || right.parse::<f64>().is_err() {
        return None;
    }

    Some((left.to_string(), right.to_string()))
}
