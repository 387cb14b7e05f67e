use serde::{Deserialize, Serialize};

use crate::FrequencyKey;

/// Строковая заглушка для неизвестных или потерявших смысл значений.
pub const NAN_FIELD: &str = "NaN";

/// Раздел хранилища, в который направляется запись.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Partition {
    /// Частота в пределах диапазона приёмника
    Main,
    /// Частота вне диапазона — сохраняется для разбора, не выбрасывается
    Dirty,
}

/// Одно измерение после нормализации.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRecord {
    /// Номер окна или `"NaN"`
    pub window: String,
    /// Номер канала или `"NaN"`
    pub channel: String,
    /// Квантованная частота, МГц
    pub frequency: FrequencyKey,
    /// Интенсивность (Ян), никогда не NaN
    pub intensity_jy: f64,
    /// Сколько измерений усреднено в записи (≥ 1)
    pub counts: u32,
    pub partition: Partition,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Main => "main",
            Partition::Dirty => "dirty",
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Скользящее среднее: `(old_mean * old_count + value) / (old_count + 1)`.
pub fn running_mean(
    old_mean: f64,
    old_count: u32,
    value: f64,
) -> f64 {
    let n = old_count as f64;
    (old_mean * n + value) / (n + 1.0)
}

impl DataRecord {
    pub fn new(
        window: String,
        channel: String,
        frequency: FrequencyKey,
        intensity_jy: f64,
        partition: Partition,
    ) -> Self {
        DataRecord {
            window,
            channel,
            frequency,
            intensity_jy,
            counts: 1,
            partition,
        }
    }

    /// Вливает повторное измерение той же частоты.
    ///
    /// Окно и канал теряют смысл для усреднённой точки и становятся `"NaN"`.
    pub fn absorb(
        &mut self,
        intensity_jy: f64,
    ) {
        self.intensity_jy = running_mean(self.intensity_jy, self.counts, intensity_jy);
        self.counts += 1;
        self.window = NAN_FIELD.to_string();
        self.channel = NAN_FIELD.to_string();
    }

    pub fn is_merged(&self) -> bool {
        self.counts > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(intensity: f64) -> DataRecord {
        DataRecord::new(
            "1".into(),
            "17".into(),
            FrequencyKey::from_decimal_str("1400.1234").unwrap(),
            intensity,
            Partition::Main,
        )
    }

    #[test]
    fn test_absorb_running_mean() {
        let mut r = record(2.0);
        r.absorb(4.0);

        assert_eq!(r.counts, 2);
        assert!((r.intensity_jy - 3.0).abs() < 1e-12);
        assert_eq!(r.window, NAN_FIELD);
        assert_eq!(r.channel, NAN_FIELD);

        r.absorb(9.0);
        assert_eq!(r.counts, 3);
        assert!((r.intensity_jy - 5.0).abs() < 1e-12);
        assert!(r.is_merged());
    }

    #[test]
    fn test_running_mean_matches_arithmetic_mean() {
        let values = [1.5, -2.0, 7.25, 0.0, 3.0];
        let mut mean = values[0];

        for (i, v) in values.iter().enumerate().skip(1) {
            mean = running_mean(mean, i as u32, *v);
        }

        let expected = values.iter().sum::<f64>() / values.len() as f64;
        assert!((mean - expected).abs() < 1e-12);
    }
}
