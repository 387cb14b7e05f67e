use serde::{Deserialize, Serialize};

/// Сводная статистика интенсивностей на одной частоте по всему архиву.
///
/// Имена колонок CSV совпадают с таблицей средних.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateBin {
    #[serde(rename = "Frequency")]
    pub frequency_mhz: f64,
    #[serde(rename = "mean_intensity")]
    pub mean: f64,
    #[serde(rename = "max_intensity")]
    pub max: f64,
    #[serde(rename = "min_intensity")]
    pub min: f64,
    #[serde(rename = "median_intensity")]
    pub median: f64,
    /// 2.75-й перцентиль
    #[serde(rename = "low_percentile_intensity")]
    pub p2_75: f64,
    /// 97.5-й перцентиль
    #[serde(rename = "high_percentile_intensity")]
    pub p97_5: f64,
    /// Количество измерений в корзине
    pub samples: usize,
}
