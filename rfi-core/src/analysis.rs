//! Обзорные расчёты по всему архиву: пробелы покрытия и интегральная
//! энергия.

use rfi_types::AggregateBin;

/// Частоты ниже этой границы (МГц) не проверяются на пробелы.
pub const DEFAULT_GAP_FLOOR_MHZ: f64 = 2900.0;
/// Минимальный пробел, о котором стоит сообщать (МГц).
pub const DEFAULT_MAX_GAP_MHZ: f64 = 100.0;

/// Эффективность апертуры.
const APERTURE_EFFICIENCY: f64 = 0.70;
/// Геометрическая площадь 100-метрового зеркала, м².
const DISH_AREA_M2: f64 = 7853.98;
/// 1 Ян в Вт·м⁻²·Гц⁻¹.
const JANSKY: f64 = 1e-26;

/// Пробел между соседними наблюдёнными частотами.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageGap {
    pub from_mhz: f64,
    pub to_mhz: f64,
}

impl CoverageGap {
    pub fn width(&self) -> f64 {
        self.to_mhz - self.from_mhz
    }
}

/// Интегральная мощность по средним и медианным интенсивностям, Вт.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergySummary {
    pub mean: f64,
    pub median: f64,
}

/// Ищет пробелы шире `max_gap` в отсортированном списке частот.
///
/// Отсчёт начинается от `floor`, поэтому первая частота над границей тоже
/// может дать пробел.
pub fn coverage_gaps<I>(
    sorted_freqs: I,
    floor: f64,
    max_gap: f64,
) -> Vec<CoverageGap>
where
    I: IntoIterator<Item = f64>,
{
    let mut gaps = Vec::new();
    let mut previous = floor;

    for value in sorted_freqs {
        if value < floor {
            continue;
        }
        if (value - previous).abs() > max_gap {
            gaps.push(CoverageGap {
                from_mhz: previous,
                to_mhz: value,
            });
        }
        previous = value;
    }

    gaps
}

/// `Σ Iᵢ·(νᵢ₊₁ − νᵢ)` в Гц, умноженная на эффективную площадь и Ян.
/// Последняя точка вклада не даёт.
pub fn integrated_energy<I>(points: I) -> f64
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut sum = 0.0;
    let mut previous: Option<(f64, f64)> = None;

    for (frequency_mhz, intensity) in points {
        if let Some((prev_freq, prev_intensity)) = previous {
            sum += prev_intensity * (frequency_mhz - prev_freq) * 1e6;
        }
        previous = Some((frequency_mhz, intensity));
    }

    sum * APERTURE_EFFICIENCY * DISH_AREA_M2 * JANSKY
}

/// Интегральная энергия по корзинам агрегатной таблицы.
pub fn bin_energy(bins: &[AggregateBin]) -> EnergySummary {
    EnergySummary {
        mean: integrated_energy(bins.iter().map(|b| (b.frequency_mhz, b.mean))),
        median: integrated_energy(bins.iter().map(|b| (b.frequency_mhz, b.median))),
    }
}
