//! Однопроходная статистика интенсивностей по частотам.
//!
//! Вход отсортирован по частоте заранее, здесь ничего не сортируется.
//! Значение попадает в текущую корзину, если его частота близка к
//! «якорю» с относительным допуском 1e-6. Якорь сдвигается на каждое
//! совпавшее значение, поэтому длинная цепочка близких частот может
//! слиться в одну корзину, и разбиение зависит от порядка входа.

use rfi_types::AggregateBin;

/// Относительный допуск совпадения частот.
pub const REL_TOLERANCE: f64 = 1e-6;

/// Нижний перцентиль корзины.
pub const LOW_PERCENTILE: f64 = 2.75;
/// Верхний перцентиль корзины.
pub const HIGH_PERCENTILE: f64 = 97.5;

/// `|a - b| <= rel_tol * max(|a|, |b|)`.
pub fn is_close(
    a: f64,
    b: f64,
) -> bool {
    a == b || (a - b).abs() <= REL_TOLERANCE * a.abs().max(b.abs())
}

/// Перцентиль с линейной интерполяцией между соседними рангами.
/// `sorted` не пуст и отсортирован по возрастанию.
pub fn percentile(
    sorted: &[f64],
    p: f64,
) -> f64 {
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;

    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Накопитель одного прохода.
#[derive(Debug, Default)]
pub struct AggregationEngine {
    anchor: Option<f64>,
    buffer: Vec<f64>,
}

impl AggregationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавляет пару. Возвращает законченную корзину, если частота не
    /// совпала с якорем; новое значение открывает следующую корзину.
    pub fn push(
        &mut self,
        frequency: f64,
        intensity: f64,
    ) -> Option<AggregateBin> {
        let emitted = match self.anchor {
            Some(anchor) if !is_close(anchor, frequency) => self.flush(),
            _ => None,
        };

        self.anchor = Some(frequency);
        self.buffer.push(intensity);

        emitted
    }

    /// Закрывает последнюю корзину.
    pub fn finish(&mut self) -> Option<AggregateBin> {
        let bin = self.flush();
        self.anchor = None;
        bin
    }

    fn flush(&mut self) -> Option<AggregateBin> {
        let frequency = self.anchor?;

        if self.buffer.is_empty() {
            return None;
        }

        let mut values = std::mem::take(&mut self.buffer);
        values.sort_by(f64::total_cmp);

        let n = values.len();
        let mean = values.iter().sum::<f64>() / n as f64;

        Some(AggregateBin {
            frequency_mhz: frequency,
            mean,
            max: values[n - 1],
            min: values[0],
            median: percentile(&values, 50.0),
            p2_75: percentile(&values, LOW_PERCENTILE),
            p97_5: percentile(&values, HIGH_PERCENTILE),
            samples: n,
        })
    }
}

/// Итератор корзин поверх отсортированного потока `(частота, интенсивность)`.
pub struct Aggregate<I> {
    inner: I,
    engine: AggregationEngine,
    done: bool,
}

/// Оборачивает поток в [`Aggregate`].
pub fn aggregate<I>(input: I) -> Aggregate<I::IntoIter>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    Aggregate {
        inner: input.into_iter(),
        engine: AggregationEngine::new(),
        done: false,
    }
}

impl<I> Iterator for Aggregate<I>
where
    I: Iterator<Item = (f64, f64)>,
{
    type Item = AggregateBin;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        for (frequency, intensity) in self.inner.by_ref() {
            if let Some(bin) = self.engine.push(frequency, intensity) {
                return Some(bin);
            }
        }

        self.done = true;
        self.engine.finish()
    }
}
