//! Выгрузка агрегатной таблицы и обзорные расчёты по ней.

use std::io::{BufRead, Read, Write};

use log::{debug, warn};
use rfi_core::{
    bin_energy, coverage_gaps, AggregationEngine, CoverageGap, EnergySummary, Predicate, RfiStore,
};
use rfi_types::{AggregateBin, Partition};

use crate::LoaderResult;

/// Результат обзора агрегатной таблицы.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub bins: usize,
    pub gaps: Vec<CoverageGap>,
    pub energy: EnergySummary,
}

////////////////////////////////////////////////////////////////////////////////
// Агрегация
////////////////////////////////////////////////////////////////////////////////

/// Агрегирует текстовую выгрузку `частота интенсивность`, отсортированную
/// по частоте, и пишет корзины в CSV. Возвращает число корзин.
///
/// Пустые строки пропускаются молча, нечисловые — с предупреждением.
pub fn aggregate_text<R: BufRead, W: Write>(
    input: R,
    output: W,
) -> LoaderResult<usize> {
    let mut engine = AggregationEngine::new();
    let mut writer = csv::Writer::from_writer(output);
    let mut bins = 0;

    for (n, line) in input.lines().enumerate() {
        let line = line?;
        let mut tokens = line.split_whitespace();

        let (Some(freq), Some(intensity)) = (tokens.next(), tokens.next()) else {
            if !line.trim().is_empty() {
                warn!("line {}: expected 'frequency intensity', got {line:?}", n + 1);
            }
            continue;
        };

        let (Ok(freq), Ok(intensity)) = (freq.parse::<f64>(), intensity.parse::<f64>()) else {
            warn!("line {}: non-numeric pair {line:?}", n + 1);
            continue;
        };

        if let Some(bin) = engine.push(freq, intensity) {
            writer.serialize(&bin)?;
            bins += 1;
        }
    }

    if let Some(bin) = engine.finish() {
        writer.serialize(&bin)?;
        bins += 1;
    }

    writer.flush()?;
    debug!("Aggregated {bins} bins from text input");

    Ok(bins)
}

/// Агрегирует строки раздела, отобранные `predicate`, и пишет корзины в CSV.
pub fn aggregate_store<S: RfiStore + ?Sized, W: Write>(
    store: &S,
    partition: Partition,
    predicate: &Predicate,
    output: W,
) -> LoaderResult<usize> {
    let rows = store.query(partition, predicate)?;
    let mut writer = csv::Writer::from_writer(output);
    let mut count = 0;

    let pairs = rows
        .iter()
        .map(|row| (row.record.frequency.as_mhz(), row.record.intensity_jy));

    for bin in rfi_core::aggregate(pairs) {
        writer.serialize(&bin)?;
        count += 1;
    }

    writer.flush()?;
    debug!("Aggregated {count} bins from {} {partition:?} rows", rows.len());

    Ok(count)
}

////////////////////////////////////////////////////////////////////////////////
// Обзор
////////////////////////////////////////////////////////////////////////////////

/// Читает CSV, записанный [`aggregate_text`] или [`aggregate_store`].
pub fn read_bins<R: Read>(input: R) -> LoaderResult<Vec<AggregateBin>> {
    let mut reader = csv::Reader::from_reader(input);
    let mut bins = Vec::new();

    for row in reader.deserialize() {
        bins.push(row?);
    }

    Ok(bins)
}

/// Пробелы покрытия выше `floor` и интегральная энергия корзин.
pub fn analyze(
    mut bins: Vec<AggregateBin>,
    floor: f64,
    max_gap: f64,
) -> Analysis {
    bins.sort_by(|a, b| a.frequency_mhz.total_cmp(&b.frequency_mhz));

    Analysis {
        bins: bins.len(),
        gaps: coverage_gaps(bins.iter().map(|b| b.frequency_mhz), floor, max_gap),
        energy: bin_energy(&bins),
    }
}
