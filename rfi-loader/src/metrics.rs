use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

use rfi_core::{FileStats, UploadReport};

/// Счётчики загрузки, обновляемые lock-free из потоков разбора и записи.
#[derive(Debug, Default)]
pub struct LoaderMetrics {
    pub files_seen: AtomicU64,
    pub files_ingested: AtomicU64,
    /// Файлы, уже бывшие в хранилище
    pub files_already_ingested: AtomicU64,
    /// Файлы, отброшенные из-за ошибок схемы или чтения
    pub files_failed: AtomicU64,
    pub lines_read: AtomicU64,
    pub lines_skipped: AtomicU64,
    pub lines_repaired: AtomicU64,
    pub records_clean: AtomicU64,
    pub records_dirty: AtomicU64,
    /// Строки, слитые внутри одного файла
    pub records_merged: AtomicU64,
    /// Строки, усреднённые с записями других файлов
    pub rows_averaged: AtomicU64,
}

/// Снимок метрик для вывода и тестов.
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub duration_secs: f64,
    pub files_seen: u64,
    pub files_ingested: u64,
    pub files_already_ingested: u64,
    pub files_failed: u64,
    pub lines_read: u64,
    pub lines_skipped: u64,
    pub lines_repaired: u64,
    pub records_clean: u64,
    pub records_dirty: u64,
    pub records_merged: u64,
    pub rows_averaged: u64,
    pub files_per_sec: f64,
    pub dirty_rate_pct: f64,
}

impl LoaderMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Учитывает статистику разобранного файла.
    pub fn record_file(
        &self,
        stats: &FileStats,
    ) {
        self.lines_read.fetch_add(stats.lines, Ordering::Relaxed);
        self.lines_skipped.fetch_add(
            stats.skipped_lines + stats.bad_frequency_lines,
            Ordering::Relaxed,
        );
        self.lines_repaired
            .fetch_add(stats.repaired_lines, Ordering::Relaxed);
        self.records_clean
            .fetch_add(stats.clean_lines, Ordering::Relaxed);
        self.records_dirty
            .fetch_add(stats.dirty_lines, Ordering::Relaxed);
        self.records_merged
            .fetch_add(stats.merged_lines, Ordering::Relaxed);
    }

    pub fn record_upload(
        &self,
        report: &UploadReport,
    ) {
        self.files_ingested.fetch_add(1, Ordering::Relaxed);
        self.rows_averaged
            .fetch_add(report.averaged, Ordering::Relaxed);
    }

    pub fn files_per_sec(
        &self,
        elapsed: &Instant,
    ) -> f64 {
        let secs = elapsed.elapsed().as_secs_f64();

        if secs < 1e-9 {
            return 0.0;
        }

        self.files_ingested.load(Ordering::Relaxed) as f64 / secs
    }

    /// Доля записей вне диапазона приёмника (0.0-100.0).
    pub fn dirty_rate_pct(&self) -> f64 {
        let clean = self.records_clean.load(Ordering::Relaxed);
        let dirty = self.records_dirty.load(Ordering::Relaxed);
        let total = clean + dirty;

        if total == 0 {
            0.0
        } else {
            dirty as f64 / total as f64 * 100.0
        }
    }

    /// Итоговая сводка в конце загрузки.
    pub fn summary(
        &self,
        elapsed: &Instant,
    ) -> MetricsSummary {
        MetricsSummary {
            duration_secs: elapsed.elapsed().as_secs_f64(),
            files_seen: self.files_seen.load(Ordering::Relaxed),
            files_ingested: self.files_ingested.load(Ordering::Relaxed),
            files_already_ingested: self.files_already_ingested.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            lines_read: self.lines_read.load(Ordering::Relaxed),
            lines_skipped: self.lines_skipped.load(Ordering::Relaxed),
            lines_repaired: self.lines_repaired.load(Ordering::Relaxed),
            records_clean: self.records_clean.load(Ordering::Relaxed),
            records_dirty: self.records_dirty.load(Ordering::Relaxed),
            records_merged: self.records_merged.load(Ordering::Relaxed),
            rows_averaged: self.rows_averaged.load(Ordering::Relaxed),
            files_per_sec: self.files_per_sec(elapsed),
            dirty_rate_pct: self.dirty_rate_pct(),
        }
    }
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(f, "  Duration      : {:.1}s", self.duration_secs)?;
        writeln!(
            f,
            "  Files         : {} seen, {} ingested, {} already stored, {} failed",
            self.files_seen, self.files_ingested, self.files_already_ingested, self.files_failed
        )?;
        writeln!(
            f,
            "  Lines         : {} read, {} skipped, {} repaired",
            self.lines_read, self.lines_skipped, self.lines_repaired
        )?;
        writeln!(
            f,
            "  Records       : {} clean, {} dirty ({:.2}%)",
            self.records_clean, self.records_dirty, self.dirty_rate_pct
        )?;
        writeln!(f, "  Merged        : {}", self.records_merged)?;
        writeln!(f, "  Averaged      : {}", self.rows_averaged)?;
        writeln!(f, "  Speed         : {:.1} files/s", self.files_per_sec)?;
        write!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")
    }
}
