use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Instant,
};

use crossbeam_channel::{Receiver, Sender};
use log::{info, warn};
use rfi_core::{
    FileIngestor, IngestResult, IngestedFile, RfiStore, UploadOutcome, Uploader,
};
use rfi_types::{ColumnSchema, ReceiverCatalog};

use crate::{metrics::LoaderMetrics, LoaderConfig, LoaderError, LoaderResult};

/// Префиксы имён архивных файлов.
pub const FILE_PREFIXES: [&str; 3] = ["AGBT", "TRFI", "TGBT"];
/// Служебный файл архива со ссылками, не содержит измерений.
pub const EXCLUDED_FILE: &str = "URLs.txt";

/// Список файлов каталога для загрузки, отсортированный по имени.
///
/// Без `subset` берутся `*.txt` с префиксами [`FILE_PREFIXES`], кроме
/// [`EXCLUDED_FILE`]. С `subset` — файлы, имя которых содержит хотя бы одну
/// из подстрок.
pub fn gather_filepaths(
    dir: &Path,
    subset: &[String],
) -> LoaderResult<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();

        let keep = if subset.is_empty() {
            name.ends_with(".txt")
                && name != EXCLUDED_FILE
                && FILE_PREFIXES.iter().any(|p| name.starts_with(p))
        } else {
            subset.iter().any(|s| name.contains(s.as_str()))
        };

        if keep {
            paths.push(entry.path());
        }
    }

    paths.sort();
    Ok(paths)
}

/// Разобранный файл с его позицией в списке.
struct Parsed {
    index: usize,
    path: PathBuf,
    result: IngestResult<IngestedFile>,
}

/// Пакетная загрузка: потоки разбирают файлы, текущий поток пишет в
/// хранилище в исходном порядке файлов.
pub struct IngestPipeline {
    config: LoaderConfig,
    ingestor: FileIngestor,
    uploader: Uploader,
    metrics: Arc<LoaderMetrics>,
    stop_flag: Arc<AtomicBool>,
}

impl IngestPipeline {
    /// Создаёт пайплайн. Возвращает также shared-ссылку на метрики.
    pub fn new(
        config: LoaderConfig,
        catalog: ReceiverCatalog,
    ) -> (Self, Arc<LoaderMetrics>) {
        let catalog = Arc::new(catalog);
        let ingestor = FileIngestor::new(config.ingest.clone(), catalog.clone());
        let uploader = Uploader::new(catalog, config.ingest.primary_composite_key.clone());
        let metrics = LoaderMetrics::new();

        let p = Self {
            config,
            ingestor,
            uploader,
            metrics: metrics.clone(),
            stop_flag: Arc::new(AtomicBool::new(false)),
        };

        (p, metrics)
    }

    /// Заменяет стандартную таблицу написаний колонок.
    pub fn with_schema(
        mut self,
        schema: ColumnSchema,
    ) -> Self {
        self.ingestor = self.ingestor.with_schema(schema);
        self
    }

    /// Флаг остановки. Проверяется между файлами; начатый файл
    /// дописывается целиком.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    /// Загружает файлы. Блокируется до завершения или остановки.
    ///
    /// Ошибки отдельных файлов учитываются в метриках и не прерывают
    /// пакет; ошибка хранилища прерывает.
    pub fn run<S: RfiStore + ?Sized>(
        &self,
        files: Vec<PathBuf>,
        store: &mut S,
    ) -> LoaderResult<()> {
        let total = files.len();
        info!(
            "Loading {total} files with {} workers",
            self.config.workers
        );

        let (job_tx, job_rx) = crossbeam_channel::unbounded::<(usize, PathBuf)>();
        for job in files.into_iter().enumerate() {
            job_tx
                .send(job)
                .map_err(|e| LoaderError::Pipeline(e.to_string()))?;
        }
        drop(job_tx);

        let (result_tx, result_rx) =
            crossbeam_channel::bounded::<Parsed>(self.config.channel_capacity);

        thread::scope(|scope| {
            for _ in 0..self.config.workers {
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                scope.spawn(move || self.parse_worker(jobs, results));
            }
            drop(result_tx);

            self.writer_loop(result_rx, store, total)
        })
    }

    fn parse_worker(
        &self,
        jobs: Receiver<(usize, PathBuf)>,
        results: Sender<Parsed>,
    ) {
        for (index, path) in jobs.iter() {
            if self.stop_flag.load(Ordering::Relaxed) {
                break;
            }

            self.metrics.files_seen.fetch_add(1, Ordering::Relaxed);
            let result = self.ingestor.ingest_path(&path);

            // Писатель остановился и закрыл канал
            if results.send(Parsed { index, path, result }).is_err() {
                break;
            }
        }
    }

    fn writer_loop<S: RfiStore + ?Sized>(
        &self,
        results: Receiver<Parsed>,
        store: &mut S,
        total: usize,
    ) -> LoaderResult<()> {
        let start = Instant::now();
        let mut pending: BTreeMap<usize, Parsed> = BTreeMap::new();
        let mut next = 0;

        for parsed in results.iter() {
            pending.insert(parsed.index, parsed);

            while let Some(parsed) = pending.remove(&next) {
                if self.stop_flag.load(Ordering::Relaxed) {
                    info!("Stop signal received after {next} of {total} files");
                    return Ok(());
                }

                self.handle(store, parsed)?;
                next += 1;

                if next % self.config.progress_every == 0 {
                    self.log_progress(next, total, &start);
                }
            }
        }

        Ok(())
    }

    fn handle<S: RfiStore + ?Sized>(
        &self,
        store: &mut S,
        parsed: Parsed,
    ) -> LoaderResult<()> {
        let path = parsed.path;

        let file = match parsed.result {
            Ok(file) => file,
            Err(e) => {
                if e.is_schema() {
                    warn!("Dropping file {path:?}: {e}");
                } else {
                    warn!("Failed to read {path:?}: {e}");
                }
                self.metrics.files_failed.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        };

        match self.uploader.upload(store, &file)? {
            UploadOutcome::Uploaded(report) => {
                self.metrics.record_file(&file.stats);
                self.metrics.record_upload(&report);
            }
            UploadOutcome::AlreadyIngested => {
                self.metrics
                    .files_already_ingested
                    .fetch_add(1, Ordering::Relaxed);
            }
        }

        Ok(())
    }

    fn log_progress(
        &self,
        done: usize,
        total: usize,
        start: &Instant,
    ) {
        let m = &self.metrics;

        info!(
            "[ {:.0}s ] files={done}/{total} ingested={} failed={} dirty={:.2}%",
            start.elapsed().as_secs_f64(),
            m.files_ingested.load(Ordering::Relaxed),
            m.files_failed.load(Ordering::Relaxed),
            m.dirty_rate_pct(),
        );
    }
}
