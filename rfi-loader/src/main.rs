use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

use clap::{Parser, Subcommand};
use log::{error, info, warn, LevelFilter};
use rfi_core::{Predicate, DEFAULT_GAP_FLOOR_MHZ, DEFAULT_MAX_GAP_MHZ};
use rfi_loader::{
    aggregate_store, aggregate_text, analyze, gather_filepaths, load_store, read_bins, save_store,
    IngestPipeline, LoaderConfig, LoaderResult,
};
use rfi_types::Partition;

#[derive(Parser, Debug)]
#[command(
    name = "rfi-loader",
    version = env!("CARGO_PKG_VERSION"),
    about = "Normalize, validate and deduplicate GBT RFI archive files",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Тихий режим (только ошибки)
    #[arg(short, long, global = true)]
    quiet: bool,
    /// Подробный вывод (debug)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Загрузить каталог архивных файлов в хранилище
    Ingest {
        /// Каталог с файлами (перекрывает input_dir конфигурации)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// JSON конфигурация загрузчика
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Подстрока имени файла (можно повторять)
        #[arg(short, long)]
        subset: Vec<String>,
        /// JSON снимок хранилища
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// JSON справочник приёмников
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Потоков разбора
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Построить агрегатную таблицу (CSV)
    Aggregate {
        /// Текстовая выгрузка `частота интенсивность`, отсортированная по частоте
        #[arg(short, long, conflicts_with = "snapshot", required_unless_present = "snapshot")]
        input: Option<PathBuf>,
        /// Снимок хранилища вместо текстовой выгрузки
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Агрегировать раздел вне диапазона вместо основного
        #[arg(long, requires = "snapshot")]
        dirty: bool,
        /// Только строки приёмника (каноническое имя, например Rcvr1_2)
        #[arg(long, requires = "snapshot")]
        frontend: Option<String>,
        /// Выходной CSV
        #[arg(short, long, default_value = "aggregate.csv")]
        output: PathBuf,
    },
    /// Пробелы покрытия и интегральная энергия по агрегатной таблице
    Analyze {
        /// CSV агрегатной таблицы
        #[arg(short, long, default_value = "aggregate.csv")]
        bins: PathBuf,
        /// Нижняя граница поиска пробелов, МГц
        #[arg(long, default_value_t = DEFAULT_GAP_FLOOR_MHZ)]
        floor: f64,
        /// Минимальная ширина пробела, МГц
        #[arg(long, default_value_t = DEFAULT_MAX_GAP_MHZ)]
        max_gap: f64,
    },
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.quiet {
        LevelFilter::Error
    } else if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .format_target(false)
        .format_timestamp_secs()
        .init();

    let result = match cli.command {
        Command::Ingest {
            input,
            config,
            subset,
            snapshot,
            catalog,
            workers,
        } => run_ingest(input, config, subset, snapshot, catalog, workers),
        Command::Aggregate {
            input,
            snapshot,
            dirty,
            frontend,
            output,
        } => run_aggregate(input, snapshot, dirty, frontend, output),
        Command::Analyze {
            bins,
            floor,
            max_gap,
        } => run_analyze(bins, floor, max_gap),
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run_ingest(
    input: Option<PathBuf>,
    config_path: Option<PathBuf>,
    subset: Vec<String>,
    snapshot: Option<PathBuf>,
    catalog: Option<PathBuf>,
    workers: Option<usize>,
) -> LoaderResult<()> {
    let mut config = match &config_path {
        Some(path) => LoaderConfig::from_json_file(path)?,
        None => LoaderConfig::default(),
    };

    if let Some(dir) = input {
        config.input_dir = dir;
    }
    if !subset.is_empty() {
        config.subset = subset;
    }
    if let Some(path) = snapshot {
        config.snapshot_path = path;
    }
    if catalog.is_some() {
        config.receiver_catalog = catalog;
    }
    if let Some(n) = workers {
        config.workers = n;
    }

    config.validate()?;
    let receivers = config.load_catalog()?;
    let schema = config.load_schema()?;

    let files = gather_filepaths(&config.input_dir, &config.subset)?;
    if files.is_empty() {
        warn!("No matching files in {:?}", config.input_dir);
        return Ok(());
    }

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  Input         : {:?}", config.input_dir);
    info!("  Files         : {}", files.len());
    info!("  Receivers     : {}", receivers.receivers().count());
    info!(
        "  Columns       : {}",
        if schema.is_some() { "custom" } else { "standard" }
    );
    info!("  Key           : {}", config.ingest.primary_composite_key.join(" + "));
    info!("  Workers       : {}", config.workers);
    info!("  Snapshot      : {:?}", config.snapshot_path);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let snapshot_path = config.snapshot_path.clone();
    let mut store = load_store(&snapshot_path)?;

    let (pipeline, metrics) = IngestPipeline::new(config, receivers);
    let pipeline = match schema {
        Some(schema) => pipeline.with_schema(schema),
        None => pipeline,
    };
    let stop_flag: Arc<AtomicBool> = pipeline.stop_flag();

    let stop_ctrlc = stop_flag.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        if stop_ctrlc.swap(true, Ordering::SeqCst) {
            // Второй Ctrl+C — принудительный выход
            warn!("Force exit");
            std::process::exit(130);
        }
        warn!("Ctrl+C received, finishing current file and saving snapshot...");
    }) {
        warn!("Failed to set Ctrl+C handler: {e}");
    }

    let session_start = Instant::now();
    let run = pipeline.run(files, &mut store);

    // Снимок пишется и после ошибки хранилища
    save_store(&snapshot_path, &store)?;
    run?;

    let summary = metrics.summary(&session_start);
    info!("\n{summary}");

    if summary.files_failed > 0 {
        warn!("⚠ {} files were dropped, see warnings above", summary.files_failed);
    }

    if stop_flag.load(Ordering::Relaxed) {
        info!("Stopped early, {:?} is consistent", snapshot_path);
    } else {
        info!("✓ Ingest complete: {:?}", snapshot_path);
    }

    Ok(())
}

fn run_aggregate(
    input: Option<PathBuf>,
    snapshot: Option<PathBuf>,
    dirty: bool,
    frontend: Option<String>,
    output: PathBuf,
) -> LoaderResult<()> {
    let writer = BufWriter::new(File::create(&output)?);

    let bins = match (input, snapshot) {
        (Some(path), _) => aggregate_text(BufReader::new(File::open(path)?), writer)?,
        (None, Some(path)) => {
            let store = load_store(&path)?;
            let partition = if dirty {
                Partition::Dirty
            } else {
                Partition::Main
            };
            let predicate = frontend.map_or(Predicate::All, Predicate::Frontend);
            aggregate_store(&store, partition, &predicate, writer)?
        }
        (None, None) => {
            return Err(rfi_loader::LoaderError::config(
                "either --input or --snapshot is required",
            ))
        }
    };

    info!("✓ {bins} bins written to {output:?}");
    Ok(())
}

fn run_analyze(
    bins_path: PathBuf,
    floor: f64,
    max_gap: f64,
) -> LoaderResult<()> {
    let bins = read_bins(BufReader::new(File::open(&bins_path)?))?;
    let analysis = analyze(bins, floor, max_gap);

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  Bins          : {}", analysis.bins);
    info!("  Gaps > {max_gap} MHz above {floor} MHz: {}", analysis.gaps.len());
    for gap in &analysis.gaps {
        info!(
            "    {:.4} .. {:.4} MHz ({:.1} MHz)",
            gap.from_mhz,
            gap.to_mhz,
            gap.width()
        );
    }
    info!("  Energy (mean) : {:.6e} W", analysis.energy.mean);
    info!("  Energy (med.) : {:.6e} W", analysis.energy.median);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    Ok(())
}
