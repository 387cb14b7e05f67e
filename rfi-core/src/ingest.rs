//! Обработка одного файла: заголовок, строки, проверка частоты и
//! дедупликация внутри файла.

use std::{
    collections::{btree_map::Entry, BTreeMap},
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use log::{debug, info, warn};
use rfi_types::{
    ColumnSchema, DataRecord, FileHeader, FrequencyKey, Partition, ReceiverCatalog, RfiError,
    UNKNOWN_RECEIVER,
};

use crate::{
    config::IngestConfig,
    error::{IngestError, IngestResult, ValidationError},
    header::{extrapolate_header, HeaderParser},
    line::{LineParseOutcome, LineParser, LineRecord},
    source::LineSource,
    validator::FrequencyValidator,
};

/// Счётчики одного файла.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileStats {
    pub lines: u64,
    pub blank_lines: u64,
    /// Строки с NaN/нечисловой интенсивностью
    pub skipped_lines: u64,
    /// Строки с нечисловой частотой
    pub bad_frequency_lines: u64,
    pub repaired_lines: u64,
    pub clean_lines: u64,
    pub dirty_lines: u64,
    /// Строки, влитые в уже существующую запись той же частоты
    pub merged_lines: u64,
}

/// Нормализованный файл, готовый к записи в хранилище.
#[derive(Debug, Clone)]
pub struct IngestedFile {
    pub path: PathBuf,
    /// Заголовок с уже канонизированным frontend
    pub header: FileHeader,
    /// Записи по квантованной частоте
    pub records: BTreeMap<FrequencyKey, DataRecord>,
    /// Первая чистая запись файла в исходном виде (до слияний). Из неё
    /// строится составной ключ проверки повторной загрузки.
    pub first_valid: Option<DataRecord>,
    pub stats: FileStats,
}

impl IngestedFile {
    pub fn has_dirty(&self) -> bool {
        self.stats.dirty_lines > 0
    }

    pub fn records_in(
        &self,
        partition: Partition,
    ) -> impl Iterator<Item = &DataRecord> {
        self.records.values().filter(move |r| r.partition == partition)
    }
}

/// Связывает разбор заголовка, строк и проверку частоты.
#[derive(Debug, Clone)]
pub struct FileIngestor {
    config: IngestConfig,
    schema: ColumnSchema,
    header_parser: HeaderParser,
    validator: FrequencyValidator,
}

impl FileIngestor {
    pub fn new(
        config: IngestConfig,
        catalog: Arc<ReceiverCatalog>,
    ) -> Self {
        let schema = config.column_schema();
        let header_parser = HeaderParser::new(config.header_marker);
        let validator = FrequencyValidator::new(catalog, config.bound_buffer_factor);

        Self {
            config,
            schema,
            header_parser,
            validator,
        }
    }

    /// Заменяет таблицу колонок, сохраняя обязательные поля конфигурации.
    pub fn with_schema(
        mut self,
        schema: ColumnSchema,
    ) -> Self {
        self.schema = schema.with_mandatory(self.config.mandatory_fields.iter().copied());
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ReceiverCatalog {
        self.validator.catalog()
    }

    /// Открывает файл и обрабатывает его. mtime нужен для файлов без
    /// заголовка.
    pub fn ingest_path(
        &self,
        path: &Path,
    ) -> IngestResult<IngestedFile> {
        let file = File::open(path)?;
        let modified = file
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| IngestError::header(path, format!("no modification time: {e}")))?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| IngestError::header(path, "path has no file name"))?;

        let mut ingested = self.ingest_reader(&filename, BufReader::new(file), modified)?;
        ingested.path = path.to_path_buf();

        Ok(ingested)
    }

    /// Обрабатывает поток строк одного файла.
    ///
    /// Ошибка схемы прерывает только этот файл; строки с плохой
    /// интенсивностью или частотой пропускаются.
    pub fn ingest_reader<R: BufRead>(
        &self,
        filename: &str,
        reader: R,
        modified: SystemTime,
    ) -> IngestResult<IngestedFile> {
        let mut src = LineSource::new(reader);

        let (mut header, first_line) = if self.header_parser.has_header(&mut src)? {
            let scan = self.header_parser.parse(filename, &mut src)?;
            (scan.header, scan.first_data_line)
        } else {
            debug!("{filename}: no header, inferring metadata from filename");
            (extrapolate_header(filename, modified), None)
        };

        self.canonicalize_frontend(&mut header);

        let parser = LineParser::new(
            &header.column_names,
            &self.schema,
            self.config.overlap_split_offset,
        );

        let mut records: BTreeMap<FrequencyKey, DataRecord> = BTreeMap::new();
        let mut first_valid = None;
        let mut stats = FileStats::default();

        let lines = first_line.into_iter().map(Ok).chain(&mut src);

        for line in lines {
            let line = line?;
            stats.lines += 1;

            if line.trim().is_empty() {
                stats.blank_lines += 1;
                continue;
            }

            let draft = match parser.parse_line(&line) {
                LineParseOutcome::Record(draft) => draft,
                LineParseOutcome::Skip(e) => {
                    debug!("{filename}: skipping line {line:?}: {e}");
                    stats.skipped_lines += 1;
                    continue;
                }
                LineParseOutcome::Fatal(e) => {
                    return Err(IngestError::Schema {
                        path: PathBuf::from(filename),
                        line,
                        layout: parser.layout().to_vec(),
                        source: e,
                    });
                }
            };

            if draft.repaired {
                stats.repaired_lines += 1;
            }

            let Some(record) = self.classify(filename, &header.frontend, draft, &mut stats)? else {
                continue;
            };

            if first_valid.is_none() && record.partition == Partition::Main {
                first_valid = Some(record.clone());
            }

            match records.entry(record.frequency) {
                Entry::Occupied(mut slot) => {
                    slot.get_mut().absorb(record.intensity_jy);
                    stats.merged_lines += 1;
                }
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
            }
        }

        if stats.dirty_lines > 0 {
            warn!(
                "{filename}: {} lines outside '{}' bounds routed to dirty partition",
                stats.dirty_lines, header.frontend
            );
        }

        info!(
            "{filename}: {} records ({} lines, {} merged, {} skipped)",
            records.len(),
            stats.lines,
            stats.merged_lines,
            stats.skipped_lines + stats.bad_frequency_lines
        );

        Ok(IngestedFile {
            path: PathBuf::from(filename),
            header,
            records,
            first_valid,
            stats,
        })
    }

    fn canonicalize_frontend(
        &self,
        header: &mut FileHeader,
    ) {
        let canonical = self.catalog().resolve_alias(&header.frontend);

        if canonical == UNKNOWN_RECEIVER {
            warn!(
                "{}: unknown frontend '{}', treating as {UNKNOWN_RECEIVER}; add it to the receiver catalog",
                header.filename, header.frontend
            );
        }

        header.frontend = canonical.to_string();
    }

    /// Проверяет частоту и назначает раздел. `None` — строка пропущена.
    fn classify(
        &self,
        filename: &str,
        receiver: &str,
        draft: LineRecord,
        stats: &mut FileStats,
    ) -> IngestResult<Option<DataRecord>> {
        let (frequency, partition) = match self.validator.validate(&draft.frequency, receiver) {
            Ok(key) => (key, Partition::Main),
            Err(ValidationError::OutOfBounds(e)) => {
                debug!("{filename}: {e}");
                match self.validator.quantize(&draft.frequency) {
                    Ok(key) => (key, Partition::Dirty),
                    Err(e) => {
                        debug!("{filename}: {e}");
                        stats.bad_frequency_lines += 1;
                        return Ok(None);
                    }
                }
            }
            Err(ValidationError::Rfi(e @ RfiError::UnknownReceiver(_))) => {
                return Err(e.into());
            }
            Err(ValidationError::Rfi(e)) => {
                debug!("{filename}: skipping line: {e}");
                stats.bad_frequency_lines += 1;
                return Ok(None);
            }
        };

        match partition {
            Partition::Main => stats.clean_lines += 1,
            Partition::Dirty => stats.dirty_lines += 1,
        }

        Ok(Some(DataRecord::new(
            draft.window,
            draft.channel,
            frequency,
            draft.intensity_jy,
            partition,
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Cursor, time::UNIX_EPOCH};

    use rfi_types::NAN_FIELD;

    use super::*;

    fn ingestor() -> FileIngestor {
        FileIngestor::new(IngestConfig::default(), Arc::new(ReceiverCatalog::gbt()))
    }

    fn ingest(
        name: &str,
        text: &str,
    ) -> IngestResult<IngestedFile> {
        ingestor().ingest_reader(name, Cursor::new(text.to_string()), UNIX_EPOCH)
    }

    const HEADER: &str = "\
# frontend: L
# projid: TRFI_052819_L1
# mjd: 58631.5
# Window\tChannel\tFrequency(MHz)\tIntensity(Jy)
";

    #[test]
    fn test_dedup_within_file() {
        let text = format!("{HEADER}0 1 1400.12345 2.0\n\n0 2 1400.12349 4.0\n0 3 1500.0 1.0\n");
        let file = ingest("TRFI_a.txt", &text).unwrap();

        assert_eq!(file.header.frontend, "Rcvr1_2");
        assert_eq!(file.records.len(), 2);

        let key: FrequencyKey = "1400.1234".parse().unwrap();
        let merged = &file.records[&key];
        assert_eq!(merged.counts, 2);
        assert_eq!(merged.intensity_jy, 3.0);
        assert_eq!(merged.window, NAN_FIELD);
        assert_eq!(merged.channel, NAN_FIELD);

        let first = file.first_valid.as_ref().unwrap();
        assert_eq!(first.counts, 1);
        assert_eq!(first.channel, "1");

        assert_eq!(file.stats.blank_lines, 1);
        assert_eq!(file.stats.merged_lines, 1);
    }

    #[test]
    fn test_out_of_range_goes_dirty() {
        let text = format!("{HEADER}0 1 9000.0 2.0\n0 2 1400.0 3.0\n");
        let file = ingest("TRFI_b.txt", &text).unwrap();

        assert!(file.has_dirty());
        assert_eq!(file.records_in(Partition::Dirty).count(), 1);
        assert_eq!(file.records_in(Partition::Main).count(), 1);
        // первая чистая запись, а не первая строка
        assert_eq!(file.first_valid.unwrap().frequency.to_string(), "1400.0000");
    }

    #[test]
    fn test_nan_intensity_line_dropped() {
        let text = format!("{HEADER}0 1 1400.0 NaN\n0 2 1401.0 3.0\n");
        let file = ingest("TRFI_c.txt", &text).unwrap();

        assert_eq!(file.records.len(), 1);
        assert_eq!(file.stats.skipped_lines, 1);
    }

    #[test]
    fn test_schema_error_aborts_file() {
        let text = format!("{HEADER}0 1 1400.0 2.0\n1400.1 2.0 7\n");

        match ingest("TRFI_d.txt", &text) {
            Err(IngestError::Schema { line, layout, .. }) => {
                assert_eq!(line, "1400.1 2.0 7");
                assert_eq!(layout.len(), 4);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_frontend_is_unbounded() {
        let text = "# frontend: Mystery\n# Frequency(MHz) Intensity(Jy)\n99999.0 1.0\n";
        let file = ingest("TRFI_e.txt", text).unwrap();

        assert_eq!(file.header.frontend, UNKNOWN_RECEIVER);
        assert_eq!(file.records_in(Partition::Main).count(), 1);
    }

    #[test]
    fn test_unrepresentable_frequency_skipped() {
        // Unknown не ограничен, в Dirty эта частота тоже не попадает
        let text = "# frontend: Mystery\n# Frequency(MHz) Intensity(Jy)\n\
                    922337203685477.9999 1.0\n1400.0 2.0\n";
        let file = ingest("TRFI_f.txt", text).unwrap();
        assert_eq!(file.stats.bad_frequency_lines, 1);
        assert_eq!(file.records.len(), 1);

        let text = format!("{HEADER}0 1 922337203685477.9999 2.0\n0 2 1400.0 3.0\n");
        let file = ingest("TRFI_g.txt", &text).unwrap();
        assert_eq!(file.stats.bad_frequency_lines, 1);
        assert!(!file.has_dirty());
    }

    #[test]
    fn test_headerless_file() {
        let file = ingest(
            "TRFI_052819_L1_rfiscan1_s0001_f001_Linr_az357_el045.txt",
            "1.4 2.0\n1400.5 3.0\n",
        )
        .unwrap();

        assert!(file.header.is_inferred());
        assert_eq!(file.header.frontend, "Rcvr1_2");
        assert_eq!(file.records.len(), 2);
        assert!(file.records.contains_key(&"1400.0000".parse().unwrap()));
    }
}
