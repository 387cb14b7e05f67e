//! Метаданные файла: разбор `#`-заголовка или восстановление по имени файла.

use std::{io::BufRead, sync::LazyLock, time::SystemTime};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use regex::Regex;
use rfi_types::{FileHeader, HeaderSource};

use crate::{
    source::LineSource,
    time::{self, GBT_LONGITUDE_DEG},
};

/// Раскладка колонок файлов без заголовка.
pub const HEADERLESS_COLUMNS: [&str; 2] = ["Frequency (MHz)", "Intensity (Jy)"];

static AZIMUTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)az(\d+(?:\.\d+)?)").expect("valid azimuth regex"));
static ELEVATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)el(\d+(?:\.\d+)?)").expect("valid elevation regex"));

/// Результат сканирования заголовка.
#[derive(Debug, Clone)]
pub struct HeaderScan {
    pub header: FileHeader,
    /// Первая строка данных, прочитанная при выходе из заголовка. Должна
    /// быть передана разборщику строк.
    pub first_data_line: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    ScanningHeader,
    Done,
}

/// Конечный автомат разбора заголовка.
#[derive(Debug, Clone)]
pub struct HeaderParser {
    marker: char,
}

impl HeaderParser {
    pub fn new(marker: char) -> Self {
        Self { marker }
    }

    /// Есть ли у файла заголовок: первый символ файла — маркер.
    pub fn has_header<R: BufRead>(
        &self,
        src: &mut LineSource<R>,
    ) -> std::io::Result<bool> {
        Ok(src
            .peek()?
            .is_some_and(|line| line.starts_with(self.marker)))
    }

    /// Разбирает строки заголовка до первой строки без маркера.
    ///
    /// Строка `# key: value` делится по первому двоеточию. Строка без
    /// двоеточия — список колонок, если следующая строка уже данные, иначе
    /// декоративный заголовок и пропускается.
    pub fn parse<R: BufRead>(
        &self,
        filename: &str,
        src: &mut LineSource<R>,
    ) -> std::io::Result<HeaderScan> {
        let mut header = FileHeader::empty(filename, HeaderSource::Parsed);
        let mut first_data_line = None;
        let mut state = ScanState::ScanningHeader;

        while state == ScanState::ScanningHeader {
            let Some(line) = src.next_line()? else {
                state = ScanState::Done;
                continue;
            };

            if !line.starts_with(self.marker) {
                first_data_line = Some(line);
                state = ScanState::Done;
                continue;
            }

            let body = line.trim_start_matches(self.marker).trim();

            if let Some((key, value)) = body.split_once(':') {
                assign_entry(&mut header, key.trim(), value.trim());
                continue;
            }

            let next_is_data = src
                .peek()?
                .is_some_and(|next| !next.starts_with(self.marker));

            if next_is_data {
                header.column_names = split_column_names(body);
            } else {
                debug!("{filename}: skipping header line {line:?}");
            }
        }

        Ok(HeaderScan {
            header,
            first_data_line,
        })
    }
}

impl Default for HeaderParser {
    fn default() -> Self {
        Self::new('#')
    }
}

/// Делит строку имён колонок.
///
/// При наличии табуляций — только по ним. Иначе по пробелам, но единица
/// измерения в скобках (`Frequency (MHz)`) приклеивается к предыдущему
/// слову.
pub fn split_column_names(body: &str) -> Vec<String> {
    if body.contains('\t') {
        return body
            .split('\t')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }

    let mut names: Vec<String> = Vec::new();

    for token in body.split_whitespace() {
        let is_unit_tail = token.starts_with('(') || (token.contains(')') && !token.contains('('));

        match names.last_mut() {
            Some(prev) if is_unit_tail => {
                prev.push(' ');
                prev.push_str(token);
            }
            _ => names.push(token.to_string()),
        }
    }

    names
}

/// Переносит пару `key: value` в типизированное поле заголовка.
fn assign_entry(
    header: &mut FileHeader,
    key: &str,
    value: &str,
) {
    let number = |v: &str| v.parse::<f64>().ok().filter(|x| x.is_finite());

    match key.to_ascii_lowercase().as_str() {
        "frontend" | "receiver" => header.frontend = value.to_string(),
        "azimuth (deg)" | "azimuth" => header.azimuth_deg = number(value),
        "elevation (deg)" | "elevation" => header.elevation_deg = number(value),
        "polarization" => header.polarization = value.to_string(),
        "date" => header.date = value.to_string(),
        "mjd" => header.mjd = number(value),
        "lst (hrs)" | "lst" => header.lst_hrs = number(value),
        "utc (hrs)" | "utc" => header.utc_hrs = number(value),
        "projid" => header.projid = value.to_string(),
        "feed" => header.feed = value.to_string(),
        "backend" => header.backend = value.to_string(),
        "source" => header.source = value.to_string(),
        "tsys" => header.tsys = value.to_string(),
        "frequency_type" => header.frequency_type = value.to_string(),
        "units" => header.units = value.to_string(),
        "scan_number" => header.scan_number = value.to_string(),
        "frequency_resolution (mhz)" | "frequency_resolution" => {
            header.frequency_resolution = value.to_string()
        }
        "exposure (sec)" | "exposure" => header.exposure = value.to_string(),
        "number_if_windows" => header.number_if_windows = value.to_string(),
        _ => {
            header.extra.insert(key.to_string(), value.to_string());
        }
    }
}

/// Восстанавливает метаданные файла без заголовка.
///
/// Имя делится по `_` и `.`: приёмник — токен 2, поляризация — 6,
/// `az…` — 7, `el…` — 8 (`TRFI_052819_L1_rfiscan1_s0001_f001_Linr_az357_el045.txt`).
/// Если позиционные az/el не читаются, ищется `az<число>`/`el<число>` по
/// всему имени. Дата — mtime файла, от неё MJD и LST. Остальное `"NaN"`.
pub fn extrapolate_header(
    filename: &str,
    modified: SystemTime,
) -> FileHeader {
    let mut header = FileHeader::empty(filename, HeaderSource::Inferred);
    let tokens: Vec<&str> = filename.split(['_', '.']).collect();

    if let Some(frontend) = tokens.get(2) {
        header.frontend = frontend.to_string();
    }
    if let Some(pol) = tokens.get(6) {
        header.polarization = pol.to_string();
    }

    header.azimuth_deg = positional_angle(&tokens, 7, "az")
        .or_else(|| search_angle(&AZIMUTH_RE, filename));
    header.elevation_deg = positional_angle(&tokens, 8, "el")
        .or_else(|| search_angle(&ELEVATION_RE, filename));

    if header.azimuth_deg.is_none() || header.elevation_deg.is_none() {
        warn!("{filename}: azimuth/elevation not recoverable from filename");
    }

    let date: DateTime<Utc> = modified.into();
    let mjd = time::mjd(&date);

    header.date = date.format(time::DATE_FORMAT).to_string();
    header.mjd = Some(mjd);
    header.utc_hrs = Some(time::utc_hours(&date));
    header.lst_hrs = Some(time::lst_hours(mjd, GBT_LONGITUDE_DEG));
    header.units = "Jy".to_string();
    header.column_names = HEADERLESS_COLUMNS.iter().map(|s| s.to_string()).collect();

    header
}

fn positional_angle(
    tokens: &[&str],
    index: usize,
    prefix: &str,
) -> Option<f64> {
    let token = tokens.get(index)?;
    let rest = token.get(prefix.len()..)?;

    if !token[..prefix.len()].eq_ignore_ascii_case(prefix) {
        return None;
    }

    rest.parse::<f64>().ok()
}

fn search_angle(
    re: &Regex,
    filename: &str,
) -> Option<f64> {
    re.captures(filename)?.get(1)?.as_str().parse::<f64>().ok()
}
