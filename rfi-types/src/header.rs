use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::NAN_FIELD;

/// Откуда получены метаданные файла.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderSource {
    /// Разобран заголовок `#` внутри файла
    Parsed,
    /// Восстановлен из имени файла и mtime — пониженное доверие
    Inferred,
}

/// Метаданные одного файла измерений.
///
/// Числовые поля `None`, когда значение неизвестно; при записи в хранилище
/// они превращаются в `"NaN"`. Строковые неизвестные поля хранят `"NaN"`
/// напрямую.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileHeader {
    pub filename: String,
    /// Сырой frontend до канонизации, каноническое имя после
    pub frontend: String,
    pub azimuth_deg: Option<f64>,
    pub elevation_deg: Option<f64>,
    pub polarization: String,
    /// `YYYY-MM-DD HH:MM:SS` (UTC)
    pub date: String,
    /// Modified Julian Date
    pub mjd: Option<f64>,
    /// Local Sidereal Time, часы
    pub lst_hrs: Option<f64>,
    pub utc_hrs: Option<f64>,
    pub projid: String,
    pub feed: String,
    pub backend: String,
    pub source: String,
    pub tsys: String,
    pub frequency_type: String,
    pub units: String,
    pub scan_number: String,
    pub frequency_resolution: String,
    pub exposure: String,
    pub number_if_windows: String,
    /// Сырые имена колонок в порядке файла
    pub column_names: Vec<String>,
    /// Ключи заголовка, не имеющие отдельного поля
    pub extra: BTreeMap<String, String>,
    pub origin: HeaderSource,
}

impl FileHeader {
    /// Заголовок, у которого все поля неизвестны.
    pub fn empty(
        filename: impl Into<String>,
        origin: HeaderSource,
    ) -> Self {
        let nan = || NAN_FIELD.to_string();

        FileHeader {
            filename: filename.into(),
            frontend: nan(),
            azimuth_deg: None,
            elevation_deg: None,
            polarization: nan(),
            date: nan(),
            mjd: None,
            lst_hrs: None,
            utc_hrs: None,
            projid: nan(),
            feed: nan(),
            backend: nan(),
            source: nan(),
            tsys: nan(),
            frequency_type: nan(),
            units: nan(),
            scan_number: nan(),
            frequency_resolution: nan(),
            exposure: nan(),
            number_if_windows: nan(),
            column_names: Vec::new(),
            extra: BTreeMap::new(),
            origin,
        }
    }

    pub fn is_inferred(&self) -> bool {
        self.origin == HeaderSource::Inferred
    }

    pub fn has_projid(&self) -> bool {
        self.projid != NAN_FIELD
    }

    /// Строковое значение поля по имени столбца хранилища.
    ///
    /// Используется для построения составного ключа из конфигурации.
    pub fn field(
        &self,
        name: &str,
    ) -> Option<String> {
        let num = |v: Option<f64>| v.map_or_else(|| NAN_FIELD.to_string(), |x| x.to_string());

        let value = match name {
            "filename" => self.filename.clone(),
            "frontend" => self.frontend.clone(),
            "azimuth_deg" => num(self.azimuth_deg),
            "elevation_deg" => num(self.elevation_deg),
            "polarization" => self.polarization.clone(),
            "date" => self.date.clone(),
            "mjd" => num(self.mjd),
            "lst" => num(self.lst_hrs),
            "utc_hrs" => num(self.utc_hrs),
            "projid" => self.projid.clone(),
            "feed" => self.feed.clone(),
            "backend" => self.backend.clone(),
            "source" => self.source.clone(),
            "tsys" => self.tsys.clone(),
            "frequency_type" => self.frequency_type.clone(),
            "units" => self.units.clone(),
            "scan_number" => self.scan_number.clone(),
            "resolution_MHz" => self.frequency_resolution.clone(),
            "exposure" => self.exposure.clone(),
            "number_IF_Windows" => self.number_if_windows.clone(),
            _ => return None,
        };

        Some(value)
    }

    /// Имена, которые понимает [`FileHeader::field`].
    pub const FIELD_NAMES: &'static [&'static str] = &[
        "filename",
        "frontend",
        "azimuth_deg",
        "elevation_deg",
        "polarization",
        "date",
        "mjd",
        "lst",
        "utc_hrs",
        "projid",
        "feed",
        "backend",
        "source",
        "tsys",
        "frequency_type",
        "units",
        "scan_number",
        "resolution_MHz",
        "exposure",
        "number_IF_Windows",
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_header_is_nan() {
        let h = FileHeader::empty("TRFI_x.txt", HeaderSource::Inferred);

        assert!(h.is_inferred());
        assert!(!h.has_projid());
        assert_eq!(h.field("mjd").as_deref(), Some("NaN"));
        assert_eq!(h.field("projid").as_deref(), Some("NaN"));
        assert_eq!(h.field("filename").as_deref(), Some("TRFI_x.txt"));
        assert_eq!(h.field("no_such_field"), None);
    }

    #[test]
    fn test_every_field_name_resolves() {
        let h = FileHeader::empty("f.txt", HeaderSource::Parsed);

        for name in FileHeader::FIELD_NAMES {
            assert!(h.field(name).is_some(), "{name}");
        }
    }
}
