use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{RfiError, RfiResult};

/// Каноническое имя-заглушка для нераспознанных приёмников.
pub const UNKNOWN_RECEIVER: &str = "Unknown";

/// Рабочий диапазон приёмника (МГц). Вместе с каноническим именем в
/// справочнике описывает приёмник целиком.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRange {
    pub freq_min: f64,
    pub freq_max: f64,
}

/// Таблицы справочника в сыром виде (для загрузки из JSON).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogTables {
    /// Сырые обозначения → каноническое имя
    pub aliases: BTreeMap<String, String>,
    /// Каноническое имя → диапазон
    pub ranges: BTreeMap<String, FrequencyRange>,
    /// Обобщённые группы ("Prime Focus All" и т.п.), для которых не ведётся
    /// отдельный индекс приёмника
    #[serde(default)]
    pub generic: BTreeSet<String>,
}

/// Неизменяемый справочник приёмников телескопа.
///
/// Загружается один раз и передаётся в пайплайн явно, вместо глобальных
/// таблиц. Инвариант: каждый алиас указывает на имя, для которого есть
/// диапазон.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "CatalogTables", into = "CatalogTables")]
pub struct ReceiverCatalog {
    aliases: BTreeMap<String, String>,
    ranges: BTreeMap<String, FrequencyRange>,
    generic: BTreeSet<String>,
}

////////////////////////////////////////////////////////////////////////////////
// FrequencyRange
////////////////////////////////////////////////////////////////////////////////

impl FrequencyRange {
    pub const UNBOUNDED: FrequencyRange = FrequencyRange {
        freq_min: f64::MIN,
        freq_max: f64::MAX,
    };

    pub fn new(
        freq_min: f64,
        freq_max: f64,
    ) -> Self {
        Self { freq_min, freq_max }
    }

    /// Ширина диапазона (МГц).
    pub fn span(&self) -> f64 {
        self.freq_max - self.freq_min
    }
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы ReceiverCatalog
////////////////////////////////////////////////////////////////////////////////

impl ReceiverCatalog {
    /// Создаёт справочник, проверяя замыкание алиасов на таблицу диапазонов.
    pub fn new(tables: CatalogTables) -> RfiResult<Self> {
        for (alias, canonical) in &tables.aliases {
            if canonical != UNKNOWN_RECEIVER && !tables.ranges.contains_key(canonical) {
                return Err(RfiError::invalid_catalog(format!(
                    "alias '{alias}' resolves to '{canonical}' which has no frequency range"
                )));
            }
        }

        for (name, range) in &tables.ranges {
            if range.freq_min > range.freq_max {
                return Err(RfiError::invalid_catalog(format!(
                    "receiver '{name}' has freq_min {} > freq_max {}",
                    range.freq_min, range.freq_max
                )));
            }
        }

        Ok(Self {
            aliases: tables.aliases,
            ranges: tables.ranges,
            generic: tables.generic,
        })
    }

    /// Справочник приёмников GBT (состояние на 2020 год).
    pub fn gbt() -> Self {
        let aliases = GBT_ALIASES
            .iter()
            .map(|(a, c)| (a.to_string(), c.to_string()))
            .collect();
        let ranges = GBT_RANGES
            .iter()
            .map(|(n, lo, hi)| (n.to_string(), FrequencyRange::new(*lo, *hi)))
            .collect();
        let generic = ["Prime Focus All", "Array All", "Kband All"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        Self {
            aliases,
            ranges,
            generic,
        }
    }

    /// Нормализует сырое обозначение приёмника.
    ///
    /// Если всё, кроме первого символа, является целым числом, значим только
    /// первый символ (`"K1"` → `"K"`, `"342"` → `"3"`). Иначе строка
    /// используется целиком.
    pub fn normalize_token(raw: &str) -> &str {
        let Some(first) = raw.chars().next() else {
            return raw;
        };
        let rest = &raw[first.len_utf8()..];

        if rest.parse::<i64>().is_ok() {
            &raw[..first.len_utf8()]
        } else {
            raw
        }
    }

    /// Возвращает каноническое имя или [`UNKNOWN_RECEIVER`]. Никогда не
    /// падает; предупреждение пишет вызывающая сторона.
    pub fn resolve_alias(
        &self,
        raw: &str,
    ) -> &str {
        let token = Self::normalize_token(raw.trim());

        self.aliases
            .get(token)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_RECEIVER)
    }

    /// Диапазон частот для канонического имени.
    pub fn range_for(
        &self,
        canonical_name: &str,
    ) -> RfiResult<FrequencyRange> {
        if canonical_name == UNKNOWN_RECEIVER {
            return Ok(FrequencyRange::UNBOUNDED);
        }

        self.ranges
            .get(canonical_name)
            .copied()
            .ok_or_else(|| RfiError::UnknownReceiver(canonical_name.to_string()))
    }

    /// Имя таблицы индекса приёмника. `None` для `Unknown` и обобщённых групп
    /// ("Prime Focus All", "Array All", ...), которые не соответствуют
    /// одному физическому приёмнику.
    pub fn index_name<'a>(
        &self,
        canonical_name: &'a str,
    ) -> Option<&'a str> {
        if canonical_name == UNKNOWN_RECEIVER || self.generic.contains(canonical_name) {
            None
        } else {
            Some(canonical_name)
        }
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(a, c)| (a.as_str(), c.as_str()))
    }

    pub fn receivers(&self) -> impl Iterator<Item = &str> {
        self.ranges.keys().map(String::as_str)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for ReceiverCatalog {
    fn default() -> Self {
        Self::gbt()
    }
}

impl TryFrom<CatalogTables> for ReceiverCatalog {
    type Error = RfiError;

    fn try_from(tables: CatalogTables) -> Result<Self, Self::Error> {
        Self::new(tables)
    }
}

impl From<ReceiverCatalog> for CatalogTables {
    fn from(c: ReceiverCatalog) -> Self {
        CatalogTables {
            aliases: c.aliases,
            ranges: c.ranges,
            generic: c.generic,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Таблицы GBT
////////////////////////////////////////////////////////////////////////////////

// Однобуквенные коды — старые обозначения диапазонов; цифровые — PF приёмники.
const GBT_ALIASES: &[(&str, &str)] = &[
    ("P1", "Prime Focus 1"),
    ("RcvrPF_1", "Prime Focus 1"),
    ("RcvrPF_", "Prime Focus All"),
    ("Rcvr_342", "Rcvr_342"),
    ("Rcvr_450", "Rcvr_450"),
    ("Rcvr_600", "Rcvr_600"),
    ("Rcvr_800", "Rcvr_800"),
    ("Rcvr_1070", "Prime Focus 2"),
    ("RcvrPF_2", "Prime Focus 2"),
    ("P2", "Prime Focus 2"),
    ("RcvrArr", "Array All"),
    ("RcvrArray1_2", "RcvrArray1_2"),
    ("Rcvr1_2", "Rcvr1_2"),
    ("Rcvr2_3", "Rcvr2_3"),
    ("Rcvr4_6", "Rcvr4_8"),
    ("Rcvr4_8", "Rcvr4_8"),
    ("x", "Rcvr8_10"),
    ("Rcvr8_1", "Rcvr8_10"),
    ("Rcvr8_10", "Rcvr8_10"),
    ("Rcvr12_", "Rcvr12_18"),
    ("Rcvr12_18", "Rcvr12_18"),
    ("KU1", "Rcvr12_18"),
    ("Ku1", "Rcvr12_18"),
    ("RcvrArray18_26", "RcvrArray19_26"),
    ("RcvrArray19_26", "RcvrArray19_26"),
    ("Rcvr26_40", "Rcvr26_40"),
    ("Rcvr40_", "Rcvr40_52"),
    ("Rcvr40_52", "Rcvr40_52"),
    ("Rcvr68_92", "Rcvr68_92"),
    ("Rcvr_MBA1_2", "RcvrMBA1_2"),
    ("RcvrArray75_115", "RcvrArray75_115"),
    ("3", "Rcvr_342"),
    ("4", "Rcvr_450"),
    ("6", "Rcvr_600"),
    ("8", "Rcvr_800"),
    ("P", "Prime Focus 2"),
    ("L", "Rcvr1_2"),
    ("S", "Rcvr2_3"),
    ("C", "Rcvr4_8"),
    ("X", "Rcvr8_10"),
    ("U", "Rcvr12_18"),
    ("K", "RcvrArray19_26"),
    ("A", "Rcvr26_40"),
    ("Q", "Rcvr40_52"),
    ("W", "Rcvr68_92"),
    ("G", "RcvrArray75_115"),
];

const GBT_RANGES: &[(&str, f64, f64)] = &[
    ("Rcvr_342", 290.0, 395.0),
    ("Rcvr_450", 385.0, 520.0),
    ("Rcvr_600", 510.0, 690.0),
    ("Rcvr_800", 680.0, 920.0),
    ("Prime Focus 1", 290.0, 920.0),
    ("Prime Focus 2", 910.0, 1230.0),
    ("Prime Focus All", 290.0, 1230.0),
    ("Array All", 1200.0, 115300.0),
    ("RcvrArray1_2", 1200.0, 1600.0),
    ("Rcvr1_2", 1150.0, 1730.0),
    ("Rcvr2_3", 1730.0, 2600.0),
    ("Rcvr4_8", 3950.0, 7800.0),
    ("Rcvr8_10", 8000.0, 11600.0),
    ("Kband All", 12000.0, 40000.0),
    ("Rcvr12_18", 12000.0, 15400.0),
    ("RcvrArray19_26", 18000.0, 27500.0),
    ("Rcvr26_40", 26000.0, 39500.0),
    ("Rcvr40_52", 38200.0, 49800.0),
    ("Rcvr68_92", 67000.0, 93300.0),
    ("RcvrMBA1_2", 80000.0, 100000.0),
    ("RcvrArray75_115", 80000.0, 115300.0),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_alias_resolves_to_ranged_receiver() {
        let catalog = ReceiverCatalog::gbt();

        for (alias, _) in catalog.aliases() {
            let canonical = catalog.resolve_alias(alias);
            assert_ne!(canonical, UNKNOWN_RECEIVER, "alias {alias}");
            assert!(
                catalog.range_for(canonical).is_ok(),
                "{alias} → {canonical} без диапазона"
            );
        }
    }

    #[test]
    fn test_normalize_token() {
        assert_eq!(ReceiverCatalog::normalize_token("K1"), "K");
        assert_eq!(ReceiverCatalog::normalize_token("342"), "3");
        assert_eq!(ReceiverCatalog::normalize_token("L"), "L");
        assert_eq!(ReceiverCatalog::normalize_token("Rcvr1_2"), "Rcvr1_2");
        assert_eq!(ReceiverCatalog::normalize_token("Ku1"), "Ku1");
        assert_eq!(ReceiverCatalog::normalize_token(""), "");
    }

    #[test]
    fn test_resolve_alias() {
        let catalog = ReceiverCatalog::gbt();

        assert_eq!(catalog.resolve_alias("L1"), "Rcvr1_2");
        assert_eq!(catalog.resolve_alias("83"), "Rcvr_800");
        assert_eq!(catalog.resolve_alias("Rcvr4_6"), "Rcvr4_8");
        assert_eq!(catalog.resolve_alias("Ku1"), "Rcvr12_18");
        assert_eq!(catalog.resolve_alias("Z9"), UNKNOWN_RECEIVER);
        assert_eq!(catalog.resolve_alias("NoSuchRcvr"), UNKNOWN_RECEIVER);
    }

    #[test]
    fn test_range_for_unknown_is_unbounded() {
        let catalog = ReceiverCatalog::gbt();
        let range = catalog.range_for(UNKNOWN_RECEIVER).unwrap();

        assert_eq!(range, FrequencyRange::UNBOUNDED);
        assert!(matches!(
            catalog.range_for("Rcvr_9999"),
            Err(RfiError::UnknownReceiver(_))
        ));
    }

    #[test]
    fn test_index_name_excludes_generic_groups() {
        let catalog = ReceiverCatalog::gbt();

        assert_eq!(catalog.index_name("Rcvr1_2"), Some("Rcvr1_2"));
        assert_eq!(catalog.index_name("Prime Focus All"), None);
        assert_eq!(catalog.index_name(UNKNOWN_RECEIVER), None);
    }

    #[test]
    fn test_catalog_rejects_dangling_alias() {
        let mut tables = CatalogTables::default();
        tables.aliases.insert("L".into(), "Rcvr1_2".into());

        assert!(ReceiverCatalog::new(tables).is_err());
    }

    #[test]
    fn test_catalog_json_round_trip_validates() {
        let json = r#"{
            "aliases": {"L": "Rcvr1_2"},
            "ranges": {"Rcvr1_2": {"freq_min": 1150.0, "freq_max": 1730.0}}
        }"#;
        let catalog: ReceiverCatalog = serde_json::from_str(json).unwrap();
        assert_eq!(catalog.resolve_alias("L2"), "Rcvr1_2");

        let bad = r#"{"aliases": {"L": "Nope"}, "ranges": {}}"#;
        assert!(serde_json::from_str::<ReceiverCatalog>(bad).is_err());
    }
}
