//! Частота с фиксированной точкой (4 знака после запятой, МГц).
//!
//! Ключ дедупликации внутри файла и часть составного первичного ключа,
//! поэтому квантование должно быть побитово воспроизводимым: значение
//! обрезается к нулю (не округляется) по десятичной записи числа, без
//! промежуточной двоичной арифметики.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{RfiError, RfiResult};

/// Число знаков после запятой.
pub const FREQUENCY_DECIMALS: u32 = 4;

const SCALE: i64 = 10_i64.pow(FREQUENCY_DECIMALS);

/// Частота в десятитысячных долях МГц.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrequencyKey(i64);

impl FrequencyKey {
    /// Квантует десятичную строку до 4 знаков с обрезкой к нулю.
    ///
    /// `"100.00006"` → `100.0000`, `"-1.23456"` → `-1.2345`. Экспоненциальная
    /// запись сначала приводится к обычной через `f64`.
    pub fn from_decimal_str(s: &str) -> RfiResult<Self> {
        let s = s.trim();

        if s.contains(['e', 'E']) {
            let v: f64 = s
                .parse()
                .map_err(|_| RfiError::invalid_frequency(s))?;
            return Self::from_mhz(v);
        }

        let (negative, digits) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };

        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };

        let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if (int_part.is_empty() && frac_part.is_empty())
            || !all_digits(int_part)
            || !all_digits(frac_part)
        {
            return Err(RfiError::invalid_frequency(s));
        }

        let mut units: i64 = 0;
        for b in int_part.bytes() {
            units = units
                .checked_mul(10)
                .and_then(|u| u.checked_add((b - b'0') as i64))
                .ok_or_else(|| RfiError::invalid_frequency(s))?;
        }
        units = units
            .checked_mul(SCALE)
            .ok_or_else(|| RfiError::invalid_frequency(s))?;

        // Лишние знаки отбрасываются, недостающие дополняются нулями
        let mut place = SCALE / 10;
        for b in frac_part.bytes().take(FREQUENCY_DECIMALS as usize) {
            units = units
                .checked_add((b - b'0') as i64 * place)
                .ok_or_else(|| RfiError::invalid_frequency(s))?;
            place /= 10;
        }

        Ok(FrequencyKey(if negative { -units } else { units }))
    }

    /// Квантует `f64` через его кратчайшее десятичное представление.
    pub fn from_mhz(mhz: f64) -> RfiResult<Self> {
        if !mhz.is_finite() {
            return Err(RfiError::invalid_frequency(mhz.to_string()));
        }

        Self::from_decimal_str(&format!("{mhz}"))
    }

    pub fn as_mhz(&self) -> f64 {
        self.0 as f64 / SCALE as f64
    }
}

impl std::fmt::Display for FrequencyKey {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let abs = self.0.unsigned_abs();
        let sign = if self.0 < 0 { "-" } else { "" };

        write!(
            f,
            "{sign}{}.{:04}",
            abs / SCALE as u64,
            abs % SCALE as u64
        )
    }
}

impl std::str::FromStr for FrequencyKey {
    type Err = RfiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_decimal_str(s)
    }
}

impl Serialize for FrequencyKey {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FrequencyKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_decimal_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncates_not_rounds() {
        let k = FrequencyKey::from_decimal_str("100.00006").unwrap();
        assert_eq!(k.to_string(), "100.0000");

        let k = FrequencyKey::from_decimal_str("1400.12349").unwrap();
        assert_eq!(k.to_string(), "1400.1234");

        let k = FrequencyKey::from_decimal_str("-1.23456").unwrap();
        assert_eq!(k.to_string(), "-1.2345");
    }

    #[test]
    fn test_quantize_idempotent() {
        for s in ["1400.1234", "0.0001", "115300.0000", "-3.5000"] {
            let once = FrequencyKey::from_decimal_str(s).unwrap();
            let twice = FrequencyKey::from_decimal_str(&once.to_string()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_short_and_integer_inputs() {
        assert_eq!(
            FrequencyKey::from_decimal_str("1420").unwrap().to_string(),
            "1420.0000"
        );
        assert_eq!(
            FrequencyKey::from_decimal_str("1420.5").unwrap().to_string(),
            "1420.5000"
        );
        assert_eq!(
            FrequencyKey::from_decimal_str(".25").unwrap().to_string(),
            "0.2500"
        );
    }

    #[test]
    fn test_from_mhz_uses_shortest_repr() {
        let k = FrequencyKey::from_mhz(1.5 * 1000.0).unwrap();
        assert_eq!(k.to_string(), "1500.0000");

        let k = FrequencyKey::from_mhz(1420.40575).unwrap();
        assert_eq!(k.to_string(), "1420.4057");
        assert!(FrequencyKey::from_mhz(f64::NAN).is_err());
    }

    #[test]
    fn test_exponent_notation() {
        let k = FrequencyKey::from_decimal_str("1.4e3").unwrap();
        assert_eq!(k.to_string(), "1400.0000");
    }

    #[test]
    fn test_rejects_garbage() {
        for s in ["", ".", "abc", "1.2.3", "12a", "-"] {
            assert!(FrequencyKey::from_decimal_str(s).is_err(), "{s:?}");
        }
    }

    #[test]
    fn test_out_of_range_is_error() {
        // Целая часть помещается в i64, дробная уже нет
        assert!(matches!(
            FrequencyKey::from_decimal_str("922337203685477.9999"),
            Err(RfiError::InvalidFrequency(_))
        ));
        assert!(FrequencyKey::from_decimal_str("-922337203685477.9999").is_err());
        assert!(FrequencyKey::from_decimal_str("99999999999999999999").is_err());

        let max = FrequencyKey::from_decimal_str("922337203685477.5807").unwrap();
        assert_eq!(max.to_string(), "922337203685477.5807");
    }

    #[test]
    fn test_serde_as_string() {
        let k = FrequencyKey::from_decimal_str("1400.12345").unwrap();
        let json = serde_json::to_string(&k).unwrap();
        assert_eq!(json, "\"1400.1234\"");

        let back: FrequencyKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, k);
    }
}
