//! Астрономическое время для восстановленных заголовков: MJD, UTC в часах,
//! местное звёздное время на площадке GBT.

use std::f64::consts::TAU;

use chrono::{DateTime, Timelike, Utc};

/// MJD эпохи Unix (1970-01-01T00:00:00 UTC).
pub const MJD_UNIX_EPOCH: f64 = 40_587.0;

/// MJD эпохи J2000.0.
pub const MJD_J2000: f64 = 51_544.5;

/// Восточная долгота GBT, градусы.
pub const GBT_LONGITUDE_DEG: f64 = -79.839_835;

/// Формат поля `date` заголовка.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Modified Julian Date для момента UTC.
pub fn mjd(at: &DateTime<Utc>) -> f64 {
    let secs = at.timestamp() as f64 + at.timestamp_subsec_nanos() as f64 * 1e-9;
    secs / 86_400.0 + MJD_UNIX_EPOCH
}

/// Время суток UTC в часах.
pub fn utc_hours(at: &DateTime<Utc>) -> f64 {
    at.hour() as f64 + at.minute() as f64 / 60.0 + at.second() as f64 / 3600.0
}

/// Среднее гринвичское звёздное время (радианы, [0, 2π)).
///
/// Полином IAU 1982 для 0h UT1 плюс вклад доли суток. UT1 ≈ UTC:
/// заголовки, восстановленные из mtime, точнее секунды не бывают.
pub fn gmst(mjd: f64) -> f64 {
    const C0: f64 = 24_110.548_41;
    const C1: f64 = 8_640_184.812_866;
    const C2: f64 = 9.3104e-2;
    const C3: f64 = -6.2e-6;
    // Отношение звёздных суток к солнечным
    const RAP: f64 = 1.002_737_909_34;

    let day = mjd.floor();
    let t = (day - MJD_J2000) / 36_525.0;

    let gmst0 = (((C3 * t + C2) * t + C1) * t + C0) * TAU / 86_400.0;
    let h = (mjd - day) * TAU;

    (gmst0 + h * RAP).rem_euclid(TAU)
}

/// Местное среднее звёздное время (часы) для заданной долготы.
pub fn lst_hours(
    mjd: f64,
    longitude_deg: f64,
) -> f64 {
    let lst = (gmst(mjd) + longitude_deg.to_radians()).rem_euclid(TAU);
    lst * 24.0 / TAU
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_mjd_known_dates() {
        let j2000 = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        assert!((mjd(&j2000) - MJD_J2000).abs() < 1e-9);

        let d = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(mjd(&d), 59_215.0);
    }

    #[test]
    fn test_utc_hours() {
        let d = Utc.with_ymd_and_hms(2019, 5, 28, 13, 30, 36).unwrap();
        assert!((utc_hours(&d) - 13.51).abs() < 1e-12);
    }

    #[test]
    fn test_gmst_at_j2000() {
        // GMST в J2000.0 = 18h 41m 50.548s
        let expected = (18.0 + 41.0 / 60.0 + 50.548_41 / 3600.0) / 24.0 * TAU;
        assert!((gmst(MJD_J2000) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_lst_is_gmst_shifted_by_longitude() {
        let m = 58_631.5;
        let g_hours = gmst(m) * 24.0 / TAU;
        let l = lst_hours(m, GBT_LONGITUDE_DEG);
        let diff = (g_hours + GBT_LONGITUDE_DEG / 15.0).rem_euclid(24.0);

        assert!((l - diff).abs() < 1e-9);
        assert!((0.0..24.0).contains(&l));
    }
}
