//! Conversión de marcas de tiempo a ticks
//!
//! Las columnas de tiempo se guardan como enteros de 100 ns. Los instantes se
//! cuentan desde 0001-01-01T00:00:00Z; las duraciones desde cero.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Ticks por segundo (1 tick = 100 ns)
pub const TICKS_PER_SECOND: i64 = 10_000_000;

const NANOS_PER_TICK: u32 = 100;

/// Segundos entre 0001-01-01T00:00:00Z y la época Unix
const EPOCH_OFFSET_SECONDS: i64 = 62_135_596_800;

/// Convertir un instante a ticks; `None` si no cabe en un `i64`
pub fn to_ticks(value: DateTime<Utc>) -> Option<i64> {
    value
        .timestamp()
        .checked_add(EPOCH_OFFSET_SECONDS)?
        .checked_mul(TICKS_PER_SECOND)?
        .checked_add(i64::from(value.timestamp_subsec_nanos() / NANOS_PER_TICK))
}

/// Si el instante se puede persistir como ticks
pub fn is_representable(value: &DateTime<Utc>) -> bool {
    to_ticks(*value).is_some()
}

/// Ticks para comparar en filtros; fuera de rango satura al extremo
pub fn saturating_ticks(value: DateTime<Utc>) -> i64 {
    to_ticks(value).unwrap_or(if value.timestamp() < 0 { i64::MIN } else { i64::MAX })
}

/// Convertir ticks a instante; `None` si queda fuera del rango de chrono
pub fn from_ticks(ticks: i64) -> Option<DateTime<Utc>> {
    let seconds = ticks.div_euclid(TICKS_PER_SECOND) - EPOCH_OFFSET_SECONDS;
    let nanos = u32::try_from(ticks.rem_euclid(TICKS_PER_SECOND)).ok()? * NANOS_PER_TICK;
    DateTime::from_timestamp(seconds, nanos)
}

/// Truncar un instante a la precisión que se persiste.
/// Los instantes fuera de rango se devuelven sin tocar; el almacén los rechaza.
pub fn truncate(value: DateTime<Utc>) -> DateTime<Utc> {
    to_ticks(value).and_then(from_ticks).unwrap_or(value)
}

/// Convertir una duración a ticks; `None` si no cabe en un `i64`
pub fn duration_to_ticks(value: Duration) -> Option<i64> {
    let seconds = i64::try_from(value.as_secs()).ok()?;
    seconds
        .checked_mul(TICKS_PER_SECOND)?
        .checked_add(i64::from(value.subsec_nanos() / NANOS_PER_TICK))
}

/// Convertir ticks a duración; `None` para valores negativos
pub fn duration_from_ticks(ticks: i64) -> Option<Duration> {
    let seconds = u64::try_from(ticks.div_euclid(TICKS_PER_SECOND)).ok()?;
    let nanos = u32::try_from(ticks.rem_euclid(TICKS_PER_SECOND)).ok()? * NANOS_PER_TICK;
    Some(Duration::new(seconds, nanos))
}

/// Truncar una duración a la precisión que se persiste
pub fn truncate_duration(value: Duration) -> Duration {
    duration_to_ticks(value)
        .and_then(duration_from_ticks)
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_unix_epoch_ticks() {
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        assert_eq!(to_ticks(epoch), Some(621_355_968_000_000_000));
        assert_eq!(from_ticks(621_355_968_000_000_000), Some(epoch));
    }

    #[test]
    fn test_ticks_drop_sub_tick_precision() {
        let value = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let truncated = truncate(value);
        assert_eq!(truncated.timestamp(), 1_700_000_000);
        assert_eq!(truncated.timestamp_subsec_nanos(), 123_456_700);
        assert_eq!(to_ticks(truncated).and_then(from_ticks), Some(truncated));
    }

    #[test]
    fn test_far_future_does_not_fit() {
        let far = Utc.with_ymd_and_hms(100_000, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(to_ticks(far), None);
        assert!(!is_representable(&far));
        assert_eq!(truncate(far), far);
        assert_eq!(saturating_ticks(far), i64::MAX);

        let ancient = Utc.with_ymd_and_hms(-100_000, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(saturating_ticks(ancient), i64::MIN);
    }

    #[test]
    fn test_last_representable_year() {
        let edge = Utc.with_ymd_and_hms(29_000, 1, 1, 0, 0, 0).unwrap();
        assert!(is_representable(&edge));
        assert_eq!(to_ticks(edge).and_then(from_ticks), Some(edge));
    }

    #[test]
    fn test_first_tick_is_year_one() {
        let first = from_ticks(0).unwrap();
        assert_eq!(first.format("%Y-%m-%d").to_string(), "0001-01-01");
    }

    #[test]
    fn test_duration_ticks() {
        let dwell = Duration::from_millis(90_500);
        assert_eq!(duration_to_ticks(dwell), Some(905_000_000));
        assert_eq!(duration_from_ticks(905_000_000), Some(dwell));
        assert_eq!(duration_from_ticks(-1), None);
        assert_eq!(truncate_duration(Duration::new(1, 150)).subsec_nanos(), 100);
    }
}
