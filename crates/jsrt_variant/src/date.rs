//! OLE automation dates and FILETIME ticks.
//!
//! An OLE date is a double counting days since 1899-12-30. Dates before the
//! epoch keep a positive time-of-day fraction (`-1.25` is 1899-12-29 06:00),
//! so the integral and fractional parts are handled separately.

use crate::error::{Result, VariantError};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

const MILLIS_PER_DAY: i64 = 86_400_000;
// 9999-12-31 is day 2 958 465; 0100-01-01 is day -657 434.
const MAX_OA_DATE: f64 = 2_958_466.0;
const MIN_OA_DATE: f64 = -657_435.0;

fn ole_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

fn file_time_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1601, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Converts a date/time to an OLE automation date with millisecond precision.
pub fn to_ole_date(value: NaiveDateTime) -> Result<f64> {
    let mut millis = (value - ole_epoch()).num_milliseconds();
    if millis < 0 {
        let frac = millis % MILLIS_PER_DAY;
        if frac != 0 {
            millis -= (MILLIS_PER_DAY + frac) * 2;
        }
    }
    let days = millis as f64 / MILLIS_PER_DAY as f64;
    if !(MIN_OA_DATE..MAX_OA_DATE).contains(&days) {
        return Err(VariantError::UnrepresentableDate(value.to_string()));
    }
    Ok(days)
}

/// Converts an OLE automation date back to a date/time, rounding to the
/// nearest millisecond.
pub fn from_ole_date(value: f64) -> Result<NaiveDateTime> {
    if !(value > MIN_OA_DATE && value < MAX_OA_DATE) {
        return Err(VariantError::DateOutOfRange(value));
    }
    let rounding = if value >= 0.0 { 0.5 } else { -0.5 };
    let mut millis = (value * MILLIS_PER_DAY as f64 + rounding) as i64;
    if millis < 0 {
        millis -= (millis % MILLIS_PER_DAY) * 2;
    }
    ole_epoch()
        .checked_add_signed(TimeDelta::milliseconds(millis))
        .ok_or(VariantError::DateOutOfRange(value))
}

/// 100-nanosecond ticks since 1601-01-01, clamped to zero for earlier dates.
pub fn to_file_time(value: NaiveDateTime) -> u64 {
    let delta = value - file_time_epoch();
    let micros = delta.num_microseconds().unwrap_or(i64::MAX);
    if micros <= 0 {
        return 0;
    }
    (micros as u64).saturating_mul(10)
}

pub fn from_file_time(ticks: u64) -> Result<NaiveDateTime> {
    let micros = i64::try_from(ticks / 10)
        .map_err(|_| VariantError::UnrepresentableDate(format!("FILETIME {ticks}")))?;
    file_time_epoch()
        .checked_add_signed(TimeDelta::microseconds(micros))
        .ok_or_else(|| VariantError::UnrepresentableDate(format!("FILETIME {ticks}")))
}
