//! Device timestamp encodings
//!
//! Terminals keep local wall-clock time without a zone. Two encodings show up
//! on the wire:
//!
//! - a packed `u32` used in stored attendance records, counting seconds in a
//!   calendar where every month has 31 days
//! - six raw bytes `[year - 2000, month, day, hour, minute, second]` used in
//!   real-time event pushes

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::error::{Error, Result};

/// Decode a packed attendance timestamp
///
/// # Examples
///
/// ```
/// use zkbridge_types::time;
///
/// let ts = time::decode_packed(0).unwrap();
/// assert_eq!(ts.to_string(), "2000-01-01 00:00:00");
/// ```
pub fn decode_packed(mut t: u32) -> Result<NaiveDateTime> {
    let second = t % 60;
    t /= 60;
    let minute = t % 60;
    t /= 60;
    let hour = t % 24;
    t /= 24;
    let day = t % 31 + 1;
    t /= 31;
    let month = t % 12 + 1;
    t /= 12;
    let year = t as i32 + 2000;

    build(year, month, day, hour, minute, second)
}

/// Encode a timestamp into the packed attendance form
pub fn encode_packed(ts: &NaiveDateTime) -> u32 {
    let year = (ts.year() % 100) as u32;
    let days = (year * 12 + ts.month0()) * 31 + ts.day0();

    days * 24 * 60 * 60 + (ts.hour() * 60 + ts.minute()) * 60 + ts.second()
}

/// Decode the six-byte form carried by real-time events
pub fn decode_bytes(raw: &[u8]) -> Result<NaiveDateTime> {
    let [year, month, day, hour, minute, second] = raw else {
        return Err(Error::Parse(format!(
            "event timestamp must be 6 bytes, got {}",
            raw.len()
        )));
    };

    build(
        *year as i32 + 2000,
        *month as u32,
        *day as u32,
        *hour as u32,
        *minute as u32,
        *second as u32,
    )
}

fn build(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Result<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .ok_or_else(|| {
            Error::Parse(format!(
                "invalid device time {year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_decode_packed_known_value() {
        let ts = at(2024, 3, 15, 8, 30, 5);
        assert_eq!(decode_packed(encode_packed(&ts)).unwrap(), ts);
        assert_eq!(encode_packed(&at(2000, 1, 2, 0, 0, 0)), 86400);
    }

    #[test]
    fn test_decode_packed_rejects_impossible_date() {
        // Day 31 of February exists in the packed calendar but not in reality
        let packed = (31 + 30) * 86400;
        assert!(decode_packed(packed).is_err());
    }

    #[test]
    fn test_decode_bytes() {
        let ts = decode_bytes(&[24, 12, 31, 23, 59, 58]).unwrap();
        assert_eq!(ts, at(2024, 12, 31, 23, 59, 58));
    }

    #[test]
    fn test_decode_bytes_wrong_length() {
        assert!(decode_bytes(&[24, 12, 31]).is_err());
    }

    proptest! {
        #[test]
        fn packed_encoding_is_lossless(
            y in 2000i32..2099,
            mo in 1u32..=12,
            d in 1u32..=28,
            h in 0u32..24,
            mi in 0u32..60,
            s in 0u32..60,
        ) {
            let ts = at(y, mo, d, h, mi, s);
            prop_assert_eq!(decode_packed(encode_packed(&ts)).unwrap(), ts);
        }
    }
}
