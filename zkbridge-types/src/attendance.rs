//! Attendance log records

use bytes::Buf;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::{read_text, time};

/// One stored attendance punch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    /// Device slot of the user (0 when the layout does not carry it)
    pub uid: u16,
    pub user_id: String,
    /// Local device time of the punch
    pub timestamp: NaiveDateTime,
    /// Verification mode (fingerprint, card, password...)
    pub status: u8,
    /// Punch type (check-in, check-out...)
    pub punch: u8,
}

impl AttendanceRecord {
    /// Record sizes seen across firmware generations, most recent first
    pub const WIRE_SIZES: [usize; 3] = [40, 16, 8];

    /// Decode one record of any supported size
    pub fn decode(mut raw: &[u8]) -> Result<Self> {
        match raw.len() {
            40 => {
                let uid = raw.get_u16_le();
                let user_id = read_text(&raw[..24]);
                raw.advance(24);
                let status = raw.get_u8();
                let timestamp = time::decode_packed(raw.get_u32_le())?;
                let punch = raw.get_u8();

                Ok(Self { uid, user_id, timestamp, status, punch })
            }
            16 => {
                let user_id = raw.get_u32_le();
                let timestamp = time::decode_packed(raw.get_u32_le())?;
                let status = raw.get_u8();
                let punch = raw.get_u8();

                Ok(Self {
                    uid: u16::try_from(user_id).unwrap_or(0),
                    user_id: user_id.to_string(),
                    timestamp,
                    status,
                    punch,
                })
            }
            8 => {
                let uid = raw.get_u16_le();
                let status = raw.get_u8();
                let timestamp = time::decode_packed(raw.get_u32_le())?;
                let punch = raw.get_u8();

                Ok(Self { uid, user_id: uid.to_string(), timestamp, status, punch })
            }
            n => Err(crate::Error::Parse(format!("unexpected attendance record size {n}"))),
        }
    }

    /// Decode an attendance table as returned by a buffered read
    ///
    /// `expected` is the record count reported by the device.
    pub fn decode_table(data: &[u8], expected: Option<usize>) -> Result<Vec<Self>> {
        let body = crate::split_table(data)?;
        let size = crate::record_size(body.len(), expected, &Self::WIRE_SIZES)?;

        body.chunks_exact(size).map(Self::decode).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn punch_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(9, 1, 2)
            .unwrap()
    }

    fn record40(uid: u16, user_id: &str) -> Vec<u8> {
        let mut raw = vec![0u8; 40];
        raw[0..2].copy_from_slice(&uid.to_le_bytes());
        raw[2..2 + user_id.len()].copy_from_slice(user_id.as_bytes());
        raw[26] = 1;
        raw[27..31].copy_from_slice(&time::encode_packed(&punch_time()).to_le_bytes());
        raw[31] = 0;
        raw
    }

    #[test]
    fn test_decode_40_byte_record() {
        let record = AttendanceRecord::decode(&record40(7, "emp007")).unwrap();
        assert_eq!(
            record,
            AttendanceRecord {
                uid: 7,
                user_id: "emp007".into(),
                timestamp: punch_time(),
                status: 1,
                punch: 0,
            }
        );
    }

    #[test]
    fn test_decode_16_byte_record() {
        let mut raw = vec![0u8; 16];
        raw[0..4].copy_from_slice(&1234u32.to_le_bytes());
        raw[4..8].copy_from_slice(&time::encode_packed(&punch_time()).to_le_bytes());
        raw[8] = 15;
        raw[9] = 1;

        let record = AttendanceRecord::decode(&raw).unwrap();
        assert_eq!(record.uid, 1234);
        assert_eq!(record.user_id, "1234");
        assert_eq!(record.status, 15);
        assert_eq!(record.punch, 1);
    }

    #[test]
    fn test_decode_table() {
        let mut body = record40(1, "1");
        body.extend(record40(2, "2"));
        let mut data = (body.len() as u32).to_le_bytes().to_vec();
        data.extend(body);

        let records = AttendanceRecord::decode_table(&data, Some(2)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].user_id, "2");
    }

    #[test]
    fn test_decode_table_short_payload() {
        let mut data = 80u32.to_le_bytes().to_vec();
        data.extend(record40(1, "1"));

        assert!(AttendanceRecord::decode_table(&data, None).is_err());
    }
}
