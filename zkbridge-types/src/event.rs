//! Real-time push events

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::{read_text, time};

/// A punch pushed by the terminal while real-time mode is active
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeEvent {
    /// Event flag the device raised (`EF_ATTLOG` = 1)
    pub event: u16,
    pub user_id: String,
    pub timestamp: NaiveDateTime,
    /// Verification mode
    pub status: u8,
    /// Punch type
    pub punch: u8,
}

impl RealtimeEvent {
    /// Decode the payload of a pushed `CMD_REG_EVENT` packet
    ///
    /// Firmware generations differ in how wide the user id field is: 2 or 4
    /// byte integers on old units, a 24-byte string on newer ones.
    pub fn decode(event: u16, payload: &[u8]) -> Result<Self> {
        let (user_id, rest) = match payload.len() {
            10 | 14 => {
                let (id, rest) = payload.split_at(2);
                (u16::from_le_bytes([id[0], id[1]]).to_string(), rest)
            }
            12 => {
                let (id, rest) = payload.split_at(4);
                (u32::from_le_bytes([id[0], id[1], id[2], id[3]]).to_string(), rest)
            }
            n if n >= 32 => {
                let (id, rest) = payload.split_at(24);
                (read_text(id), rest)
            }
            n => return Err(Error::Parse(format!("unexpected event payload size {n}"))),
        };

        Ok(Self {
            event,
            user_id,
            status: rest[0],
            punch: rest[1],
            timestamp: time::decode_bytes(&rest[2..8])?,
        })
    }
}
