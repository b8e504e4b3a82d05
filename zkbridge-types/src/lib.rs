//! Type definitions for zkbridge
//!
//! Records exchanged with the terminal, together with their on-device
//! binary layouts.

pub mod attendance;
pub mod device_info;
pub mod error;
pub mod event;
pub mod time;
pub mod user;

pub use attendance::AttendanceRecord;
pub use device_info::{DeviceInfo, StorageSizes};
pub use error::{Error, Result};
pub use event::RealtimeEvent;
pub use user::UserRecord;

/// Read a NUL-padded fixed-width text field.
pub(crate) fn read_text(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).trim().to_string()
}

/// Strip the `u32` length prefix of a buffered table read
pub(crate) fn split_table(data: &[u8]) -> Result<&[u8]> {
    if data.is_empty() {
        return Ok(data);
    }
    let Some((prefix, body)) = data.split_first_chunk::<4>() else {
        return Err(Error::Parse(format!("table header too short: {} bytes", data.len())));
    };

    let declared = u32::from_le_bytes(*prefix) as usize;
    if body.len() < declared {
        return Err(Error::Parse(format!(
            "table declares {declared} bytes but only {} arrived",
            body.len()
        )));
    }
    Ok(&body[..declared])
}

/// Pick the record size of a table from the device-reported count, falling
/// back to the first candidate that divides the table evenly.
pub(crate) fn record_size(len: usize, expected: Option<usize>, candidates: &[usize]) -> Result<usize> {
    if let Some(count) = expected.filter(|&count| count > 0) {
        if len % count == 0 && candidates.contains(&(len / count)) {
            return Ok(len / count);
        }
    }

    if len == 0 {
        return Ok(candidates[0]);
    }

    candidates
        .iter()
        .copied()
        .find(|size| len % size == 0)
        .ok_or(Error::UnknownRecordLayout { len })
}
