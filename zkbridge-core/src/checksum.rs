//! ZKTeco checksum algorithm
//!
//! The checksum is the ones-complement of the ones-complement sum of the
//! packet taken as little-endian 16-bit words, with the checksum field itself
//! zeroed. An odd trailing byte counts as the low byte of a final word.

use tracing::trace;

/// Calculate ZKTeco packet checksum
///
/// # Examples
///
/// ```
/// use zkbridge_core::checksum;
///
/// let checksum = checksum::calculate(1000, 0, 0, &[]);
/// assert!(checksum::verify(1000, 0, 0, &[], checksum));
/// ```
pub fn calculate(command: u16, session_id: u16, reply_id: u16, payload: &[u8]) -> u16 {
    let header = [command, 0, session_id, reply_id];

    let words = header
        .into_iter()
        .chain(payload.chunks(2).map(|pair| match *pair {
            [lo, hi] => u16::from_le_bytes([lo, hi]),
            [lo] => lo as u16,
            _ => unreachable!("chunks(2) yields one or two bytes"),
        }));

    let mut sum: u32 = 0;
    for word in words {
        sum += word as u32;
        // End-around carry keeps the running sum within 16 bits
        if sum > 0xFFFF {
            sum -= 0xFFFF;
        }
    }

    let checksum = !(sum as u16);

    trace!(
        command,
        session_id,
        reply_id,
        payload_len = payload.len(),
        checksum = format!("0x{:04X}", checksum),
        "Calculated checksum"
    );

    checksum
}

/// Verify checksum
pub fn verify(command: u16, session_id: u16, reply_id: u16, payload: &[u8], expected: u16) -> bool {
    calculate(command, session_id, reply_id, payload) == expected
}
