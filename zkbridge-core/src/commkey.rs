//! CommKey authentication
//!
//! A terminal configured with a communication password answers `CMD_CONNECT`
//! with `CMD_ACK_UNAUTH`; the client must then send `CMD_AUTH` carrying the
//! password scrambled with the session id the device just assigned.

use bytes::Bytes;

/// Scramble a CommKey password into the 4-byte `CMD_AUTH` payload
///
/// Steps: bit-reverse the password, add the session id, XOR with `"ZKSO"`,
/// swap the 16-bit halves, then mix in the `ticks` byte. The lowest byte
/// of the sum is dropped by the device's layout, so session ids that differ
/// only in their low byte yield the same key.
///
/// # Examples
///
/// ```
/// use zkbridge_core::make_commkey;
///
/// let key = make_commkey(0, 32031, 50);
/// assert_eq!(key.len(), 4);
/// ```
pub fn make_commkey(password: u32, session_id: u16, ticks: u8) -> Bytes {
    let k = password.reverse_bits().wrapping_add(session_id as u32);

    let [b0, b1, b2, b3] = k.to_le_bytes();
    let mixed = [b0 ^ b'Z', b1 ^ b'K', b2 ^ b'S', b3 ^ b'O'];

    let key = [
        mixed[2] ^ ticks,
        mixed[3] ^ ticks,
        ticks,
        mixed[1] ^ ticks,
    ];

    Bytes::copy_from_slice(&key)
}
