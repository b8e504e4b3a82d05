//! ZKTeco protocol packet structure and encoding/decoding

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    checksum,
    command::Command,
    error::{Error, Result},
};

/// ZKTeco protocol packet
///
/// ```text
/// ┌───────────┬───────────┬───────────┬───────────┬───────────┐
/// │  Command  │ Checksum  │ SessionID │  ReplyID  │  Payload  │
/// │  u16 LE   │  u16 LE   │  u16 LE   │  u16 LE   │  N bytes  │
/// └───────────┴───────────┴───────────┴───────────┴───────────┘
/// ```
///
/// Pushed real-time events reuse the header: the command is
/// `CMD_REG_EVENT` and the session id field carries the event flag.
///
/// # Examples
///
/// ```
/// use zkbridge_core::{Command, Packet};
///
/// let packet = Packet::new(Command::Connect, 0, 0);
/// let decoded = Packet::decode(packet.encode()).unwrap();
/// assert_eq!(decoded.command, Command::Connect);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    /// Command code
    pub command: Command,

    /// Session identifier (assigned by device on connect)
    pub session_id: u16,

    /// Reply number (echoed by the device)
    pub reply_id: u16,

    /// Command-specific data
    pub payload: Bytes,
}

impl Packet {
    /// Packet header size in bytes
    pub const HEADER_SIZE: usize = 8;

    /// Maximum payload size
    pub const MAX_PAYLOAD_SIZE: usize = 65535 - Self::HEADER_SIZE;

    /// Create a new packet with empty payload
    pub fn new(command: Command, session_id: u16, reply_id: u16) -> Self {
        Self::with_payload(command, session_id, reply_id, Bytes::new())
    }

    /// Create a packet with payload
    pub fn with_payload(
        command: Command,
        session_id: u16,
        reply_id: u16,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            command,
            session_id,
            reply_id,
            payload: payload.into(),
        }
    }

    /// Calculate checksum for this packet
    pub fn checksum(&self) -> u16 {
        checksum::calculate(
            self.command.into(),
            self.session_id,
            self.reply_id,
            &self.payload,
        )
    }

    /// Check that the payload fits a single packet
    pub fn validate(&self) -> Result<()> {
        if self.payload.len() > Self::MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                size: self.payload.len(),
                max: Self::MAX_PAYLOAD_SIZE,
            });
        }
        Ok(())
    }

    /// Encode packet to bytes
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.size());

        buf.put_u16_le(self.command.into());
        buf.put_u16_le(self.checksum());
        buf.put_u16_le(self.session_id);
        buf.put_u16_le(self.reply_id);
        buf.put_slice(&self.payload);

        buf
    }

    /// Decode packet from bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is shorter than a header, the command
    /// code is unknown or the checksum does not match.
    pub fn decode(mut buf: BytesMut) -> Result<Self> {
        if buf.len() < Self::HEADER_SIZE {
            return Err(Error::PacketTooShort {
                expected: Self::HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let command = Command::try_from(buf.get_u16_le())?;
        let received = buf.get_u16_le();
        let session_id = buf.get_u16_le();
        let reply_id = buf.get_u16_le();

        let packet = Self::with_payload(command, session_id, reply_id, buf.freeze());

        let expected = packet.checksum();
        if expected != received {
            return Err(Error::ChecksumMismatch { expected, received });
        }

        Ok(packet)
    }

    /// Check if this packet is a pushed real-time event
    pub fn is_event(&self) -> bool {
        self.command == Command::RegEvent
    }

    /// Check if this is a success response
    pub fn is_success(&self) -> bool {
        self.command.is_success()
    }

    /// Check if this is an error response
    pub fn is_error(&self) -> bool {
        self.command.is_error()
    }

    /// Get total packet size
    pub fn size(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len()
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("command", &self.command)
            .field("session_id", &format!("0x{:04X}", self.session_id))
            .field("reply_id", &format!("0x{:04X}", self.reply_id))
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Packet[{}](session={}, reply={}, len={})",
            self.command,
            self.session_id,
            self.reply_id,
            self.payload.len()
        )
    }
}
