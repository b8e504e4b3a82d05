//! Session bookkeeping for the ZKTeco protocol
//!
//! Every command carries the session id the device assigned during
//! `CMD_CONNECT` and a reply id that advances per command. The device echoes
//! the reply id back, and the client continues counting from the echo.

use crate::command::Command;
use crate::packet::Packet;

/// Session id and reply counter of one device link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSession {
    session_id: u16,
    reply_id: u16,
    open: bool,
}

impl LinkSession {
    /// Initial reply id (USHRT_MAX - 1); the first command goes out as 0
    pub const INITIAL_REPLY_ID: u16 = 65534;

    /// Reply ids count modulo USHRT_MAX
    const REPLY_MODULUS: u32 = 65535;

    /// Create a closed session
    pub fn new() -> Self {
        Self {
            session_id: 0,
            reply_id: Self::INITIAL_REPLY_ID,
            open: false,
        }
    }

    /// Get current session id
    pub fn session_id(&self) -> u16 {
        self.session_id
    }

    /// Check if the device accepted the connection
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Record the session id assigned by the device
    pub fn open(&mut self, session_id: u16) {
        self.session_id = session_id;
        self.open = true;
    }

    /// Forget the session
    pub fn close(&mut self) {
        *self = Self::new();
    }

    /// Advance and return the reply id for the next command
    pub fn next_reply_id(&mut self) -> u16 {
        self.reply_id = ((self.reply_id as u32 + 1) % Self::REPLY_MODULUS) as u16;
        self.reply_id
    }

    /// Continue counting from the reply id echoed by the device
    pub fn observe(&mut self, reply: &Packet) {
        if !reply.is_event() {
            self.reply_id = reply.reply_id;
        }
    }

    /// Build the next outgoing packet of this session
    pub fn packet(&mut self, command: Command, payload: impl Into<bytes::Bytes>) -> Packet {
        let reply_id = self.next_reply_id();
        Packet::with_payload(command, self.session_id, reply_id, payload)
    }
}

impl Default for LinkSession {
    fn default() -> Self {
        Self::new()
    }
}
