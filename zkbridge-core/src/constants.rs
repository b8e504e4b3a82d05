//! Protocol constants

/// TCP wrapper magic (some devices frame every packet with it over TCP)
pub const TCP_MAGIC_1: u16 = 0x5050;
pub const TCP_MAGIC_2: u16 = 0x8272;

/// Size of the TCP wrapper: two magic words plus a `u32` length
pub const TCP_HEADER_SIZE: usize = 8;

/// Default connection timeout (milliseconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Largest chunk requested with a single `CMD_READ_BUFFER`
pub const MAX_CHUNK: u32 = 0xFFC0;

/// `ticks` byte mixed into the CommKey
pub const COMMKEY_TICKS: u8 = 50;

/// Real-time event flags
pub mod events {
    /// Attendance log event
    pub const EF_ATTLOG: u32 = 1;
}

/// Data type flags for buffered reads and `CMD_CLEAR_DATA`
pub mod data_types {
    /// Attendance log
    pub const FCT_ATTLOG: u8 = 1;

    /// User record
    pub const FCT_USER: u8 = 5;
}
