//! Wire errors raised while framing or parsing packets

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Fewer bytes than the 8-byte header
    #[error("Truncated packet: need {expected} bytes, have {actual}")]
    PacketTooShort { expected: usize, actual: usize },

    #[error("Bad checksum: computed 0x{expected:04X}, header says 0x{received:04X}")]
    ChecksumMismatch { expected: u16, received: u16 },

    #[error("Command code {0} is not recognised")]
    UnknownCommand(u16),

    /// Payload does not fit in one frame
    #[error("Payload of {size} bytes exceeds the {max} byte frame limit")]
    PayloadTooLarge { size: usize, max: usize },
}
