//! Transport errors

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Transport is not open")]
    NotConnected,

    #[error("Transport is already open")]
    AlreadyConnected,

    #[error("Timed out connecting to {addr} after {}ms", .after.as_millis())]
    ConnectTimeout {
        addr: SocketAddr,
        after: Duration,
    },

    /// Nothing arrived within the read timeout
    #[error("No reply from device")]
    ReadTimeout,

    #[error("Device closed the connection")]
    ConnectionClosed,

    #[error("Socket error: {0}")]
    Io(#[from] io::Error),

    #[error("Cannot resolve device address {target}: {reason}")]
    Unresolvable {
        target: String,
        reason: String,
    },

    #[error("Invalid TCP frame: {0}")]
    InvalidFrame(String),
}

impl Error {
    /// The device did not answer in time
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ReadTimeout | Self::ConnectTimeout { .. })
    }
}
