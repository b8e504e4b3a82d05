//! Session-level error types
//!
//! Callers branch on [`ErrorKind`], never on message text.

use crate::client::ClientError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No device address was given and none is configured
    #[error("Device address is required: pass an ip or set DEVICE_IP")]
    Configuration,

    #[error("Device not connected. Please connect first.")]
    NotConnected,

    /// The link to the device failed (I/O, timeout, malformed reply)
    #[error("Failed to {operation}: {source}")]
    Transport {
        operation: &'static str,
        source: ClientError,
    },

    /// The device answered with an error
    #[error("Device rejected {operation}: {source}")]
    DeviceRejected {
        operation: &'static str,
        source: ClientError,
    },
}

/// Failure classes of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    NotConnected,
    Transport,
    DeviceRejected,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration => ErrorKind::Configuration,
            Self::NotConnected => ErrorKind::NotConnected,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::DeviceRejected { .. } => ErrorKind::DeviceRejected,
        }
    }

    /// Attach the failed operation to a protocol client error, keeping its kind
    pub(crate) fn device(operation: &'static str) -> impl FnOnce(ClientError) -> Self {
        move |source| {
            if source.is_rejection() {
                Self::DeviceRejected { operation, source }
            } else {
                Self::Transport { operation, source }
            }
        }
    }
}
