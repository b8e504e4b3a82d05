//! Protocol client seam
//!
//! The session talks to the terminal only through [`ProtocolClient`], and
//! obtains connected clients only through a [`Connector`]. [`ZkClient`] is the
//! production implementation speaking the ZKTeco protocol.

mod link;
mod zk;

pub use zk::{Protocol, ZkClient, ZkConnector};

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use zkbridge_core::Command;
use zkbridge_types::{AttendanceRecord, DeviceInfo, RealtimeEvent, UserRecord};

/// Channel end the client pushes real-time events into
pub type EventSink = mpsc::UnboundedSender<RealtimeEvent>;

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] zkbridge_transport::Error),

    #[error(transparent)]
    Protocol(#[from] zkbridge_core::Error),

    #[error(transparent)]
    Decode(#[from] zkbridge_types::Error),

    /// The device acknowledged a command with an error code
    #[error("{command} answered with {reply}")]
    Rejected {
        command: Command,
        reply: Command,
    },

    #[error("Unexpected reply to {command}: {reply}")]
    UnexpectedReply {
        command: Command,
        reply: Command,
    },

    #[error("Authentication failed - incorrect CommKey")]
    AuthenticationFailed,
}

impl ClientError {
    /// The device answered, but refused
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::AuthenticationFailed)
    }
}

/// Where and how to reach the terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTarget {
    pub ip: String,
    pub port: u16,
    /// Connection timeout, also used as the per-reply read timeout
    pub timeout: Duration,
}

impl std::fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Operations of one connected terminal
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProtocolClient: Send {
    /// Serial number, firmware and storage counters
    async fn get_info(&mut self) -> ClientResult<DeviceInfo>;

    /// Full user table
    async fn get_users(&mut self) -> ClientResult<Vec<UserRecord>>;

    /// Write a user slot, overwriting whatever `user.uid` held
    async fn set_user(&mut self, user: &UserRecord) -> ClientResult<()>;

    async fn delete_user(&mut self, uid: u16) -> ClientResult<()>;

    /// Erase the entire user table
    ///
    /// Despite the name this is not a privilege reset: every user on the
    /// device is removed.
    async fn clear_admin_privilege(&mut self) -> ClientResult<()>;

    /// Full attendance log
    async fn get_attendances(&mut self) -> ClientResult<Vec<AttendanceRecord>>;

    async fn clear_attendance_log(&mut self) -> ClientResult<()>;

    /// Reboot; the link drops while the device restarts
    async fn restart_device(&mut self) -> ClientResult<()>;

    /// Start pushing attendance events into `sink` until stopped
    async fn get_real_time_logs(&mut self, sink: EventSink) -> ClientResult<()>;

    /// Leave real-time mode; nothing reaches the sink once this returns
    async fn stop_real_time_logs(&mut self) -> ClientResult<()>;

    /// Close the link
    async fn disconnect(&mut self) -> ClientResult<()>;
}

/// Opens connected clients
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, target: &DeviceTarget) -> ClientResult<Box<dyn ProtocolClient>>;
}
