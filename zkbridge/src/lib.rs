//! # zkbridge
//!
//! HTTP bridge for a single ZKTeco biometric terminal.
//!
//! The [`DeviceSession`] owns the one live connection to the terminal and
//! serializes every command through it; the [`realtime`] module turns the
//! terminal's push stream into observer callbacks; [`api`] exposes the
//! session over HTTP.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use zkbridge::client::{Protocol, ZkConnector};
//! use zkbridge::{DeviceSession, SessionDefaults};
//!
//! #[tokio::main]
//! async fn main() -> zkbridge::Result<()> {
//!     let connector = Arc::new(ZkConnector::new(Protocol::Udp, 0));
//!     let session = DeviceSession::new(connector, SessionDefaults::default());
//!
//!     session.connect(Some("192.168.1.201".into()), None, None).await?;
//!     for user in session.list_users().await? {
//!         println!("{} {}", user.uid, user.name);
//!     }
//!     session.disconnect().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod realtime;
pub mod session;

// Re-exports
pub use error::{Error, ErrorKind, Result};
pub use realtime::{EventObserver, LogObserver};
pub use session::{ConnectOutcome, DeviceSession, SessionDefaults, SessionStatus, Transition};

// Re-export types
pub use zkbridge_types::{AttendanceRecord, DeviceInfo, RealtimeEvent, UserRecord};
