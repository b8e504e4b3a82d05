//! # zkbridge-core
//!
//! Wire primitives of the ZKTeco terminal protocol:
//! - Packet structure and encoding/decoding
//! - Checksum calculation
//! - Command definitions
//! - CommKey authentication
//! - Session id / reply id bookkeeping

pub mod checksum;
pub mod command;
pub mod commkey;
pub mod constants;
pub mod error;
pub mod packet;
pub mod session;

pub use command::Command;
pub use commkey::make_commkey;
pub use error::{Error, Result};
pub use packet::Packet;
pub use session::LinkSession;

/// Default device port
pub const DEFAULT_PORT: u16 = 4370;
