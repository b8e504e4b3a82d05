//! Transport layer for ZKTeco protocol
//!
//! Moves whole protocol packets between the client and a device over UDP
//! datagrams or a TCP stream.

pub mod error;
pub mod tcp;
pub mod udp;

pub use error::{Error, Result};
pub use tcp::TcpTransport;
pub use udp::UdpTransport;

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;

/// Transport trait for different communication methods
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to device
    async fn connect(&mut self) -> Result<()>;

    /// Disconnect from device
    async fn disconnect(&mut self) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Send one encoded packet
    async fn send(&mut self, packet: &[u8]) -> Result<()>;

    /// Receive one encoded packet, waiting at most `timeout`
    async fn receive(&mut self, timeout: Duration) -> Result<BytesMut>;

    /// Get remote address
    fn remote_addr(&self) -> String;
}

/// Render the first bytes of a buffer for trace logs
pub(crate) fn preview(data: &[u8]) -> String {
    hex::encode(&data[..data.len().min(32)])
}

/// Resolve `host:port` to the first socket address
pub(crate) async fn resolve(host: &str, port: u16) -> Result<std::net::SocketAddr> {
    let target = format!("{}:{}", host, port);

    let first = tokio::net::lookup_host(&target)
        .await
        .map_err(|e| Error::Unresolvable {
            target: target.clone(),
            reason: e.to_string(),
        })?
        .next();

    first.ok_or_else(|| Error::Unresolvable {
        reason: "no addresses found".to_string(),
        target,
    })
}
