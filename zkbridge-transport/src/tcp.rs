//! TCP transport
//!
//! Over TCP every protocol packet is wrapped in an 8-byte header:
//!
//! ```text
//! ┌──────────┬──────────┬──────────────┬──────────┐
//! │  0x5050  │  0x8272  │ length (u32) │  packet  │
//! └──────────┴──────────┴──────────────┴──────────┘
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, trace, warn};
use zkbridge_core::constants::{TCP_HEADER_SIZE, TCP_MAGIC_1, TCP_MAGIC_2};

use crate::{error::*, preview, resolve, Transport};

const READ_CAPACITY: usize = 4096;

/// TCP transport for ZKTeco devices
pub struct TcpTransport {
    addr: String,
    port: u16,
    socket_addr: Option<SocketAddr>,
    stream: Option<TcpStream>,
    /// Bytes received but not yet returned as a whole frame
    read_buf: BytesMut,
    connect_timeout: Duration,
}

impl TcpTransport {
    /// Create new TCP transport
    pub fn new(addr: impl Into<String>, port: u16) -> Self {
        Self {
            addr: addr.into(),
            port,
            socket_addr: None,
            stream: None,
            read_buf: BytesMut::with_capacity(READ_CAPACITY),
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Prefix a packet with the TCP wrapper header
pub fn wrap(packet: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(TCP_HEADER_SIZE + packet.len());
    buf.put_u16_le(TCP_MAGIC_1);
    buf.put_u16_le(TCP_MAGIC_2);
    buf.put_u32_le(packet.len() as u32);
    buf.put_slice(packet);
    buf
}

/// Validate a wrapper header and return the length of the packet it announces
pub fn frame_len(mut header: &[u8]) -> Result<usize> {
    if header.len() < TCP_HEADER_SIZE {
        return Err(Error::InvalidFrame(format!("header of {} bytes", header.len())));
    }

    let magic = (header.get_u16_le(), header.get_u16_le());
    if magic != (TCP_MAGIC_1, TCP_MAGIC_2) {
        return Err(Error::InvalidFrame(format!(
            "bad magic {:04X} {:04X}",
            magic.0, magic.1
        )));
    }

    Ok(header.get_u32_le() as usize)
}

/// Take one complete frame off the front of `buf`, if it holds one
fn split_frame(buf: &mut BytesMut) -> Result<Option<BytesMut>> {
    if buf.len() < TCP_HEADER_SIZE {
        return Ok(None);
    }

    let len = match frame_len(&buf[..TCP_HEADER_SIZE]) {
        Ok(len) => len,
        Err(e) => {
            buf.clear();
            return Err(e);
        }
    };
    if buf.len() < TCP_HEADER_SIZE + len {
        buf.reserve(TCP_HEADER_SIZE + len - buf.len());
        return Ok(None);
    }

    buf.advance(TCP_HEADER_SIZE);
    Ok(Some(buf.split_to(len)))
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        let addr = match self.socket_addr {
            Some(addr) => addr,
            None => resolve(&self.addr, self.port).await?,
        };
        self.socket_addr = Some(addr);

        debug!("Connecting to {} via TCP...", addr);

        let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::ConnectTimeout {
                addr,
                after: self.connect_timeout,
            })??;

        // Packets are small request/response pairs
        stream.set_nodelay(true)?;

        debug!("Connected to {} via TCP", addr);

        self.stream = Some(stream);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            debug!("Disconnecting from {}...", self.remote_addr());
            let _ = stream.shutdown().await;
        }
        self.read_buf.clear();

        self.socket_addr = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn send(&mut self, packet: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        let frame = wrap(packet);

        trace!("Sending {} bytes via TCP: {}", frame.len(), preview(&frame));

        stream.write_all(&frame).await?;
        stream.flush().await?;

        Ok(())
    }

    async fn receive(&mut self, wait: Duration) -> Result<BytesMut> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        let deadline = Instant::now() + wait;

        // Partial frames stay in `read_buf` across timeouts
        let packet = loop {
            if let Some(packet) = split_frame(&mut self.read_buf)? {
                break packet;
            }

            match timeout_at(deadline, stream.read_buf(&mut self.read_buf)).await {
                Err(_) => return Err(Error::ReadTimeout),
                Ok(Ok(0)) => {
                    warn!("Device closed the TCP connection");
                    return Err(Error::ConnectionClosed);
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(e.into()),
            }
        };

        trace!("Received {} bytes via TCP: {}", packet.len(), preview(&packet));

        Ok(packet)
    }

    fn remote_addr(&self) -> String {
        self.socket_addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| format!("{}:{}", self.addr, self.port))
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if self.is_connected() {
            warn!("TCP transport dropped while still connected");
        }
    }
}
