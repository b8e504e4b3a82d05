//! Command/reply exchange over one transport

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, trace, warn};
use zkbridge_core::constants::MAX_CHUNK;
use zkbridge_core::{Command, LinkSession, Packet};
use zkbridge_transport::Transport;
use zkbridge_types::RealtimeEvent;

use super::{ClientError, ClientResult, EventSink};

/// One transport plus the protocol state riding on it
pub(crate) struct Link {
    transport: Box<dyn Transport>,
    pub(crate) session: LinkSession,
    timeout: Duration,
    /// Destination of pushed events while real-time mode is on
    pub(crate) events: Option<EventSink>,
}

impl Link {
    pub(crate) fn new(transport: Box<dyn Transport>, timeout: Duration) -> Self {
        Self {
            transport,
            session: LinkSession::new(),
            timeout,
            events: None,
        }
    }

    pub(crate) fn remote_addr(&self) -> String {
        self.transport.remote_addr()
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub(crate) async fn open_transport(&mut self) -> ClientResult<()> {
        self.transport.connect().await?;
        Ok(())
    }

    pub(crate) async fn close_transport(&mut self) -> ClientResult<()> {
        self.events = None;
        self.session.close();
        self.transport.disconnect().await?;
        Ok(())
    }

    pub(crate) async fn send(&mut self, packet: &Packet) -> ClientResult<()> {
        trace!("Sending: {:?}", packet);

        packet.validate()?;
        self.transport.send(&packet.encode()).await?;

        Ok(())
    }

    /// Receive one packet of any kind
    pub(crate) async fn receive(&mut self, wait: Duration) -> ClientResult<Packet> {
        let buf = self.transport.receive(wait).await?;
        let packet = Packet::decode(buf)?;

        trace!("Received: {:?}", packet);

        Ok(packet)
    }

    /// Wait for the reply to the last command
    ///
    /// Events pushed by the device in the meantime are forwarded, not
    /// mistaken for the reply.
    pub(crate) async fn reply(&mut self) -> ClientResult<Packet> {
        loop {
            let packet = self.receive(self.timeout).await?;

            if packet.is_event() {
                self.dispatch_event(packet).await?;
                continue;
            }

            self.session.observe(&packet);
            return Ok(packet);
        }
    }

    /// Send a command and return whatever the device answers
    pub(crate) async fn command(&mut self, command: Command, payload: impl Into<Bytes>) -> ClientResult<Packet> {
        let packet = self.session.packet(command, payload);
        self.send(&packet).await?;
        self.reply().await
    }

    /// Send a command that must be acknowledged with success
    pub(crate) async fn execute(&mut self, command: Command, payload: impl Into<Bytes>) -> ClientResult<Packet> {
        let reply = self.command(command, payload).await?;
        expect_success(command, reply)
    }

    /// Acknowledge a pushed event and forward it to the sink
    pub(crate) async fn dispatch_event(&mut self, packet: Packet) -> ClientResult<()> {
        let ack = Packet::new(
            Command::AckOk,
            self.session.session_id(),
            LinkSession::INITIAL_REPLY_ID,
        );
        self.send(&ack).await?;

        let Some(sink) = &self.events else {
            debug!("Dropping event pushed outside real-time mode");
            return Ok(());
        };

        match RealtimeEvent::decode(packet.session_id, &packet.payload) {
            Ok(event) => {
                if sink.send(event).is_err() {
                    debug!("Event sink closed, dropping event");
                }
            }
            Err(e) => warn!("Undecodable real-time event ({} bytes): {}", packet.payload.len(), e),
        }

        Ok(())
    }

    /// Read a whole device table through the buffered transfer commands
    ///
    /// Small tables come back directly as `CMD_DATA`; larger ones are staged
    /// on the device and fetched in chunks, then released with
    /// `CMD_FREE_DATA`.
    pub(crate) async fn read_table(&mut self, table: Command, fct: u8) -> ClientResult<BytesMut> {
        let mut request = BytesMut::with_capacity(11);
        request.put_u8(1);
        request.put_u16_le(table.into());
        request.put_u32_le(fct as u32);
        request.put_u32_le(0);

        let reply = self.command(Command::PrepareBuffer, request.freeze()).await?;
        let staged = match reply.command {
            Command::Data => return Ok(BytesMut::from(&reply.payload[..])),
            Command::AckOk => reply.payload,
            _ => return Err(unsuccessful(Command::PrepareBuffer, &reply)),
        };

        let Some(size) = staged.get(1..5) else {
            return Err(ClientError::UnexpectedReply {
                command: Command::PrepareBuffer,
                reply: reply.command,
            });
        };
        let size = u32::from_le_bytes([size[0], size[1], size[2], size[3]]);

        debug!("Reading {} staged bytes for {}", size, table);

        let mut data = BytesMut::with_capacity(size as usize);
        let mut start = 0;
        while start < size {
            let len = MAX_CHUNK.min(size - start);
            let chunk = self.read_chunk(start, len).await?;
            data.extend_from_slice(&chunk);
            start += len;
        }

        self.execute(Command::FreeData, Bytes::new()).await?;

        Ok(data)
    }

    async fn read_chunk(&mut self, start: u32, len: u32) -> ClientResult<BytesMut> {
        let mut request = BytesMut::with_capacity(8);
        request.put_u32_le(start);
        request.put_u32_le(len);

        let reply = self.command(Command::ReadBuffer, request.freeze()).await?;
        match reply.command {
            Command::Data => Ok(BytesMut::from(&reply.payload[..])),
            Command::PrepareData => {
                let mut chunk = BytesMut::with_capacity(len as usize);
                loop {
                    let packet = self.reply().await?;
                    match packet.command {
                        Command::Data => chunk.extend_from_slice(&packet.payload),
                        Command::AckOk => break,
                        _ => return Err(unsuccessful(Command::ReadBuffer, &packet)),
                    }
                }
                Ok(chunk)
            }
            _ => Err(unsuccessful(Command::ReadBuffer, &reply)),
        }
    }
}

pub(crate) fn expect_success(command: Command, reply: Packet) -> ClientResult<Packet> {
    if reply.is_success() {
        Ok(reply)
    } else {
        Err(unsuccessful(command, &reply))
    }
}

fn unsuccessful(command: Command, reply: &Packet) -> ClientError {
    if reply.is_error() {
        ClientError::Rejected { command, reply: reply.command }
    } else {
        ClientError::UnexpectedReply { command, reply: reply.command }
    }
}
