//! ZKTeco protocol client

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zkbridge_core::constants::{COMMKEY_TICKS, data_types, events};
use zkbridge_core::{make_commkey, Command};
use zkbridge_transport::{TcpTransport, Transport, UdpTransport};
use zkbridge_types::{AttendanceRecord, DeviceInfo, StorageSizes, UserRecord};

use super::link::{expect_success, Link};
use super::{ClientError, ClientResult, Connector, DeviceTarget, EventSink, ProtocolClient};

/// How long the real-time listener holds the link per poll
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Wire transport used to reach the terminal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Protocol {
    #[default]
    Udp,
    Tcp,
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "udp" => Ok(Self::Udp),
            "tcp" => Ok(Self::Tcp),
            other => Err(format!("unknown protocol '{other}', expected udp or tcp")),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Udp => f.write_str("udp"),
            Self::Tcp => f.write_str("tcp"),
        }
    }
}

/// Opens [`ZkClient`]s with a fixed protocol and CommKey password
#[derive(Debug, Clone)]
pub struct ZkConnector {
    protocol: Protocol,
    password: u32,
}

impl ZkConnector {
    pub fn new(protocol: Protocol, password: u32) -> Self {
        Self { protocol, password }
    }
}

#[async_trait]
impl Connector for ZkConnector {
    async fn connect(&self, target: &DeviceTarget) -> ClientResult<Box<dyn ProtocolClient>> {
        let client = ZkClient::connect(self.protocol, target, self.password).await?;
        Ok(Box::new(client))
    }
}

/// Background task draining pushed events between commands
struct Listener {
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Connected ZKTeco terminal
///
/// The device is never put into `CMD_DISABLEDEVICE` state around reads;
/// several firmware versions stay locked if the link drops before the
/// matching enable.
pub struct ZkClient {
    link: Arc<Mutex<Link>>,
    listener: Option<Listener>,
}

impl ZkClient {
    /// Open the transport and run the connect handshake
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The address cannot be reached or the device doesn't respond
    /// - The device refuses the connection
    /// - The CommKey password is wrong
    pub async fn connect(protocol: Protocol, target: &DeviceTarget, password: u32) -> ClientResult<Self> {
        let transport: Box<dyn Transport> = match protocol {
            Protocol::Udp => Box::new(UdpTransport::new(target.ip.as_str(), target.port)),
            Protocol::Tcp => Box::new(
                TcpTransport::new(target.ip.as_str(), target.port).with_connect_timeout(target.timeout),
            ),
        };
        let mut link = Link::new(transport, target.timeout);

        info!("Connecting to {} via {}...", target, protocol);

        link.open_transport().await?;
        if let Err(e) = handshake(&mut link, password).await {
            if let Err(close) = link.close_transport().await {
                debug!("Failed to close transport after handshake error: {}", close);
            }
            return Err(e);
        }

        Ok(Self {
            link: Arc::new(Mutex::new(link)),
            listener: None,
        })
    }

    fn stop_listener(&mut self) -> Option<JoinHandle<()>> {
        let listener = self.listener.take()?;
        listener.stop.store(true, Ordering::Release);
        Some(listener.task)
    }
}

async fn handshake(link: &mut Link, password: u32) -> ClientResult<()> {
    let reply = link.command(Command::Connect, Bytes::new()).await?;
    let session_id = reply.session_id;

    match reply.command {
        Command::AckOk => {
            link.session.open(session_id);
            info!("Connected successfully (session_id={})", session_id);
            Ok(())
        }
        Command::AckUnauth => {
            info!("Device requires authentication, sending CommKey...");
            link.session.open(session_id);

            let key = make_commkey(password, session_id, COMMKEY_TICKS);
            let auth = link.command(Command::Auth, key).await?;
            if !auth.is_success() {
                warn!("Device refused CommKey ({})", auth.command);
                return Err(ClientError::AuthenticationFailed);
            }

            info!("Authenticated successfully (session_id={})", session_id);
            Ok(())
        }
        _ => expect_success(Command::Connect, reply).map(|_| ()),
    }
}

/// Decode a NUL-terminated text reply
fn text(payload: &[u8]) -> String {
    let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
    String::from_utf8_lossy(&payload[..end]).trim().to_string()
}

/// Read one `~Key=value` device option; `None` when the device lacks it
async fn read_option(link: &mut Link, key: &str) -> ClientResult<Option<String>> {
    let reply = link.command(Command::OptionsRrq, format!("{key}\0")).await?;
    if reply.is_error() {
        debug!("Device has no {} option", key);
        return Ok(None);
    }

    let reply = expect_success(Command::OptionsRrq, reply)?;
    let value = text(&reply.payload)
        .split_once('=')
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty());

    Ok(value)
}

async fn read_sizes(link: &mut Link) -> ClientResult<StorageSizes> {
    let reply = link.execute(Command::GetFreeSizes, Bytes::new()).await?;
    Ok(StorageSizes::decode(&reply.payload)?)
}

/// Forward pushed events until told to stop or the link fails
async fn listen(link: Arc<Mutex<Link>>, stop: Arc<AtomicBool>) {
    debug!("Real-time listener started");

    while !stop.load(Ordering::Acquire) {
        let mut link = link.lock().await;
        match link.receive(POLL_INTERVAL).await {
            Ok(packet) if packet.is_event() => {
                if let Err(e) = link.dispatch_event(packet).await {
                    warn!("Failed to acknowledge real-time event: {}", e);
                }
            }
            Ok(packet) => debug!("Ignoring stray {} from device", packet.command),
            Err(ClientError::Transport(e)) if e.is_timeout() => {}
            Err(e) => {
                warn!("Real-time listener stopped: {}", e);
                break;
            }
        }
    }

    debug!("Real-time listener finished");
}

#[async_trait]
impl ProtocolClient for ZkClient {
    async fn get_info(&mut self) -> ClientResult<DeviceInfo> {
        let mut link = self.link.lock().await;

        let version = link.execute(Command::GetVersion, Bytes::new()).await?;
        let serial = read_option(&mut link, "~SerialNumber").await?;
        let platform = read_option(&mut link, "~Platform").await?;
        let device_name = read_option(&mut link, "~DeviceName").await?;
        let sizes = read_sizes(&mut link).await?;

        let mut info = DeviceInfo::new(
            serial.unwrap_or_else(|| "UNKNOWN".to_string()),
            text(&version.payload),
        )
        .with_sizes(sizes);
        info.platform = platform;
        info.device_name = device_name;

        debug!("Device info: {}", info);
        Ok(info)
    }

    async fn get_users(&mut self) -> ClientResult<Vec<UserRecord>> {
        let mut link = self.link.lock().await;

        let sizes = read_sizes(&mut link).await?;
        let data = link.read_table(Command::UserTempRrq, data_types::FCT_USER).await?;
        let users = UserRecord::decode_table(&data, Some(sizes.user_count as usize))?;

        debug!("Read {} users ({} bytes)", users.len(), data.len());
        Ok(users)
    }

    async fn set_user(&mut self, user: &UserRecord) -> ClientResult<()> {
        let mut link = self.link.lock().await;

        link.execute(Command::UserWrq, user.encode().freeze()).await?;
        link.execute(Command::RefreshData, Bytes::new()).await?;

        debug!("Wrote user slot {} ({})", user.uid, user.user_id);
        Ok(())
    }

    async fn delete_user(&mut self, uid: u16) -> ClientResult<()> {
        let mut link = self.link.lock().await;

        link.execute(Command::DeleteUser, uid.to_le_bytes().to_vec()).await?;
        link.execute(Command::RefreshData, Bytes::new()).await?;

        debug!("Deleted user slot {}", uid);
        Ok(())
    }

    async fn clear_admin_privilege(&mut self) -> ClientResult<()> {
        let mut link = self.link.lock().await;

        link.execute(Command::ClearData, vec![data_types::FCT_USER]).await?;
        link.execute(Command::RefreshData, Bytes::new()).await?;

        debug!("Cleared user table");
        Ok(())
    }

    async fn get_attendances(&mut self) -> ClientResult<Vec<AttendanceRecord>> {
        let mut link = self.link.lock().await;

        let sizes = read_sizes(&mut link).await?;
        let data = link.read_table(Command::AttLogRrq, data_types::FCT_ATTLOG).await?;
        let records = AttendanceRecord::decode_table(&data, Some(sizes.record_count as usize))?;

        debug!("Read {} attendance records ({} bytes)", records.len(), data.len());
        Ok(records)
    }

    async fn clear_attendance_log(&mut self) -> ClientResult<()> {
        let mut link = self.link.lock().await;

        link.execute(Command::ClearAttLog, Bytes::new()).await?;

        debug!("Cleared attendance log");
        Ok(())
    }

    async fn restart_device(&mut self) -> ClientResult<()> {
        if let Some(task) = self.stop_listener() {
            let _ = task.await;
        }

        let mut link = self.link.lock().await;

        // The device reboots without answering
        let packet = link.session.packet(Command::Restart, Bytes::new());
        link.send(&packet).await?;

        info!("Restart sent to {}", link.remote_addr());
        link.close_transport().await
    }

    async fn get_real_time_logs(&mut self, sink: EventSink) -> ClientResult<()> {
        if let Some(task) = self.stop_listener() {
            let _ = task.await;
        }

        {
            let mut link = self.link.lock().await;
            // Pushes may follow the ack immediately
            link.events = Some(sink);
            if let Err(e) = link
                .execute(Command::RegEvent, events::EF_ATTLOG.to_le_bytes().to_vec())
                .await
            {
                link.events = None;
                return Err(e);
            }
        }

        let stop = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(listen(self.link.clone(), stop.clone()));
        self.listener = Some(Listener { stop, task });

        info!("Real-time events registered");
        Ok(())
    }

    async fn stop_real_time_logs(&mut self) -> ClientResult<()> {
        // Awaited rather than aborted so an event being handled still gets
        // its ack
        if let Some(task) = self.stop_listener() {
            if let Err(e) = task.await {
                warn!("Real-time listener task failed: {}", e);
            }
        }

        let mut link = self.link.lock().await;
        link.events = None;
        link.execute(Command::RegEvent, 0u32.to_le_bytes().to_vec()).await?;

        info!("Real-time events unregistered");
        Ok(())
    }

    async fn disconnect(&mut self) -> ClientResult<()> {
        if let Some(task) = self.stop_listener() {
            let _ = task.await;
        }

        let mut link = self.link.lock().await;
        if !link.is_connected() {
            return Ok(());
        }

        info!("Disconnecting from {}...", link.remote_addr());

        let packet = link.session.packet(Command::Exit, Bytes::new());
        if let Err(e) = link.send(&packet).await {
            warn!("Failed to send EXIT command: {}", e);
        }

        link.close_transport().await?;

        info!("Disconnected");
        Ok(())
    }
}

impl Drop for ZkClient {
    fn drop(&mut self) {
        self.stop_listener();
    }
}
