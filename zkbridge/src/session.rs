//! Device session
//!
//! The single owner of the connection to the terminal. Every operation that
//! touches the device takes the connection mutex for the whole round-trip, so
//! commands never interleave on the link and state transitions never race.
//! The status snapshot sits behind its own lock and is only written while
//! the connection mutex is held.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use zkbridge_core::constants::DEFAULT_TIMEOUT_MS;
use zkbridge_types::{AttendanceRecord, DeviceInfo, RealtimeEvent, UserRecord};

use crate::client::{Connector, DeviceTarget, ProtocolClient};
use crate::error::{Error, Result};
use crate::realtime::{BroadcastObserver, EventObserver, RealtimeBridge};

/// Buffered events per [`DeviceSession::subscribe`] receiver
const SUBSCRIBER_CAPACITY: usize = 256;

/// Fallbacks for connect arguments the caller leaves out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDefaults {
    pub ip: Option<String>,
    pub port: u16,
    pub timeout: Duration,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            ip: None,
            port: zkbridge_core::DEFAULT_PORT,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

/// Snapshot returned by [`DeviceSession::status`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub connected: bool,
    pub realtime_mode: bool,
    pub device_info: Option<DeviceInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected(DeviceInfo),
    /// A connection was already open; nothing was done
    AlreadyConnected,
}

/// Result of an idempotent transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    AlreadyInState,
}

#[derive(Default)]
struct Connection {
    client: Option<Box<dyn ProtocolClient>>,
    realtime: Option<RealtimeBridge>,
}

/// Connection to one terminal
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use zkbridge::client::{Protocol, ZkConnector};
/// use zkbridge::{DeviceSession, LogObserver, SessionDefaults};
///
/// # async fn run() -> zkbridge::Result<()> {
/// let session = DeviceSession::new(
///     Arc::new(ZkConnector::new(Protocol::Udp, 0)),
///     SessionDefaults { ip: Some("192.168.1.201".into()), ..Default::default() },
/// )
/// .with_observer(Arc::new(LogObserver));
///
/// session.connect(None, None, None).await?;
/// session.enable_realtime().await?;
/// # Ok(())
/// # }
/// ```
pub struct DeviceSession {
    connector: Arc<dyn Connector>,
    defaults: SessionDefaults,
    observers: Vec<Arc<dyn EventObserver>>,
    broadcast: Arc<BroadcastObserver>,
    conn: Mutex<Connection>,
    status: RwLock<SessionStatus>,
}

impl DeviceSession {
    pub fn new(connector: Arc<dyn Connector>, defaults: SessionDefaults) -> Self {
        let broadcast = Arc::new(BroadcastObserver::new(SUBSCRIBER_CAPACITY));
        let observers: Vec<Arc<dyn EventObserver>> = vec![broadcast.clone()];

        Self {
            connector,
            defaults,
            observers,
            broadcast,
            conn: Mutex::new(Connection::default()),
            status: RwLock::new(SessionStatus::default()),
        }
    }

    /// Add an observer of real-time events
    pub fn with_observer(mut self, observer: Arc<dyn EventObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn defaults(&self) -> &SessionDefaults {
        &self.defaults
    }

    /// Current state; never waits for an operation in flight
    pub fn status(&self) -> SessionStatus {
        self.status.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.status.read().connected
    }

    /// Receive real-time events delivered from now on
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.broadcast.subscribe()
    }

    /// Open the connection and read device info
    ///
    /// Missing arguments fall back to [`SessionDefaults`]. Nothing changes
    /// when a connection is already open.
    ///
    /// # Errors
    ///
    /// - [`Error::Configuration`] if no address is given or configured
    /// - [`Error::Transport`] / [`Error::DeviceRejected`] if connecting or the
    ///   initial info read fails; the session stays disconnected
    pub async fn connect(
        &self,
        ip: Option<String>,
        port: Option<u16>,
        timeout: Option<Duration>,
    ) -> Result<ConnectOutcome> {
        let mut conn = self.conn.lock().await;
        if conn.client.is_some() {
            debug!("Connect requested while already connected");
            return Ok(ConnectOutcome::AlreadyConnected);
        }

        let ip = ip
            .filter(|ip| !ip.trim().is_empty())
            .or_else(|| self.defaults.ip.clone())
            .ok_or(Error::Configuration)?;
        let target = DeviceTarget {
            ip,
            port: port.unwrap_or(self.defaults.port),
            timeout: timeout.unwrap_or(self.defaults.timeout),
        };

        info!("Connecting to device at {}...", target);

        let mut client = self
            .connector
            .connect(&target)
            .await
            .map_err(Error::device("connect to device"))?;

        let info = match client.get_info().await {
            Ok(info) => info,
            Err(e) => {
                if let Err(close) = client.disconnect().await {
                    debug!("Failed to close half-open connection: {}", close);
                }
                return Err(Error::device("read device info")(e));
            }
        };

        conn.client = Some(client);
        *self.status.write() = SessionStatus {
            connected: true,
            realtime_mode: false,
            device_info: Some(info.clone()),
        };

        info!("Connected to {}", info);
        Ok(ConnectOutcome::Connected(info))
    }

    /// Close the connection, leaving real-time mode first
    ///
    /// If the device refuses to leave real-time mode the session stays
    /// connected and streaming. A dead link does not block the disconnect.
    pub async fn disconnect(&self) -> Result<Transition> {
        let mut guard = self.conn.lock().await;
        let conn = &mut *guard;
        let Some(client) = conn.client.as_mut() else {
            return Ok(Transition::AlreadyInState);
        };

        if let Some(bridge) = conn.realtime.take() {
            match client.stop_real_time_logs().await {
                Ok(()) => {}
                Err(e) if e.is_rejection() => {
                    conn.realtime = Some(bridge);
                    return Err(Error::device("disable real-time mode")(e));
                }
                Err(e) => warn!("Real-time deregistration failed, closing anyway: {}", e),
            }
            bridge.close();
        }

        if let Err(e) = client.disconnect().await {
            warn!("Error while closing device connection: {}", e);
        }

        conn.client = None;
        *self.status.write() = SessionStatus::default();

        info!("Disconnected from device");
        Ok(Transition::Applied)
    }

    /// Read device info and store it in the status
    pub async fn get_device_info(&self) -> Result<DeviceInfo> {
        let mut conn = self.conn.lock().await;
        let client = conn.client.as_mut().ok_or(Error::NotConnected)?;
        let info = client.get_info().await.map_err(Error::device("get device info"))?;

        self.status.write().device_info = Some(info.clone());
        Ok(info)
    }

    /// Restart the terminal and drop the connection
    ///
    /// The device goes away mid-command, so anything but an explicit refusal
    /// counts as success and leaves the session disconnected.
    pub async fn reboot(&self) -> Result<()> {
        let mut guard = self.conn.lock().await;
        let conn = &mut *guard;
        let client = conn.client.as_mut().ok_or(Error::NotConnected)?;

        match client.restart_device().await {
            Ok(()) => {}
            Err(e) if e.is_rejection() => return Err(Error::device("reboot device")(e)),
            Err(e) => debug!("Restart did not complete normally: {}", e),
        }

        if let Some(bridge) = conn.realtime.take() {
            bridge.close();
        }
        conn.client = None;
        *self.status.write() = SessionStatus::default();

        info!("Device rebooting, session disconnected");
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<UserRecord>> {
        let mut conn = self.conn.lock().await;
        let client = conn.client.as_mut().ok_or(Error::NotConnected)?;
        client.get_users().await.map_err(Error::device("list users"))
    }

    /// Look a user up by slot
    pub async fn get_user(&self, uid: u16) -> Result<Option<UserRecord>> {
        let users = self.list_users().await?;
        Ok(users.into_iter().find(|user| user.uid == uid))
    }

    /// Write a user, replacing whatever the slot held
    pub async fn enroll_user(&self, user: &UserRecord) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let client = conn.client.as_mut().ok_or(Error::NotConnected)?;
        client.set_user(user).await.map_err(Error::device("enroll user"))?;

        info!("Enrolled user {} in slot {}", user.user_id, user.uid);
        Ok(())
    }

    pub async fn delete_user(&self, uid: u16) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let client = conn.client.as_mut().ok_or(Error::NotConnected)?;
        client.delete_user(uid).await.map_err(Error::device("delete user"))?;

        info!("Deleted user in slot {}", uid);
        Ok(())
    }

    /// Erase every user on the device
    ///
    /// Irreversible. Goes through `clear_admin_privilege`, which despite its
    /// name wipes the whole user table.
    pub async fn clear_all_users(&self) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let client = conn.client.as_mut().ok_or(Error::NotConnected)?;
        client
            .clear_admin_privilege()
            .await
            .map_err(Error::device("clear all users"))?;

        warn!("All users erased from device");
        Ok(())
    }

    pub async fn get_attendance(&self) -> Result<Vec<AttendanceRecord>> {
        let mut conn = self.conn.lock().await;
        let client = conn.client.as_mut().ok_or(Error::NotConnected)?;
        client.get_attendances().await.map_err(Error::device("get attendance"))
    }

    pub async fn clear_attendance(&self) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let client = conn.client.as_mut().ok_or(Error::NotConnected)?;
        client
            .clear_attendance_log()
            .await
            .map_err(Error::device("clear attendance"))?;

        warn!("Attendance log erased from device");
        Ok(())
    }

    /// Start routing pushed events to the observers
    pub async fn enable_realtime(&self) -> Result<Transition> {
        let mut guard = self.conn.lock().await;
        let conn = &mut *guard;
        let client = conn.client.as_mut().ok_or(Error::NotConnected)?;

        if conn.realtime.is_some() {
            return Ok(Transition::AlreadyInState);
        }

        let (bridge, sink) = RealtimeBridge::open(self.observers.clone());
        if let Err(e) = client.get_real_time_logs(sink).await {
            bridge.close();
            return Err(Error::device("enable real-time mode")(e));
        }

        conn.realtime = Some(bridge);
        self.status.write().realtime_mode = true;

        info!("Real-time mode enabled");
        Ok(Transition::Applied)
    }

    /// Stop real-time delivery; no observer is called after this returns
    pub async fn disable_realtime(&self) -> Result<Transition> {
        let mut guard = self.conn.lock().await;
        let conn = &mut *guard;
        let client = conn.client.as_mut().ok_or(Error::NotConnected)?;

        let Some(bridge) = conn.realtime.take() else {
            return Ok(Transition::AlreadyInState);
        };

        if let Err(e) = client.stop_real_time_logs().await {
            conn.realtime = Some(bridge);
            return Err(Error::device("disable real-time mode")(e));
        }

        bridge.close();
        self.status.write().realtime_mode = false;

        info!("Real-time mode disabled");
        Ok(Transition::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientError, MockConnector, MockProtocolClient};
    use crate::error::ErrorKind;
    use chrono::NaiveDate;
    use mockall::Sequence;
    use pretty_assertions::assert_eq;
    use zkbridge_core::Command;

    fn device_info() -> DeviceInfo {
        DeviceInfo::new("A6F1234".to_string(), "Ver 6.60 Apr 28 2017".to_string())
    }

    fn event(user_id: &str) -> RealtimeEvent {
        RealtimeEvent {
            event: 1,
            user_id: user_id.to_string(),
            timestamp: NaiveDate::from_ymd_opt(2024, 5, 6)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            status: 1,
            punch: 0,
        }
    }

    fn timeout() -> ClientError {
        ClientError::Transport(zkbridge_transport::Error::ReadTimeout)
    }

    fn rejected(command: Command) -> ClientError {
        ClientError::Rejected {
            command,
            reply: Command::AckError,
        }
    }

    /// Client that answers the connect-time info read
    fn client() -> MockProtocolClient {
        let mut client = MockProtocolClient::new();
        client.expect_get_info().returning(|| Ok(device_info()));
        client
    }

    fn connector_for(client: MockProtocolClient) -> Arc<MockConnector> {
        let mut connector = MockConnector::new();
        connector
            .expect_connect()
            .times(1)
            .return_once(move |_| Ok(Box::new(client) as Box<dyn ProtocolClient>));
        Arc::new(connector)
    }

    fn session(connector: Arc<MockConnector>) -> DeviceSession {
        DeviceSession::new(
            connector,
            SessionDefaults {
                ip: Some("10.0.0.5".to_string()),
                ..Default::default()
            },
        )
    }

    async fn connected(client: MockProtocolClient) -> DeviceSession {
        let session = session(connector_for(client));
        session.connect(None, None, None).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_connect_populates_status() {
        let mut connector = MockConnector::new();
        connector
            .expect_connect()
            .withf(|target| {
                target.ip == "10.0.0.5" && target.port == 4370 && target.timeout == Duration::from_millis(5000)
            })
            .times(1)
            .return_once(|_| Ok(Box::new(client()) as Box<dyn ProtocolClient>));
        let session = DeviceSession::new(Arc::new(connector), SessionDefaults::default());

        let outcome = session
            .connect(Some("10.0.0.5".into()), Some(4370), Some(Duration::from_millis(5000)))
            .await
            .unwrap();
        assert_eq!(outcome, ConnectOutcome::Connected(device_info()));

        let status = session.status();
        assert_eq!(
            status,
            SessionStatus {
                connected: true,
                realtime_mode: false,
                device_info: Some(device_info()),
            }
        );

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["connected"], true);
        assert_eq!(json["realtimeMode"], false);
        assert_eq!(json["deviceInfo"]["serialNumber"], "A6F1234");
    }

    #[tokio::test]
    async fn test_connect_while_connected_creates_no_second_client() {
        let session = connected(client()).await;

        for _ in 0..3 {
            let outcome = session.connect(Some("10.0.0.9".into()), None, None).await.unwrap();
            assert_eq!(outcome, ConnectOutcome::AlreadyConnected);
        }
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_connect_without_address() {
        let mut connector = MockConnector::new();
        connector.expect_connect().never();
        let session = DeviceSession::new(Arc::new(connector), SessionDefaults::default());

        let err = session.connect(Some("  ".into()), None, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_connect_failure_stays_disconnected() {
        let mut connector = MockConnector::new();
        connector
            .expect_connect()
            .times(1)
            .return_once(|_| Err(timeout()));
        let session = session(Arc::new(connector));

        let err = session.connect(None, None, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(session.status(), SessionStatus::default());
    }

    #[tokio::test]
    async fn test_info_failure_closes_half_open_client() {
        let mut client = MockProtocolClient::new();
        client.expect_get_info().times(1).returning(|| Err(timeout()));
        client.expect_disconnect().times(1).returning(|| Ok(()));
        let session = session(connector_for(client));

        let err = session.connect(None, None, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(!session.is_connected());
        assert_eq!(
            session.list_users().await.unwrap_err().kind(),
            ErrorKind::NotConnected
        );
    }

    #[tokio::test]
    async fn test_operations_require_connection() {
        let mut connector = MockConnector::new();
        connector.expect_connect().never();
        let session = session(Arc::new(connector));
        let user = UserRecord::new(7, "emp007", "A. Smith");

        let kinds = [
            session.get_device_info().await.map(|_| ()).unwrap_err().kind(),
            session.reboot().await.unwrap_err().kind(),
            session.list_users().await.map(|_| ()).unwrap_err().kind(),
            session.get_user(7).await.map(|_| ()).unwrap_err().kind(),
            session.enroll_user(&user).await.unwrap_err().kind(),
            session.delete_user(7).await.unwrap_err().kind(),
            session.clear_all_users().await.unwrap_err().kind(),
            session.get_attendance().await.map(|_| ()).unwrap_err().kind(),
            session.clear_attendance().await.unwrap_err().kind(),
            session.enable_realtime().await.map(|_| ()).unwrap_err().kind(),
            session.disable_realtime().await.map(|_| ()).unwrap_err().kind(),
        ];

        assert!(kinds.iter().all(|kind| *kind == ErrorKind::NotConnected));
        assert_eq!(session.disconnect().await.unwrap(), Transition::AlreadyInState);
    }

    #[tokio::test]
    async fn test_enable_realtime_registers_once() {
        let mut client = client();
        client
            .expect_get_real_time_logs()
            .times(1)
            .returning(|_| Ok(()));
        client.expect_stop_real_time_logs().never();
        let session = connected(client).await;

        assert_eq!(session.enable_realtime().await.unwrap(), Transition::Applied);
        assert_eq!(session.enable_realtime().await.unwrap(), Transition::AlreadyInState);
        assert!(session.status().realtime_mode);
    }

    #[tokio::test]
    async fn test_disable_realtime_when_inactive() {
        let mut client = client();
        client.expect_stop_real_time_logs().never();
        let session = connected(client).await;

        assert_eq!(session.disable_realtime().await.unwrap(), Transition::AlreadyInState);
    }

    #[tokio::test]
    async fn test_failed_registration_leaves_realtime_off() {
        let mut client = client();
        client
            .expect_get_real_time_logs()
            .times(1)
            .returning(|_| Err(rejected(Command::RegEvent)));
        let session = connected(client).await;

        let err = session.enable_realtime().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceRejected);
        assert!(!session.status().realtime_mode);
    }

    #[tokio::test]
    async fn test_disconnect_leaves_realtime_before_closing() {
        let sink = Arc::new(parking_lot::Mutex::new(None));
        let captured = sink.clone();

        let mut seq = Sequence::new();
        let mut client = client();
        client
            .expect_get_real_time_logs()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |tx| {
                *captured.lock() = Some(tx);
                Ok(())
            });
        client
            .expect_stop_real_time_logs()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        client
            .expect_disconnect()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));

        let session = connected(client).await;
        let mut events = session.subscribe();
        session.enable_realtime().await.unwrap();

        let tx = sink.lock().clone().unwrap();
        tx.send(event("emp007")).unwrap();
        let delivered = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivered.user_id, "emp007");

        assert_eq!(session.disconnect().await.unwrap(), Transition::Applied);
        assert_eq!(session.status(), SessionStatus::default());

        let _ = tx.send(event("late"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnect_keeps_streaming_when_device_refuses() {
        let mut client = client();
        client.expect_get_real_time_logs().returning(|_| Ok(()));
        client
            .expect_stop_real_time_logs()
            .times(1)
            .returning(|| Err(rejected(Command::RegEvent)));
        client.expect_disconnect().never();
        let session = connected(client).await;
        session.enable_realtime().await.unwrap();

        let err = session.disconnect().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceRejected);
        assert!(session.status().connected);
        assert!(session.status().realtime_mode);
    }

    #[tokio::test]
    async fn test_reboot_disconnects_when_link_drops() {
        let mut client = client();
        client.expect_get_real_time_logs().returning(|_| Ok(()));
        client
            .expect_restart_device()
            .times(1)
            .returning(|| Err(ClientError::Transport(zkbridge_transport::Error::ConnectionClosed)));
        let session = connected(client).await;
        session.enable_realtime().await.unwrap();

        session.reboot().await.unwrap();

        assert_eq!(session.status(), SessionStatus::default());
        assert_eq!(
            session.get_attendance().await.unwrap_err().kind(),
            ErrorKind::NotConnected
        );
    }

    #[tokio::test]
    async fn test_reboot_refused_stays_connected() {
        let mut client = client();
        client
            .expect_restart_device()
            .times(1)
            .returning(|| Err(rejected(Command::Restart)));
        let session = connected(client).await;

        let err = session.reboot().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceRejected);
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_clear_all_users_erases_table_in_one_call() {
        let mut client = client();
        client
            .expect_clear_admin_privilege()
            .times(1)
            .returning(|| Ok(()));
        client.expect_delete_user().never();
        let session = connected(client).await;

        session.clear_all_users().await.unwrap();
    }

    #[tokio::test]
    async fn test_get_user_filters_by_slot() {
        let mut client = client();
        client.expect_get_users().returning(|| {
            Ok(vec![
                UserRecord::new(1, "1001", "Alice"),
                UserRecord::new(7, "emp007", "A. Smith"),
            ])
        });
        let session = connected(client).await;

        assert_eq!(session.get_user(7).await.unwrap().unwrap().name, "A. Smith");
        assert_eq!(session.get_user(9).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_errors_keep_kind_and_operation() {
        let mut client = client();
        client
            .expect_delete_user()
            .with(mockall::predicate::eq(42))
            .returning(|_| Err(rejected(Command::DeleteUser)));
        client.expect_get_attendances().returning(|| Err(timeout()));
        let session = connected(client).await;

        let err = session.delete_user(42).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceRejected);
        assert!(err.to_string().contains("delete user"));

        let err = session.get_attendance().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_get_device_info_refreshes_status() {
        let mut client = MockProtocolClient::new();
        let mut seq = Sequence::new();
        client
            .expect_get_info()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(device_info()));
        client
            .expect_get_info()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| {
                let mut info = device_info();
                info.sizes.user_count = 12;
                Ok(info)
            });
        let session = connected(client).await;

        let info = session.get_device_info().await.unwrap();
        assert_eq!(info.sizes.user_count, 12);
        assert_eq!(session.status().device_info, Some(info));
    }
}
