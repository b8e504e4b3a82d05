//! In-memory terminal for driving the session without a device

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use zkbridge::client::{ClientError, ClientResult, Connector, DeviceTarget, EventSink, ProtocolClient};
use zkbridge::{AttendanceRecord, DeviceInfo, DeviceSession, RealtimeEvent, SessionDefaults, UserRecord};
use zkbridge_core::Command;
use zkbridge_types::StorageSizes;

/// What the fake device holds and what was asked of it
#[derive(Default)]
pub struct Terminal {
    pub users: Vec<UserRecord>,
    pub attendance: Vec<AttendanceRecord>,
    pub targets: Vec<DeviceTarget>,
    pub sink: Option<EventSink>,
    pub registrations: usize,
    pub restarts: usize,
    pub disconnects: usize,
    /// How long an info read takes
    pub info_delay: Duration,
}

#[derive(Clone, Default)]
pub struct FakeTerminal(Arc<Mutex<Terminal>>);

impl FakeTerminal {
    pub fn state(&self) -> parking_lot::MutexGuard<'_, Terminal> {
        self.0.lock()
    }

    pub fn connects(&self) -> usize {
        self.0.lock().targets.len()
    }

    /// Push an event as the device would; false if nobody is registered
    pub fn push(&self, event: RealtimeEvent) -> bool {
        match &self.0.lock().sink {
            Some(sink) => sink.send(event).is_ok(),
            None => false,
        }
    }

    pub fn session(&self, defaults: SessionDefaults) -> DeviceSession {
        DeviceSession::new(Arc::new(self.clone()), defaults)
    }
}

#[async_trait]
impl Connector for FakeTerminal {
    async fn connect(&self, target: &DeviceTarget) -> ClientResult<Box<dyn ProtocolClient>> {
        self.0.lock().targets.push(target.clone());
        Ok(Box::new(FakeClient(self.clone())))
    }
}

struct FakeClient(FakeTerminal);

impl FakeClient {
    fn state(&self) -> parking_lot::MutexGuard<'_, Terminal> {
        self.0.state()
    }
}

#[async_trait]
impl ProtocolClient for FakeClient {
    async fn get_info(&mut self) -> ClientResult<DeviceInfo> {
        let delay = self.state().info_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let state = self.state();
        let sizes = StorageSizes {
            user_count: state.users.len() as u32,
            record_count: state.attendance.len() as u32,
            user_capacity: 1000,
            record_capacity: 100_000,
            ..Default::default()
        };
        Ok(DeviceInfo::new("FAKE0001".to_string(), "Ver 6.60 Apr 28 2017".to_string()).with_sizes(sizes))
    }

    async fn get_users(&mut self) -> ClientResult<Vec<UserRecord>> {
        Ok(self.state().users.clone())
    }

    async fn set_user(&mut self, user: &UserRecord) -> ClientResult<()> {
        let mut state = self.state();
        state.users.retain(|existing| existing.uid != user.uid);
        state.users.push(user.clone());
        Ok(())
    }

    async fn delete_user(&mut self, uid: u16) -> ClientResult<()> {
        let mut state = self.state();
        let before = state.users.len();
        state.users.retain(|user| user.uid != uid);
        if state.users.len() == before {
            return Err(ClientError::Rejected {
                command: Command::DeleteUser,
                reply: Command::AckError,
            });
        }
        Ok(())
    }

    async fn clear_admin_privilege(&mut self) -> ClientResult<()> {
        self.state().users.clear();
        Ok(())
    }

    async fn get_attendances(&mut self) -> ClientResult<Vec<AttendanceRecord>> {
        Ok(self.state().attendance.clone())
    }

    async fn clear_attendance_log(&mut self) -> ClientResult<()> {
        self.state().attendance.clear();
        Ok(())
    }

    async fn restart_device(&mut self) -> ClientResult<()> {
        self.state().restarts += 1;
        Err(ClientError::Transport(zkbridge_transport::Error::ConnectionClosed))
    }

    async fn get_real_time_logs(&mut self, sink: EventSink) -> ClientResult<()> {
        let mut state = self.state();
        state.registrations += 1;
        state.sink = Some(sink);
        Ok(())
    }

    async fn stop_real_time_logs(&mut self) -> ClientResult<()> {
        self.state().sink = None;
        Ok(())
    }

    async fn disconnect(&mut self) -> ClientResult<()> {
        let mut state = self.state();
        state.disconnects += 1;
        state.sink = None;
        Ok(())
    }
}

pub fn timestamp(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").unwrap()
}

pub fn punch(user_id: &str, at: &str) -> RealtimeEvent {
    RealtimeEvent {
        event: 1,
        user_id: user_id.to_string(),
        timestamp: timestamp(at),
        status: 1,
        punch: 0,
    }
}

pub fn defaults() -> SessionDefaults {
    SessionDefaults {
        ip: Some("10.0.0.5".to_string()),
        ..Default::default()
    }
}
