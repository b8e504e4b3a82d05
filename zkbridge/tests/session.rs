mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{defaults, punch, FakeTerminal};
use pretty_assertions::assert_eq;
use zkbridge::{ConnectOutcome, ErrorKind, SessionDefaults, SessionStatus, Transition, UserRecord};

#[tokio::test]
async fn test_connect_populates_device_info() {
    let terminal = FakeTerminal::default();
    let session = terminal.session(SessionDefaults::default());

    let outcome = session
        .connect(Some("10.0.0.5".into()), Some(4370), Some(Duration::from_millis(5000)))
        .await
        .unwrap();
    let ConnectOutcome::Connected(info) = outcome else {
        panic!("expected a fresh connection");
    };
    assert_eq!(info.serial_number, "FAKE0001");

    let target = terminal.state().targets[0].clone();
    assert_eq!(target.to_string(), "10.0.0.5:4370");
    assert_eq!(target.timeout, Duration::from_millis(5000));

    assert_eq!(
        session.status(),
        SessionStatus {
            connected: true,
            realtime_mode: false,
            device_info: Some(info),
        }
    );
}

#[tokio::test]
async fn test_enroll_then_list() {
    let terminal = FakeTerminal::default();
    let session = terminal.session(defaults());
    session.connect(None, None, None).await.unwrap();

    let user = UserRecord::new(7, "emp007", "A. Smith");
    session.enroll_user(&user).await.unwrap();

    let users = session.list_users().await.unwrap();
    let enrolled = users.iter().find(|u| u.uid == 7).unwrap();
    assert_eq!(enrolled.name, "A. Smith");
    assert_eq!(enrolled.role, 0);
    assert_eq!(enrolled.card_number, 0);
}

#[tokio::test]
async fn test_enroll_overwrites_slot() {
    let terminal = FakeTerminal::default();
    let session = terminal.session(defaults());
    session.connect(None, None, None).await.unwrap();

    session.enroll_user(&UserRecord::new(7, "emp007", "A. Smith")).await.unwrap();
    session
        .enroll_user(&UserRecord::new(7, "emp007", "Alice Smith").with_role(UserRecord::ROLE_ADMIN))
        .await
        .unwrap();

    let users = session.list_users().await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name, "Alice Smith");
    assert_eq!(session.get_user(7).await.unwrap().unwrap().role, UserRecord::ROLE_ADMIN);
}

#[tokio::test]
async fn test_clear_all_users_removes_everyone() {
    let terminal = FakeTerminal::default();
    terminal.state().users = vec![
        UserRecord::new(1, "1001", "Alice"),
        UserRecord::new(2, "1002", "Bob"),
    ];
    let session = terminal.session(defaults());
    session.connect(None, None, None).await.unwrap();

    session.enroll_user(&UserRecord::new(7, "emp007", "A. Smith")).await.unwrap();
    session.clear_all_users().await.unwrap();

    assert!(session.list_users().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_attendance_while_disconnected_does_no_io() {
    let terminal = FakeTerminal::default();
    let session = terminal.session(defaults());

    let err = session.get_attendance().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotConnected);
    assert_eq!(terminal.connects(), 0);
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    let terminal = FakeTerminal::default();
    let session = terminal.session(defaults());

    session.connect(None, None, None).await.unwrap();
    let outcome = session.connect(Some("10.0.0.9".into()), None, None).await.unwrap();

    assert_eq!(outcome, ConnectOutcome::AlreadyConnected);
    assert_eq!(terminal.connects(), 1);
}

#[tokio::test]
async fn test_delete_unknown_user_is_rejected() {
    let terminal = FakeTerminal::default();
    let session = terminal.session(defaults());
    session.connect(None, None, None).await.unwrap();

    let err = session.delete_user(99).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceRejected);
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_realtime_events_reach_subscribers_in_order() {
    let terminal = FakeTerminal::default();
    let session = terminal.session(defaults());
    session.connect(None, None, None).await.unwrap();
    let mut events = session.subscribe();

    assert_eq!(session.enable_realtime().await.unwrap(), Transition::Applied);
    assert_eq!(session.enable_realtime().await.unwrap(), Transition::AlreadyInState);
    assert_eq!(terminal.state().registrations, 1);

    for (user, at) in [("1", "2024-05-06 09:00:00"), ("2", "2024-05-06 09:00:05"), ("3", "2024-05-06 09:01:00")] {
        assert!(terminal.push(punch(user, at)));
    }

    let mut received = Vec::new();
    for _ in 0..3 {
        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        received.push(event.user_id);
    }
    assert_eq!(received, vec!["1", "2", "3"]);

    assert_eq!(session.disable_realtime().await.unwrap(), Transition::Applied);
    assert!(!session.status().realtime_mode);
    assert!(!terminal.push(punch("4", "2024-05-06 09:02:00")));
}

#[tokio::test]
async fn test_disconnect_leaves_realtime_first() {
    let terminal = FakeTerminal::default();
    let session = terminal.session(defaults());
    session.connect(None, None, None).await.unwrap();
    session.enable_realtime().await.unwrap();

    assert_eq!(session.disconnect().await.unwrap(), Transition::Applied);

    assert!(terminal.state().sink.is_none());
    assert_eq!(terminal.state().disconnects, 1);
    assert_eq!(session.status(), SessionStatus::default());
    assert_eq!(session.disconnect().await.unwrap(), Transition::AlreadyInState);
}

#[tokio::test]
async fn test_reboot_drops_connection() {
    let terminal = FakeTerminal::default();
    let session = terminal.session(defaults());
    session.connect(None, None, None).await.unwrap();

    session.reboot().await.unwrap();

    assert_eq!(terminal.state().restarts, 1);
    assert!(!session.is_connected());

    // Reconnecting after the device comes back opens a new client
    session.connect(None, None, None).await.unwrap();
    assert_eq!(terminal.connects(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_connects_open_one_link() {
    let terminal = FakeTerminal::default();
    terminal.state().info_delay = Duration::from_millis(50);
    let session = Arc::new(terminal.session(defaults()));

    let connect = || {
        let session = session.clone();
        tokio::spawn(async move { session.connect(None, None, None).await })
    };
    let (a, b, c, d) = tokio::join!(connect(), connect(), connect(), connect());

    let fresh = [a, b, c, d]
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .filter(|outcome| matches!(outcome, ConnectOutcome::Connected(_)))
        .count();
    assert_eq!(fresh, 1);
    assert_eq!(terminal.connects(), 1);
    assert!(session.is_connected());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_status_never_connected_without_info() {
    let terminal = FakeTerminal::default();
    terminal.state().info_delay = Duration::from_millis(200);
    let session = Arc::new(terminal.session(defaults()));

    let connecting = {
        let session = session.clone();
        tokio::spawn(async move { session.connect(None, None, None).await })
    };

    while !connecting.is_finished() {
        let status = session.status();
        assert!(!status.connected || status.device_info.is_some());
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    connecting.await.unwrap().unwrap();

    let status = session.status();
    assert!(status.connected);
    assert!(status.device_info.is_some());
}
