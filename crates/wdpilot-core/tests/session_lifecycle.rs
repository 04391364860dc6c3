//! Session creation, reuse and teardown against an in-process WebDriver server.

mod common;

use common::FakeServer;
use tempfile::TempDir;

use wdpilot_core::action::ActionParser;
use wdpilot_core::device::LocalDeviceInventory;
use wdpilot_core::driver::AutomationDriver;
use wdpilot_core::orchestrator::ActionOrchestrator;
use wdpilot_core::platform::Platform;
use wdpilot_core::session::{ConnectConfig, SessionError, SessionManager};
use wdpilot_core::session_store::{SessionStore, SESSION_TTL_SECS};

fn config(server: &FakeServer, app_id: &str) -> ConnectConfig {
    ConnectConfig::new(Platform::Ios, app_id)
        .device_id("UDID-1")
        .server_url(server.url())
}

fn manager(config: ConnectConfig, dir: &TempDir) -> SessionManager {
    SessionManager::new(config, SessionStore::new(dir.path()), &LocalDeviceInventory).unwrap()
}

#[tokio::test]
async fn fresh_session_is_ended_on_disconnect() {
    let server = FakeServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut mgr = manager(config(&server, "com.example"), &dir);

    let session_id = mgr.connect().await.unwrap().session_id().to_string();
    assert_eq!(server.sessions_created(), 1);
    assert!(!mgr.is_reused());
    assert!(server
        .requests()
        .contains(&format!("POST /session/{session_id}/timeouts")));

    mgr.disconnect().await;
    assert!(!server.is_live(&session_id));
    assert!(SessionStore::new(dir.path()).load(&mgr.fingerprint()).is_none());
}

#[tokio::test]
async fn kept_session_is_reattached_without_creating() {
    let server = FakeServer::start().await;
    let dir = TempDir::new().unwrap();

    let mut first = manager(config(&server, "com.example").keep_alive(true), &dir);
    let session_id = first.connect().await.unwrap().session_id().to_string();
    first.disconnect().await;
    assert!(server.is_live(&session_id));

    let mut second = manager(config(&server, "com.example").reuse(true), &dir);
    let reattached = second.connect().await.unwrap().session_id().to_string();

    assert_eq!(reattached, session_id);
    assert!(second.is_reused());
    assert_eq!(server.sessions_created(), 1);
    assert!(server.requests().contains(&format!("GET /session/{session_id}")));
}

#[tokio::test]
async fn dead_cached_session_falls_back_to_create() {
    let server = FakeServer::start().await;
    let dir = TempDir::new().unwrap();

    let mut first = manager(config(&server, "com.example").keep_alive(true), &dir);
    let stale = first.connect().await.unwrap().session_id().to_string();
    first.disconnect().await;
    server.kill(&stale);

    let mut second = manager(config(&server, "com.example").reuse(true), &dir);
    let fresh = second.connect().await.unwrap().session_id().to_string();

    assert_ne!(fresh, stale);
    assert!(!second.is_reused());
    assert_eq!(server.sessions_created(), 2);
    assert!(SessionStore::new(dir.path()).load(&second.fingerprint()).is_none());
}

#[tokio::test]
async fn expired_record_falls_back_to_create() {
    let server = FakeServer::start().await;
    let dir = TempDir::new().unwrap();

    let mut first = manager(config(&server, "com.example").keep_alive(true), &dir);
    let old = first.connect().await.unwrap().session_id().to_string();
    first.disconnect().await;

    let store = SessionStore::new(dir.path());
    let mut record = store.load(&first.fingerprint()).unwrap();
    record.last_touched -= chrono::Duration::seconds(SESSION_TTL_SECS + 1);
    store.save(&record).unwrap();

    let mut second = manager(config(&server, "com.example").reuse(true), &dir);
    let fresh = second.connect().await.unwrap().session_id().to_string();

    assert_ne!(fresh, old);
    assert!(!second.is_reused());
    assert_eq!(server.sessions_created(), 2);
    assert!(!server.requests().contains(&format!("GET /session/{old}")));
}

#[tokio::test]
async fn session_lost_mid_run_is_not_cached() {
    let server = FakeServer::start().await;
    let dir = TempDir::new().unwrap();

    let mut mgr = manager(config(&server, "com.example").keep_alive(true), &dir);
    let session_id = mgr.connect().await.unwrap().session_id().to_string();
    server.kill(&session_id);

    assert!(mgr.driver().unwrap().page_source().await.is_err());
    mgr.disconnect().await;

    assert!(SessionStore::new(dir.path()).load(&mgr.fingerprint()).is_none());
}

#[tokio::test]
async fn different_apps_use_different_slots() {
    let server = FakeServer::start().await;
    let dir = TempDir::new().unwrap();

    let mut a = manager(config(&server, "com.example.a").keep_alive(true), &dir);
    a.connect().await.unwrap();
    a.disconnect().await;

    let mut b = manager(config(&server, "com.example.b").reuse(true), &dir);
    b.connect().await.unwrap();
    assert!(!b.is_reused());
    assert_eq!(server.sessions_created(), 2);
}

#[tokio::test]
async fn end_all_terminates_and_clears() {
    let server = FakeServer::start().await;
    let dir = TempDir::new().unwrap();

    let mut ids = Vec::new();
    for app in ["com.example.a", "com.example.b"] {
        let mut mgr = manager(config(&server, app).keep_alive(true), &dir);
        ids.push(mgr.connect().await.unwrap().session_id().to_string());
        mgr.disconnect().await;
    }

    let store = SessionStore::new(dir.path());
    assert_eq!(store.list().len(), 2);
    assert_eq!(SessionManager::end_all(&store, &server.url()).await, 2);
    assert!(store.list().is_empty());
    for id in ids {
        assert!(!server.is_live(&id));
    }
}

#[tokio::test]
async fn unreachable_server_is_a_connection_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let dir = TempDir::new().unwrap();
    let config = ConnectConfig::new(Platform::Android, "com.example")
        .device_id("emulator-5554")
        .server_url(format!("http://127.0.0.1:{port}"));
    let mut mgr = manager(config, &dir);

    let err = mgr.connect().await.unwrap_err();
    assert!(matches!(err, SessionError::Connection(_)));
    assert!(matches!(mgr.driver(), Err(SessionError::NotConnected)));
}

#[tokio::test]
async fn actions_run_over_http() {
    let server = FakeServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut mgr = manager(config(&server, "com.example"), &dir);
    let session_id = mgr.connect().await.unwrap().session_id().to_string();

    let actions = ActionParser::parse(&["--tap", "Login", "--expect", "Login", "Welcome"]).unwrap();
    let mut out = Vec::new();
    let outcome = ActionOrchestrator::new(mgr.driver().unwrap(), "com.example")
        .run(&actions, &mut out)
        .await
        .unwrap();

    assert!(outcome.succeeded());
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("tap 'Login': ok"));
    assert!(out.contains("expect 'Login' contains 'Welcome': PASS"));
    assert!(server
        .requests()
        .contains(&format!("POST /session/{session_id}/element/el-1/click")));

    mgr.disconnect().await;
}

#[tokio::test]
async fn list_buttons_reads_page_source_over_http() {
    let server = FakeServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut mgr = manager(config(&server, "com.example"), &dir);
    mgr.connect().await.unwrap();

    let actions = ActionParser::parse(&["--list-buttons"]).unwrap();
    let mut out = Vec::new();
    ActionOrchestrator::new(mgr.driver().unwrap(), "com.example")
        .run(&actions, &mut out)
        .await
        .unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "buttons:\n  - Welcome\n");
    mgr.disconnect().await;
}
