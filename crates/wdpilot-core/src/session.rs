//! Session lifecycle: create, reattach, keep alive, tear down.
//!
//! [`SessionManager`] owns at most one [`ActiveSession`]. When reuse is
//! requested it first looks for a cached record in the [`SessionStore`],
//! probes the server to check the session is still alive and, if so, binds a
//! handle to it without running the session-creation handshake. Any failure
//! along that path evicts the record and falls through to a fresh session.
//! Reattachment is purely an optimization.
//!
//! # Example
//!
//! ```no_run
//! use wdpilot_core::device::LocalDeviceInventory;
//! use wdpilot_core::platform::Platform;
//! use wdpilot_core::session::{ConnectConfig, SessionManager};
//! use wdpilot_core::session_store::SessionStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConnectConfig::new(Platform::Ios, "com.example.app")
//!     .keep_alive(true)
//!     .reuse(true);
//! let store = SessionStore::new("/tmp/wdpilot-sessions");
//! let mut manager = SessionManager::new(config, store, &LocalDeviceInventory)?;
//! manager.connect().await?;
//! // ... run actions ...
//! manager.disconnect().await;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::client::WebDriverClient;
use crate::config::DEFAULT_SERVER_URL;
use crate::device::{DeviceError, DeviceInventory};
use crate::driver::{AutomationDriver, DriverError};
use crate::platform::Platform;
use crate::remote::ActiveSession;
use crate::session_store::{fingerprint, SessionDescriptor, SessionStore};

/// Timeout for the liveness probe on reattachment.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for each best-effort termination in [`SessionManager::end_all`].
pub const END_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur while establishing or using a session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// A fresh session could not be created.
    #[error("failed to connect to automation server: {0}")]
    Connection(#[source] DriverError),

    /// No device id was given and none could be detected.
    #[error("device detection failed: {0}")]
    Device(#[from] DeviceError),

    /// An operation needed a session but none is connected.
    #[error("no active session")]
    NotConnected,
}

/// Everything needed to open (or reattach to) a session.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectConfig {
    pub platform: Platform,
    /// Bundle id (Apple) or package name (Android).
    pub app_id: String,
    /// Device UDID; auto-detected when `None`.
    pub device_id: Option<String>,
    pub server_url: String,
    /// App bundle or APK to install at session start.
    pub app_path: Option<String>,
    /// Keep app data between sessions.
    pub no_reset: bool,
    /// Android: grant runtime permissions automatically.
    pub auto_grant_permissions: bool,
    /// Leave the remote session running on disconnect and cache it.
    pub keep_alive: bool,
    /// Try to reattach to a cached session before creating one.
    pub reuse: bool,
}

impl ConnectConfig {
    pub fn new(platform: Platform, app_id: impl Into<String>) -> Self {
        Self {
            platform,
            app_id: app_id.into(),
            device_id: None,
            server_url: DEFAULT_SERVER_URL.to_string(),
            app_path: None,
            no_reset: true,
            auto_grant_permissions: true,
            keep_alive: false,
            reuse: false,
        }
    }

    pub fn device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    pub fn app_path(mut self, path: impl Into<String>) -> Self {
        self.app_path = Some(path.into());
        self
    }

    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn reuse(mut self, reuse: bool) -> Self {
        self.reuse = reuse;
        self
    }
}

/// Builds the W3C `POST /session` payload for `config` on `device_id`.
pub fn build_capabilities(config: &ConnectConfig, device_id: &str) -> Value {
    let mut caps = Map::new();
    let mut set = |key: &str, value: Value| {
        caps.insert(key.to_string(), value);
    };

    match config.platform {
        Platform::Ios => {
            set("platformName", json!("iOS"));
            set("appium:automationName", json!("XCUITest"));
            set("appium:deviceName", json!("iPhone"));
            set("appium:udid", json!(device_id));
            set("appium:bundleId", json!(config.app_id));
        }
        Platform::Android => {
            set("platformName", json!("Android"));
            set("appium:automationName", json!("UiAutomator2"));
            set("appium:udid", json!(device_id));
            set("appium:appPackage", json!(config.app_id));
            set("appium:autoGrantPermissions", json!(config.auto_grant_permissions));
        }
        Platform::MacCatalyst => {
            set("platformName", json!("Mac"));
            set("appium:automationName", json!("Mac2"));
            set("appium:bundleId", json!(config.app_id));
        }
    }
    set("appium:noReset", json!(config.no_reset));
    if let Some(app) = &config.app_path {
        set("appium:app", json!(app));
    }

    json!({ "capabilities": { "alwaysMatch": Value::Object(caps), "firstMatch": [{}] } })
}

/// Owns the single active remote session of one invocation.
pub struct SessionManager {
    config: ConnectConfig,
    device_id: String,
    store: SessionStore,
    client: WebDriverClient,
    session: Option<ActiveSession>,
    reused: bool,
}

impl SessionManager {
    /// Resolves the device and prepares the transport. No request is sent.
    pub fn new(
        config: ConnectConfig,
        store: SessionStore,
        inventory: &dyn DeviceInventory,
    ) -> Result<Self, SessionError> {
        let device_id = match &config.device_id {
            Some(id) => id.clone(),
            None => inventory.auto_detect(config.platform)?,
        };
        let client = WebDriverClient::new(&config.server_url).map_err(SessionError::Connection)?;
        Ok(Self {
            config,
            device_id,
            store,
            client,
            session: None,
            reused: false,
        })
    }

    pub fn config(&self) -> &ConnectConfig {
        &self.config
    }

    /// The resolved device id.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Cache fingerprint of this manager's session slot.
    pub fn fingerprint(&self) -> String {
        fingerprint(
            self.config.platform,
            &self.config.app_id,
            &self.device_id,
            &self.config.server_url,
        )
    }

    /// True when the current session was reattached rather than created.
    pub fn is_reused(&self) -> bool {
        self.reused
    }

    pub fn session(&self) -> Option<&ActiveSession> {
        self.session.as_ref()
    }

    /// The active session as a command driver.
    pub fn driver(&self) -> Result<&dyn AutomationDriver, SessionError> {
        self.session
            .as_ref()
            .map(|s| s as &dyn AutomationDriver)
            .ok_or(SessionError::NotConnected)
    }

    /// Reattaches to a cached session or creates a fresh one.
    pub async fn connect(&mut self) -> Result<&ActiveSession, SessionError> {
        let reattached = if self.config.reuse {
            self.try_reattach().await
        } else {
            None
        };

        let session = match reattached {
            Some(session) => {
                info!(session_id = %session.session_id(), "reattached to cached session");
                self.reused = true;
                session
            }
            None => {
                let caps = build_capabilities(&self.config, &self.device_id);
                let session = ActiveSession::create(self.client.clone(), &caps, self.config.platform)
                    .await
                    .map_err(SessionError::Connection)?;
                info!(session_id = %session.session_id(), "created new session");
                self.reused = false;
                session
            }
        };

        // All waiting is done client-side against explicit deadlines.
        if let Err(e) = session.set_implicit_wait(Duration::ZERO).await {
            warn!(error = %e, "failed to reset implicit wait");
        }

        if self.config.keep_alive || self.reused {
            self.persist(session.session_id());
        }

        Ok(self.session.insert(session))
    }

    async fn try_reattach(&self) -> Option<ActiveSession> {
        let fingerprint = self.fingerprint();
        let cached = self.store.load(&fingerprint)?;

        match ActiveSession::probe(&self.client, &cached.session_id, PROBE_TIMEOUT).await {
            Ok(capabilities) => Some(ActiveSession::bind(
                self.client.clone(),
                cached.session_id,
                capabilities,
                self.config.platform,
            )),
            Err(e) => {
                debug!(session_id = %cached.session_id, error = %e, "cached session is gone");
                self.store.remove(&fingerprint);
                None
            }
        }
    }

    fn persist(&self, session_id: &str) {
        let descriptor = SessionDescriptor {
            session_id: session_id.to_string(),
            platform: self.config.platform,
            app_id: self.config.app_id.clone(),
            device_id: self.device_id.clone(),
            server_url: self.config.server_url.clone(),
            last_touched: Utc::now(),
        };
        if let Err(e) = self.store.save(&descriptor) {
            warn!(error = %e, "failed to cache session");
        }
    }

    /// Releases the session according to the keep-alive policy.
    ///
    /// With keep-alive the remote session keeps running and its record is
    /// refreshed. Otherwise the remote session is terminated and the record
    /// deleted. Termination errors are logged, not returned. A session the
    /// server stopped recognising mid-run is never cached again.
    pub async fn disconnect(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        if session.is_invalidated() {
            debug!(session_id = %session.session_id(), "session died during the run; dropping record");
            self.store.remove(&self.fingerprint());
            return;
        }

        if self.config.keep_alive {
            self.persist(session.session_id());
            debug!(session_id = %session.session_id(), "detached; session kept alive");
            return;
        }

        if let Err(e) = session.quit(END_TIMEOUT).await {
            warn!(session_id = %session.session_id(), error = %e, "failed to end session");
        }
        self.store.remove(&self.fingerprint());
    }

    /// Terminates every cached session on `server_url` and deletes all records.
    ///
    /// Termination is best effort; records are removed whether or not the
    /// server accepted the request. Returns how many records were removed.
    pub async fn end_all(store: &SessionStore, server_url: &str) -> usize {
        match WebDriverClient::new(server_url) {
            Ok(client) => {
                for descriptor in store.list() {
                    match client.delete_session(&descriptor.session_id, END_TIMEOUT).await {
                        Ok(()) => debug!(session_id = %descriptor.session_id, "session ended"),
                        Err(e) => debug!(session_id = %descriptor.session_id, error = %e, "end failed"),
                    }
                }
            }
            Err(e) => warn!(error = %e, "cannot reach server; clearing cache only"),
        }
        store.clear_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceInfo;

    struct NoDevices;

    impl DeviceInventory for NoDevices {
        fn list_devices(&self, _platform: Platform) -> Result<Vec<DeviceInfo>, DeviceError> {
            Ok(Vec::new())
        }
    }

    fn always_match(caps: &Value) -> &Value {
        &caps["capabilities"]["alwaysMatch"]
    }

    #[test]
    fn ios_capabilities() {
        let config = ConnectConfig::new(Platform::Ios, "com.example.app").app_path("/tmp/App.app");
        let caps = build_capabilities(&config, "UDID-1");
        let m = always_match(&caps);
        assert_eq!(m["platformName"], "iOS");
        assert_eq!(m["appium:automationName"], "XCUITest");
        assert_eq!(m["appium:udid"], "UDID-1");
        assert_eq!(m["appium:bundleId"], "com.example.app");
        assert_eq!(m["appium:noReset"], true);
        assert_eq!(m["appium:app"], "/tmp/App.app");
        assert_eq!(caps["capabilities"]["firstMatch"], json!([{}]));
    }

    #[test]
    fn android_capabilities_follow_policy_flags() {
        let mut config = ConnectConfig::new(Platform::Android, "com.example.app");
        config.no_reset = false;
        config.auto_grant_permissions = false;
        let caps = build_capabilities(&config, "emulator-5554");
        let m = always_match(&caps);
        assert_eq!(m["appium:automationName"], "UiAutomator2");
        assert_eq!(m["appium:appPackage"], "com.example.app");
        assert_eq!(m["appium:noReset"], false);
        assert_eq!(m["appium:autoGrantPermissions"], false);
        assert!(m.get("appium:app").is_none());
    }

    #[test]
    fn mac_capabilities_have_no_udid() {
        let config = ConnectConfig::new(Platform::MacCatalyst, "com.example.mac");
        let caps = build_capabilities(&config, "mac");
        let m = always_match(&caps);
        assert_eq!(m["platformName"], "Mac");
        assert_eq!(m["appium:automationName"], "Mac2");
        assert!(m.get("appium:udid").is_none());
    }

    #[test]
    fn identical_configs_share_a_fingerprint() {
        let store = SessionStore::new(std::env::temp_dir().join("wdpilot-fp-test"));
        let config = ConnectConfig::new(Platform::Ios, "com.a").device_id("D1");
        let a = SessionManager::new(config.clone(), store.clone(), &NoDevices).unwrap();
        let b = SessionManager::new(config.clone(), store.clone(), &NoDevices).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let other = SessionManager::new(config.server_url("http://10.0.0.1:4723"), store, &NoDevices)
            .unwrap();
        assert_ne!(a.fingerprint(), other.fingerprint());
    }

    #[test]
    fn missing_device_is_reported() {
        let store = SessionStore::new(std::env::temp_dir().join("wdpilot-fp-test"));
        let config = ConnectConfig::new(Platform::Android, "com.a");
        let err = SessionManager::new(config, store, &NoDevices).err().unwrap();
        assert!(matches!(err, SessionError::Device(_)));
    }

    #[test]
    fn mac_device_is_detected_without_tools() {
        let store = SessionStore::new(std::env::temp_dir().join("wdpilot-fp-test"));
        let config = ConnectConfig::new(Platform::MacCatalyst, "com.a");
        let manager = SessionManager::new(config, store, &NoDevices).unwrap();
        assert_eq!(manager.device_id(), "mac");
        assert!(manager.driver().is_err());
    }
}
