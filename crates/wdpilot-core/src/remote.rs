//! Live handle to a remote automation session.
//!
//! An [`ActiveSession`] carries only what is needed to issue commands: the
//! session id, the capabilities the server reported, the platform tag and a
//! plain HTTP transport. It can be obtained two ways:
//!
//! - [`ActiveSession::create`] runs the full session-creation handshake.
//! - [`ActiveSession::probe`] + [`ActiveSession::bind`] reattach to a session
//!   that is already running, without any handshake.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use crate::client::WebDriverClient;
use crate::driver::{AutomationDriver, DriverError};
use crate::element::{ElementHandle, ElementRect, WindowSize};
use crate::platform::Platform;
use crate::vocabulary::LocatorStrategy;

/// A bound remote session.
#[derive(Debug, Clone)]
pub struct ActiveSession {
    client: WebDriverClient,
    session_id: String,
    capabilities: Value,
    platform: Platform,
    invalidated: Arc<AtomicBool>,
}

impl ActiveSession {
    /// Creates a fresh remote session with the given capabilities payload.
    pub async fn create(
        client: WebDriverClient,
        capabilities: &Value,
        platform: Platform,
    ) -> Result<Self, DriverError> {
        let (session_id, caps) = client.create_session(capabilities).await?;
        debug!(%session_id, "session created");
        Ok(Self::bind(client, session_id, caps, platform))
    }

    /// Asks the server whether `session_id` is still alive.
    ///
    /// Returns the capabilities the server reports for it.
    pub async fn probe(
        client: &WebDriverClient,
        session_id: &str,
        timeout: Duration,
    ) -> Result<Value, DriverError> {
        client.probe_session(session_id, timeout).await
    }

    /// Constructs a handle for an already-running session.
    ///
    /// No request is sent; callers are expected to [`probe`](Self::probe)
    /// first.
    pub fn bind(
        client: WebDriverClient,
        session_id: impl Into<String>,
        capabilities: Value,
        platform: Platform,
    ) -> Self {
        Self {
            client,
            session_id: session_id.into(),
            capabilities,
            platform,
            invalidated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Capabilities reported by the server for this session.
    pub fn capabilities(&self) -> &Value {
        &self.capabilities
    }

    /// True once the server has answered any command with `invalid session id`.
    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::SeqCst)
    }

    /// Sets the server-side implicit wait.
    pub async fn set_implicit_wait(&self, wait: Duration) -> Result<(), DriverError> {
        self.post("timeouts", json!({ "implicit": wait.as_millis() as u64 }))
            .await
            .map(|_| ())
    }

    /// Ends the remote session.
    pub async fn quit(&self, timeout: Duration) -> Result<(), DriverError> {
        self.client.delete_session(&self.session_id, timeout).await
    }

    fn path(&self, suffix: &str) -> String {
        if suffix.is_empty() {
            format!("session/{}", self.session_id)
        } else {
            format!("session/{}/{}", self.session_id, suffix)
        }
    }

    async fn get(&self, suffix: &str) -> Result<Value, DriverError> {
        let result = self.client.get(&self.path(suffix)).await;
        self.observe(result)
    }

    async fn post(&self, suffix: &str, body: Value) -> Result<Value, DriverError> {
        let result = self.client.post(&self.path(suffix), &body).await;
        self.observe(result)
    }

    fn observe(&self, result: Result<Value, DriverError>) -> Result<Value, DriverError> {
        if let Err(e) = &result {
            if e.is_invalid_session() && !self.invalidated.swap(true, Ordering::SeqCst) {
                debug!(session_id = %self.session_id, "server no longer knows this session");
            }
        }
        result
    }

    async fn element_get(&self, element: &ElementHandle, what: &str) -> Result<Value, DriverError> {
        self.get(&format!("element/{}/{}", element.id, what)).await
    }
}

fn expect_string(value: Value, what: &str) -> Result<String, DriverError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        other => Err(DriverError::UnexpectedResponse(format!("{what}: {other}"))),
    }
}

#[async_trait]
impl AutomationDriver for ActiveSession {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn find_element(
        &self,
        strategy: &LocatorStrategy,
    ) -> Result<Option<ElementHandle>, DriverError> {
        let body = json!({ "using": strategy.using.as_wire(), "value": strategy.value });
        match self.post("element", body).await {
            Ok(value) => ElementHandle::from_json(&value)
                .map(Some)
                .ok_or_else(|| DriverError::UnexpectedResponse(format!("element reference: {value}"))),
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn find_elements(
        &self,
        strategy: &LocatorStrategy,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        let body = json!({ "using": strategy.using.as_wire(), "value": strategy.value });
        match self.post("elements", body).await {
            Ok(Value::Array(items)) => Ok(items.iter().filter_map(ElementHandle::from_json).collect()),
            Ok(other) => Err(DriverError::UnexpectedResponse(format!("element list: {other}"))),
            Err(e) if e.is_no_such_element() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), DriverError> {
        self.post(&format!("element/{}/click", element.id), json!({}))
            .await
            .map(|_| ())
    }

    async fn clear(&self, element: &ElementHandle) -> Result<(), DriverError> {
        self.post(&format!("element/{}/clear", element.id), json!({}))
            .await
            .map(|_| ())
    }

    async fn send_keys(&self, element: &ElementHandle, text: &str) -> Result<(), DriverError> {
        self.post(
            &format!("element/{}/value", element.id),
            json!({ "text": text, "value": text.chars().map(String::from).collect::<Vec<_>>() }),
        )
        .await
        .map(|_| ())
    }

    async fn element_text(&self, element: &ElementHandle) -> Result<String, DriverError> {
        expect_string(self.element_get(element, "text").await?, "text")
    }

    async fn element_attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        Ok(match self.element_get(element, &format!("attribute/{name}")).await? {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }

    async fn element_rect(&self, element: &ElementHandle) -> Result<ElementRect, DriverError> {
        let value = self.element_get(element, "rect").await?;
        serde_json::from_value(value.clone())
            .map_err(|e| DriverError::UnexpectedResponse(format!("rect {value}: {e}")))
    }

    async fn element_enabled(&self, element: &ElementHandle) -> Result<bool, DriverError> {
        Ok(self.element_get(element, "enabled").await?.as_bool().unwrap_or(false))
    }

    async fn active_element(&self) -> Result<Option<ElementHandle>, DriverError> {
        match self.get("element/active").await {
            Ok(value) => Ok(ElementHandle::from_json(&value)),
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn window_size(&self) -> Result<WindowSize, DriverError> {
        let value = self.get("window/rect").await?;
        let dim = |key: &str| value.get(key).and_then(Value::as_f64).map(|v| v as i32);
        match (dim("width"), dim("height")) {
            (Some(width), Some(height)) => Ok(WindowSize { width, height }),
            _ => Err(DriverError::UnexpectedResponse(format!("window rect: {value}"))),
        }
    }

    async fn page_source(&self) -> Result<String, DriverError> {
        expect_string(self.get("source").await?, "source")
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        let encoded = expect_string(self.get("screenshot").await?, "screenshot")?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| DriverError::UnexpectedResponse(format!("screenshot base64: {e}")))
    }

    async fn execute(&self, script: &str, args: Value) -> Result<Value, DriverError> {
        let args = match args {
            Value::Null => json!([]),
            Value::Array(_) => args,
            other => json!([other]),
        };
        self.post("execute/sync", json!({ "script": script, "args": args }))
            .await
    }

    async fn perform_actions(&self, actions: Value) -> Result<(), DriverError> {
        self.post("actions", actions).await?;
        self.client
            .send(Method::DELETE, &self.path("actions"), None, None)
            .await
            .map(|_| ())
    }

    async fn alert_text(&self) -> Result<String, DriverError> {
        expect_string(self.get("alert/text").await?, "alert text")
    }

    async fn accept_alert(&self) -> Result<(), DriverError> {
        self.post("alert/accept", json!({})).await.map(|_| ())
    }

    async fn dismiss_alert(&self) -> Result<(), DriverError> {
        self.post("alert/dismiss", json!({})).await.map(|_| ())
    }

    async fn back(&self) -> Result<(), DriverError> {
        self.post("back", json!({})).await.map(|_| ())
    }

    async fn orientation(&self) -> Result<String, DriverError> {
        expect_string(self.get("orientation").await?, "orientation")
    }

    async fn set_orientation(&self, orientation: &str) -> Result<(), DriverError> {
        self.post("orientation", json!({ "orientation": orientation.to_uppercase() }))
            .await
            .map(|_| ())
    }

    async fn contexts(&self) -> Result<Vec<String>, DriverError> {
        match self.get("contexts").await? {
            Value::Array(items) => Ok(items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()),
            other => Err(DriverError::UnexpectedResponse(format!("contexts: {other}"))),
        }
    }

    async fn switch_context(&self, name: &str) -> Result<(), DriverError> {
        self.post("context", json!({ "name": name })).await.map(|_| ())
    }
}
