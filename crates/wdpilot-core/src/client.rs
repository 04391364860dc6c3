//! HTTP transport for the WebDriver protocol.
//!
//! [`WebDriverClient`] is a thin wrapper around a [`reqwest::Client`] bound to
//! one server base URL. It knows how to unwrap the `{"value": ...}` envelope
//! and how to turn W3C error bodies into [`DriverError::Remote`]. It holds no
//! session state: session-scoped commands live on
//! [`ActiveSession`](crate::remote::ActiveSession).

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, debug_span, trace, Instrument};
use url::Url;

use crate::driver::DriverError;

/// Default request timeout for ordinary commands.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Session creation can take a long time (app install, driver warm-up).
const CREATE_SESSION_TIMEOUT: Duration = Duration::from_secs(300);

/// Plain HTTP transport to a remote automation server.
#[derive(Debug, Clone)]
pub struct WebDriverClient {
    http: reqwest::Client,
    base_url: String,
}

impl WebDriverClient {
    /// Creates a client for `server_url` (e.g. `http://127.0.0.1:4723`).
    pub fn new(server_url: &str) -> Result<Self, DriverError> {
        let parsed = Url::parse(server_url)
            .map_err(|e| DriverError::CommandFailed(format!("invalid server URL '{server_url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DriverError::CommandFailed(format!(
                "unsupported URL scheme '{}'",
                parsed.scheme()
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DriverError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: server_url.trim_end_matches('/').to_string(),
        })
    }

    /// The server base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Sends one command and returns the unwrapped `value` of the response.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, DriverError> {
        let url = self.endpoint(path);
        let span = debug_span!("webdriver", %method, path);

        async {
            let mut request = self.http.request(method.clone(), &url);
            if let Some(body) = body {
                request = request.json(body);
            } else if method == Method::POST {
                request = request.json(&json!({}));
            }
            if let Some(timeout) = timeout {
                request = request.timeout(timeout);
            }

            let response = request.send().await.map_err(map_reqwest_error)?;
            let status = response.status();
            let text = response.text().await.map_err(map_reqwest_error)?;
            trace!(%status, body = %text, "response");

            let payload: Value = if text.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&text)
                    .map_err(|e| DriverError::UnexpectedResponse(format!("{e}: {text}")))?
            };

            if !status.is_success() {
                return Err(remote_error(status, &payload));
            }

            Ok(match payload {
                Value::Object(mut map) => map.remove("value").unwrap_or(Value::Object(map)),
                other => other,
            })
        }
        .instrument(span)
        .await
    }

    /// `GET path`.
    pub async fn get(&self, path: &str) -> Result<Value, DriverError> {
        self.send(Method::GET, path, None, None).await
    }

    /// `POST path` with a JSON body.
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, DriverError> {
        self.send(Method::POST, path, Some(body), None).await
    }

    /// Runs the full session-creation handshake.
    ///
    /// Returns the new session id and the capabilities the server negotiated.
    pub async fn create_session(&self, capabilities: &Value) -> Result<(String, Value), DriverError> {
        debug!(server = %self.base_url, "creating session");
        let value = self
            .send(Method::POST, "session", Some(capabilities), Some(CREATE_SESSION_TIMEOUT))
            .await?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::UnexpectedResponse(format!("no sessionId in {value}")))?
            .to_string();
        let caps = value.get("capabilities").cloned().unwrap_or(Value::Null);
        Ok((session_id, caps))
    }

    /// Liveness probe: `GET /session/{id}`. Returns the session's capabilities.
    pub async fn probe_session(&self, session_id: &str, timeout: Duration) -> Result<Value, DriverError> {
        let value = self
            .send(Method::GET, &format!("session/{session_id}"), None, Some(timeout))
            .await?;
        Ok(value.get("capabilities").cloned().unwrap_or(value))
    }

    /// Terminates a remote session.
    pub async fn delete_session(&self, session_id: &str, timeout: Duration) -> Result<(), DriverError> {
        self.send(Method::DELETE, &format!("session/{session_id}"), None, Some(timeout))
            .await
            .map(|_| ())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> DriverError {
    if err.is_timeout() {
        DriverError::Timeout
    } else {
        DriverError::Transport(err.to_string())
    }
}

fn remote_error(status: StatusCode, payload: &Value) -> DriverError {
    let value = payload.get("value").unwrap_or(payload);
    let error = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    DriverError::Remote {
        status: status.as_u16(),
        error,
        message,
    }
}
