//! Remote command seam.
//!
//! [`AutomationDriver`] is the set of WebDriver commands the rest of the crate
//! issues against a live session. The production implementation is
//! [`ActiveSession`](crate::remote::ActiveSession), which speaks HTTP/JSON to
//! the remote automation server. The locator and the orchestrator only ever
//! see `&dyn AutomationDriver`, so tests can substitute an in-memory fake.
//!
//! "Element not found" is not an error at this layer:
//! [`find_element`](AutomationDriver::find_element) returns `Ok(None)` for a
//! miss and reserves `Err` for transport and protocol failures.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::element::{ElementHandle, ElementRect, WindowSize};
use crate::platform::Platform;
use crate::vocabulary::LocatorStrategy;

/// Errors that can occur while issuing remote commands.
#[derive(Error, Debug)]
pub enum DriverError {
    /// The HTTP request could not be delivered or its response not read.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with a WebDriver error object.
    #[error("{error} (HTTP {status}): {message}")]
    Remote {
        /// HTTP status code of the response.
        status: u16,
        /// WebDriver error code, e.g. `no such element`.
        error: String,
        /// Human-readable message from the server.
        message: String,
    },

    /// A request exceeded its deadline.
    #[error("Operation timed out")]
    Timeout,

    /// The server answered with a body that does not have the expected shape.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A command or operation failed with the given message.
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    /// The WebDriver error code, when the server returned one.
    pub fn remote_code(&self) -> Option<&str> {
        match self {
            DriverError::Remote { error, .. } => Some(error),
            _ => None,
        }
    }

    /// True when the server reported that no element matched the query.
    pub fn is_no_such_element(&self) -> bool {
        matches!(self.remote_code(), Some("no such element"))
    }

    /// True when the server no longer recognises the session.
    pub fn is_invalid_session(&self) -> bool {
        matches!(self.remote_code(), Some("invalid session id"))
    }
}

/// WebDriver commands issued against a single live session.
#[async_trait]
pub trait AutomationDriver: Send + Sync {
    /// Platform of the app under automation.
    fn platform(&self) -> Platform;

    /// Remote session id.
    fn session_id(&self) -> &str;

    /// Runs one lookup. A miss is `Ok(None)`.
    async fn find_element(
        &self,
        strategy: &LocatorStrategy,
    ) -> Result<Option<ElementHandle>, DriverError>;

    /// Runs one lookup and returns every match (possibly none).
    async fn find_elements(
        &self,
        strategy: &LocatorStrategy,
    ) -> Result<Vec<ElementHandle>, DriverError>;

    /// Clicks (taps) an element.
    async fn click(&self, element: &ElementHandle) -> Result<(), DriverError>;

    /// Clears an editable element.
    async fn clear(&self, element: &ElementHandle) -> Result<(), DriverError>;

    /// Types `text` into an element.
    async fn send_keys(&self, element: &ElementHandle, text: &str) -> Result<(), DriverError>;

    /// The element's visible text as reported by the server.
    async fn element_text(&self, element: &ElementHandle) -> Result<String, DriverError>;

    /// A raw attribute value; `None` when the attribute is absent.
    async fn element_attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError>;

    /// The element's frame in window coordinates.
    async fn element_rect(&self, element: &ElementHandle) -> Result<ElementRect, DriverError>;

    /// Whether the element accepts input.
    async fn element_enabled(&self, element: &ElementHandle) -> Result<bool, DriverError>;

    /// The element that currently has keyboard focus, if any.
    async fn active_element(&self) -> Result<Option<ElementHandle>, DriverError>;

    /// Size of the app window.
    async fn window_size(&self) -> Result<WindowSize, DriverError>;

    /// Serialized accessibility tree (XML).
    async fn page_source(&self) -> Result<String, DriverError>;

    /// PNG screenshot bytes.
    async fn screenshot(&self) -> Result<Vec<u8>, DriverError>;

    /// Runs a script or vendor extension command (`mobile: ...`).
    async fn execute(&self, script: &str, args: Value) -> Result<Value, DriverError>;

    /// Sends a W3C actions payload (`{"actions": [...]}`).
    async fn perform_actions(&self, actions: Value) -> Result<(), DriverError>;

    /// Text of the open alert.
    async fn alert_text(&self) -> Result<String, DriverError>;

    /// Accepts the open alert.
    async fn accept_alert(&self) -> Result<(), DriverError>;

    /// Dismisses the open alert.
    async fn dismiss_alert(&self) -> Result<(), DriverError>;

    /// Navigates back (Android back button).
    async fn back(&self) -> Result<(), DriverError>;

    /// Current orientation (`PORTRAIT` or `LANDSCAPE`).
    async fn orientation(&self) -> Result<String, DriverError>;

    /// Rotates the device.
    async fn set_orientation(&self, orientation: &str) -> Result<(), DriverError>;

    /// Available automation contexts (native and web views).
    async fn contexts(&self) -> Result<Vec<String>, DriverError>;

    /// Switches the automation context.
    async fn switch_context(&self, name: &str) -> Result<(), DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::Remote {
            status: 404,
            error: "no such element".into(),
            message: "An element could not be located".into(),
        };
        assert_eq!(
            err.to_string(),
            "no such element (HTTP 404): An element could not be located"
        );
        assert_eq!(DriverError::Timeout.to_string(), "Operation timed out");
    }

    #[test]
    fn test_error_classification() {
        let missing = DriverError::Remote {
            status: 404,
            error: "no such element".into(),
            message: String::new(),
        };
        assert!(missing.is_no_such_element());
        assert!(!missing.is_invalid_session());

        let gone = DriverError::Remote {
            status: 404,
            error: "invalid session id".into(),
            message: String::new(),
        };
        assert!(gone.is_invalid_session());
        assert!(!DriverError::Transport("refused".into()).is_no_such_element());
    }
}
