//! Shared element types returned by the remote automation server.
//!
//! These are plain data carriers. Lookups produce an [`ElementHandle`];
//! geometry comes back as an [`ElementRect`] or [`WindowSize`]; listing
//! actions produce [`ElementSummary`] rows.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON key under which W3C WebDriver returns an element reference.
pub const W3C_ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Legacy (JSONWP) element reference key, still emitted by some drivers.
const LEGACY_ELEMENT_KEY: &str = "ELEMENT";

/// An opaque reference to an element inside the active remote session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    /// The server-assigned element id.
    pub id: String,
}

impl ElementHandle {
    /// Wraps a server-assigned element id.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Extracts an element reference from a find-element response value.
    ///
    /// Accepts both the W3C key and the legacy `ELEMENT` key.
    pub fn from_json(value: &Value) -> Option<Self> {
        value
            .get(W3C_ELEMENT_KEY)
            .or_else(|| value.get(LEGACY_ELEMENT_KEY))
            .and_then(Value::as_str)
            .map(Self::new)
    }
}

/// Position and size of an element, in window points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementRect {
    /// Center point, truncated to whole points.
    pub fn center(&self) -> (i32, i32) {
        (
            (self.x + self.width / 2.0) as i32,
            (self.y + self.height / 2.0) as i32,
        )
    }

    /// True when the element has area and its center lies inside `window`.
    pub fn is_visible_in(&self, window: &WindowSize) -> bool {
        if self.width <= 0.0 || self.height <= 0.0 {
            return false;
        }
        let (cx, cy) = self.center();
        cx >= 0 && cy >= 0 && cx <= window.width && cy <= window.height
    }
}

/// Size of the application window, in points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: i32,
    pub height: i32,
}

/// One row of an element listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementSummary {
    /// Short element type, with platform prefixes stripped.
    pub element_type: String,
    /// Most specific identifier found on the element.
    pub id: Option<String>,
    /// Displayed text.
    pub text: Option<String>,
}

impl ElementSummary {
    /// Formats the row as `[type] id=.. text=..`, omitting absent parts.
    pub fn display_line(&self) -> String {
        let mut line = format!("[{}]", self.element_type);
        if let Some(id) = &self.id {
            line.push_str(&format!(" id={id}"));
        }
        if let Some(text) = &self.text {
            line.push_str(&format!(" text={}", truncate(text, 40)));
        }
        line
    }
}

/// Shortens a platform class name for display
/// (`XCUIElementTypeButton` → `Button`, `android.widget.Button` → `Button`).
pub fn short_type(tag: &str) -> &str {
    let tag = tag.strip_prefix("XCUIElementType").unwrap_or(tag);
    tag.rsplit('.').next().unwrap_or(tag)
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}
