//! In-memory [`AutomationDriver`] for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::driver::{AutomationDriver, DriverError};
use crate::element::{ElementHandle, ElementRect, WindowSize};
use crate::platform::Platform;
use crate::vocabulary::{LocatorStrategy, Using};

/// Scriptable fake: elements are registered per (strategy, query) and every
/// mutating command is appended to a log.
pub(crate) struct FakeDriver {
    platform: Platform,
    elements: HashMap<(Using, String), Vec<String>>,
    attributes: HashMap<(String, String), String>,
    texts: HashMap<String, String>,
    rects: HashMap<String, ElementRect>,
    disabled: Vec<String>,
    source: Option<String>,
    window: WindowSize,
    active: Option<String>,
    alert: Option<String>,
    fail_execute: bool,
    finds: AtomicUsize,
    log: Mutex<Vec<String>>,
}

impl FakeDriver {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            elements: HashMap::new(),
            attributes: HashMap::new(),
            texts: HashMap::new(),
            rects: HashMap::new(),
            disabled: Vec::new(),
            source: None,
            window: WindowSize { width: 400, height: 800 },
            active: None,
            alert: None,
            fail_execute: false,
            finds: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn with_element(mut self, using: Using, value: &str, id: &str) -> Self {
        self.elements
            .entry((using, value.to_string()))
            .or_default()
            .push(id.to_string());
        self
    }

    pub fn with_attribute(mut self, id: &str, name: &str, value: &str) -> Self {
        self.attributes
            .insert((id.to_string(), name.to_string()), value.to_string());
        self
    }

    pub fn with_text(mut self, id: &str, text: &str) -> Self {
        self.texts.insert(id.to_string(), text.to_string());
        self
    }

    pub fn with_rect(mut self, id: &str, rect: ElementRect) -> Self {
        self.rects.insert(id.to_string(), rect);
        self
    }

    pub fn with_disabled(mut self, id: &str) -> Self {
        self.disabled.push(id.to_string());
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    pub fn with_active(mut self, id: &str) -> Self {
        self.active = Some(id.to_string());
        self
    }

    pub fn with_alert(mut self, text: &str) -> Self {
        self.alert = Some(text.to_string());
        self
    }

    pub fn failing_execute(mut self) -> Self {
        self.fail_execute = true;
        self
    }

    /// Number of `find_element` calls so far.
    pub fn find_count(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    /// Commands issued so far, in order.
    pub fn log(&self) -> Vec<String> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    fn record(&self, entry: String) {
        if let Ok(mut log) = self.log.lock() {
            log.push(entry);
        }
    }

    fn lookup(&self, strategy: &LocatorStrategy) -> Vec<ElementHandle> {
        self.elements
            .get(&(strategy.using, strategy.value.clone()))
            .map(|ids| ids.iter().map(ElementHandle::new).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AutomationDriver for FakeDriver {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn session_id(&self) -> &str {
        "fake-session"
    }

    async fn find_element(
        &self,
        strategy: &LocatorStrategy,
    ) -> Result<Option<ElementHandle>, DriverError> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        Ok(self.lookup(strategy).into_iter().next())
    }

    async fn find_elements(
        &self,
        strategy: &LocatorStrategy,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        Ok(self.lookup(strategy))
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), DriverError> {
        self.record(format!("click {}", element.id));
        Ok(())
    }

    async fn clear(&self, element: &ElementHandle) -> Result<(), DriverError> {
        self.record(format!("clear {}", element.id));
        Ok(())
    }

    async fn send_keys(&self, element: &ElementHandle, text: &str) -> Result<(), DriverError> {
        self.record(format!("send_keys {} {}", element.id, text));
        Ok(())
    }

    async fn element_text(&self, element: &ElementHandle) -> Result<String, DriverError> {
        Ok(self.texts.get(&element.id).cloned().unwrap_or_default())
    }

    async fn element_attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        Ok(self
            .attributes
            .get(&(element.id.clone(), name.to_string()))
            .cloned())
    }

    async fn element_rect(&self, element: &ElementHandle) -> Result<ElementRect, DriverError> {
        Ok(self.rects.get(&element.id).copied().unwrap_or(ElementRect {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 50.0,
        }))
    }

    async fn element_enabled(&self, element: &ElementHandle) -> Result<bool, DriverError> {
        Ok(!self.disabled.contains(&element.id))
    }

    async fn active_element(&self) -> Result<Option<ElementHandle>, DriverError> {
        Ok(self.active.as_deref().map(ElementHandle::new))
    }

    async fn window_size(&self) -> Result<WindowSize, DriverError> {
        Ok(self.window)
    }

    async fn page_source(&self) -> Result<String, DriverError> {
        self.source
            .clone()
            .ok_or_else(|| DriverError::CommandFailed("no source".into()))
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        Ok(b"\x89PNG".to_vec())
    }

    async fn execute(&self, script: &str, args: Value) -> Result<Value, DriverError> {
        self.record(format!("execute {script} {args}"));
        if self.fail_execute {
            return Err(DriverError::CommandFailed(format!("{script} unsupported")));
        }
        Ok(Value::Null)
    }

    async fn perform_actions(&self, actions: Value) -> Result<(), DriverError> {
        let steps = actions["actions"][0]["actions"]
            .as_array()
            .map(|a| a.len())
            .unwrap_or(0);
        self.record(format!("actions {steps}"));
        Ok(())
    }

    async fn alert_text(&self) -> Result<String, DriverError> {
        self.alert
            .clone()
            .ok_or_else(|| DriverError::CommandFailed("no such alert".into()))
    }

    async fn accept_alert(&self) -> Result<(), DriverError> {
        self.record("accept_alert".into());
        Ok(())
    }

    async fn dismiss_alert(&self) -> Result<(), DriverError> {
        self.record("dismiss_alert".into());
        Ok(())
    }

    async fn back(&self) -> Result<(), DriverError> {
        self.record("back".into());
        Ok(())
    }

    async fn orientation(&self) -> Result<String, DriverError> {
        Ok("PORTRAIT".into())
    }

    async fn set_orientation(&self, orientation: &str) -> Result<(), DriverError> {
        self.record(format!("orientation {orientation}"));
        Ok(())
    }

    async fn contexts(&self) -> Result<Vec<String>, DriverError> {
        Ok(vec!["NATIVE_APP".into()])
    }

    async fn switch_context(&self, name: &str) -> Result<(), DriverError> {
        self.record(format!("context {name}"));
        Ok(())
    }
}
