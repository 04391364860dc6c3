//! Sequential action execution.
//!
//! [`ActionOrchestrator`] runs an ordered list of [`Action`]s against one
//! session, strictly one after another, and writes a human-readable result
//! line for each. Only assertions can fail a run: a failed
//! [`Action::Expect`] stops execution immediately. Every other action
//! reports its outcome (including "not found" and remote errors) in its
//! result line and lets the run continue.
//!
//! # Example
//!
//! ```no_run
//! use wdpilot_core::action::ActionParser;
//! use wdpilot_core::orchestrator::ActionOrchestrator;
//! # use wdpilot_core::driver::AutomationDriver;
//!
//! # async fn example(driver: &dyn AutomationDriver) -> std::io::Result<()> {
//! let actions = ActionParser::parse(&["--tap", "Login", "--expect", "Title", "Welcome"]).unwrap();
//! let orchestrator = ActionOrchestrator::new(driver, "com.example.app");
//! let outcome = orchestrator.run(&actions, &mut std::io::stdout()).await?;
//! std::process::exit(outcome.exit_code());
//! # }
//! ```

use std::io::Write;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, info_span, warn, Instrument};

use crate::action::Action;
use crate::driver::{AutomationDriver, DriverError};
use crate::element::{short_type, ElementHandle, ElementSummary};
use crate::gesture::{
    scroll_path, swipe_path, Direction, GestureBackend, Point, SCROLL_DURATION_MS,
    SWIPE_DURATION_MS,
};
use crate::locator::{ElementLocator, POLL_INTERVAL};
use crate::platform::Platform;
use crate::tree;
use crate::vocabulary::{
    AttributeVocabulary, LocatorStrategy, Using, SUMMARY_ID_ATTRIBUTES, SUMMARY_TEXT_ATTRIBUTES,
};

/// Maximum number of rows printed by `--list-elements`.
pub const LIST_ELEMENTS_LIMIT: usize = 50;

const LONG_PRESS_MS: u64 = 2_000;
const DRAG_TO_MS: u64 = 1_000;
const SCROLL_TO_MAX_SWIPES: usize = 5;
const FALLBACK_TIMEOUT: Duration = Duration::from_secs(2);
const SCROLL_SETTLE: Duration = Duration::from_millis(300);
const API_BUTTON_ATTRIBUTES: &[&str] = &["label", "title", "identifier", "name", "text", "value"];

/// Budgets used by element-resolving actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Default lookup budget (tap, type, clear, wait-for, ...).
    pub element: Duration,
    /// Quick existence checks (exists, is-visible, get-rect).
    pub probe: Duration,
    /// Text reads (get-text, expect, get-attribute).
    pub text: Duration,
    /// Polling waits (wait-for-text, wait-until-gone).
    pub wait: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            element: Duration::from_secs(10),
            probe: Duration::from_secs(2),
            text: Duration::from_secs(5),
            wait: Duration::from_secs(10),
        }
    }
}

/// Result of executing one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    /// False only for a failed assertion.
    pub succeeded: bool,
    /// Human-readable result line(s).
    pub message: String,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            message: message.into(),
        }
    }
}

/// Summary of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Number of actions executed, including a failing one.
    pub executed: usize,
    /// Index of the assertion that stopped the run.
    pub failed_at: Option<usize>,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.failed_at.is_none()
    }

    /// Process exit code: 0 on success, 1 after a failed assertion.
    pub fn exit_code(&self) -> i32 {
        if self.succeeded() {
            0
        } else {
            1
        }
    }
}

fn ok_or(found: bool, miss: &'static str) -> &'static str {
    if found {
        "ok"
    } else {
        miss
    }
}

/// Runs actions against a borrowed driver.
pub struct ActionOrchestrator<'a> {
    driver: &'a dyn AutomationDriver,
    locator: ElementLocator<'a>,
    gestures: GestureBackend<'a>,
    vocab: AttributeVocabulary,
    app_id: &'a str,
    timeouts: Timeouts,
}

impl<'a> ActionOrchestrator<'a> {
    pub fn new(driver: &'a dyn AutomationDriver, app_id: &'a str) -> Self {
        Self {
            driver,
            locator: ElementLocator::new(driver, app_id),
            gestures: GestureBackend::new(driver),
            vocab: AttributeVocabulary::new(driver.platform()),
            app_id,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Executes `actions` in order, writing one result per action to `out`.
    ///
    /// Stops after the first failed assertion.
    pub async fn run<W: Write>(&self, actions: &[Action], out: &mut W) -> std::io::Result<RunOutcome> {
        for (index, action) in actions.iter().enumerate() {
            let result = self.execute(action).await;
            writeln!(out, "{}", result.message)?;
            out.flush()?;
            if !result.succeeded {
                return Ok(RunOutcome {
                    executed: index + 1,
                    failed_at: Some(index),
                });
            }
        }
        Ok(RunOutcome {
            executed: actions.len(),
            failed_at: None,
        })
    }

    /// Executes a single action.
    pub async fn execute(&self, action: &Action) -> ActionResult {
        let span = info_span!("execute_action", action = action.name());
        async {
            let start = Instant::now();
            let result = match self.dispatch(action).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(error = %e, "action failed");
                    let message = format!("{}: error: {e}", action.name());
                    if action.is_assertion() {
                        ActionResult::failed(message)
                    } else {
                        ActionResult::ok(message)
                    }
                }
            };
            debug!(
                elapsed_ms = start.elapsed().as_millis() as u64,
                succeeded = result.succeeded,
                "action complete"
            );
            result
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, action: &Action) -> Result<ActionResult, DriverError> {
        let t = self.timeouts;
        let line = match action {
            Action::Tap(id) => {
                let ok = self.tap_id(id, t.element).await?;
                format!("tap '{id}': {}", ok_or(ok, "not found"))
            }
            Action::TapButton(text) => {
                let ok = self.tap_button(text).await?;
                format!("tap_button '{text}': {}", ok_or(ok, "not found"))
            }
            Action::TapText(text) => {
                let ok = self.tap_text(text, t.element).await?;
                format!("tap_text '{text}': {}", ok_or(ok, "not found"))
            }
            Action::TapLike(partial) => {
                let ok = match self.locator.locate_like(partial, t.element).await {
                    Some(el) => {
                        self.driver.click(&el).await?;
                        true
                    }
                    None => false,
                };
                format!("tap_like '{partial}': {}", ok_or(ok, "not found"))
            }
            Action::DoubleTap(id) => {
                let ok = match self.center_of(id, t.element).await? {
                    Some(point) => {
                        self.gestures.double_tap(point).await?;
                        true
                    }
                    None => false,
                };
                format!("double_tap '{id}': {}", ok_or(ok, "not found"))
            }
            Action::LongPress(id) => {
                let ok = match self.center_of(id, t.element).await? {
                    Some(point) => {
                        self.gestures.long_press(point, LONG_PRESS_MS).await?;
                        true
                    }
                    None => false,
                };
                format!("long_press '{id}': {}", ok_or(ok, "not found"))
            }
            Action::Type { id, text } => {
                let ok = match self.locator.locate(id, t.element).await {
                    Some(el) => {
                        self.driver.clear(&el).await?;
                        self.driver.send_keys(&el, text).await?;
                        true
                    }
                    None => false,
                };
                format!("type '{id}' <- '{text}': {}", ok_or(ok, "not found"))
            }
            Action::Clear(id) => {
                let ok = match self.locator.locate(id, t.element).await {
                    Some(el) => {
                        self.driver.clear(&el).await?;
                        true
                    }
                    None => false,
                };
                format!("clear '{id}': {}", ok_or(ok, "not found"))
            }
            Action::GetText(id) => {
                let text = self.text_of(id, t.text).await;
                format!("text '{id}': {}", text.as_deref().unwrap_or("not found"))
            }
            Action::GetAttribute { id, name } => match self.locator.locate(id, t.text).await {
                Some(el) => {
                    let value = self.driver.element_attribute(&el, name).await?;
                    format!("attribute '{id}' {name}: {}", value.as_deref().unwrap_or("(none)"))
                }
                None => format!("attribute '{id}' {name}: not found"),
            },
            Action::Exists(id) => {
                let found = self.locator.locate(id, t.probe).await.is_some();
                format!("exists '{id}': {found}")
            }
            Action::Expect { id, expected } => {
                let actual = self.text_of(id, t.text).await;
                let passed = actual.as_deref().is_some_and(|a| a.contains(expected.as_str()));
                let line = format!(
                    "expect '{id}' contains '{expected}': {} (actual: {})",
                    if passed { "PASS" } else { "FAIL" },
                    actual.as_deref().unwrap_or("not found"),
                );
                return Ok(if passed {
                    ActionResult::ok(line)
                } else {
                    ActionResult::failed(line)
                });
            }
            Action::IsEnabled(id) => match self.locator.locate(id, t.element).await {
                Some(el) => format!("is_enabled '{id}': {}", self.driver.element_enabled(&el).await?),
                None => format!("is_enabled '{id}': not found"),
            },
            Action::IsVisible(id) => {
                let visible = match self.locator.locate(id, t.probe).await {
                    Some(el) => {
                        let rect = self.driver.element_rect(&el).await?;
                        let window = self.driver.window_size().await?;
                        rect.is_visible_in(&window)
                    }
                    None => false,
                };
                format!("is_visible '{id}': {visible}")
            }
            Action::Wait(duration) => {
                tokio::time::sleep(*duration).await;
                format!("wait: {}s", duration.as_secs_f64())
            }
            Action::WaitFor(id) => {
                let found = self.locator.locate(id, t.element).await.is_some();
                format!("wait_for '{id}': {}", if found { "found" } else { "timeout" })
            }
            Action::WaitForText { id, text } => {
                let found = self.wait_for_text(id, text, t.wait).await;
                format!(
                    "wait_for_text '{id}' contains '{text}': {}",
                    if found { "found" } else { "timeout" }
                )
            }
            Action::WaitUntilGone(id) => {
                let gone = self.wait_until_gone(id, t.wait).await;
                format!("wait_until_gone '{id}': {}", if gone { "gone" } else { "timeout" })
            }
            Action::DismissKeyboard => {
                let ok = self.dismiss_keyboard().await;
                format!("dismiss_keyboard: {}", ok_or(ok, "failed"))
            }
            Action::KeyboardShown => {
                let shown = self
                    .driver
                    .execute(&self.vocab.extension("isKeyboardShown"), Value::Null)
                    .await?
                    .as_bool()
                    .unwrap_or(false);
                format!("keyboard_shown: {shown}")
            }
            Action::PressKey(key) => {
                let ok = self.press_key(key).await?;
                format!("press_key '{key}': {}", ok_or(ok, "failed"))
            }
            Action::AcceptAlert => {
                let ok = self.driver.accept_alert().await.is_ok();
                format!("accept_alert: {}", ok_or(ok, "no alert"))
            }
            Action::DismissAlert => {
                let ok = self.driver.dismiss_alert().await.is_ok();
                format!("dismiss_alert: {}", ok_or(ok, "no alert"))
            }
            Action::GetAlert => {
                let text = self.driver.alert_text().await.ok();
                format!("alert: {}", text.as_deref().unwrap_or("none"))
            }
            Action::Swipe(direction) => {
                self.swipe(*direction).await?;
                format!("swipe '{direction}': ok")
            }
            Action::Scroll(direction) => {
                let window = self.driver.window_size().await?;
                let (from, to) = scroll_path(window, *direction, 0.5);
                self.gestures.drag(from, to, SCROLL_DURATION_MS).await?;
                format!("scroll '{direction}': ok")
            }
            Action::ScrollTo(id) => {
                let found = self.scroll_to(id).await?;
                format!("scroll_to '{id}': {}", if found { "found" } else { "not found" })
            }
            Action::TapCoords { x, y } => {
                let (command, args) = self.vocab.tap_command(*x, *y);
                if let Err(e) = self.driver.execute(command, args).await {
                    debug!(error = %e, "tap extension failed; using pointer tap");
                    self.gestures.tap(Point::new(*x, *y)).await?;
                }
                format!("tap_coords: ({x}, {y})")
            }
            Action::Drag { id, dx, dy, duration } => {
                let ok = self.drag(id, *dx, *dy, *duration).await?;
                format!("drag '{id}' by ({dx}, {dy}): {}", ok_or(ok, "not found"))
            }
            Action::DragTo { source, target } => {
                let from = self.center_of(source, t.element).await?;
                let to = match from {
                    Some(_) => self.center_of(target, t.element).await?,
                    None => None,
                };
                let ok = match (from, to) {
                    (Some(from), Some(to)) => {
                        self.gestures.drag(from, to, DRAG_TO_MS).await?;
                        true
                    }
                    _ => false,
                };
                format!("drag_to '{source}' -> '{target}': {}", ok_or(ok, "not found"))
            }
            Action::Pinch { id, scale } => {
                if self.vocab.platform() != Platform::Ios {
                    format!("pinch '{id}': unsupported on {}", self.vocab.platform())
                } else {
                    let ok = match self.locator.locate(id, t.element).await {
                        Some(el) => {
                            let velocity = if *scale < 1.0 { -1.0 } else { 1.0 };
                            self.driver
                                .execute(
                                    "mobile: pinch",
                                    json!({ "elementId": el.id, "scale": scale, "velocity": velocity }),
                                )
                                .await?;
                            true
                        }
                        None => false,
                    };
                    format!("pinch '{id}' x{scale}: {}", ok_or(ok, "not found"))
                }
            }
            Action::SetSlider { id, value } => {
                let ok = match self.locator.locate(id, t.element).await {
                    Some(el) => {
                        self.driver.send_keys(&el, &value.to_string()).await?;
                        true
                    }
                    None => false,
                };
                format!("set_slider '{id}' to {value}: {}", ok_or(ok, "not found"))
            }
            Action::Activate => {
                self.app_command("activateApp").await?;
                "activate_app: ok".to_string()
            }
            Action::Terminate => {
                self.app_command("terminateApp").await?;
                "terminate_app: ok".to_string()
            }
            Action::Install(path) => {
                let key = if self.vocab.platform() == Platform::Android { "appPath" } else { "app" };
                self.driver
                    .execute(&self.vocab.extension("installApp"), json!({ key: path }))
                    .await?;
                format!("install_app: {path}")
            }
            Action::RemoveApp => {
                let removed = self.app_command("removeApp").await?.as_bool().unwrap_or(true);
                format!("remove_app: {}", ok_or(removed, "failed"))
            }
            Action::IsInstalled => {
                let installed = self
                    .app_command("isAppInstalled")
                    .await?
                    .as_bool()
                    .unwrap_or(false);
                format!("is_installed: {installed}")
            }
            Action::ResetApp => {
                self.app_command("terminateApp").await?;
                self.app_command("activateApp").await?;
                "reset_app: ok".to_string()
            }
            Action::Background(seconds) => {
                self.driver
                    .execute(&self.vocab.extension("backgroundApp"), json!({ "seconds": seconds }))
                    .await?;
                format!("background_app: {seconds}s")
            }
            Action::PressBack => {
                if self.vocab.platform() == Platform::Android {
                    self.driver.back().await?;
                    "press_back: ok".to_string()
                } else {
                    format!("press_back: unsupported on {}", self.vocab.platform())
                }
            }
            Action::PressHome => match self.vocab.platform() {
                Platform::Android => {
                    self.driver
                        .execute("mobile: pressKey", json!({ "keycode": 3 }))
                        .await?;
                    "press_home: ok".to_string()
                }
                Platform::Ios => {
                    self.driver
                        .execute("mobile: pressButton", json!({ "name": "home" }))
                        .await?;
                    "press_home: ok".to_string()
                }
                Platform::MacCatalyst => "press_home: unsupported on maccatalyst".to_string(),
            },
            Action::GetOrientation => format!("orientation: {}", self.driver.orientation().await?),
            Action::SetOrientation(orientation) => {
                self.driver.set_orientation(orientation).await?;
                format!("set_orientation: {orientation}")
            }
            Action::WindowSize => {
                let size = self.driver.window_size().await?;
                format!("window_size: {}x{}", size.width, size.height)
            }
            Action::Contexts => format!("contexts: {}", self.driver.contexts().await?.join(", ")),
            Action::SwitchContext(name) => {
                self.driver.switch_context(name).await?;
                format!("switch_context '{name}': ok")
            }
            Action::Screenshot(path) => {
                let png = self.driver.screenshot().await?;
                std::fs::write(path, png)?;
                format!("screenshot: {}", path.display())
            }
            Action::PageSource => self.driver.page_source().await?,
            Action::ListButtons => {
                let labels = self.list_buttons().await?;
                let mut out = String::from("buttons:");
                for label in labels {
                    out.push_str(&format!("\n  - {label}"));
                }
                out
            }
            Action::ListElements => {
                let rows = self.list_elements().await?;
                let mut out = String::from("elements:");
                for row in rows {
                    out.push_str(&format!("\n  {}", row.display_line()));
                }
                out
            }
            Action::FindText(text) => {
                let query = self.vocab.find_text_query(text, true);
                let mut out = format!("elements with '{text}':");
                for el in self.driver.find_elements(&query).await? {
                    let row = ElementSummary {
                        element_type: self.element_type(&el).await,
                        id: self.first_attribute(&el, &["accessibility-id", "name"]).await,
                        text: self.display_text(&el).await,
                    };
                    out.push_str(&format!("\n  {}", row.display_line()));
                }
                out
            }
            Action::GetRect(id) => match self.locator.locate(id, t.probe).await {
                Some(el) => {
                    let r = self.driver.element_rect(&el).await?;
                    format!(
                        "rect '{id}': x={} y={} w={} h={}",
                        r.x as i64, r.y as i64, r.width as i64, r.height as i64
                    )
                }
                None => format!("rect '{id}': not found"),
            },
        };
        Ok(ActionResult::ok(line))
    }

    async fn tap_id(&self, id: &str, timeout: Duration) -> Result<bool, DriverError> {
        match self.locator.locate(id, timeout).await {
            Some(el) => {
                self.driver.click(&el).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Tries equality then containment text queries, splitting `timeout`
    /// evenly between them.
    async fn tap_text(&self, text: &str, timeout: Duration) -> Result<bool, DriverError> {
        let queries = self.vocab.text_queries(text);
        match self.locator.first_match(&queries, timeout, Duration::ZERO).await {
            Some(el) => {
                self.driver.click(&el).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn tap_button(&self, text: &str) -> Result<bool, DriverError> {
        let query = self.vocab.button_query(text);
        if let Some(el) = self.locator.poll(&query, self.timeouts.element).await {
            self.driver.click(&el).await?;
            return Ok(true);
        }
        debug!(%text, "no button matched; falling back to id and text lookup");
        if self.tap_id(text, FALLBACK_TIMEOUT).await? {
            return Ok(true);
        }
        self.tap_text(text, FALLBACK_TIMEOUT).await
    }

    async fn center_of(&self, id: &str, timeout: Duration) -> Result<Option<Point>, DriverError> {
        match self.locator.locate(id, timeout).await {
            Some(el) => {
                let (x, y) = self.driver.element_rect(&el).await?.center();
                Ok(Some(Point::new(x, y)))
            }
            None => Ok(None),
        }
    }

    async fn text_of(&self, id: &str, timeout: Duration) -> Option<String> {
        let el = self.locator.locate(id, timeout).await?;
        self.locator.read_text(&el).await
    }

    async fn wait_for_text(&self, id: &str, expected: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let budget = self.timeouts.text.min(remaining);
            if let Some(el) = self.locator.locate(id, budget).await {
                if self
                    .locator
                    .read_text(&el)
                    .await
                    .is_some_and(|text| text.contains(expected))
                {
                    return true;
                }
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn wait_until_gone(&self, id: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.locator.find_now(id).await.is_none() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn dismiss_keyboard(&self) -> bool {
        let hide = self.vocab.extension("hideKeyboard");
        if self.vocab.platform() == Platform::Android {
            return self.driver.execute(&hide, json!({})).await.is_ok();
        }

        if let Ok(Some(active)) = self.driver.active_element().await {
            if self.driver.send_keys(&active, "\n").await.is_ok() {
                return true;
            }
        }
        if self
            .driver
            .execute(&hide, json!({ "keys": ["return"] }))
            .await
            .is_ok()
        {
            return true;
        }
        match self
            .driver
            .find_element(&LocatorStrategy::new(Using::AccessibilityId, "Done"))
            .await
        {
            Ok(Some(done)) => self.driver.click(&done).await.is_ok(),
            _ => false,
        }
    }

    async fn press_key(&self, key: &str) -> Result<bool, DriverError> {
        let keys = match key.to_lowercase().as_str() {
            "enter" | "return" => "\n",
            "tab" => "\t",
            "backspace" => "\u{8}",
            _ => return Ok(false),
        };
        match self.driver.active_element().await? {
            Some(active) => {
                self.driver.send_keys(&active, keys).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn swipe(&self, direction: Direction) -> Result<(), DriverError> {
        let window = self.driver.window_size().await?;
        let (from, to) = swipe_path(window, direction);
        self.gestures.drag(from, to, SWIPE_DURATION_MS).await
    }

    async fn scroll_to(&self, id: &str) -> Result<bool, DriverError> {
        for _ in 0..SCROLL_TO_MAX_SWIPES {
            if self.locator.find_now(id).await.is_some() {
                return Ok(true);
            }
            self.swipe(Direction::Down).await?;
            tokio::time::sleep(SCROLL_SETTLE).await;
        }
        Ok(self.locator.find_now(id).await.is_some())
    }

    /// Drags an element by an offset. Sliders start from their current thumb
    /// position rather than their centre.
    async fn drag(&self, id: &str, dx: i32, dy: i32, duration: f64) -> Result<bool, DriverError> {
        let Some(el) = self.locator.locate(id, self.timeouts.element).await else {
            return Ok(false);
        };
        let rect = self.driver.element_rect(&el).await?;
        let element_type = self
            .driver
            .element_attribute(&el, self.vocab.type_attribute())
            .await?
            .unwrap_or_default();

        let from_x = if element_type.contains("Slider") {
            let fraction = self
                .driver
                .element_attribute(&el, "value")
                .await?
                .and_then(|v| v.trim().trim_end_matches('%').parse::<f64>().ok())
                .map(|pct| pct / 100.0)
                .unwrap_or(0.5);
            rect.x + rect.width * fraction
        } else {
            rect.x + rect.width / 2.0
        };
        let from_y = rect.y + rect.height / 2.0;
        let (to_x, to_y) = (from_x + dx as f64, from_y + dy as f64);

        if self.vocab.platform().is_apple() {
            self.driver
                .execute(
                    &self.vocab.extension("dragFromToForDuration"),
                    json!({
                        "fromX": from_x,
                        "fromY": from_y,
                        "toX": to_x,
                        "toY": to_y,
                        "duration": duration,
                    }),
                )
                .await?;
        } else {
            self.gestures
                .drag(
                    Point::new(from_x as i32, from_y as i32),
                    Point::new(to_x as i32, to_y as i32),
                    (duration * 1000.0) as u64,
                )
                .await?;
        }
        Ok(true)
    }

    async fn app_command(&self, name: &str) -> Result<Value, DriverError> {
        self.driver
            .execute(&self.vocab.extension(name), self.vocab.app_argument(self.app_id))
            .await
    }

    async fn list_buttons(&self) -> Result<Vec<String>, DriverError> {
        let class = self.vocab.button_class();
        if let Some(root) = self.locator.snapshot().await {
            return Ok(tree::button_labels(&root, class));
        }

        let mut labels = Vec::new();
        let query = LocatorStrategy::new(Using::ClassName, class);
        for el in self.driver.find_elements(&query).await? {
            let label = match self.first_attribute(&el, API_BUTTON_ATTRIBUTES).await {
                Some(label) => Some(label),
                None => self.driver.element_text(&el).await.ok().filter(|t| !t.is_empty()),
            };
            labels.extend(label);
        }
        Ok(labels)
    }

    async fn list_elements(&self) -> Result<Vec<ElementSummary>, DriverError> {
        if let Some(root) = self.locator.snapshot().await {
            return Ok(tree::element_summaries(&root, LIST_ELEMENTS_LIMIT));
        }

        let mut rows = Vec::new();
        let all = self.driver.find_elements(&LocatorStrategy::xpath("//*")).await?;
        for el in all.iter().take(LIST_ELEMENTS_LIMIT) {
            let id = self.first_attribute(el, SUMMARY_ID_ATTRIBUTES).await;
            let text = self.first_attribute(el, SUMMARY_TEXT_ATTRIBUTES).await;
            if id.is_none() && text.is_none() {
                continue;
            }
            rows.push(ElementSummary {
                element_type: self.element_type(el).await,
                id,
                text,
            });
        }
        Ok(rows)
    }

    async fn first_attribute(&self, el: &ElementHandle, names: &[&str]) -> Option<String> {
        for name in names {
            if let Ok(Some(value)) = self.driver.element_attribute(el, name).await {
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }
        None
    }

    async fn element_type(&self, el: &ElementHandle) -> String {
        self.first_attribute(el, &[self.vocab.type_attribute()])
            .await
            .map(|t| short_type(&t).to_string())
            .unwrap_or_else(|| "?".to_string())
    }

    async fn display_text(&self, el: &ElementHandle) -> Option<String> {
        match self.driver.element_text(el).await {
            Ok(text) if !text.is_empty() => Some(text),
            _ => self.first_attribute(el, &["label", "text"]).await,
        }
    }
}
