//! Pointer gestures.
//!
//! Gestures are synthesized as W3C pointer action sequences (move, down,
//! pause, up) and handed to the server unchanged. [`PointerSequence`] builds
//! one touch pointer's sequence; [`GestureBackend`] wraps the common shapes
//! (tap, double tap, long press, straight-line drag) over a borrowed driver.

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};

use crate::driver::{AutomationDriver, DriverError};
use crate::element::WindowSize;

/// A screen point, in window coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Direction of a swipe or scroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        })
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            _ => Err(format!("invalid direction '{s}' (expected up, down, left or right)")),
        }
    }
}

/// Swipe duration in milliseconds.
pub const SWIPE_DURATION_MS: u64 = 500;

/// Scroll duration in milliseconds.
pub const SCROLL_DURATION_MS: u64 = 300;

/// Start and end points of a swipe: 70% to 30% of the window along the
/// vertical axis, 80% to 20% along the horizontal axis.
pub fn swipe_path(window: WindowSize, direction: Direction) -> (Point, Point) {
    let (w, h) = (window.width, window.height);
    let at = |v: i32, f: f64| (v as f64 * f) as i32;
    match direction {
        Direction::Up => (Point::new(w / 2, at(h, 0.7)), Point::new(w / 2, at(h, 0.3))),
        Direction::Down => (Point::new(w / 2, at(h, 0.3)), Point::new(w / 2, at(h, 0.7))),
        Direction::Left => (Point::new(at(w, 0.8), h / 2), Point::new(at(w, 0.2), h / 2)),
        Direction::Right => (Point::new(at(w, 0.2), h / 2), Point::new(at(w, 0.8), h / 2)),
    }
}

/// Start and end points of a scroll: a stroke of `amount` times the smaller
/// window side, centred on the window.
pub fn scroll_path(window: WindowSize, direction: Direction, amount: f64) -> (Point, Point) {
    let (cx, cy) = (window.width / 2, window.height / 2);
    let half = (window.width.min(window.height) as f64 * amount) as i32 / 2;
    match direction {
        Direction::Up => (Point::new(cx, cy + half), Point::new(cx, cy - half)),
        Direction::Down => (Point::new(cx, cy - half), Point::new(cx, cy + half)),
        Direction::Left => (Point::new(cx + half, cy), Point::new(cx - half, cy)),
        Direction::Right => (Point::new(cx - half, cy), Point::new(cx + half, cy)),
    }
}

/// Builder for one touch pointer's action sequence.
#[derive(Debug, Clone, Default)]
pub struct PointerSequence {
    steps: Vec<Value>,
}

impl PointerSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the pointer to `point` over `duration_ms`.
    pub fn move_to(mut self, point: Point, duration_ms: u64) -> Self {
        self.steps.push(json!({
            "type": "pointerMove",
            "duration": duration_ms,
            "origin": "viewport",
            "x": point.x,
            "y": point.y,
        }));
        self
    }

    pub fn down(mut self) -> Self {
        self.steps.push(json!({ "type": "pointerDown", "button": 0 }));
        self
    }

    pub fn up(mut self) -> Self {
        self.steps.push(json!({ "type": "pointerUp", "button": 0 }));
        self
    }

    pub fn pause(mut self, duration_ms: u64) -> Self {
        self.steps.push(json!({ "type": "pause", "duration": duration_ms }));
        self
    }

    /// Renders the full `POST /actions` payload.
    pub fn into_payload(self) -> Value {
        json!({
            "actions": [{
                "type": "pointer",
                "id": "finger1",
                "parameters": { "pointerType": "touch" },
                "actions": self.steps,
            }]
        })
    }
}

/// Common pointer gestures over a borrowed driver.
pub struct GestureBackend<'a> {
    driver: &'a dyn AutomationDriver,
}

impl<'a> GestureBackend<'a> {
    pub fn new(driver: &'a dyn AutomationDriver) -> Self {
        Self { driver }
    }

    /// Single tap at `point`.
    pub async fn tap(&self, point: Point) -> Result<(), DriverError> {
        let seq = PointerSequence::new()
            .move_to(point, 0)
            .down()
            .pause(50)
            .up();
        self.driver.perform_actions(seq.into_payload()).await
    }

    /// Two taps in quick succession at `point`.
    pub async fn double_tap(&self, point: Point) -> Result<(), DriverError> {
        let seq = PointerSequence::new()
            .move_to(point, 0)
            .down()
            .pause(50)
            .up()
            .pause(100)
            .down()
            .pause(50)
            .up();
        self.driver.perform_actions(seq.into_payload()).await
    }

    /// Press and hold at `point` for `hold_ms`.
    pub async fn long_press(&self, point: Point, hold_ms: u64) -> Result<(), DriverError> {
        let seq = PointerSequence::new()
            .move_to(point, 0)
            .down()
            .pause(hold_ms)
            .up();
        self.driver.perform_actions(seq.into_payload()).await
    }

    /// Straight-line drag from `from` to `to` taking `duration_ms`.
    pub async fn drag(&self, from: Point, to: Point, duration_ms: u64) -> Result<(), DriverError> {
        let seq = PointerSequence::new()
            .move_to(from, 0)
            .down()
            .pause(100)
            .move_to(to, duration_ms)
            .up();
        self.driver.perform_actions(seq.into_payload()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHONE: WindowSize = WindowSize { width: 400, height: 800 };

    #[test]
    fn swipe_up_goes_from_70_to_30_percent() {
        let (from, to) = swipe_path(PHONE, Direction::Up);
        assert_eq!(from, Point::new(200, 560));
        assert_eq!(to, Point::new(200, 240));
    }

    #[test]
    fn swipe_left_is_horizontal() {
        let (from, to) = swipe_path(PHONE, Direction::Left);
        assert_eq!(from, Point::new(320, 400));
        assert_eq!(to, Point::new(80, 400));
    }

    #[test]
    fn scroll_uses_half_the_smaller_side() {
        let (from, to) = scroll_path(PHONE, Direction::Down, 0.5);
        assert_eq!(from, Point::new(200, 300));
        assert_eq!(to, Point::new(200, 500));
    }

    #[test]
    fn direction_parsing() {
        assert_eq!("UP".parse::<Direction>().unwrap(), Direction::Up);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn pointer_payload_shape() {
        let payload = PointerSequence::new()
            .move_to(Point::new(1, 2), 0)
            .down()
            .pause(2000)
            .up()
            .into_payload();
        let pointer = &payload["actions"][0];
        assert_eq!(pointer["type"], "pointer");
        assert_eq!(pointer["parameters"]["pointerType"], "touch");
        let steps = pointer["actions"].as_array().unwrap();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0]["x"], 1);
        assert_eq!(steps[2]["duration"], 2000);
        assert_eq!(steps[3]["type"], "pointerUp");
    }
}
