//! Action vocabulary and the order-preserving flag parser.
//!
//! Actions are given on the command line as flags (`--tap Login --wait 1
//! --expect Title Welcome`). Their execution order is the order in which the
//! flags appear, which a declarative argument parser cannot recover once the
//! flags are grouped by name. [`ActionParser`] therefore walks the raw
//! argument list itself, left to right, consuming each action flag's
//! arguments according to [`ACTION_FLAGS`] and leaving every other token for
//! the regular option parser.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::gesture::Direction;

/// How many arguments an action flag takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many.
    Fixed(usize),
    /// Between `min` and `max`; collection stops early at the next `--` token.
    Range(usize, usize),
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Fixed(n) => write!(f, "{n}"),
            Arity::Range(min, max) => write!(f, "{min}-{max}"),
        }
    }
}

/// One row of the action flag table.
#[derive(Debug, Clone, Copy)]
pub struct FlagSpec {
    pub flag: &'static str,
    pub arity: Arity,
    /// Argument placeholder for help output.
    pub usage: &'static str,
    pub help: &'static str,
}

const fn spec(flag: &'static str, arity: Arity, usage: &'static str, help: &'static str) -> FlagSpec {
    FlagSpec { flag, arity, usage, help }
}

use Arity::{Fixed, Range};

/// Every action flag, grouped as shown in `--help`.
pub const ACTION_FLAGS: &[FlagSpec] = &[
    spec("--tap", Fixed(1), "ID", "Tap element by identifier"),
    spec("--tap-button", Fixed(1), "TEXT", "Tap button by its visible text"),
    spec("--tap-text", Fixed(1), "TEXT", "Tap element showing (or containing) text"),
    spec("--tap-like", Fixed(1), "PARTIAL", "Tap element whose id contains PARTIAL"),
    spec("--double-tap", Fixed(1), "ID", "Double-tap element"),
    spec("--long-press", Fixed(1), "ID", "Press and hold element for 2 s"),
    spec("--type", Fixed(2), "ID TEXT", "Clear field and type text"),
    spec("--clear", Fixed(1), "ID", "Clear text field"),
    spec("--get-text", Fixed(1), "ID", "Print element text"),
    spec("--get-attribute", Fixed(2), "ID NAME", "Print raw attribute value"),
    spec("--exists", Fixed(1), "ID", "Print whether element exists"),
    spec("--expect", Fixed(2), "ID TEXT", "Assert element text contains TEXT (halts on failure)"),
    spec("--is-enabled", Fixed(1), "ID", "Print whether element is enabled"),
    spec("--is-visible", Fixed(1), "ID", "Print whether element is on screen"),
    spec("--wait", Fixed(1), "SECS", "Sleep"),
    spec("--wait-for", Fixed(1), "ID", "Wait up to 10 s for element"),
    spec("--wait-for-text", Fixed(2), "ID TEXT", "Wait up to 10 s for element text to contain TEXT"),
    spec("--wait-until-gone", Fixed(1), "ID", "Wait up to 10 s for element to disappear"),
    spec("--dismiss-keyboard", Fixed(0), "", "Hide the on-screen keyboard"),
    spec("--keyboard-shown", Fixed(0), "", "Print whether the keyboard is shown"),
    spec("--press-key", Fixed(1), "KEY", "Press enter, return, tab or backspace"),
    spec("--accept-alert", Fixed(0), "", "Accept the open alert"),
    spec("--dismiss-alert", Fixed(0), "", "Dismiss the open alert"),
    spec("--get-alert", Fixed(0), "", "Print alert text"),
    spec("--swipe", Fixed(1), "DIR", "Swipe up, down, left or right"),
    spec("--scroll", Fixed(1), "DIR", "Scroll up, down, left or right"),
    spec("--scroll-to", Fixed(1), "ID", "Swipe until element exists (max 5 swipes)"),
    spec("--tap-coords", Fixed(2), "X Y", "Tap at screen coordinates"),
    spec("--drag", Range(3, 4), "ID DX DY [DUR]", "Drag element by offset (slider aware)"),
    spec("--drag-to", Fixed(2), "SRC DST", "Drag one element onto another"),
    spec("--pinch", Fixed(2), "ID SCALE", "Pinch element (iOS only)"),
    spec("--set-slider", Fixed(2), "ID VALUE", "Set slider to 0-1 or 0-100"),
    spec("--activate", Fixed(0), "", "Bring app to foreground"),
    spec("--terminate", Fixed(0), "", "Terminate app"),
    spec("--install", Fixed(1), "PATH", "Install app bundle or APK"),
    spec("--remove-app", Fixed(0), "", "Uninstall app"),
    spec("--is-installed", Fixed(0), "", "Print whether app is installed"),
    spec("--reset-app", Fixed(0), "", "Terminate and relaunch app"),
    spec("--background", Fixed(1), "SECS", "Send app to background (-1 = indefinitely)"),
    spec("--press-back", Fixed(0), "", "Press back (Android)"),
    spec("--press-home", Fixed(0), "", "Press home"),
    spec("--get-orientation", Fixed(0), "", "Print orientation"),
    spec("--set-orientation", Fixed(1), "ORIENTATION", "Rotate to PORTRAIT or LANDSCAPE"),
    spec("--window-size", Fixed(0), "", "Print window size"),
    spec("--contexts", Fixed(0), "", "Print available contexts"),
    spec("--switch-context", Fixed(1), "NAME", "Switch automation context"),
    spec("--screenshot", Fixed(1), "PATH", "Save PNG screenshot"),
    spec("--page-source", Fixed(0), "", "Print accessibility tree XML"),
    spec("--list-buttons", Fixed(0), "", "List button labels"),
    spec("--list-elements", Fixed(0), "", "List elements with id or text (max 50)"),
    spec("--find-text", Fixed(1), "TEXT", "List elements containing text"),
    spec("--get-rect", Fixed(1), "ID", "Print element position and size"),
];

/// Looks up the table row for `flag`.
pub fn flag_spec(flag: &str) -> Option<&'static FlagSpec> {
    ACTION_FLAGS.iter().find(|s| s.flag == flag)
}

/// Renders the action table for `--help`.
pub fn help_table() -> String {
    let width = ACTION_FLAGS
        .iter()
        .map(|s| s.flag.len() + 1 + s.usage.len())
        .max()
        .unwrap_or(0);
    let mut out = String::from("Actions (executed in the order given):\n");
    for s in ACTION_FLAGS {
        let left = if s.usage.is_empty() {
            s.flag.to_string()
        } else {
            format!("{} {}", s.flag, s.usage)
        };
        out.push_str(&format!("  {left:<width$}  {}\n", s.help));
    }
    out
}

/// Errors raised while turning flags into actions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("{flag} expects {expected} argument(s), got {found}")]
    MissingArguments {
        flag: String,
        expected: Arity,
        found: usize,
    },

    #[error("{flag}: invalid value '{value}': {reason}")]
    InvalidValue {
        flag: String,
        value: String,
        reason: String,
    },
}

/// One operation to run against the app.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Tap(String),
    TapButton(String),
    TapText(String),
    TapLike(String),
    DoubleTap(String),
    LongPress(String),
    Type { id: String, text: String },
    Clear(String),
    GetText(String),
    GetAttribute { id: String, name: String },
    Exists(String),
    /// Assertion: the element's text must contain `expected`.
    Expect { id: String, expected: String },
    IsEnabled(String),
    IsVisible(String),
    Wait(Duration),
    WaitFor(String),
    WaitForText { id: String, text: String },
    WaitUntilGone(String),
    DismissKeyboard,
    KeyboardShown,
    PressKey(String),
    AcceptAlert,
    DismissAlert,
    GetAlert,
    Swipe(Direction),
    Scroll(Direction),
    ScrollTo(String),
    TapCoords { x: i32, y: i32 },
    Drag { id: String, dx: i32, dy: i32, duration: f64 },
    DragTo { source: String, target: String },
    Pinch { id: String, scale: f64 },
    /// `value` is already normalized to `[0, 1]`.
    SetSlider { id: String, value: f64 },
    Activate,
    Terminate,
    Install(String),
    RemoveApp,
    IsInstalled,
    ResetApp,
    Background(f64),
    PressBack,
    PressHome,
    GetOrientation,
    SetOrientation(String),
    WindowSize,
    Contexts,
    SwitchContext(String),
    Screenshot(PathBuf),
    PageSource,
    ListButtons,
    ListElements,
    FindText(String),
    GetRect(String),
}

impl Action {
    /// Short name used in logs and result lines.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Tap(_) => "tap",
            Action::TapButton(_) => "tap_button",
            Action::TapText(_) => "tap_text",
            Action::TapLike(_) => "tap_like",
            Action::DoubleTap(_) => "double_tap",
            Action::LongPress(_) => "long_press",
            Action::Type { .. } => "type",
            Action::Clear(_) => "clear",
            Action::GetText(_) => "get_text",
            Action::GetAttribute { .. } => "get_attribute",
            Action::Exists(_) => "exists",
            Action::Expect { .. } => "expect",
            Action::IsEnabled(_) => "is_enabled",
            Action::IsVisible(_) => "is_visible",
            Action::Wait(_) => "wait",
            Action::WaitFor(_) => "wait_for",
            Action::WaitForText { .. } => "wait_for_text",
            Action::WaitUntilGone(_) => "wait_until_gone",
            Action::DismissKeyboard => "dismiss_keyboard",
            Action::KeyboardShown => "keyboard_shown",
            Action::PressKey(_) => "press_key",
            Action::AcceptAlert => "accept_alert",
            Action::DismissAlert => "dismiss_alert",
            Action::GetAlert => "get_alert",
            Action::Swipe(_) => "swipe",
            Action::Scroll(_) => "scroll",
            Action::ScrollTo(_) => "scroll_to",
            Action::TapCoords { .. } => "tap_coords",
            Action::Drag { .. } => "drag",
            Action::DragTo { .. } => "drag_to",
            Action::Pinch { .. } => "pinch",
            Action::SetSlider { .. } => "set_slider",
            Action::Activate => "activate_app",
            Action::Terminate => "terminate_app",
            Action::Install(_) => "install_app",
            Action::RemoveApp => "remove_app",
            Action::IsInstalled => "is_installed",
            Action::ResetApp => "reset_app",
            Action::Background(_) => "background_app",
            Action::PressBack => "press_back",
            Action::PressHome => "press_home",
            Action::GetOrientation => "get_orientation",
            Action::SetOrientation(_) => "set_orientation",
            Action::WindowSize => "window_size",
            Action::Contexts => "contexts",
            Action::SwitchContext(_) => "switch_context",
            Action::Screenshot(_) => "screenshot",
            Action::PageSource => "page_source",
            Action::ListButtons => "list_buttons",
            Action::ListElements => "list_elements",
            Action::FindText(_) => "find_text",
            Action::GetRect(_) => "get_rect",
        }
    }

    /// True for actions whose failure stops the run.
    pub fn is_assertion(&self) -> bool {
        matches!(self, Action::Expect { .. })
    }

    /// Builds an action from a flag and the arguments consumed for it.
    pub fn from_flag(flag: &str, args: &[String]) -> Result<Action, ParseError> {
        let spec = flag_spec(flag).ok_or_else(|| invalid(flag, "", "not an action flag"))?;
        let (min, max) = match spec.arity {
            Fixed(n) => (n, n),
            Range(min, max) => (min, max),
        };
        if args.len() < min || args.len() > max {
            return Err(ParseError::MissingArguments {
                flag: flag.to_string(),
                expected: spec.arity,
                found: args.len(),
            });
        }

        let arg = |i: usize| args[i].clone();
        let action = match flag {
            "--tap" => Action::Tap(arg(0)),
            "--tap-button" => Action::TapButton(arg(0)),
            "--tap-text" => Action::TapText(arg(0)),
            "--tap-like" => Action::TapLike(arg(0)),
            "--double-tap" => Action::DoubleTap(arg(0)),
            "--long-press" => Action::LongPress(arg(0)),
            "--type" => Action::Type { id: arg(0), text: arg(1) },
            "--clear" => Action::Clear(arg(0)),
            "--get-text" => Action::GetText(arg(0)),
            "--get-attribute" => Action::GetAttribute { id: arg(0), name: arg(1) },
            "--exists" => Action::Exists(arg(0)),
            "--expect" => Action::Expect { id: arg(0), expected: arg(1) },
            "--is-enabled" => Action::IsEnabled(arg(0)),
            "--is-visible" => Action::IsVisible(arg(0)),
            "--wait" => {
                let secs: f64 = number(flag, &args[0])?;
                if !secs.is_finite() || secs < 0.0 {
                    return Err(invalid(flag, &args[0], "must be a non-negative number"));
                }
                let wait = Duration::try_from_secs_f64(secs)
                    .map_err(|e| invalid(flag, &args[0], &e.to_string()))?;
                Action::Wait(wait)
            }
            "--wait-for" => Action::WaitFor(arg(0)),
            "--wait-for-text" => Action::WaitForText { id: arg(0), text: arg(1) },
            "--wait-until-gone" => Action::WaitUntilGone(arg(0)),
            "--dismiss-keyboard" => Action::DismissKeyboard,
            "--keyboard-shown" => Action::KeyboardShown,
            "--press-key" => Action::PressKey(arg(0)),
            "--accept-alert" => Action::AcceptAlert,
            "--dismiss-alert" => Action::DismissAlert,
            "--get-alert" => Action::GetAlert,
            "--swipe" => Action::Swipe(direction(flag, &args[0])?),
            "--scroll" => Action::Scroll(direction(flag, &args[0])?),
            "--scroll-to" => Action::ScrollTo(arg(0)),
            "--tap-coords" => Action::TapCoords {
                x: number(flag, &args[0])?,
                y: number(flag, &args[1])?,
            },
            "--drag" => Action::Drag {
                id: arg(0),
                dx: number(flag, &args[1])?,
                dy: number(flag, &args[2])?,
                duration: match args.get(3) {
                    Some(d) => positive(flag, d)?,
                    None => 1.0,
                },
            },
            "--drag-to" => Action::DragTo { source: arg(0), target: arg(1) },
            "--pinch" => Action::Pinch {
                id: arg(0),
                scale: positive(flag, &args[1])?,
            },
            "--set-slider" => {
                let raw: f64 = number(flag, &args[1])?;
                if !raw.is_finite() {
                    return Err(invalid(flag, &args[1], "must be a number"));
                }
                Action::SetSlider {
                    id: arg(0),
                    value: normalize_slider(raw),
                }
            }
            "--activate" => Action::Activate,
            "--terminate" => Action::Terminate,
            "--install" => Action::Install(arg(0)),
            "--remove-app" => Action::RemoveApp,
            "--is-installed" => Action::IsInstalled,
            "--reset-app" => Action::ResetApp,
            "--background" => Action::Background(number(flag, &args[0])?),
            "--press-back" => Action::PressBack,
            "--press-home" => Action::PressHome,
            "--get-orientation" => Action::GetOrientation,
            "--set-orientation" => {
                let o = args[0].to_uppercase();
                if o != "PORTRAIT" && o != "LANDSCAPE" {
                    return Err(invalid(flag, &args[0], "expected PORTRAIT or LANDSCAPE"));
                }
                Action::SetOrientation(o)
            }
            "--window-size" => Action::WindowSize,
            "--contexts" => Action::Contexts,
            "--switch-context" => Action::SwitchContext(arg(0)),
            "--screenshot" => Action::Screenshot(PathBuf::from(&args[0])),
            "--page-source" => Action::PageSource,
            "--list-buttons" => Action::ListButtons,
            "--list-elements" => Action::ListElements,
            "--find-text" => Action::FindText(arg(0)),
            "--get-rect" => Action::GetRect(arg(0)),
            other => return Err(invalid(other, "", "not an action flag")),
        };
        Ok(action)
    }
}

/// Maps a slider input to `[0, 1]`.
///
/// Values above 1 are read as percentages; the result is clamped.
pub fn normalize_slider(value: f64) -> f64 {
    let v = if value > 1.0 { value / 100.0 } else { value };
    v.clamp(0.0, 1.0)
}

fn invalid(flag: &str, value: &str, reason: &str) -> ParseError {
    ParseError::InvalidValue {
        flag: flag.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn number<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, ParseError>
where
    T::Err: fmt::Display,
{
    let parsed: T = value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(flag, value, &e.to_string()))?;
    Ok(parsed)
}

fn positive(flag: &str, value: &str) -> Result<f64, ParseError> {
    let v: f64 = number(flag, value)?;
    if !v.is_finite() || v <= 0.0 {
        return Err(invalid(flag, value, "must be a positive number"));
    }
    Ok(v)
}

fn direction(flag: &str, value: &str) -> Result<Direction, ParseError> {
    value.parse().map_err(|reason: String| invalid(flag, value, &reason))
}

/// Order-preserving action flag parser.
pub struct ActionParser;

impl ActionParser {
    /// Parses every action flag in `args`, in order, ignoring other tokens.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Vec<Action>, ParseError> {
        Self::split(args).map(|(actions, _)| actions)
    }

    /// Separates action flags from everything else.
    ///
    /// Returns the actions in argument order and the remaining tokens (also
    /// in order) for the option parser.
    pub fn split<S: AsRef<str>>(args: &[S]) -> Result<(Vec<Action>, Vec<String>), ParseError> {
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        let mut actions = Vec::new();
        let mut rest = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let token = args[i];
            let Some(spec) = flag_spec(token) else {
                rest.push(token.to_string());
                i += 1;
                continue;
            };

            let values: Vec<String> = match spec.arity {
                Fixed(n) => {
                    let available: Vec<&str> = args[i + 1..]
                        .iter()
                        .take(n)
                        .take_while(|t| flag_spec(t).is_none())
                        .copied()
                        .collect();
                    if available.len() < n {
                        return Err(ParseError::MissingArguments {
                            flag: token.to_string(),
                            expected: spec.arity,
                            found: available.len(),
                        });
                    }
                    available.into_iter().map(str::to_string).collect()
                }
                Range(min, max) => {
                    let collected: Vec<String> = args[i + 1..]
                        .iter()
                        .take_while(|t| !t.starts_with("--"))
                        .take(max)
                        .map(|t| t.to_string())
                        .collect();
                    if collected.len() < min {
                        return Err(ParseError::MissingArguments {
                            flag: token.to_string(),
                            expected: spec.arity,
                            found: collected.len(),
                        });
                    }
                    collected
                }
            };

            i += 1 + values.len();
            actions.push(Action::from_flag(token, &values)?);
        }

        Ok((actions, rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn preserves_argument_order() {
        let actions = ActionParser::parse(&args("--wait-for A --tap B --wait 1")).unwrap();
        assert_eq!(
            actions,
            vec![
                Action::WaitFor("A".into()),
                Action::Tap("B".into()),
                Action::Wait(Duration::from_secs(1)),
            ]
        );
    }

    #[test]
    fn repeated_flags_are_kept_in_place() {
        let actions = ActionParser::parse(&args("--tap A --exists B --tap C")).unwrap();
        let names: Vec<&str> = actions.iter().map(Action::name).collect();
        assert_eq!(names, vec!["tap", "exists", "tap"]);
        assert_eq!(actions[2], Action::Tap("C".into()));
    }

    #[test]
    fn split_returns_remaining_tokens() {
        let (actions, rest) = ActionParser::split(&args(
            "--platform ios --tap Login --app-id com.example --keep-session",
        ))
        .unwrap();
        assert_eq!(actions, vec![Action::Tap("Login".into())]);
        assert_eq!(
            rest,
            args("--platform ios --app-id com.example --keep-session")
        );
    }

    #[test]
    fn drag_takes_three_or_four_arguments() {
        let actions = ActionParser::parse(&args("--drag Slider 50 0 --tap X")).unwrap();
        assert_eq!(
            actions[0],
            Action::Drag { id: "Slider".into(), dx: 50, dy: 0, duration: 1.0 }
        );
        assert_eq!(actions[1], Action::Tap("X".into()));

        let actions = ActionParser::parse(&args("--drag Slider 50 0 2.5 leftover")).unwrap();
        assert_eq!(
            actions[0],
            Action::Drag { id: "Slider".into(), dx: 50, dy: 0, duration: 2.5 }
        );
        let (_, rest) = ActionParser::split(&args("--drag Slider 50 0 2.5 leftover")).unwrap();
        assert_eq!(rest, args("leftover"));
    }

    #[test]
    fn drag_with_too_few_arguments_fails() {
        let err = ActionParser::parse(&args("--drag Slider 10 --tap X")).unwrap_err();
        assert_eq!(
            err,
            ParseError::MissingArguments {
                flag: "--drag".into(),
                expected: Arity::Range(3, 4),
                found: 2,
            }
        );
    }

    #[test]
    fn missing_fixed_arguments_fail() {
        assert!(matches!(
            ActionParser::parse(&args("--type Email")),
            Err(ParseError::MissingArguments { found: 1, .. })
        ));
        // An action flag is never swallowed as another flag's argument.
        assert!(ActionParser::parse(&args("--tap --wait 1")).is_err());
    }

    #[test]
    fn malformed_numbers_fail() {
        assert!(matches!(
            ActionParser::parse(&args("--wait abc")),
            Err(ParseError::InvalidValue { .. })
        ));
        assert!(ActionParser::parse(&args("--wait -1")).is_err());
        assert!(matches!(
            ActionParser::parse(&args("--wait 1e30")),
            Err(ParseError::InvalidValue { .. })
        ));
        assert!(ActionParser::parse(&args("--tap-coords 10 y")).is_err());
        assert!(ActionParser::parse(&args("--swipe sideways")).is_err());
        assert!(ActionParser::parse(&args("--set-orientation upside")).is_err());
    }

    #[test]
    fn zero_arity_flags() {
        let actions = ActionParser::parse(&args("--dismiss-keyboard --page-source --activate")).unwrap();
        assert_eq!(
            actions,
            vec![Action::DismissKeyboard, Action::PageSource, Action::Activate]
        );
    }

    #[test]
    fn fixed_arguments_may_start_with_dashes() {
        let actions = ActionParser::parse(&args("--type Field --verbose-text")).unwrap();
        assert_eq!(
            actions[0],
            Action::Type { id: "Field".into(), text: "--verbose-text".into() }
        );
    }

    #[test]
    fn slider_normalization() {
        assert_eq!(normalize_slider(50.0), 0.5);
        assert_eq!(normalize_slider(0.5), 0.5);
        assert_eq!(normalize_slider(150.0), 1.0);
        assert_eq!(normalize_slider(-3.0), 0.0);
        assert_eq!(normalize_slider(1.0), 1.0);

        let a = ActionParser::parse(&args("--set-slider S 50")).unwrap();
        let b = ActionParser::parse(&args("--set-slider S 0.5")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn only_expect_is_an_assertion() {
        let all = ActionParser::parse(&args("--expect A b --exists A --wait-for A")).unwrap();
        let flags: Vec<bool> = all.iter().map(Action::is_assertion).collect();
        assert_eq!(flags, vec![true, false, false]);
    }

    #[test]
    fn every_flag_is_unique_and_documented() {
        let mut seen = std::collections::HashSet::new();
        for s in ACTION_FLAGS {
            assert!(seen.insert(s.flag), "duplicate flag {}", s.flag);
            assert!(!s.help.is_empty());
        }
        let help = help_table();
        assert!(help.contains("--drag ID DX DY [DUR]"));
        assert!(help.contains("--get-rect ID"));
    }

    #[test]
    fn no_actions_is_empty() {
        assert!(ActionParser::parse(&args("--platform ios")).unwrap().is_empty());
    }
}
