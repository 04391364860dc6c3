//! Per-platform attribute vocabulary.
//!
//! iOS, Android and Mac-hosted apps expose the same logical concepts (an
//! element's identifier, its visible text, its value) under different
//! accessibility-tree attribute names. [`AttributeVocabulary`] is the single
//! place that knows those names. It is a pure lookup table: every method is a
//! deterministic function of the platform tag and its arguments.
//!
//! # Example
//!
//! ```
//! use wdpilot_core::platform::Platform;
//! use wdpilot_core::vocabulary::{AttributeVocabulary, Using};
//!
//! let vocab = AttributeVocabulary::new(Platform::Android);
//! let strategies = vocab.strategies_for("Submit", "com.example.app");
//! assert_eq!(strategies[0].using, Using::AccessibilityId);
//! assert_eq!(strategies.last().unwrap().value, "com.example.app:id/Submit");
//! ```

use std::fmt;

use serde_json::{json, Value};

use crate::platform::Platform;

/// A WebDriver element lookup strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Using {
    /// Accessibility identifier (`accessibility id`).
    AccessibilityId,
    /// Platform element id (`id`).
    Id,
    /// Element name (`name`).
    Name,
    /// XPath query over the accessibility tree (`xpath`).
    XPath,
    /// Element class or type (`class name`).
    ClassName,
}

impl Using {
    /// The strategy string sent to the remote server.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Using::AccessibilityId => "accessibility id",
            Using::Id => "id",
            Using::Name => "name",
            Using::XPath => "xpath",
            Using::ClassName => "class name",
        }
    }
}

/// One rendered lookup: a strategy plus the query value for it.
///
/// A logical identifier expands into an ordered list of these. The order is
/// significant: the most specific and cheapest strategies come first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocatorStrategy {
    /// Which lookup mechanism to use.
    pub using: Using,
    /// The rendered query for that mechanism.
    pub value: String,
}

impl LocatorStrategy {
    /// Creates a strategy from its parts.
    pub fn new(using: Using, value: impl Into<String>) -> Self {
        Self {
            using,
            value: value.into(),
        }
    }

    /// Shorthand for an XPath strategy.
    pub fn xpath(query: impl Into<String>) -> Self {
        Self::new(Using::XPath, query)
    }
}

impl fmt::Display for LocatorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.using.as_wire(), self.value)
    }
}

/// Attributes scanned (in this order) by fuzzy partial-id matching.
pub const FUZZY_ATTRIBUTES: &[&str] = &[
    "name",
    "identifier",
    "resource-id",
    "accessibility-id",
    "content-desc",
];

/// Attributes tried (in this order) when naming a button in a listing.
pub const BUTTON_LABEL_ATTRIBUTES: &[&str] = &[
    "label",
    "title",
    "text",
    "content-desc",
    "identifier",
    "name",
    "value",
];

/// Attributes tried (in this order) for the display id of a listed element.
pub const SUMMARY_ID_ATTRIBUTES: &[&str] = &["identifier", "resource-id", "name"];

/// Attributes tried (in this order) for the display text of a listed element.
pub const SUMMARY_TEXT_ATTRIBUTES: &[&str] = &["label", "text", "value", "title"];

/// Renders `text` as an XPath 1.0 string literal.
///
/// XPath has no escape sequences, so text containing both quote kinds is
/// split into a `concat(...)` expression.
pub fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{text}'")
    } else if !text.contains('"') {
        format!("\"{text}\"")
    } else {
        let parts: Vec<String> = text
            .split('\'')
            .map(|part| format!("'{part}'"))
            .collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// Lookup tables for one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeVocabulary {
    platform: Platform,
}

impl AttributeVocabulary {
    /// Creates the vocabulary for `platform`.
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    /// The platform this vocabulary describes.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Expands a logical identifier into its ordered lookup strategies.
    ///
    /// The base strategies are accessibility id, generic id and name. Android
    /// additionally tries the package-qualified resource id
    /// (`{app_id}:id/{identifier}`).
    pub fn strategies_for(&self, identifier: &str, app_id: &str) -> Vec<LocatorStrategy> {
        let mut strategies = vec![
            LocatorStrategy::new(Using::AccessibilityId, identifier),
            LocatorStrategy::new(Using::Id, identifier),
            LocatorStrategy::new(Using::Name, identifier),
        ];
        if self.platform == Platform::Android {
            strategies.push(LocatorStrategy::new(
                Using::Id,
                format!("{app_id}:id/{identifier}"),
            ));
        }
        strategies
    }

    /// Queries used for "tap by visible text": equality queries first, then
    /// containment queries.
    pub fn text_queries(&self, text: &str) -> Vec<LocatorStrategy> {
        let lit = xpath_literal(text);
        let (equal, contain): (&[&str], &[&str]) = if self.platform.is_apple() {
            (&["label", "name", "value"], &["label", "name"])
        } else {
            (&["text", "content-desc"], &["text", "content-desc"])
        };

        equal
            .iter()
            .map(|attr| LocatorStrategy::xpath(format!("//*[@{attr}={lit}]")))
            .chain(
                contain
                    .iter()
                    .map(|attr| LocatorStrategy::xpath(format!("//*[contains(@{attr}, {lit})]"))),
            )
            .collect()
    }

    /// Query for a button whose visible text equals `text`.
    pub fn button_query(&self, text: &str) -> LocatorStrategy {
        let lit = xpath_literal(text);
        if self.platform.is_apple() {
            LocatorStrategy::xpath(format!(
                "//XCUIElementTypeButton[@name={lit} or @label={lit}]"
            ))
        } else {
            LocatorStrategy::xpath(format!(
                "//android.widget.Button[@text={lit} or @content-desc={lit}]"
            ))
        }
    }

    /// Server-side fallback query for fuzzy partial-id matching.
    pub fn contains_query(&self, partial: &str) -> LocatorStrategy {
        let lit = xpath_literal(partial);
        if self.platform.is_apple() {
            LocatorStrategy::xpath(format!("//*[contains(@name, {lit})]"))
        } else {
            LocatorStrategy::xpath(format!(
                "//*[contains(@resource-id, {lit}) or contains(@content-desc, {lit})]"
            ))
        }
    }

    /// Query for every element whose text, label or name matches `text`.
    pub fn find_text_query(&self, text: &str, partial: bool) -> LocatorStrategy {
        let lit = xpath_literal(text);
        if partial {
            LocatorStrategy::xpath(format!(
                "//*[contains(@text, {lit}) or contains(@label, {lit}) or contains(@name, {lit})]"
            ))
        } else {
            LocatorStrategy::xpath(format!(
                "//*[@text={lit} or @label={lit} or @name={lit}]"
            ))
        }
    }

    /// Attribute priority used when extracting an element's displayed text.
    pub fn text_attributes(&self) -> &'static [&'static str] {
        if self.platform.is_apple() {
            &["value", "label", "name"]
        } else {
            &["text", "content-desc", "value"]
        }
    }

    /// Element class name of a push button.
    pub fn button_class(&self) -> &'static str {
        if self.platform.is_apple() {
            "XCUIElementTypeButton"
        } else {
            "android.widget.Button"
        }
    }

    /// Attribute holding an element's class or type name.
    pub fn type_attribute(&self) -> &'static str {
        if self.platform.is_apple() {
            "type"
        } else {
            "class"
        }
    }

    /// Fully qualified vendor extension command (`mobile: name`, or
    /// `macos: name` for Mac-hosted apps).
    pub fn extension(&self, name: &str) -> String {
        match self.platform {
            Platform::MacCatalyst => format!("macos: {name}"),
            _ => format!("mobile: {name}"),
        }
    }

    /// Argument object naming the app for lifecycle extensions.
    pub fn app_argument(&self, app_id: &str) -> Value {
        if self.platform.is_apple() {
            json!({ "bundleId": app_id })
        } else {
            json!({ "appId": app_id })
        }
    }

    /// Vendor extension that taps at screen coordinates, with its arguments.
    pub fn tap_command(&self, x: i32, y: i32) -> (&'static str, Value) {
        match self.platform {
            Platform::Ios => ("mobile: tap", json!({ "x": x, "y": y })),
            Platform::Android => ("mobile: clickGesture", json!({ "x": x, "y": y })),
            Platform::MacCatalyst => ("macos: click", json!({ "x": x, "y": y })),
        }
    }
}
