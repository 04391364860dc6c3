//! Target platform tag.
//!
//! Every platform-dependent decision in the crate (capabilities, locator
//! expansion, text attribute priority, vendor gesture commands) is keyed by
//! [`Platform`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A target platform exposed by the remote automation server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// iOS simulator or device (XCUITest driver).
    Ios,
    /// Android emulator or device (UiAutomator2 driver).
    Android,
    /// Mac-hosted app (Mac2 driver).
    #[serde(rename = "maccatalyst")]
    MacCatalyst,
}

impl Platform {
    /// The lowercase tag used on the command line and in cache fingerprints.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::MacCatalyst => "maccatalyst",
        }
    }

    /// Returns true for platforms whose accessibility tree uses the Apple
    /// attribute vocabulary (`label`, `name`, `value`).
    pub fn is_apple(&self) -> bool {
        matches!(self, Platform::Ios | Platform::MacCatalyst)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a platform tag is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown platform '{0}' (expected ios, android or maccatalyst)")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            "maccatalyst" | "mac" => Ok(Platform::MacCatalyst),
            _ => Err(UnknownPlatform(s.to_string())),
        }
    }
}
