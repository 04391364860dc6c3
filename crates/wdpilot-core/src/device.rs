//! Device discovery and simulator boot.
//!
//! [`DeviceInventory`] is the seam the session manager uses to pick a device
//! when none is given. [`LocalDeviceInventory`] implements it by shelling out
//! to `xcrun simctl` (iOS simulators) and `adb` (Android devices and
//! emulators). Mac-hosted apps always run on the local machine, whose device
//! id is the literal `mac`.
//!
//! # Example
//!
//! ```no_run
//! use wdpilot_core::device::{DeviceInventory, LocalDeviceInventory};
//! use wdpilot_core::platform::Platform;
//!
//! let inventory = LocalDeviceInventory;
//! for device in inventory.list_devices(Platform::Ios).unwrap() {
//!     println!("{} {} ({})", device.udid, device.name, device.state);
//! }
//! ```

use std::collections::BTreeMap;
use std::process::Command;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::platform::Platform;

/// Device id used for Mac-hosted apps.
pub const MAC_DEVICE_ID: &str = "mac";

/// Errors that can occur when querying devices.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// A device tool exited with an error.
    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    /// No usable device is available.
    #[error("{0}")]
    NoDevice(String),

    /// Failed to parse tool output.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The tool could not be executed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A device or simulator that can host the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub udid: String,
    pub name: String,
    pub platform: Platform,
    /// OS version, when the tool reports one.
    pub version: Option<String>,
    /// Tool-specific state (`Booted`, `Shutdown`, `device`, ...).
    pub state: String,
}

impl DeviceInfo {
    /// True when the device can accept a session right now.
    pub fn is_ready(&self) -> bool {
        matches!(self.state.as_str(), "Booted" | "device")
    }
}

/// Source of devices for a platform.
pub trait DeviceInventory: Send + Sync {
    /// Lists every device for `platform`.
    fn list_devices(&self, platform: Platform) -> Result<Vec<DeviceInfo>, DeviceError>;

    /// Picks a ready device for `platform`.
    fn auto_detect(&self, platform: Platform) -> Result<String, DeviceError> {
        if platform == Platform::MacCatalyst {
            return Ok(MAC_DEVICE_ID.to_string());
        }
        self.list_devices(platform)?
            .into_iter()
            .find(DeviceInfo::is_ready)
            .map(|d| d.udid)
            .ok_or_else(|| DeviceError::NoDevice(no_device_hint(platform).to_string()))
    }
}

fn no_device_hint(platform: Platform) -> &'static str {
    match platform {
        Platform::Ios => "No booted iOS simulator found. Boot one with: xcrun simctl boot \"iPhone 15\"",
        Platform::Android => "No Android device found. Start an emulator with: emulator -avd <name>",
        Platform::MacCatalyst => "No Mac device available",
    }
}

/// Device inventory backed by `xcrun simctl` and `adb`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDeviceInventory;

impl DeviceInventory for LocalDeviceInventory {
    fn list_devices(&self, platform: Platform) -> Result<Vec<DeviceInfo>, DeviceError> {
        match platform {
            Platform::Ios => {
                let stdout = run("xcrun", &["simctl", "list", "devices", "-j"])?;
                parse_simctl_devices(&stdout)
            }
            Platform::Android => {
                let stdout = run("adb", &["devices", "-l"])?;
                Ok(parse_adb_devices(&String::from_utf8_lossy(&stdout)))
            }
            Platform::MacCatalyst => Ok(vec![DeviceInfo {
                udid: MAC_DEVICE_ID.to_string(),
                name: "This Mac".to_string(),
                platform: Platform::MacCatalyst,
                version: None,
                state: "Booted".to_string(),
            }]),
        }
    }
}

impl LocalDeviceInventory {
    /// Boots an iOS simulator by name or UDID and returns its UDID.
    ///
    /// A simulator that is already booted is not an error.
    pub fn boot_simulator(&self, name_or_udid: &str) -> Result<String, DeviceError> {
        let matches = |d: &DeviceInfo| d.udid == name_or_udid || d.name == name_or_udid;

        let devices = self.list_devices(Platform::Ios)?;
        if let Some(device) = devices.iter().find(|d| matches(d) && d.is_ready()) {
            debug!(udid = %device.udid, "simulator already booted");
            return Ok(device.udid.clone());
        }

        let output = Command::new("xcrun")
            .args(["simctl", "boot", name_or_udid])
            .output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.contains("current state: Booted") {
                return Err(DeviceError::CommandFailed(stderr.trim().to_string()));
            }
        }

        Ok(self
            .list_devices(Platform::Ios)?
            .into_iter()
            .find(|d| matches(d) && d.is_ready())
            .map(|d| d.udid)
            .unwrap_or_else(|| name_or_udid.to_string()))
    }
}

fn run(program: &str, args: &[&str]) -> Result<Vec<u8>, DeviceError> {
    let output = Command::new(program).args(args).output()?;
    if !output.status.success() {
        return Err(DeviceError::CommandFailed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(output.stdout)
}

#[derive(Debug, Deserialize)]
struct SimctlDevice {
    udid: String,
    name: String,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SimctlDeviceList {
    devices: BTreeMap<String, Vec<SimctlDevice>>,
}

/// Parses `xcrun simctl list devices -j` output, keeping iOS runtimes only.
pub fn parse_simctl_devices(json: &[u8]) -> Result<Vec<DeviceInfo>, DeviceError> {
    let list: SimctlDeviceList = serde_json::from_slice(json)?;
    Ok(list
        .devices
        .into_iter()
        .filter(|(runtime, _)| runtime.contains("iOS"))
        .flat_map(|(runtime, devices)| {
            let version = runtime
                .split_once("iOS-")
                .map(|(_, v)| v.replace('-', "."));
            devices.into_iter().map(move |d| DeviceInfo {
                udid: d.udid,
                name: d.name,
                platform: Platform::Ios,
                version: version.clone(),
                state: d.state.unwrap_or_else(|| "unknown".to_string()),
            })
        })
        .collect())
}

/// Parses `adb devices -l` output.
pub fn parse_adb_devices(output: &str) -> Vec<DeviceInfo> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let udid = parts.next()?;
            let state = parts.next()?;
            if state != "device" {
                return None;
            }
            let name = parts
                .find_map(|p| p.strip_prefix("model:"))
                .unwrap_or("Unknown");
            Some(DeviceInfo {
                udid: udid.to_string(),
                name: name.to_string(),
                platform: Platform::Android,
                version: None,
                state: state.to_string(),
            })
        })
        .collect()
}
