//! # wdpilot-core
//!
//! Core library for scripting UI actions on iOS, Android and Mac Catalyst
//! apps through a W3C WebDriver automation server (Appium).
//!
//! ## Modules
//!
//! - [`session`] - Connect to a server, reuse persisted sessions, disconnect
//! - [`session_store`] - On-disk session records keyed by fingerprint
//! - [`locator`] - Budgeted element resolution across lookup strategies
//! - [`action`] - Action vocabulary and order-preserving argument parsing
//! - [`orchestrator`] - Sequential action execution with assertion gating
//! - [`vocabulary`] - Per-platform attribute names and query builders
//! - [`remote`] / [`client`] - WebDriver HTTP transport
//! - [`device`] - Local simulator/emulator inventory
//! - [`server`] - Local automation-server supervision
//!
//! ## Example
//!
//! ```no_run
//! use wdpilot_core::action::ActionParser;
//! use wdpilot_core::device::LocalDeviceInventory;
//! use wdpilot_core::orchestrator::ActionOrchestrator;
//! use wdpilot_core::platform::Platform;
//! use wdpilot_core::session::{ConnectConfig, SessionManager};
//! use wdpilot_core::session_store::SessionStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConnectConfig::new(Platform::Ios, "com.example.app");
//! let store = SessionStore::new(std::env::temp_dir().join("wdpilot-sessions"));
//! let mut manager = SessionManager::new(config, store, &LocalDeviceInventory)?;
//!
//! let actions = ActionParser::parse(&["--tap", "Login"])?;
//! manager.connect().await?;
//! let outcome = {
//!     let driver = manager.driver()?;
//!     ActionOrchestrator::new(driver, "com.example.app")
//!         .run(&actions, &mut std::io::stdout())
//!         .await?
//! };
//! manager.disconnect().await;
//! std::process::exit(outcome.exit_code());
//! # }
//! ```

pub mod action;
pub mod client;
pub mod config;
pub mod device;
pub mod driver;
pub mod element;
pub mod gesture;
pub mod locator;
pub mod orchestrator;
pub mod platform;
pub mod remote;
pub mod server;
pub mod session;
pub mod session_store;
pub mod tree;
pub mod vocabulary;

#[cfg(test)]
pub(crate) mod test_support;
