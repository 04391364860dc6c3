//! Flag-driven CLI for scripting UI actions through a WebDriver automation server.
//!
//! Action flags run in the order they appear on the command line; the
//! remaining flags configure the connection and session policy.
//!
//! # Usage
//!
//! ```bash
//! # Tap, type and assert against an iOS app
//! wdpilot --platform ios --app-id com.example.app \
//!     --tap Login --type Email me@example.com --expect Title Welcome
//!
//! # Keep the session alive so the next call reattaches instantly
//! wdpilot --platform android --app-id com.example.app --keep-session --reuse-session \
//!     --wait-for Home --screenshot home.png
//!
//! # Device and server management
//! wdpilot --list-devices
//! wdpilot --boot-simulator "iPhone 15"
//! wdpilot --start-server
//! wdpilot --end-session
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{CommandFactory, FromArgMatches, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use wdpilot_core::action::{help_table, Action, ActionParser};
use wdpilot_core::config::WdpilotConfig;
use wdpilot_core::device::{DeviceInventory, LocalDeviceInventory};
use wdpilot_core::orchestrator::{ActionOrchestrator, Timeouts};
use wdpilot_core::platform::Platform;
use wdpilot_core::server::{endpoint_of, AppiumSupervisor, ServerSupervisor};
use wdpilot_core::session::{ConnectConfig, SessionError, SessionManager};
use wdpilot_core::session_store::SessionStore;

/// Script UI actions against iOS, Android and Mac apps through Appium.
#[derive(Parser, Debug)]
#[command(name = "wdpilot")]
#[command(version)]
struct Cli {
    /// Target platform: ios, android or maccatalyst
    #[arg(long, env = "WDPILOT_PLATFORM")]
    platform: Option<Platform>,

    /// App identifier (bundle id or package name)
    #[arg(long, env = "WDPILOT_APP_ID")]
    app_id: Option<String>,

    /// Device UDID (auto-detected when omitted)
    #[arg(long, env = "WDPILOT_UDID")]
    udid: Option<String>,

    /// Automation server URL
    #[arg(long, env = "WDPILOT_SERVER_URL")]
    server_url: Option<String>,

    /// Path to an .app/.apk to install at session start
    #[arg(long)]
    app_path: Option<String>,

    /// Reset app state at session start
    #[arg(long)]
    full_reset: bool,

    /// Do not grant Android runtime permissions automatically
    #[arg(long)]
    no_auto_grant: bool,

    /// Default element lookup timeout in seconds
    #[arg(long, env = "WDPILOT_TIMEOUT")]
    timeout: Option<f64>,

    /// Keep the session alive after this run so it can be reused
    #[arg(long)]
    keep_session: bool,

    /// Reattach to a cached session when one is alive
    #[arg(long)]
    reuse_session: bool,

    /// End every cached session and exit
    #[arg(long)]
    end_session: bool,

    /// Directory holding cached session records
    #[arg(long, env = "WDPILOT_SESSION_DIR")]
    session_dir: Option<PathBuf>,

    /// List available simulators and devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Boot an iOS simulator by name or UDID and exit
    #[arg(long, value_name = "NAME|UDID")]
    boot_simulator: Option<String>,

    /// Start the automation server and exit
    #[arg(long)]
    start_server: bool,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug)]
enum CliError {
    /// Invalid or missing arguments.
    Usage(String),
    /// The server or a fresh session could not be reached.
    Connection(String),
    /// A device or local tool command failed.
    Device(String),
    /// Writing results failed.
    Io(std::io::Error),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Connection(_) => ExitCode::from(2),
            CliError::Usage(_) | CliError::Device(_) | CliError::Io(_) => ExitCode::from(1),
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{}", msg),
            CliError::Connection(msg) => write!(f, "Connection error: {}", msg),
            CliError::Device(msg) => write!(f, "Device error: {}", msg),
            CliError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let mut argv = std::env::args();
    let program = argv.next().unwrap_or_else(|| "wdpilot".to_string());
    let argv: Vec<String> = argv.collect();

    // Action flags are pulled out first so their order survives; clap only
    // sees the connection and policy flags.
    let (actions, rest) = match ActionParser::split(argv.as_slice()) {
        Ok(split) => split,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(1);
        }
    };

    let matches = Cli::command()
        .after_help(format!("Actions (run in command-line order):\n{}", help_table()))
        .get_matches_from(std::iter::once(program).chain(rest));
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    let default_filter = if cli.verbose {
        "wdpilot=debug,wdpilot_core=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli, actions).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            if matches!(e, CliError::Connection(_)) {
                eprintln!("Start manually with: appium --relaxed-security");
            }
            e.exit_code()
        }
    }
}

async fn run(cli: Cli, actions: Vec<Action>) -> Result<ExitCode, CliError> {
    let config = WdpilotConfig::load();
    let server_url = cli
        .server_url
        .clone()
        .unwrap_or_else(|| config.server_url().to_string());
    let session_dir = cli.session_dir.clone().unwrap_or_else(|| config.session_dir());
    let supervisor = AppiumSupervisor::new(config.relaxed_security());

    // Commands that don't need a session
    if cli.list_devices {
        list_devices();
        return Ok(ExitCode::SUCCESS);
    }
    if let Some(name) = &cli.boot_simulator {
        let udid = LocalDeviceInventory
            .boot_simulator(name)
            .map_err(|e| CliError::Device(e.to_string()))?;
        println!("Booted: {}", udid);
        return Ok(ExitCode::SUCCESS);
    }
    if cli.start_server {
        if supervisor.is_running(&server_url).await {
            println!("Server already running");
        } else {
            start_server(&supervisor, &server_url).await?;
            println!("Server started");
        }
        return Ok(ExitCode::SUCCESS);
    }
    if cli.end_session {
        let store = SessionStore::new(&session_dir);
        let ended = SessionManager::end_all(&store, &server_url).await;
        println!("All cached sessions ended ({})", ended);
        return Ok(ExitCode::SUCCESS);
    }

    let (Some(platform), Some(app_id)) = (cli.platform, cli.app_id.clone()) else {
        return Err(CliError::Usage(
            "--platform and --app-id are required for automation commands".to_string(),
        ));
    };

    if actions.is_empty() {
        println!("No actions specified. Use --help for usage.");
        return Ok(ExitCode::SUCCESS);
    }

    if !supervisor.is_running(&server_url).await {
        eprintln!("Server not running, starting automatically...");
        start_server(&supervisor, &server_url).await?;
        eprintln!("Server started");
    }

    let mut connect = ConnectConfig::new(platform, app_id.clone())
        .server_url(server_url)
        .keep_alive(cli.keep_session)
        .reuse(cli.reuse_session);
    if let Some(udid) = &cli.udid {
        connect = connect.device_id(udid);
    }
    if let Some(path) = &cli.app_path {
        connect = connect.app_path(path);
    }
    connect.no_reset = !cli.full_reset;
    connect.auto_grant_permissions = !cli.no_auto_grant;

    let store = SessionStore::new(&session_dir);
    let mut manager =
        SessionManager::new(connect, store, &LocalDeviceInventory).map_err(|e| match e {
            SessionError::Device(e) => CliError::Device(e.to_string()),
            other => CliError::Connection(other.to_string()),
        })?;
    manager
        .connect()
        .await
        .map_err(|e| CliError::Connection(e.to_string()))?;
    debug!(reused = manager.is_reused(), "session ready");

    let element_timeout = cli.timeout.unwrap_or_else(|| config.default_timeout_secs());
    let timeouts = Timeouts {
        element: Duration::try_from_secs_f64(element_timeout).unwrap_or(Timeouts::default().element),
        ..Timeouts::default()
    };

    let outcome = {
        let driver = manager
            .driver()
            .map_err(|e| CliError::Connection(e.to_string()))?;
        let orchestrator = ActionOrchestrator::new(driver, &app_id).with_timeouts(timeouts);
        let mut stdout = std::io::stdout().lock();
        let outcome = orchestrator.run(&actions, &mut stdout).await;
        stdout.flush()?;
        outcome
    };
    manager.disconnect().await;

    let outcome = outcome?;
    Ok(ExitCode::from(outcome.exit_code() as u8))
}

async fn start_server(supervisor: &AppiumSupervisor, server_url: &str) -> Result<(), CliError> {
    let (_, port) = endpoint_of(server_url).map_err(|e| CliError::Usage(e.to_string()))?;
    supervisor
        .start(port)
        .await
        .map_err(|e| CliError::Connection(format!("failed to start server: {}", e)))
}

fn list_devices() {
    let inventory = LocalDeviceInventory;

    println!("iOS Simulators:");
    match inventory.list_devices(Platform::Ios) {
        Ok(devices) => {
            for d in devices {
                let short: String = d.udid.chars().take(8).collect();
                let status = if d.state == "Booted" { " Booted" } else { "" };
                println!(
                    "  {} ({}...) {}{}",
                    d.name,
                    short,
                    d.version.as_deref().unwrap_or(""),
                    status
                );
            }
        }
        Err(e) => println!("  ({})", e),
    }

    println!("\nAndroid Devices:");
    match inventory.list_devices(Platform::Android) {
        Ok(devices) => {
            for d in devices {
                println!("  {} ({})", d.name, d.udid);
            }
        }
        Err(_) => println!("  (adb not found)"),
    }
}
