//! # rfsentry
//!
//! Host-local radio and network posture monitor for Linux.
//!
//! Five samplers (Wi-Fi, Bluetooth classic, BLE/trackers, radio/SDR,
//! network) shell out to the usual system tools on independent cadences,
//! publish their observations into a shared store, and feed pure detection
//! heuristics whose findings accumulate in a bounded log. An optional
//! mitigation layer can block offending addresses through whatever firewall
//! frontend the host carries.
//!
//! ## Quick start
//!
//! ```no_run
//! use rfsentry::{Monitor, MonitorConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let _guards = rfsentry::logging::init(std::path::Path::new("."));
//!     let monitor = Monitor::new(MonitorConfig::from_env());
//!     monitor.start_all().await;
//!     tokio::signal::ctrl_c().await.ok();
//!     monitor.close().await;
//! }
//! ```

pub mod blocker;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod findings;
pub mod invoke;
pub mod logging;
pub mod models;
pub mod samplers;
pub mod store;

pub use blocker::{BlockedItems, Blocker, Enforcer, ShellEnforcer};
pub use config::MonitorConfig;
pub use engine::Monitor;
pub use error::{DetectorError, Result};
pub use findings::{FindingsLog, MAX_FINDINGS};
pub use models::{
    Attack, AttackKind, BleDevice, BluetoothDevice, Domain, NetworkInfo, RadioInfo,
    ServiceHealth, ServiceStatus, Severity, WifiAccessPoint, WifiClient,
};
pub use samplers::{is_wireless_interface, list_wireless_interfaces};
pub use store::{ObservationStore, WifiSample};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Check if running with the privileges most samplers and every mitigation
/// path want. Non-root still works where sudo is configured; the tool
/// invoker falls back to it on permission-shaped failures.
pub fn check_privileges() -> bool {
    crate::invoke::running_as_root()
}
