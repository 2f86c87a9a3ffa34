use std::env;
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_WIFI_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_BLUETOOTH_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_BLE_INTERVAL_SECS: u64 = 45;
pub const DEFAULT_RADIO_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_NETWORK_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PORT_SCAN_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_PING_TARGET: &str = "8.8.8.8";
pub const DEFAULT_PING_COUNT: u32 = 3;
pub const DEFAULT_SCAN_SUBNET: &str = "192.168.1.0/24";
pub const DEFAULT_DEAUTH_PACKETS: u32 = 10;

/// Engine configuration. Loadable from a deserialized config file or from
/// `RFSENTRY_*` environment variables; unset values fall back to defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub wifi_interval_secs: u64,
    pub bluetooth_interval_secs: u64,
    pub ble_interval_secs: u64,
    pub radio_interval_secs: u64,
    pub network_interval_secs: u64,
    /// Bound applied to every external tool invocation.
    pub tool_timeout_secs: u64,
    /// Separate, longer bound for the nmap subnet sweep.
    pub port_scan_timeout_secs: u64,
    pub ping_target: String,
    pub ping_count: u32,
    /// Subnet swept for suspicious open ports.
    pub scan_subnet: String,
    /// Deauthentication burst size per mitigation call.
    pub deauth_packets: u32,
    /// Whether findings trigger automatic mitigation at startup.
    pub auto_block: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            wifi_interval_secs: DEFAULT_WIFI_INTERVAL_SECS,
            bluetooth_interval_secs: DEFAULT_BLUETOOTH_INTERVAL_SECS,
            ble_interval_secs: DEFAULT_BLE_INTERVAL_SECS,
            radio_interval_secs: DEFAULT_RADIO_INTERVAL_SECS,
            network_interval_secs: DEFAULT_NETWORK_INTERVAL_SECS,
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
            port_scan_timeout_secs: DEFAULT_PORT_SCAN_TIMEOUT_SECS,
            ping_target: DEFAULT_PING_TARGET.to_string(),
            ping_count: DEFAULT_PING_COUNT,
            scan_subnet: DEFAULT_SCAN_SUBNET.to_string(),
            deauth_packets: DEFAULT_DEAUTH_PACKETS,
            auto_block: false,
        }
    }
}

impl MonitorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            wifi_interval_secs: env_u64("RFSENTRY_WIFI_INTERVAL", defaults.wifi_interval_secs),
            bluetooth_interval_secs: env_u64(
                "RFSENTRY_BLUETOOTH_INTERVAL",
                defaults.bluetooth_interval_secs,
            ),
            ble_interval_secs: env_u64("RFSENTRY_BLE_INTERVAL", defaults.ble_interval_secs),
            radio_interval_secs: env_u64("RFSENTRY_RADIO_INTERVAL", defaults.radio_interval_secs),
            network_interval_secs: env_u64(
                "RFSENTRY_NETWORK_INTERVAL",
                defaults.network_interval_secs,
            ),
            tool_timeout_secs: env_u64("RFSENTRY_TOOL_TIMEOUT", defaults.tool_timeout_secs),
            port_scan_timeout_secs: env_u64(
                "RFSENTRY_PORT_SCAN_TIMEOUT",
                defaults.port_scan_timeout_secs,
            ),
            ping_target: env::var("RFSENTRY_PING_TARGET").unwrap_or(defaults.ping_target),
            ping_count: env_u64("RFSENTRY_PING_COUNT", u64::from(defaults.ping_count)) as u32,
            scan_subnet: env::var("RFSENTRY_SCAN_SUBNET").unwrap_or(defaults.scan_subnet),
            deauth_packets: env_u64("RFSENTRY_DEAUTH_PACKETS", u64::from(defaults.deauth_packets))
                as u32,
            auto_block: env_bool("RFSENTRY_AUTO_BLOCK", defaults.auto_block),
        }
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn port_scan_timeout(&self) -> Duration {
        Duration::from_secs(self.port_scan_timeout_secs)
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let cfg = MonitorConfig::default();
        assert_eq!(cfg.tool_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.ping_target, "8.8.8.8");
        assert_eq!(cfg.deauth_packets, 10);
        assert!(!cfg.auto_block);
    }

    #[test]
    fn env_override_applies() {
        std::env::set_var("RFSENTRY_TOOL_TIMEOUT", "3");
        std::env::set_var("RFSENTRY_AUTO_BLOCK", "true");
        let cfg = MonitorConfig::from_env();
        assert_eq!(cfg.tool_timeout_secs, 3);
        assert!(cfg.auto_block);
        std::env::remove_var("RFSENTRY_TOOL_TIMEOUT");
        std::env::remove_var("RFSENTRY_AUTO_BLOCK");
    }
}
