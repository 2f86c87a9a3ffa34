//! Observation and finding records shared between samplers, heuristics and
//! the presentation layer. Everything here is plain data; all types
//! serialize to JSON for external consumers.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Maximum rolling event entries kept per service health record.
pub const MAX_HEALTH_EVENTS: usize = 10;

/// One monitored subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Wifi,
    Bluetooth,
    Ble,
    Radio,
    Network,
}

impl Domain {
    pub const ALL: [Domain; 5] = [
        Domain::Wifi,
        Domain::Bluetooth,
        Domain::Ble,
        Domain::Radio,
        Domain::Network,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Wifi => "wifi",
            Domain::Bluetooth => "bluetooth",
            Domain::Ble => "ble",
            Domain::Radio => "radio",
            Domain::Network => "network",
        }
    }

    /// Audience-facing service name, shown in health records.
    pub fn display_name(&self) -> &'static str {
        match self {
            Domain::Wifi => "WiFi Monitoring",
            Domain::Bluetooth => "Bluetooth Monitoring",
            Domain::Ble => "BLE/Tracker Monitoring",
            Domain::Radio => "Radio Frequency Monitoring",
            Domain::Network => "Network Monitoring",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An access point seen during one Wi-Fi sampling pass. Replaced wholesale
/// on each successful sample; the BSSID is unique within one sample set only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WifiAccessPoint {
    pub bssid: String,
    pub signal_dbm: i32,
    pub beacons: u32,
    pub encryption: String,
    /// Empty when the network is hidden.
    pub ssid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WifiClient {
    pub mac: String,
    pub ap_mac: String,
    pub signal_dbm: i32,
    pub lost_packets: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BluetoothDevice {
    pub address: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BleDevice {
    pub address: String,
    /// Raw advertisement text; carries a human-readable annotation when the
    /// manufacturer data suggests an Apple tracker.
    pub data: String,
    pub rssi: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RadioInfo {
    pub has_sdr: bool,
    pub sdr_devices: Vec<String>,
    pub sub_ghz_signals_detected: bool,
    pub monitored_bands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkInfo {
    pub online: bool,
    /// Formatted average latency, e.g. "12.3ms", or "N/A" when offline.
    pub avg_latency: String,
}

impl Default for NetworkInfo {
    fn default() -> Self {
        Self {
            online: false,
            avg_latency: "N/A".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceStatus {
    Running,
    Error,
    Idle,
}

/// Per-domain health record. Created lazily on the first sampling attempt,
/// mutated in place afterwards, never removed for the process lifetime.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub name: String,
    pub status: ServiceStatus,
    pub last_update: DateTime<Utc>,
    /// Empty when healthy.
    pub error: String,
    pub recent_events: VecDeque<String>,
}

impl ServiceHealth {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: ServiceStatus::Idle,
            last_update: Utc::now(),
            error: String::new(),
            recent_events: VecDeque::new(),
        }
    }

    /// Appends a timestamped event, evicting the oldest beyond the cap.
    pub fn push_event(&mut self, message: &str) {
        self.recent_events
            .push_back(format!("[{}] {}", Utc::now().format("%H:%M:%S"), message));
        while self.recent_events.len() > MAX_HEALTH_EVENTS {
            self.recent_events.pop_front();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => f.write_str("Low"),
            Severity::Medium => f.write_str("Medium"),
            Severity::High => f.write_str("High"),
        }
    }
}

/// Fixed finding vocabulary. `UnknownDevice` and `AiConnectionAnomaly` are
/// produced by external consumers of the engine but participate in
/// auto-mitigation, so they live in the shared vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttackKind {
    EvilTwin,
    RogueAp,
    WeakEncryption,
    BluetoothMassScanning,
    BluetoothSpoofing,
    BluetoothMitm,
    SuspiciousPort,
    UnknownDevice,
    AiConnectionAnomaly,
}

impl AttackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttackKind::EvilTwin => "EVIL_TWIN",
            AttackKind::RogueAp => "ROGUE_AP",
            AttackKind::WeakEncryption => "WEAK_ENCRYPTION",
            AttackKind::BluetoothMassScanning => "BLUETOOTH_MASS_SCANNING",
            AttackKind::BluetoothSpoofing => "BLUETOOTH_SPOOFING",
            AttackKind::BluetoothMitm => "BLUETOOTH_MITM",
            AttackKind::SuspiciousPort => "SUSPICIOUS_PORT",
            AttackKind::UnknownDevice => "UNKNOWN_DEVICE",
            AttackKind::AiConnectionAnomaly => "AI_CONNECTION_ANOMALY",
        }
    }
}

impl fmt::Display for AttackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected suspicious condition. Immutable once created; appended to the
/// findings log and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attack {
    #[serde(rename = "type")]
    pub kind: AttackKind,
    pub severity: Severity,
    pub description: String,
    /// Address, SSID or other identifier the finding concerns.
    pub target: String,
    pub timestamp: DateTime<Utc>,
}

impl Attack {
    pub fn new(
        kind: AttackKind,
        severity: Severity,
        description: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            description: description.into(),
            target: target.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_events_are_capped_fifo() {
        let mut health = ServiceHealth::new("WiFi Monitoring");
        for i in 0..11 {
            health.push_event(&format!("event {i}"));
        }
        assert_eq!(health.recent_events.len(), MAX_HEALTH_EVENTS);
        assert!(health.recent_events[0].ends_with("event 1"));
        assert!(health.recent_events[9].ends_with("event 10"));
    }

    #[test]
    fn attack_kind_serializes_to_vocabulary_tags() {
        let json = serde_json::to_string(&AttackKind::BluetoothMassScanning).unwrap();
        assert_eq!(json, "\"BLUETOOTH_MASS_SCANNING\"");
        assert_eq!(AttackKind::EvilTwin.as_str(), "EVIL_TWIN");
    }

    #[test]
    fn network_info_defaults_offline() {
        let info = NetworkInfo::default();
        assert!(!info.online);
        assert_eq!(info.avg_latency, "N/A");
    }
}
