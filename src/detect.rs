//! Detection heuristics: pure functions from a sample set to findings.
//! No I/O, no shared state; the engine loop is responsible for appending
//! results to the findings log and triggering auto-mitigation.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{Attack, AttackKind, BluetoothDevice, Severity, WifiAccessPoint};

/// SSID fragments that mark an access point as a likely rogue/bait network.
pub const ROGUE_SSID_WORDS: [&str; 8] = [
    "free", "public", "hack", "test", "evil", "wifi", "guest", "default",
];

/// Bluetooth device-name fragments suggesting a spoofed or hostile device.
pub const SPOOF_NAME_WORDS: [&str; 8] = [
    "attack", "hack", "exploit", "test", "spoof", "evil", "malware", "virus",
];

/// Bluetooth device-name fragments suggesting a man-in-the-middle relay.
pub const MITM_NAME_WORDS: [&str; 4] = ["proxy", "gateway", "bridge", "intercept"];

/// Device count above which one sampling pass is considered mass scanning.
pub const MASS_SCAN_THRESHOLD: usize = 20;

const SUSPICIOUS_PORTS: [(&str, &str); 4] = [
    ("21/tcp", "FTP"),
    ("23/tcp", "Telnet"),
    ("3389/tcp", "RDP"),
    ("445/tcp", "SMB"),
];

/// Wi-Fi heuristics: evil twins, rogue SSIDs, weak encryption.
pub fn wifi_attacks(access_points: &[WifiAccessPoint]) -> Vec<Attack> {
    let mut attacks = Vec::new();

    // Evil twin: the same non-hidden SSID advertised by two or more BSSIDs.
    let mut by_ssid: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for ap in access_points {
        if !ap.ssid.is_empty() && ap.ssid != "Hidden" {
            by_ssid.entry(&ap.ssid).or_default().insert(&ap.bssid);
        }
    }
    for (ssid, bssids) in &by_ssid {
        if bssids.len() >= 2 {
            attacks.push(Attack::new(
                AttackKind::EvilTwin,
                Severity::High,
                format!(
                    "Potential evil twin attack: SSID '{}' advertised by {} access points",
                    ssid,
                    bssids.len()
                ),
                *ssid,
            ));
        }
    }

    for ap in access_points {
        let ssid_lower = ap.ssid.to_lowercase();
        for word in ROGUE_SSID_WORDS {
            if ssid_lower.contains(word) {
                attacks.push(Attack::new(
                    AttackKind::RogueAp,
                    Severity::High,
                    format!("Potentially rogue access point detected: {}", ap.ssid),
                    &ap.ssid,
                ));
                break;
            }
        }
    }

    for ap in access_points {
        if ap.encryption.to_lowercase().contains("wep") {
            attacks.push(Attack::new(
                AttackKind::WeakEncryption,
                Severity::High,
                format!("Weak encryption (WEP) detected on network: {}", ap.ssid),
                &ap.ssid,
            ));
        }
    }

    attacks
}

/// Bluetooth heuristics: mass scanning, spoofed names, MITM-suggestive names.
pub fn bluetooth_attacks(devices: &[BluetoothDevice]) -> Vec<Attack> {
    let mut attacks = Vec::new();

    if devices.len() > MASS_SCAN_THRESHOLD {
        attacks.push(Attack::new(
            AttackKind::BluetoothMassScanning,
            Severity::Medium,
            format!(
                "Mass scanning detected: {} Bluetooth devices found (unusual activity)",
                devices.len()
            ),
            "bluetooth_network",
        ));
    }

    for device in devices {
        let name_lower = device.name.to_lowercase();
        for word in SPOOF_NAME_WORDS {
            if name_lower.contains(word) {
                attacks.push(Attack::new(
                    AttackKind::BluetoothSpoofing,
                    Severity::High,
                    format!(
                        "Suspicious Bluetooth device name: {} ({})",
                        device.name, device.address
                    ),
                    &device.address,
                ));
                break;
            }
        }
    }

    for device in devices {
        let name_lower = device.name.to_lowercase();
        for word in MITM_NAME_WORDS {
            if name_lower.contains(word) {
                attacks.push(Attack::new(
                    AttackKind::BluetoothMitm,
                    Severity::High,
                    format!(
                        "Potential Man-in-the-Middle device: {} ({}) - appears to be a {}",
                        device.name, device.address, word
                    ),
                    &device.address,
                ));
                break;
            }
        }
    }

    attacks
}

/// Parses nmap output for the four watched service ports. The invocation
/// itself lives in the network sampler; this half is pure and testable
/// against captured output.
pub fn suspicious_ports(nmap_output: &str) -> Vec<Attack> {
    let mut attacks = Vec::new();
    for (port, service) in SUSPICIOUS_PORTS {
        let open = nmap_output
            .lines()
            .any(|line| line.contains(port) && line.contains("open"));
        if open {
            attacks.push(Attack::new(
                AttackKind::SuspiciousPort,
                Severity::Medium,
                format!("Suspicious open port detected: {port} ({service})"),
                "network",
            ));
        }
    }
    attacks
}
