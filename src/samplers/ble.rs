//! BLE / tracker sampling. Low-energy scanners run until killed, so a
//! bounded timeout that fires is a normal, benign outcome here: whatever
//! was printed before the kill is the sample.

use std::time::Duration;

use tracing::debug;

use crate::config::MonitorConfig;
use crate::invoke::{run_with_elevation_fallback, ToolCommand, ToolOutput};
use crate::models::{BleDevice, Domain};
use crate::store::ObservationStore;

/// Annotation appended when manufacturer data suggests an Apple tracker.
pub const APPLE_TRACKER_NOTE: &str = " (Potential AirTag)";

/// Apple's Bluetooth SIG manufacturer identifier as it appears in dumps.
const APPLE_MANUFACTURER_CODE: &str = "004C";

/// True for a colon-separated six-octet hardware address.
fn is_device_address(token: &str) -> bool {
    let octets: Vec<&str> = token.split(':').collect();
    octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Parses address-prefixed advertisement lines, flagging likely Apple
/// trackers by manufacturer name or code.
pub fn parse_scan_output(output: &str) -> Vec<BleDevice> {
    let mut devices = Vec::new();
    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("LE Scan") {
            continue;
        }
        let mut fields = trimmed.split_whitespace();
        let Some(address) = fields.next() else {
            continue;
        };
        if !is_device_address(address) {
            continue;
        }
        let mut data = fields.collect::<Vec<_>>().join(" ");
        if data.contains("Apple") || data.contains(APPLE_MANUFACTURER_CODE) {
            data.push_str(APPLE_TRACKER_NOTE);
        }
        devices.push(BleDevice {
            address: address.to_string(),
            data,
            // None of the cascade tools report signal strength.
            rssi: 0,
        });
    }
    devices
}

/// One BLE sampling pass through the four-tool cascade. A timed-out scan is
/// a benign empty-or-partial result, not an error.
pub async fn sample(store: &ObservationStore, cfg: &MonitorConfig) {
    let out = match scan(cfg).await {
        Some(out) => out,
        None => {
            store.mark_error(Domain::Ble, "All BLE scanning methods failed");
            return;
        }
    };

    let devices = parse_scan_output(&out.combined);
    debug!("ble scan via {} found {} devices", out.descriptor, devices.len());

    let count = devices.len();
    store.replace_ble(devices);
    store.mark_running(Domain::Ble, &format!("Monitored {count} BLE devices"));
}

async fn scan(cfg: &MonitorConfig) -> Option<ToolOutput> {
    let timeout = cfg.tool_timeout();

    let lescan = ToolCommand::new("hcitool", &["lescan", "--dup"])
        .with_indicators(&["Set scan parameters failed"]);
    if let Some(out) = attempt(&lescan, timeout).await {
        return Some(out);
    }

    // bluetoothctl needs an explicit scan-on/scan-off pairing: let discovery
    // run briefly, then stop it without caring whether the stop succeeds.
    let scan_on = ToolCommand::new("bluetoothctl", &["scan", "on"])
        .with_indicators(&["Failed to start discovery", "No default controller available"]);
    if let Some(out) = attempt(&scan_on, timeout).await {
        tokio::time::sleep(Duration::from_secs(3)).await;
        let scan_off = ToolCommand::new("bluetoothctl", &["scan", "off"]);
        let _ = run_with_elevation_fallback(&scan_off, Duration::from_secs(5)).await;
        return Some(out);
    }

    let find = ToolCommand::new("btmgmt", &["find"]);
    if let Some(out) = attempt(&find, timeout).await {
        return Some(out);
    }

    // Last resort: a classic scan still surfaces dual-mode devices.
    let classic = ToolCommand::new("hcitool", &["scan"]);
    attempt(&classic, Duration::from_secs(8)).await
}

async fn attempt(cmd: &ToolCommand, timeout: Duration) -> Option<ToolOutput> {
    if !crate::invoke::tool_available(&cmd.program) {
        return None;
    }
    match run_with_elevation_fallback(cmd, timeout).await {
        Ok(out) if out.usable() => Some(out),
        Ok(out) => {
            debug!("{} failed: {}", cmd.describe(), out.combined.trim());
            None
        }
        Err(err) => {
            debug!("{} failed: {}", cmd.describe(), err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_address_prefixed_lines_and_flags_trackers() {
        let output = "\
LE Scan ...
4C:AB:12:34:56:78 Apple, Inc. data
AA:BB:CC:DD:EE:FF (unknown)
11:22:33:44:55:66 Flags: 0x06 Mfr: 004C1219
";
        let devices = parse_scan_output(output);
        assert_eq!(devices.len(), 3);
        assert!(devices[0].data.ends_with(APPLE_TRACKER_NOTE));
        assert!(!devices[1].data.contains("AirTag"));
        assert!(devices[2].data.ends_with(APPLE_TRACKER_NOTE));
    }

    #[test]
    fn rejects_lines_without_a_hardware_address() {
        let output = "scanning:\nnot-an-address some data\n12:34 short\n";
        assert!(parse_scan_output(output).is_empty());
    }

    #[tokio::test]
    async fn devices_printed_before_a_scan_timeout_are_kept() {
        // Long-running scanners only ever end by timeout; the sample is
        // whatever they printed first.
        let cmd = ToolCommand::new(
            "sh",
            &["-c", "echo '11:22:33:44:55:66 Mfr: 004C1219'; sleep 10"],
        );
        let out = run_with_elevation_fallback(&cmd, Duration::from_millis(300))
            .await
            .unwrap();
        assert!(out.timed_out);
        assert!(out.usable());

        let devices = parse_scan_output(&out.combined);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].address, "11:22:33:44:55:66");
        assert!(devices[0].data.ends_with(APPLE_TRACKER_NOTE));
    }

    #[test]
    fn address_validation_requires_six_hex_octets() {
        assert!(is_device_address("AA:BB:CC:DD:EE:FF"));
        assert!(is_device_address("4c:ab:12:34:56:78"));
        assert!(!is_device_address("AA:BB:CC:DD:EE"));
        assert!(!is_device_address("GG:BB:CC:DD:EE:FF"));
        assert!(!is_device_address("AABBCCDDEEFF"));
    }
}
