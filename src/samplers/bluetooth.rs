//! Bluetooth classic sampling through a three-tool cascade:
//! `hcitool scan` (legacy) -> `btmgmt find` (management API) ->
//! `bluetoothctl devices` (interactive controller).

use tracing::debug;

use crate::config::MonitorConfig;
use crate::invoke::{run_first_success, ToolCommand};
use crate::models::{BluetoothDevice, Domain};
use crate::store::ObservationStore;

fn scan_cascade() -> Vec<ToolCommand> {
    vec![
        ToolCommand::new("hcitool", &["scan"]),
        ToolCommand::new("btmgmt", &["find"]),
        ToolCommand::new("bluetoothctl", &["devices"])
            .with_indicators(&["No default controller available"]),
    ]
}

/// Parses the two line formats the cascade can produce:
/// `hcitool scan` tab-separated "ADDR\tName" rows and the
/// `bluetoothctl`/`btmgmt` "Device ADDR Name" form.
pub fn parse_scan_output(output: &str) -> Vec<BluetoothDevice> {
    let mut devices = Vec::new();
    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.contains('\t') && !trimmed.starts_with("Scanning") {
            let mut fields = trimmed.split_whitespace();
            if let Some(address) = fields.next() {
                let name = fields.collect::<Vec<_>>().join(" ");
                if !name.is_empty() {
                    devices.push(BluetoothDevice {
                        address: address.to_string(),
                        name,
                    });
                }
            }
        } else if let Some(rest) = trimmed.strip_prefix("Device ") {
            let mut fields = rest.split_whitespace();
            if let Some(address) = fields.next() {
                let name = fields.collect::<Vec<_>>().join(" ");
                if !name.is_empty() {
                    devices.push(BluetoothDevice {
                        address: address.to_string(),
                        name,
                    });
                }
            }
        }
    }
    devices
}

/// One Bluetooth classic sampling pass: first scanning tool to succeed wins,
/// the sample set is replaced wholesale.
pub async fn sample(store: &ObservationStore, cfg: &MonitorConfig) {
    let out = match run_first_success(&scan_cascade(), cfg.tool_timeout()).await {
        Ok(out) => out,
        Err(err) => {
            store.mark_error(
                Domain::Bluetooth,
                &format!("All Bluetooth scanning methods failed: {err}"),
            );
            return;
        }
    };

    let devices = parse_scan_output(&out.combined);
    debug!(
        "bluetooth scan via {} found {} devices",
        out.descriptor,
        devices.len()
    );

    let count = devices.len();
    store.replace_bluetooth(devices);
    store.mark_running(
        Domain::Bluetooth,
        &format!("Monitored {count} Bluetooth devices"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hcitool_tab_format() {
        let output = "Scanning ...\n\tAA:BB:CC:DD:EE:FF\tLiving Room TV\n\t11:22:33:44:55:66\tJBL Flip 5\n";
        let devices = parse_scan_output(output);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].address, "AA:BB:CC:DD:EE:FF");
        assert_eq!(devices[0].name, "Living Room TV");
        assert_eq!(devices[1].name, "JBL Flip 5");
    }

    #[test]
    fn parses_bluetoothctl_device_format() {
        let output = "Device AA:BB:CC:DD:EE:FF Pixel Buds\nDevice 11:22:33:44:55:66 Car Audio\n";
        let devices = parse_scan_output(output);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name, "Pixel Buds");
        assert_eq!(devices[1].address, "11:22:33:44:55:66");
    }

    #[test]
    fn skips_header_and_malformed_lines() {
        let output = "Scanning ...\nDevice\nrandom noise\n";
        assert!(parse_scan_output(output).is_empty());
    }
}
