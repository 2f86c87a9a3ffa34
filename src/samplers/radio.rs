//! Radio/SDR sampling: USB SDR hardware discovery, built-in Wi-Fi card
//! capability probing and an optional sub-GHz sweep when an external SDR
//! is present.

use std::time::Duration;

use tracing::{debug, info};

use crate::config::MonitorConfig;
use crate::invoke::{run_with_elevation_fallback, ToolCommand};
use crate::models::{Domain, RadioInfo};
use crate::store::ObservationStore;

/// Sub-GHz sweeps get their own short bound; rtl_power produces its one-shot
/// CSV quickly or not at all.
const SUB_GHZ_SWEEP_TIMEOUT: Duration = Duration::from_secs(5);

/// A sweep that printed more than this many bytes of CSV saw real energy.
const SUB_GHZ_SIGNAL_THRESHOLD: usize = 50;

/// Extracts SDR device lines from the chained lsusb grep output. The shell
/// chain ends in `|| true`, so a lone "true" line means nothing matched.
pub fn parse_usb_sdr_devices(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != "true")
        .map(str::to_string)
        .collect()
}

/// The advertised coverage depends on what hardware the probe found.
pub fn monitored_bands(has_sdr: bool, builtin_capable: bool) -> Vec<String> {
    let bands: &[&str] = if has_sdr {
        &[
            "300-488MHz Sub-GHz (IoT sensors, remotes)",
            "433MHz (Wireless sensors, doorbells)",
            "868MHz (Security systems, alarm sensors)",
            "2.4GHz (WiFi, Bluetooth, Zigbee)",
            "5GHz (WiFi 5/6, surveillance cameras)",
        ]
    } else if builtin_capable {
        &[
            "2.4GHz (WiFi channels via built-in card)",
            "5GHz (WiFi channels via built-in card)",
            "*External SDR needed for Sub-GHz",
        ]
    } else {
        &[
            "No radio monitoring hardware detected",
            "Built-in WiFi card: Not found",
            "External SDR: Not found",
        ]
    };
    bands.iter().map(|b| b.to_string()).collect()
}

async fn find_usb_sdr_devices(cfg: &MonitorConfig) -> Vec<String> {
    let probe = ToolCommand::new(
        "sh",
        &[
            "-c",
            // stderr is silenced so a missing lsusb does not read as a device
            // line in the combined capture.
            "{ lsusb | grep -i rtl || lsusb | grep -i 'hackrf' || lsusb | grep -i 'blade' || true; } 2>/dev/null",
        ],
    );
    match run_with_elevation_fallback(&probe, cfg.tool_timeout()).await {
        Ok(out) if out.success => parse_usb_sdr_devices(&out.combined),
        Ok(_) | Err(_) => Vec::new(),
    }
}

/// Wireless interfaces that respond to an iwconfig query are assumed capable
/// of monitor mode.
async fn find_builtin_cards(cfg: &MonitorConfig) -> Vec<String> {
    let Ok(interfaces) = crate::list_wireless_interfaces() else {
        return Vec::new();
    };
    let mut cards = Vec::new();
    for iface in interfaces {
        let probe = ToolCommand::new("iwconfig", &[&iface]);
        if let Ok(out) = run_with_elevation_fallback(&probe, cfg.tool_timeout()).await {
            if out.success {
                cards.push(format!("{iface} (built-in WiFi card)"));
            }
        }
    }
    cards
}

async fn sub_ghz_sweep() -> bool {
    let sweep = ToolCommand::new(
        "rtl_power",
        &["-f", "300M:488M:2M", "-g", "20", "-i", "1", "-1", "-d", "0"],
    );
    let detected = match run_with_elevation_fallback(&sweep, SUB_GHZ_SWEEP_TIMEOUT).await {
        Ok(out) => out.success && out.combined.trim().len() > SUB_GHZ_SIGNAL_THRESHOLD,
        Err(err) => {
            debug!("sub-GHz sweep failed: {}", err);
            false
        }
    };
    info!("sub-GHz scan completed: signals detected {}", detected);
    detected
}

/// One radio sampling pass. Hardware discovery never fails the pass; absent
/// hardware is itself a valid observation.
pub async fn sample(store: &ObservationStore, cfg: &MonitorConfig) {
    let sdr_devices = find_usb_sdr_devices(cfg).await;
    let has_sdr = !sdr_devices.is_empty();

    let builtin_cards = find_builtin_cards(cfg).await;
    let builtin_capable = !builtin_cards.is_empty();

    let sub_ghz_signals_detected = if has_sdr { sub_ghz_sweep().await } else { false };

    let mut all_devices = sdr_devices;
    all_devices.extend(builtin_cards.iter().cloned());

    let event = if has_sdr {
        format!("External SDR detected, sub-GHz signals: {sub_ghz_signals_detected}")
    } else if builtin_capable {
        format!(
            "Built-in WiFi cards detected: {} (limited to WiFi bands)",
            builtin_cards.len()
        )
    } else {
        "No SDR hardware detected".to_string()
    };

    store.replace_radio(RadioInfo {
        has_sdr,
        sdr_devices: all_devices,
        sub_ghz_signals_detected,
        monitored_bands: monitored_bands(has_sdr, builtin_capable),
    });
    store.mark_running(Domain::Radio, &event);
}
