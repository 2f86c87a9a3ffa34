//! Wi-Fi sampling: monitor-mode interface discovery/setup and the
//! active-scan path that feeds access point records.

use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::error::{DetectorError, Result};
use crate::invoke::{run_with_elevation_fallback, ToolCommand};
use crate::models::{Domain, WifiAccessPoint};
use crate::store::{ObservationStore, WifiSample};

/// Interface name and operating mode as reported by `iwconfig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceMode {
    pub name: String,
    pub mode: String,
}

/// Parses `iwconfig` output. Wireless interfaces are recognized by the
/// "IEEE" marker on their heading line; mode defaults to Managed when the
/// "Mode:" token is absent.
pub fn parse_iwconfig(output: &str) -> Vec<InterfaceMode> {
    let mut interfaces = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if !line.contains("IEEE") {
            continue;
        }
        let Some(first) = line.split_whitespace().next() else {
            continue;
        };
        let name = first.trim_end_matches(':').to_string();
        let mode = line
            .split("Mode:")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap_or("Managed")
            .to_string();
        interfaces.push(InterfaceMode { name, mode });
    }
    interfaces
}

/// Returns the name of an interface already in monitor mode, if any.
pub(crate) async fn find_monitor_interface(cfg: &MonitorConfig) -> Result<Option<String>> {
    let out = run_with_elevation_fallback(&ToolCommand::new("iwconfig", &[]), cfg.tool_timeout())
        .await?;
    if !out.success {
        return Ok(None);
    }
    Ok(parse_iwconfig(&out.combined)
        .into_iter()
        .find(|iface| iface.mode == "Monitor")
        .map(|iface| iface.name))
}

/// Finds an existing monitor-mode interface or switches the first `wlan*`
/// interface into monitor mode (down, set mode, best-effort up).
async fn ensure_monitor_interface(cfg: &MonitorConfig) -> Result<String> {
    if let Some(existing) = find_monitor_interface(cfg).await? {
        return Ok(existing);
    }

    let target = crate::list_wireless_interfaces()?
        .into_iter()
        .find(|name| name.starts_with("wlan"))
        .ok_or_else(|| DetectorError::tool_failed("iwconfig", "no WiFi interfaces found"))?;

    info!("attempting to put interface {} into monitor mode", target);

    let down = ToolCommand::new("ifconfig", &[&target, "down"]);
    let out = run_with_elevation_fallback(&down, cfg.tool_timeout()).await?;
    if !out.success {
        warn!("could not bring down interface {}", target);
    }

    let set_mode = ToolCommand::new("iwconfig", &[&target, "mode", "monitor"]);
    let out = run_with_elevation_fallback(&set_mode, cfg.tool_timeout()).await?;
    if !out.success {
        return Err(DetectorError::tool_failed(
            "iwconfig",
            format!(
                "failed to set monitor mode on {}: {}",
                target,
                out.combined.trim()
            ),
        ));
    }

    // Failure to re-raise the interface is logged but non-fatal.
    let up = ToolCommand::new("ifconfig", &[&target, "up"]);
    match run_with_elevation_fallback(&up, cfg.tool_timeout()).await {
        Ok(out) if out.success => {}
        Ok(_) | Err(_) => warn!("could not bring up interface {}", target),
    }

    info!("interface {} switched to monitor mode", target);
    Ok(target)
}

/// Parses the simplified `iw dev <if> scan` block format: a "BSS " marker
/// line opens each access point, followed by "signal:" and "SSID:" lines.
/// The format carries no cipher information, so encryption defaults to WPA2.
pub fn parse_iw_scan(output: &str) -> Vec<WifiAccessPoint> {
    let mut access_points = Vec::new();
    let mut bssid = String::new();
    let mut ssid = String::new();
    let mut signal = 0i32;

    let mut flush = |bssid: &mut String, ssid: &mut String, signal: &mut i32| {
        if !bssid.is_empty() {
            access_points.push(WifiAccessPoint {
                bssid: std::mem::take(bssid),
                signal_dbm: *signal,
                beacons: 0,
                encryption: "WPA2".to_string(),
                ssid: std::mem::take(ssid),
            });
            *signal = 0;
        }
    };

    for line in output.lines() {
        let line = line.trim();
        if line.starts_with("BSS ") {
            flush(&mut bssid, &mut ssid, &mut signal);
            if let Some(token) = line.split_whitespace().nth(1) {
                // iw renders "BSS aa:bb:cc:dd:ee:ff(on wlan0)".
                bssid = token.split('(').next().unwrap_or(token).to_string();
            }
        } else if let Some(rest) = line.strip_prefix("signal: ") {
            let value = rest.trim().trim_end_matches("dBm").trim();
            signal = value.parse::<f64>().map(|v| v.round() as i32).unwrap_or(0);
        } else if let Some(rest) = line.strip_prefix("SSID: ") {
            ssid = rest.trim().to_string();
        }
    }
    flush(&mut bssid, &mut ssid, &mut signal);

    access_points
}

/// One Wi-Fi sampling pass. Monitor-mode setup is attempted first and
/// reported through the health record; the active scan feeds the sample
/// either way. The previous sample survives a failed pass.
pub async fn sample(store: &ObservationStore, cfg: &MonitorConfig) {
    match ensure_monitor_interface(cfg).await {
        Ok(iface) => store.push_event(Domain::Wifi, &format!("Using WiFi interface: {iface}")),
        Err(err) => {
            warn!("monitor mode setup failed: {}", err);
            store.push_event(Domain::Wifi, &format!("Monitor mode unavailable: {err}"));
        }
    }

    let interfaces = match crate::list_wireless_interfaces() {
        Ok(interfaces) if !interfaces.is_empty() => interfaces,
        Ok(_) => {
            store.mark_error(Domain::Wifi, "No wireless interfaces found");
            return;
        }
        Err(err) => {
            store.mark_error(Domain::Wifi, &format!("Interface listing failed: {err}"));
            return;
        }
    };
    let iface = interfaces
        .iter()
        .find(|name| name.starts_with("wlan"))
        .unwrap_or(&interfaces[0]);

    let scan = ToolCommand::new("iw", &["dev", iface, "scan"]);
    let out = match run_with_elevation_fallback(&scan, cfg.tool_timeout()).await {
        Ok(out) if out.success => out,
        Ok(out) => {
            let detail = if out.timed_out {
                "timed out".to_string()
            } else {
                out.combined.trim().to_string()
            };
            store.mark_error(Domain::Wifi, &format!("iw scan failed: {detail}"));
            return;
        }
        Err(err) => {
            store.mark_error(Domain::Wifi, &format!("iw scan failed: {err}"));
            return;
        }
    };

    let access_points = parse_iw_scan(&out.combined);
    debug!("wifi scan on {} found {} access points", iface, access_points.len());

    let count = access_points.len();
    store.replace_wifi(WifiSample {
        access_points,
        // The simplified scan format carries no client associations.
        clients: Vec::new(),
    });
    store.mark_running(Domain::Wifi, &format!("Scan found {count} access points"));
}

#[cfg(test)]
mod tests {
    use super::*;

    const IWCONFIG_OUTPUT: &str = "\
wlan0     IEEE 802.11  ESSID:off/any
          Mode:Managed  Access Point: Not-Associated   Tx-Power=20 dBm

wlan1     IEEE 802.11  Mode:Monitor  Frequency:2.437 GHz  Tx-Power=20 dBm

lo        no wireless extensions.
";

    #[test]
    fn iwconfig_parse_extracts_names_and_modes() {
        let interfaces = parse_iwconfig(IWCONFIG_OUTPUT);
        assert_eq!(interfaces.len(), 2);
        assert_eq!(interfaces[0].name, "wlan0");
        assert_eq!(interfaces[0].mode, "Managed");
        assert_eq!(interfaces[1].name, "wlan1");
        assert_eq!(interfaces[1].mode, "Monitor");
    }

    #[test]
    fn iwconfig_parse_defaults_mode_to_managed() {
        let interfaces = parse_iwconfig("wlan0     IEEE 802.11  ESSID:\"Home\"\n");
        assert_eq!(interfaces[0].mode, "Managed");
    }

    const IW_SCAN_OUTPUT: &str = "\
BSS e8:de:27:11:22:33(on wlan0) -- associated
\tTSF: 318193769 usec
\tsignal: -47.00 dBm
\tSSID: HomeNet
BSS 00:11:22:33:44:55(on wlan0)
\tsignal: -81.50 dBm
\tSSID: CoffeeShop Free WiFi
BSS aa:bb:cc:dd:ee:ff(on wlan0)
\tsignal: -60.00 dBm
\tSSID:
";

    #[test]
    fn iw_scan_parse_builds_access_points() {
        let aps = parse_iw_scan(IW_SCAN_OUTPUT);
        assert_eq!(aps.len(), 3);
        assert_eq!(aps[0].bssid, "e8:de:27:11:22:33");
        assert_eq!(aps[0].ssid, "HomeNet");
        assert_eq!(aps[0].signal_dbm, -47);
        assert_eq!(aps[0].encryption, "WPA2");
        assert_eq!(aps[1].signal_dbm, -82);
        // Hidden network: empty SSID survives as empty.
        assert_eq!(aps[2].ssid, "");
    }

    #[test]
    fn iw_scan_parse_skips_garbage_gracefully() {
        let aps = parse_iw_scan("not a scan output\nstill not\n");
        assert!(aps.is_empty());
    }
}
