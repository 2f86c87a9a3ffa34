//! Network sampling: reachability and latency via ping, plus the optional
//! nmap subnet sweep whose output feeds the suspicious-port heuristic.

use tracing::{debug, info};

use crate::config::MonitorConfig;
use crate::invoke::{run_with_elevation_fallback, tool_available, ToolCommand};
use crate::models::{Domain, NetworkInfo};
use crate::store::ObservationStore;

/// Extracts the average round-trip time from ping's summary line, formatted
/// as "12.345ms", or "Unknown" when the summary is missing or malformed.
pub fn parse_avg_latency(output: &str) -> String {
    for line in output.lines() {
        if !line.contains("rtt min/avg/max/mdev") {
            continue;
        }
        let Some((_, values)) = line.split_once('=') else {
            continue;
        };
        let parts: Vec<&str> = values.trim().split('/').collect();
        if parts.len() >= 2 {
            return format!("{}ms", parts[1]);
        }
    }
    "Unknown".to_string()
}

/// One network sampling pass: a short ping burst decides online/offline and
/// measures average latency. Offline is a degraded state, not an error in
/// the invocation sense, but it is surfaced through the health record.
pub async fn sample(store: &ObservationStore, cfg: &MonitorConfig) {
    let count = cfg.ping_count.to_string();
    let ping = ToolCommand::new("ping", &["-c", &count, "-i", "0.2", &cfg.ping_target]);

    let out = match run_with_elevation_fallback(&ping, cfg.tool_timeout()).await {
        Ok(out) if out.success => out,
        Ok(_) | Err(_) => {
            store.replace_network(NetworkInfo::default());
            store.mark_error(Domain::Network, "Network is offline");
            return;
        }
    };

    let latency = parse_avg_latency(&out.combined);
    info!("network online, average latency {}", latency);

    store.replace_network(NetworkInfo {
        online: true,
        avg_latency: latency.clone(),
    });
    store.mark_running(Domain::Network, &format!("Online, latency: {latency}"));
}

/// Sweeps the configured subnet for the watched service ports. Returns the
/// raw nmap output for the heuristics layer, or `None` when nmap is not
/// installed or the sweep failed.
pub async fn scan_ports(cfg: &MonitorConfig) -> Option<String> {
    if !tool_available("nmap") {
        return None;
    }
    let sweep = ToolCommand::new(
        "nmap",
        &["-p", "21,23,3389,445", "--open", &cfg.scan_subnet],
    );
    match run_with_elevation_fallback(&sweep, cfg.port_scan_timeout()).await {
        Ok(out) if out.success => Some(out.combined),
        Ok(out) => {
            debug!("port sweep failed: {}", out.combined.trim());
            None
        }
        Err(err) => {
            debug!("port sweep failed: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_parse_reads_the_rtt_summary() {
        let output = "\
3 packets transmitted, 3 received, 0% packet loss, time 404ms
rtt min/avg/max/mdev = 11.489/12.272/13.396/0.812 ms
";
        assert_eq!(parse_avg_latency(output), "12.272ms");
    }

    #[test]
    fn latency_parse_defaults_to_unknown() {
        assert_eq!(parse_avg_latency("no summary here"), "Unknown");
        assert_eq!(
            parse_avg_latency("rtt min/avg/max/mdev = garbage"),
            "Unknown"
        );
    }
}
