use std::env;
use std::path::Path;

use anyhow::{bail, Result};
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

use rfsentry::{Blocker, Monitor, MonitorConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let _guards = rfsentry::logging::init(Path::new("."));

    if !rfsentry::check_privileges() {
        info!("not running as root; tools will fall back to sudo where needed");
    }

    let cfg = MonitorConfig::from_env();
    let args: Vec<String> = env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        None | Some("monitor") | Some("start") => run_monitor(cfg).await,
        Some("scan") => run_scan(cfg).await,
        Some("block") => run_block(&cfg, &args[1..], true).await,
        Some("unblock") => run_block(&cfg, &args[1..], false).await,
        Some("deauth") => run_deauth(&cfg, &args[1..]).await,
        Some("help") | Some("-h") | Some("--help") => {
            print_help();
            Ok(())
        }
        Some(other) => bail!("unknown command: {other} (try `rfsentry help`)"),
    }
}

async fn run_monitor(cfg: MonitorConfig) -> Result<()> {
    let monitor = Monitor::new(cfg);
    monitor.start_all().await;
    info!("rfsentry monitoring started; press Ctrl-C to stop");

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => {},
        _ = sigint.recv() => {},
    }

    monitor.close().await;

    let findings = monitor.findings().recent(50);
    if findings.is_empty() {
        println!("No attacks detected.");
    } else {
        println!("{}", serde_json::to_string_pretty(&findings)?);
    }
    Ok(())
}

async fn run_scan(cfg: MonitorConfig) -> Result<()> {
    let monitor = Monitor::new(cfg);
    monitor.quick_scan().await;

    let store = monitor.store();
    println!("Access points: {}", store.wifi().access_points.len());
    println!("Bluetooth devices: {}", store.bluetooth().len());
    println!("BLE devices: {}", store.ble().len());
    println!(
        "Network: {}",
        serde_json::to_string(&store.network())?
    );
    println!("Radio: {}", serde_json::to_string(&store.radio())?);

    let findings = monitor.findings().recent(0);
    if findings.is_empty() {
        println!("No attacks detected.");
    } else {
        println!("{}", serde_json::to_string_pretty(&findings)?);
    }
    Ok(())
}

async fn run_block(cfg: &MonitorConfig, args: &[String], block: bool) -> Result<()> {
    let verb = if block { "block" } else { "unblock" };
    let [kind, address, rest @ ..] = args else {
        bail!("usage: rfsentry {verb} <ip|mac|bt> <address> [reason]");
    };
    let reason = rest.first().map(String::as_str).unwrap_or("manual");

    let blocker = Blocker::new(cfg);
    if block {
        match kind.as_str() {
            "ip" => blocker.block_ip(address, reason).await?,
            "mac" => blocker.block_mac(address, reason).await?,
            "bt" => blocker.block_bluetooth_device(address, reason).await?,
            other => bail!("unknown address kind: {other} (expected ip, mac or bt)"),
        }
    } else {
        match kind.as_str() {
            "ip" => blocker.unblock_ip(address).await?,
            "mac" => blocker.unblock_mac(address).await?,
            "bt" => blocker.unblock_bluetooth_device(address).await?,
            other => bail!("unknown address kind: {other} (expected ip, mac or bt)"),
        }
    }

    println!("{verb}ed {kind} {address}");
    Ok(())
}

async fn run_deauth(cfg: &MonitorConfig, args: &[String]) -> Result<()> {
    let [client_mac, ap_mac, rest @ ..] = args else {
        bail!("usage: rfsentry deauth <client_mac> <ap_mac> [reason]");
    };
    let reason = rest.first().map(String::as_str).unwrap_or("manual");

    let blocker = Blocker::new(cfg);
    blocker.deauth_wifi_client(client_mac, ap_mac, reason).await?;
    println!("deauthenticated {client_mac} from {ap_mac}");
    Ok(())
}

fn print_help() {
    println!(
        "rfsentry {} - wireless and network security posture monitor

USAGE:
    rfsentry [COMMAND]

COMMANDS:
    monitor | start         run all samplers until Ctrl-C (default)
    scan                    one pass of every sampler, print results
    block <ip|mac|bt> <address> [reason]
    unblock <ip|mac|bt> <address>
    deauth <client_mac> <ap_mac> [reason]
    help                    show this message

Configuration via RFSENTRY_* environment variables (intervals, timeouts,
ping target, scan subnet, RFSENTRY_AUTO_BLOCK).",
        rfsentry::VERSION
    );
}
