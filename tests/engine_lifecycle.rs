//! Engine lifecycle: explicit start, clean shutdown, and the read surface
//! exposed to presentation layers. Runs against whatever tools the host
//! actually has; a toolless host degrades domains to Error, which is a
//! valid lifecycle outcome.

use std::time::Duration;

use rfsentry::{Domain, Monitor, MonitorConfig, ServiceStatus};

fn fast_config() -> MonitorConfig {
    MonitorConfig {
        wifi_interval_secs: 1,
        bluetooth_interval_secs: 1,
        ble_interval_secs: 1,
        radio_interval_secs: 1,
        network_interval_secs: 1,
        tool_timeout_secs: 1,
        port_scan_timeout_secs: 1,
        ping_count: 1,
        ..MonitorConfig::default()
    }
}

#[tokio::test]
async fn start_all_then_close_terminates_cleanly() {
    let monitor = Monitor::new(fast_config());
    monitor.start_all().await;

    // The first pass of each loop fires immediately; give them room to land.
    tokio::time::sleep(Duration::from_secs(3)).await;

    tokio::time::timeout(Duration::from_secs(15), monitor.close())
        .await
        .expect("close did not terminate");

    let health = monitor.store().health_snapshot();
    for domain in Domain::ALL {
        let record = health
            .get(&domain)
            .unwrap_or_else(|| panic!("no health record for {domain}"));
        assert!(
            matches!(record.status, ServiceStatus::Running | ServiceStatus::Error),
            "{domain} still idle after a pass"
        );
        assert!(!record.recent_events.is_empty());
    }
}

#[tokio::test]
async fn close_is_safe_without_start_and_repeatable() {
    let monitor = Monitor::new(fast_config());
    monitor.close().await;
    monitor.close().await;
}

#[tokio::test]
async fn read_surface_is_available_before_and_after_scanning() {
    let monitor = Monitor::new(fast_config());

    assert!(monitor.findings().is_empty());
    assert!(monitor.blocker().blocked_items().await.blocked_ips.is_empty());
    assert!(!monitor.store().network().online);

    monitor.quick_scan().await;

    // Findings and samples are whatever the host produced; the calls must
    // stay serviceable either way.
    let _ = monitor.findings().recent(10);
    let _ = monitor.store().wifi();
    let _ = monitor.store().radio();
    monitor.close().await;
}
