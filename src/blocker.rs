//! Active mitigation: firewall-level IP blocks, layer-2 MAC blocks,
//! Bluetooth radio blocks and Wi-Fi deauthentication, plus the optional
//! automatic response to findings.
//!
//! Enforcement is behind the [`Enforcer`] trait so the cascade and
//! bookkeeping rules can be exercised without touching live firewalls; the
//! production [`ShellEnforcer`] shells out through the tool invoker.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::MonitorConfig;
use crate::error::{DetectorError, Result};
use crate::invoke::{run_with_elevation_fallback, tool_available, ToolCommand};
use crate::models::{Attack, AttackKind};

/// Snapshot of everything currently blocked, keyed by address with the time
/// the block was recorded.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BlockedItems {
    pub blocked_ips: HashMap<String, DateTime<Utc>>,
    pub blocked_macs: HashMap<String, DateTime<Utc>>,
    pub blocked_bt_addrs: HashMap<String, DateTime<Utc>>,
}

/// Executes enforcement commands. Availability and execution are separate so
/// the cascade can pick a tool before committing to it.
#[async_trait]
pub trait Enforcer: Send + Sync {
    fn available(&self, tool: &str) -> bool;
    async fn run(&self, cmd: &ToolCommand) -> Result<()>;
}

/// Production enforcer: PATH probe plus a bounded invocation with the usual
/// elevation fallback. A timed-out enforcement command is a failure here,
/// unlike in the scanning paths.
pub struct ShellEnforcer {
    timeout: Duration,
}

impl ShellEnforcer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Enforcer for ShellEnforcer {
    fn available(&self, tool: &str) -> bool {
        tool_available(tool)
    }

    async fn run(&self, cmd: &ToolCommand) -> Result<()> {
        let out = run_with_elevation_fallback(cmd, self.timeout).await?;
        if out.success {
            Ok(())
        } else if out.timed_out {
            Err(DetectorError::tool_failed(cmd.describe(), "timed out"))
        } else {
            Err(DetectorError::tool_failed(
                cmd.describe(),
                out.combined.trim().to_string(),
            ))
        }
    }
}

#[derive(Default)]
struct BlockerState {
    blocked_ips: HashMap<String, DateTime<Utc>>,
    blocked_macs: HashMap<String, DateTime<Utc>>,
    blocked_bt_addrs: HashMap<String, DateTime<Utc>>,
    auto_block: bool,
}

/// Mitigation subsystem. One lock covers all three address maps and the
/// auto-block flag; it is held across the enforcement call so a block is
/// recorded if and only if its command succeeded.
pub struct Blocker {
    enforcer: Box<dyn Enforcer>,
    state: RwLock<BlockerState>,
    cfg: MonitorConfig,
}

impl Blocker {
    pub fn new(cfg: &MonitorConfig) -> Self {
        Self::with_enforcer(Box::new(ShellEnforcer::new(cfg.tool_timeout())), cfg)
    }

    /// Builds a blocker over an alternate enforcement backend.
    pub fn with_enforcer(enforcer: Box<dyn Enforcer>, cfg: &MonitorConfig) -> Self {
        Self {
            enforcer,
            state: RwLock::new(BlockerState {
                auto_block: cfg.auto_block,
                ..BlockerState::default()
            }),
            cfg: cfg.clone(),
        }
    }

    /// Blocks inbound traffic from an IP through the first installed
    /// firewall frontend: ufw, then firewalld, then raw iptables.
    pub async fn block_ip(&self, ip: &str, reason: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if state.blocked_ips.contains_key(ip) {
            return Err(DetectorError::StateConflict(format!(
                "IP {ip} is already blocked"
            )));
        }

        if self.enforcer.available("ufw") {
            self.enforcer
                .run(&ToolCommand::new("ufw", &["deny", "from", ip]))
                .await?;
        } else if self.enforcer.available("firewall-cmd") {
            // firewalld persists the rule first, then needs a reload to apply.
            let rule = format!("rule family='ipv4' source address='{ip}' reject");
            self.enforcer
                .run(&ToolCommand::new(
                    "firewall-cmd",
                    &["--permanent", "--add-rich-rule", &rule],
                ))
                .await?;
            self.enforcer
                .run(&ToolCommand::new("firewall-cmd", &["--reload"]))
                .await?;
        } else if self.enforcer.available("iptables") {
            self.enforcer
                .run(&ToolCommand::new(
                    "iptables",
                    &["-I", "INPUT", "-s", ip, "-j", "DROP"],
                ))
                .await?;
        } else {
            return Err(DetectorError::ToolUnavailable("IP blocking"));
        }

        state.blocked_ips.insert(ip.to_string(), Utc::now());
        info!("blocked IP {}: {}", ip, reason);
        Ok(())
    }

    pub async fn unblock_ip(&self, ip: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.blocked_ips.contains_key(ip) {
            return Err(DetectorError::StateConflict(format!(
                "IP {ip} is not blocked"
            )));
        }

        if self.enforcer.available("ufw") {
            self.enforcer
                .run(&ToolCommand::new("ufw", &["delete", "deny", "from", ip]))
                .await?;
        } else if self.enforcer.available("firewall-cmd") {
            let rule = format!("rule family='ipv4' source address='{ip}' reject");
            self.enforcer
                .run(&ToolCommand::new(
                    "firewall-cmd",
                    &["--permanent", "--remove-rich-rule", &rule],
                ))
                .await?;
            self.enforcer
                .run(&ToolCommand::new("firewall-cmd", &["--reload"]))
                .await?;
        } else if self.enforcer.available("iptables") {
            self.enforcer
                .run(&ToolCommand::new(
                    "iptables",
                    &["-D", "INPUT", "-s", ip, "-j", "DROP"],
                ))
                .await?;
        } else {
            return Err(DetectorError::ToolUnavailable("IP unblocking"));
        }

        state.blocked_ips.remove(ip);
        info!("unblocked IP {}", ip);
        Ok(())
    }

    /// Blocks a hardware address at layer 2, preferring ebtables and falling
    /// back to iptables MAC matching when ebtables is absent or fails.
    pub async fn block_mac(&self, mac: &str, reason: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if state.blocked_macs.contains_key(mac) {
            return Err(DetectorError::StateConflict(format!(
                "MAC {mac} is already blocked"
            )));
        }

        let mut blocked = false;
        if self.enforcer.available("ebtables") {
            let cmd = ToolCommand::new("ebtables", &["-A", "INPUT", "-s", mac, "-j", "DROP"]);
            match self.enforcer.run(&cmd).await {
                Ok(()) => blocked = true,
                Err(err) => warn!("ebtables block failed, falling back: {}", err),
            }
        }
        if !blocked {
            if !self.enforcer.available("iptables") {
                return Err(DetectorError::ToolUnavailable("MAC blocking"));
            }
            self.enforcer
                .run(&ToolCommand::new(
                    "iptables",
                    &["-I", "INPUT", "-m", "mac", "--mac-source", mac, "-j", "DROP"],
                ))
                .await?;
        }

        state.blocked_macs.insert(mac.to_string(), Utc::now());
        info!("blocked MAC {}: {}", mac, reason);
        Ok(())
    }

    pub async fn unblock_mac(&self, mac: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.blocked_macs.contains_key(mac) {
            return Err(DetectorError::StateConflict(format!(
                "MAC {mac} is not blocked"
            )));
        }

        let mut removed = false;
        if self.enforcer.available("ebtables") {
            let cmd = ToolCommand::new("ebtables", &["-D", "INPUT", "-s", mac, "-j", "DROP"]);
            if self.enforcer.run(&cmd).await.is_ok() {
                removed = true;
            }
        }
        if !removed {
            if !self.enforcer.available("iptables") {
                return Err(DetectorError::ToolUnavailable("MAC unblocking"));
            }
            self.enforcer
                .run(&ToolCommand::new(
                    "iptables",
                    &["-D", "INPUT", "-m", "mac", "--mac-source", mac, "-j", "DROP"],
                ))
                .await?;
        }

        state.blocked_macs.remove(mac);
        info!("unblocked MAC {}", mac);
        Ok(())
    }

    /// Blocks a Bluetooth device. rfkill can only switch the whole radio
    /// class, so the block is radio-wide; the per-device record is kept for
    /// the unblock bookkeeping. Without rfkill the record is still kept.
    pub async fn block_bluetooth_device(&self, addr: &str, reason: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if state.blocked_bt_addrs.contains_key(addr) {
            return Err(DetectorError::StateConflict(format!(
                "Bluetooth device {addr} is already blocked"
            )));
        }

        if self.enforcer.available("rfkill") {
            warn!("rfkill blocks the whole bluetooth radio, not only {}", addr);
            self.enforcer
                .run(&ToolCommand::new("rfkill", &["block", "bluetooth"]))
                .await?;
        } else {
            warn!("rfkill not installed, recording bluetooth block for {} without enforcement", addr);
        }

        state.blocked_bt_addrs.insert(addr.to_string(), Utc::now());
        info!("blocked Bluetooth device {}: {}", addr, reason);
        Ok(())
    }

    pub async fn unblock_bluetooth_device(&self, addr: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.blocked_bt_addrs.contains_key(addr) {
            return Err(DetectorError::StateConflict(format!(
                "Bluetooth device {addr} is not blocked"
            )));
        }

        if self.enforcer.available("rfkill") {
            self.enforcer
                .run(&ToolCommand::new("rfkill", &["unblock", "bluetooth"]))
                .await?;
        }

        state.blocked_bt_addrs.remove(addr);
        info!("unblocked Bluetooth device {}", addr);
        Ok(())
    }

    /// Sends a bounded deauthentication burst to disconnect one client from
    /// one access point. Requires aireplay-ng and an interface already in
    /// monitor mode; this path never reconfigures interfaces itself.
    pub async fn deauth_wifi_client(
        &self,
        client_mac: &str,
        ap_mac: &str,
        reason: &str,
    ) -> Result<()> {
        if !self.enforcer.available("aireplay-ng") {
            return Err(DetectorError::ToolUnavailable("WiFi deauthentication"));
        }

        let iface = crate::samplers::wifi::find_monitor_interface(&self.cfg)
            .await?
            .ok_or_else(|| {
                DetectorError::tool_failed("iwconfig", "no monitor interface available for deauth")
            })?;

        let count = self.cfg.deauth_packets.to_string();
        self.enforcer
            .run(&ToolCommand::new(
                "aireplay-ng",
                &["--deauth", &count, "-a", ap_mac, "-c", client_mac, &iface],
            ))
            .await?;

        info!(
            "deauthenticated WiFi client {} from AP {}: {}",
            client_mac, ap_mac, reason
        );
        Ok(())
    }

    /// Automatic response to one finding. A no-op unless auto-blocking is
    /// enabled. Findings with no safe automatic response are logged only.
    pub async fn auto_mitigate(&self, attack: &Attack) -> Result<()> {
        if !self.state.read().await.auto_block {
            return Ok(());
        }

        match attack.kind {
            AttackKind::UnknownDevice
            | AttackKind::SuspiciousPort
            | AttackKind::AiConnectionAnomaly => {
                if attack.target.contains('.') {
                    let reason = format!("Auto-blocked: {}", attack.description);
                    self.block_ip(&attack.target, &reason).await?;
                }
            }
            AttackKind::BluetoothSpoofing | AttackKind::BluetoothMitm => {
                let reason = format!("Auto-blocked: {}", attack.description);
                self.block_bluetooth_device(&attack.target, &reason).await?;
            }
            AttackKind::EvilTwin | AttackKind::RogueAp => {
                // Deauthing clients of a rogue AP needs client context the
                // finding does not carry; record the intent only.
                info!("would deauth clients from rogue AP: {}", attack.target);
            }
            AttackKind::WeakEncryption | AttackKind::BluetoothMassScanning => {}
        }

        Ok(())
    }

    pub async fn blocked_items(&self) -> BlockedItems {
        let state = self.state.read().await;
        BlockedItems {
            blocked_ips: state.blocked_ips.clone(),
            blocked_macs: state.blocked_macs.clone(),
            blocked_bt_addrs: state.blocked_bt_addrs.clone(),
        }
    }

    pub async fn set_auto_block(&self, enabled: bool) {
        let mut state = self.state.write().await;
        state.auto_block = enabled;
        info!(
            "auto-blocking {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    pub async fn auto_block_enabled(&self) -> bool {
        self.state.read().await.auto_block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use std::sync::{Arc, Mutex};

    /// Enforcer with a fixed tool set; records every command it runs and
    /// fails those whose descriptor contains a configured fragment.
    #[derive(Clone)]
    struct FakeEnforcer {
        tools: Vec<&'static str>,
        fail_matching: Vec<&'static str>,
        ran: Arc<Mutex<Vec<String>>>,
    }

    impl FakeEnforcer {
        fn new(tools: &[&'static str]) -> Self {
            Self {
                tools: tools.to_vec(),
                fail_matching: Vec::new(),
                ran: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn failing(tools: &[&'static str], fail_matching: &[&'static str]) -> Self {
            Self {
                fail_matching: fail_matching.to_vec(),
                ..Self::new(tools)
            }
        }

        fn ran(&self) -> Vec<String> {
            self.ran.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Enforcer for FakeEnforcer {
        fn available(&self, tool: &str) -> bool {
            self.tools.contains(&tool)
        }

        async fn run(&self, cmd: &ToolCommand) -> Result<()> {
            let descriptor = cmd.describe();
            self.ran.lock().unwrap().push(descriptor.clone());
            if self.fail_matching.iter().any(|f| descriptor.contains(f)) {
                return Err(DetectorError::tool_failed(descriptor, "exit 2"));
            }
            Ok(())
        }
    }

    fn blocker(enforcer: FakeEnforcer, auto_block: bool) -> (Blocker, FakeEnforcer) {
        let cfg = MonitorConfig {
            auto_block,
            ..MonitorConfig::default()
        };
        (
            Blocker::with_enforcer(Box::new(enforcer.clone()), &cfg),
            enforcer,
        )
    }

    #[tokio::test]
    async fn block_ip_prefers_ufw_and_records_the_block() {
        let (blocker, enforcer) = blocker(FakeEnforcer::new(&["ufw", "iptables"]), false);
        blocker.block_ip("10.0.0.9", "test").await.unwrap();

        let commands = enforcer.ran();
        assert_eq!(commands, vec!["ufw deny from 10.0.0.9"]);
        let items = blocker.blocked_items().await;
        assert!(items.blocked_ips.contains_key("10.0.0.9"));
    }

    #[tokio::test]
    async fn firewalld_path_adds_rule_then_reloads() {
        let (blocker, enforcer) = blocker(FakeEnforcer::new(&["firewall-cmd"]), false);
        blocker.block_ip("10.0.0.9", "test").await.unwrap();

        let commands = enforcer.ran();
        assert_eq!(commands.len(), 2);
        assert!(commands[0].contains("--add-rich-rule"));
        assert!(commands[0].contains("10.0.0.9"));
        assert_eq!(commands[1], "firewall-cmd --reload");
    }

    #[tokio::test]
    async fn double_block_is_a_state_conflict() {
        let (blocker, _) = blocker(FakeEnforcer::new(&["iptables"]), false);
        blocker.block_ip("10.0.0.9", "test").await.unwrap();
        let err = blocker.block_ip("10.0.0.9", "again").await.unwrap_err();
        assert!(err.is_state_conflict());
    }

    #[tokio::test]
    async fn unblock_of_unknown_address_is_a_state_conflict() {
        let (blocker, _) = blocker(FakeEnforcer::new(&["iptables"]), false);
        assert!(blocker.unblock_ip("10.0.0.9").await.unwrap_err().is_state_conflict());
        assert!(blocker
            .unblock_mac("AA:BB:CC:DD:EE:FF")
            .await
            .unwrap_err()
            .is_state_conflict());
        assert!(blocker
            .unblock_bluetooth_device("AA:BB:CC:DD:EE:FF")
            .await
            .unwrap_err()
            .is_state_conflict());
    }

    #[tokio::test]
    async fn failed_enforcement_leaves_no_record() {
        let (blocker, _) =
            blocker(FakeEnforcer::failing(&["iptables"], &["iptables"]), false);
        assert!(blocker.block_ip("10.0.0.9", "test").await.is_err());
        assert!(blocker.blocked_items().await.blocked_ips.is_empty());
    }

    #[tokio::test]
    async fn no_firewall_tool_reports_unavailable() {
        let (blocker, _) = blocker(FakeEnforcer::new(&[]), false);
        let err = blocker.block_ip("10.0.0.9", "test").await.unwrap_err();
        assert!(matches!(err, DetectorError::ToolUnavailable(_)));
    }

    #[tokio::test]
    async fn mac_block_falls_back_to_iptables_when_ebtables_fails() {
        let (blocker, enforcer) = blocker(
            FakeEnforcer::failing(&["ebtables", "iptables"], &["ebtables"]),
            false,
        );
        blocker.block_mac("AA:BB:CC:DD:EE:FF", "test").await.unwrap();

        let commands = enforcer.ran();
        assert_eq!(commands.len(), 2);
        assert!(commands[0].starts_with("ebtables"));
        assert!(commands[1].contains("--mac-source AA:BB:CC:DD:EE:FF"));
        assert!(blocker
            .blocked_items()
            .await
            .blocked_macs
            .contains_key("AA:BB:CC:DD:EE:FF"));
    }

    #[tokio::test]
    async fn bluetooth_block_is_recorded_even_without_rfkill() {
        let (blocker, enforcer) = blocker(FakeEnforcer::new(&[]), false);
        blocker
            .block_bluetooth_device("AA:BB:CC:DD:EE:FF", "test")
            .await
            .unwrap();
        assert!(enforcer.ran().is_empty());
        assert!(blocker
            .blocked_items()
            .await
            .blocked_bt_addrs
            .contains_key("AA:BB:CC:DD:EE:FF"));

        blocker
            .unblock_bluetooth_device("AA:BB:CC:DD:EE:FF")
            .await
            .unwrap();
        assert!(blocker.blocked_items().await.blocked_bt_addrs.is_empty());
    }

    #[tokio::test]
    async fn auto_mitigate_is_a_noop_when_disabled() {
        let (blocker, enforcer) = blocker(FakeEnforcer::new(&["ufw"]), false);
        let attack = Attack::new(
            AttackKind::SuspiciousPort,
            Severity::Medium,
            "Suspicious open port detected: 23/tcp (Telnet)",
            "192.168.1.50",
        );
        blocker.auto_mitigate(&attack).await.unwrap();
        assert!(enforcer.ran().is_empty());
        assert!(blocker.blocked_items().await.blocked_ips.is_empty());
    }

    #[tokio::test]
    async fn auto_mitigate_blocks_ip_shaped_targets_when_enabled() {
        let (blocker, _) = blocker(FakeEnforcer::new(&["ufw"]), true);
        let attack = Attack::new(
            AttackKind::SuspiciousPort,
            Severity::Medium,
            "Suspicious open port detected: 23/tcp (Telnet)",
            "192.168.1.50",
        );
        blocker.auto_mitigate(&attack).await.unwrap();
        assert!(blocker
            .blocked_items()
            .await
            .blocked_ips
            .contains_key("192.168.1.50"));

        // Non-IP-shaped targets are skipped, not errors.
        let named = Attack::new(
            AttackKind::SuspiciousPort,
            Severity::Medium,
            "Suspicious open port detected: 21/tcp (FTP)",
            "network",
        );
        blocker.auto_mitigate(&named).await.unwrap();
        assert_eq!(blocker.blocked_items().await.blocked_ips.len(), 1);
    }

    #[tokio::test]
    async fn auto_mitigate_routes_bluetooth_findings_to_bluetooth_block() {
        let (blocker, _) = blocker(FakeEnforcer::new(&["rfkill"]), true);
        let attack = Attack::new(
            AttackKind::BluetoothSpoofing,
            Severity::High,
            "Suspicious Bluetooth device name: HackTool (AA:BB:CC:DD:EE:FF)",
            "AA:BB:CC:DD:EE:FF",
        );
        blocker.auto_mitigate(&attack).await.unwrap();
        assert!(blocker
            .blocked_items()
            .await
            .blocked_bt_addrs
            .contains_key("AA:BB:CC:DD:EE:FF"));
    }

    #[tokio::test]
    async fn rogue_ap_findings_are_logged_intent_only() {
        let (blocker, enforcer) = blocker(FakeEnforcer::new(&["ufw", "rfkill"]), true);
        let attack = Attack::new(
            AttackKind::EvilTwin,
            Severity::High,
            "Potential evil twin attack: SSID 'Home' advertised by 2 access points",
            "Home",
        );
        blocker.auto_mitigate(&attack).await.unwrap();
        assert!(enforcer.ran().is_empty());
    }

    #[tokio::test]
    async fn set_auto_block_toggles_the_flag() {
        let (blocker, _) = blocker(FakeEnforcer::new(&[]), false);
        assert!(!blocker.auto_block_enabled().await);
        blocker.set_auto_block(true).await;
        assert!(blocker.auto_block_enabled().await);
        blocker.set_auto_block(true).await;
        assert!(blocker.auto_block_enabled().await);
    }

    #[tokio::test]
    async fn deauth_requires_aireplay() {
        let (blocker, _) = blocker(FakeEnforcer::new(&[]), false);
        let err = blocker
            .deauth_wifi_client("AA:AA:AA:AA:AA:AA", "BB:BB:BB:BB:BB:BB", "test")
            .await
            .unwrap_err();
        assert!(matches!(err, DetectorError::ToolUnavailable(_)));
    }
}
