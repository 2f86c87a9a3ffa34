//! Monitoring engine: one tokio loop per started domain, each running
//! sample -> heuristics -> findings -> auto-mitigation on its own cadence,
//! all torn down together through a shared cancellation token.

use std::collections::HashSet;
use std::sync::Mutex as StdMutex;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::blocker::Blocker;
use crate::config::MonitorConfig;
use crate::detect;
use crate::findings::FindingsLog;
use crate::models::{Attack, Domain};
use crate::samplers;
use crate::store::ObservationStore;

/// The monitoring and mitigation engine. Nothing samples until a domain is
/// explicitly started; `close` stops everything and waits for the loops to
/// finish their in-flight pass.
pub struct Monitor {
    cfg: MonitorConfig,
    store: Arc<ObservationStore>,
    findings: Arc<FindingsLog>,
    blocker: Arc<Blocker>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: StdMutex<HashSet<Domain>>,
}

impl Monitor {
    pub fn new(cfg: MonitorConfig) -> Self {
        let blocker = Arc::new(Blocker::new(&cfg));
        Self {
            cfg,
            store: Arc::new(ObservationStore::new()),
            findings: Arc::new(FindingsLog::new()),
            blocker,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            started: StdMutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> Arc<ObservationStore> {
        Arc::clone(&self.store)
    }

    pub fn findings(&self) -> Arc<FindingsLog> {
        Arc::clone(&self.findings)
    }

    pub fn blocker(&self) -> Arc<Blocker> {
        Arc::clone(&self.blocker)
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.cfg
    }

    fn interval_for(&self, domain: Domain) -> Duration {
        let secs = match domain {
            Domain::Wifi => self.cfg.wifi_interval_secs,
            Domain::Bluetooth => self.cfg.bluetooth_interval_secs,
            Domain::Ble => self.cfg.ble_interval_secs,
            Domain::Radio => self.cfg.radio_interval_secs,
            Domain::Network => self.cfg.network_interval_secs,
        };
        Duration::from_secs(secs)
    }

    /// Starts the sampling loop for one domain. The first pass runs
    /// immediately; subsequent passes follow the configured interval.
    /// Starting an already-started domain is a no-op.
    pub async fn start(&self, domain: Domain) {
        {
            let mut started = self.started.lock().unwrap_or_else(|e| e.into_inner());
            if !started.insert(domain) {
                debug!("{} loop already running", domain);
                return;
            }
        }

        info!("starting {} monitoring every {:?}", domain, self.interval_for(domain));

        let cfg = self.cfg.clone();
        let store = Arc::clone(&self.store);
        let findings = Arc::clone(&self.findings);
        let blocker = Arc::clone(&self.blocker);
        let cancel = self.cancel.clone();
        let period = self.interval_for(domain);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("{} loop stopping", domain);
                        break;
                    }
                    _ = ticker.tick() => {
                        run_domain_pass(domain, &store, &findings, &blocker, &cfg).await;
                    }
                }
            }
        });

        self.tasks.lock().await.push(handle);
    }

    pub async fn start_all(&self) {
        for domain in Domain::ALL {
            self.start(domain).await;
        }
    }

    /// One immediate pass of every domain, loops untouched. Used for an
    /// on-demand posture check before (or without) starting the engine.
    pub async fn quick_scan(&self) {
        info!("running quick scan across all domains");
        for domain in Domain::ALL {
            run_domain_pass(domain, &self.store, &self.findings, &self.blocker, &self.cfg).await;
        }
    }

    /// Stops all loops and waits for them. Safe to call when nothing was
    /// started, and safe to call more than once.
    pub async fn close(&self) {
        self.cancel.cancel();
        let mut tasks = self.tasks.lock().await;
        for handle in tasks.drain(..) {
            if let Err(err) = handle.await {
                warn!("sampler task join failed: {}", err);
            }
        }
        info!("monitor closed");
    }
}

/// One full pass for one domain: sample, run that domain's heuristics, then
/// record and (optionally) mitigate each finding.
pub async fn run_domain_pass(
    domain: Domain,
    store: &ObservationStore,
    findings: &FindingsLog,
    blocker: &Blocker,
    cfg: &MonitorConfig,
) {
    let attacks: Vec<Attack> = match domain {
        Domain::Wifi => {
            samplers::wifi::sample(store, cfg).await;
            detect::wifi_attacks(&store.wifi().access_points)
        }
        Domain::Bluetooth => {
            samplers::bluetooth::sample(store, cfg).await;
            detect::bluetooth_attacks(&store.bluetooth())
        }
        Domain::Ble => {
            // Tracker annotation happens at parse time; no heuristic pass.
            samplers::ble::sample(store, cfg).await;
            Vec::new()
        }
        Domain::Radio => {
            samplers::radio::sample(store, cfg).await;
            Vec::new()
        }
        Domain::Network => {
            samplers::network::sample(store, cfg).await;
            match samplers::network::scan_ports(cfg).await {
                Some(output) => detect::suspicious_ports(&output),
                None => Vec::new(),
            }
        }
    };

    for attack in attacks {
        warn!(
            "{} [{}] {} (target {})",
            attack.kind, attack.severity, attack.description, attack.target
        );
        findings.append(attack.clone());
        if let Err(err) = blocker.auto_mitigate(&attack).await {
            if err.is_state_conflict() {
                debug!("auto-mitigation skipped: {}", err);
            } else {
                warn!("auto-mitigation failed: {}", err);
            }
        }
    }
}
