//! Scan orchestration
//!
//! A [`Scanner`] groups its start nodes by host and runs one
//! [`HostProcess`] per host on worker threads, at most `hosts_per_scan` at
//! a time. It owns pause/resume/stop and collects the alerts.

use anyhow::{bail, Result};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::alert::Alert;
use super::control::{ScanControl, ScanState};
use super::filter::ScanFilter;
use super::host_process::{HostProcess, ScannerParent};
use super::param::ScannerParam;
use super::plugin::PluginFactory;
use crate::http::{HttpMessage, HttpSender, Uri};
use crate::model::{Context, NodeId, SiteTree, TechSet};
use crate::scope::Scope;

/// Scan events; every method defaults to doing nothing
pub trait ScannerListener: Send + Sync {
    fn host_progress(&self, _host: &str, _status: Option<&str>, _percentage: u8) {}

    fn host_complete(&self, _host: &str) {}

    fn scan_complete(&self) {}

    fn alert_found(&self, _alert: &Alert) {}

    fn filtered_message(&self, _msg: &HttpMessage, _reason: &str) {}
}

/// Scan progress snapshot
#[derive(Debug, Clone)]
pub struct ScanProgress {
    pub state: ScanState,
    pub hosts_total: usize,
    pub hosts_completed: usize,
    pub host_percentages: BTreeMap<String, u8>,
    pub alerts: usize,
    pub elapsed: Duration,
}

struct ScanShared {
    param: ScannerParam,
    sender: Arc<dyn HttpSender>,
    factory: PluginFactory,
    scope: Option<Scope>,
    context: Option<Arc<dyn Context>>,
    tech_set: Option<TechSet>,
    filters: RwLock<Vec<Arc<dyn ScanFilter>>>,
    listeners: RwLock<Vec<Arc<dyn ScannerListener>>>,
    control: ScanControl,
    alerts: Mutex<Vec<Alert>>,
    host_processes: Mutex<Vec<Arc<HostProcess>>>,
    hosts_total: Mutex<usize>,
    hosts_completed: Mutex<usize>,
    finished: Mutex<bool>,
    finished_cv: Condvar,
}

impl ScanShared {
    fn listeners(&self) -> Vec<Arc<dyn ScannerListener>> {
        self.listeners.read().clone()
    }

    /// Terminal transition: the run clock stops before waiters wake
    fn finish(&self) {
        let mut finished = self.finished.lock();
        if *finished {
            return;
        }
        self.control.stop();
        *finished = true;
        self.finished_cv.notify_all();
        drop(finished);

        tracing::info!(
            "Scan complete: {} alerts in {:?}",
            self.alerts.lock().len(),
            self.control.elapsed()
        );
        for listener in self.listeners() {
            listener.scan_complete();
        }
    }

    fn run_host(self: &Arc<Self>, tree: &Arc<SiteTree>, host: &str, nodes: &[NodeId]) {
        let mut process = HostProcess::new(
            host,
            tree.clone(),
            self.clone() as Arc<dyn ScannerParent>,
            self.sender.clone(),
            self.factory.clone(),
            self.param.clone(),
        );
        if let Some(context) = &self.context {
            process = process.with_context(context.clone());
        }
        if let Some(tech_set) = &self.tech_set {
            process = process.with_tech_set(tech_set.clone());
        }

        for node in nodes {
            process.add_start_node(Some(*node));
        }

        let process = Arc::new(process);
        self.host_processes.lock().push(process.clone());
        process.run();
    }
}

impl ScannerParent for ScanShared {
    fn is_in_scope(&self, name: &str) -> bool {
        if let Some(context) = &self.context {
            if !context.is_in_context(name) {
                return false;
            }
        }
        if self.param.in_scope_only {
            return self
                .scope
                .as_ref()
                .map(|scope| scope.is_in_scope(name))
                .unwrap_or(true);
        }
        true
    }

    fn scan_children(&self) -> bool {
        self.param.scan_children
    }

    fn scan_filters(&self) -> Vec<Arc<dyn ScanFilter>> {
        self.filters.read().clone()
    }

    fn notify_filtered_message(&self, msg: &HttpMessage, reason: &str) {
        for listener in self.listeners() {
            listener.filtered_message(msg, reason);
        }
    }

    fn notify_host_progress(&self, host: &str, status: Option<&str>, percentage: u8) {
        for listener in self.listeners() {
            listener.host_progress(host, status, percentage);
        }
    }

    fn notify_host_complete(&self, host: &str) {
        *self.hosts_completed.lock() += 1;
        for listener in self.listeners() {
            listener.host_complete(host);
        }
    }

    fn alert_found(&self, alert: &Alert) {
        tracing::info!(
            "[{}] {} at {} ({})",
            alert.risk.name(),
            alert.name,
            alert.uri,
            alert.param
        );
        self.alerts.lock().push(alert.clone());
        for listener in self.listeners() {
            listener.alert_found(alert);
        }
    }

    fn wait_if_paused(&self) {
        self.control.wait_if_paused();
    }

    fn is_stop(&self) -> bool {
        self.control.is_stopped()
    }
}

pub struct Scanner {
    shared: Arc<ScanShared>,
    coordinator: Mutex<Option<JoinHandle<()>>>,
}

impl Scanner {
    /// `factory` is cloned for every host, so hosts never share plugin state
    pub fn new(param: ScannerParam, sender: Arc<dyn HttpSender>, factory: PluginFactory) -> Self {
        Self {
            shared: Arc::new(ScanShared {
                param,
                sender,
                factory,
                scope: None,
                context: None,
                tech_set: None,
                filters: RwLock::new(Vec::new()),
                listeners: RwLock::new(Vec::new()),
                control: ScanControl::new(),
                alerts: Mutex::new(Vec::new()),
                host_processes: Mutex::new(Vec::new()),
                hosts_total: Mutex::new(0),
                hosts_completed: Mutex::new(0),
                finished: Mutex::new(false),
                finished_cv: Condvar::new(),
            }),
            coordinator: Mutex::new(None),
        }
    }

    /// Settings can only change before the scan is started
    fn configure(mut self, apply: impl FnOnce(&mut ScanShared)) -> Self {
        match Arc::get_mut(&mut self.shared) {
            Some(shared) => apply(shared),
            None => tracing::warn!("Ignoring scanner setting, the scan is already running"),
        }
        self
    }

    /// Scope consulted when `in_scope_only` is set
    pub fn with_scope(self, scope: Scope) -> Self {
        self.configure(|shared| shared.scope = Some(scope))
    }

    pub fn with_context(self, context: Arc<dyn Context>) -> Self {
        self.configure(|shared| shared.context = Some(context))
    }

    pub fn with_tech_set(self, tech_set: TechSet) -> Self {
        self.configure(|shared| shared.tech_set = Some(tech_set))
    }

    pub fn add_filter(&self, filter: Arc<dyn ScanFilter>) {
        self.shared.filters.write().push(filter);
    }

    pub fn add_listener(&self, listener: Arc<dyn ScannerListener>) {
        self.shared.listeners.write().push(listener);
    }

    /// Start scanning `start_nodes` of `tree` in the background
    pub fn start(&self, tree: Arc<SiteTree>, start_nodes: &[NodeId]) -> Result<()> {
        if self.shared.control.state() != ScanState::Idle {
            bail!("scan already started");
        }

        let mut by_host: BTreeMap<String, Vec<NodeId>> = BTreeMap::new();
        for &id in start_nodes {
            let node = match tree.node(id) {
                Some(node) => node,
                None => continue,
            };
            let host = match node.message() {
                Some(msg) => msg.uri().host_url(),
                None => match Uri::parse(node.url()) {
                    Ok(uri) => uri.host_url(),
                    Err(e) => {
                        tracing::warn!("Ignoring start node {}: {}", node.name(), e);
                        continue;
                    }
                },
            };
            by_host.entry(host).or_default().push(id);
        }

        *self.shared.hosts_total.lock() = by_host.len();
        self.shared.control.start();
        tracing::info!(
            "Starting scan of {} hosts, {} at a time",
            by_host.len(),
            self.shared.param.hosts_per_scan
        );

        let queue: Arc<Mutex<VecDeque<(String, Vec<NodeId>)>>> =
            Arc::new(Mutex::new(by_host.into_iter().collect()));
        let worker_count = self.shared.param.hosts_per_scan.max(1).min(queue.lock().len());
        let shared = self.shared.clone();

        let coordinator = thread::Builder::new()
            .name("ascan-scanner".to_string())
            .spawn(move || {
                let workers: Vec<_> = (0..worker_count)
                    .filter_map(|n| {
                        let shared = shared.clone();
                        let queue = queue.clone();
                        let tree = tree.clone();
                        thread::Builder::new()
                            .name(format!("ascan-host-{}", n))
                            .spawn(move || loop {
                                if shared.control.is_stopped() {
                                    break;
                                }
                                let next = queue.lock().pop_front();
                                match next {
                                    Some((host, nodes)) => shared.run_host(&tree, &host, &nodes),
                                    None => break,
                                }
                            })
                            .map_err(|e| tracing::error!("Failed to spawn host worker: {}", e))
                            .ok()
                    })
                    .collect();

                for worker in workers {
                    if worker.join().is_err() {
                        tracing::error!("Host worker panicked");
                    }
                }
                shared.finish();
            })?;

        *self.coordinator.lock() = Some(coordinator);
        Ok(())
    }

    /// Block until every host is done or the scan stopped
    pub fn wait_for_completion(&self) {
        {
            let mut finished = self.shared.finished.lock();
            while !*finished {
                self.shared.finished_cv.wait(&mut finished);
            }
        }
        if let Some(handle) = self.coordinator.lock().take() {
            if handle.join().is_err() {
                tracing::error!("Scan coordinator panicked");
            }
        }
    }

    pub fn pause(&self) {
        self.shared.control.pause();
    }

    pub fn resume(&self) {
        self.shared.control.resume();
    }

    pub fn stop(&self) {
        self.shared.control.stop();
        for process in self.shared.host_processes.lock().iter() {
            process.stop();
        }
        if self.coordinator.lock().is_none() {
            self.shared.finish();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.shared.control.is_paused()
    }

    pub fn is_stop(&self) -> bool {
        self.shared.control.is_stopped()
    }

    pub fn state(&self) -> ScanState {
        self.shared.control.state()
    }

    /// Running time, pauses excluded
    pub fn elapsed(&self) -> Duration {
        self.shared.control.elapsed()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.shared.alerts.lock().clone()
    }

    pub fn host_processes(&self) -> Vec<Arc<HostProcess>> {
        self.shared.host_processes.lock().clone()
    }

    pub fn progress(&self) -> ScanProgress {
        ScanProgress {
            state: self.state(),
            hosts_total: *self.shared.hosts_total.lock(),
            hosts_completed: *self.shared.hosts_completed.lock(),
            host_percentages: self
                .host_processes()
                .iter()
                .map(|p| (p.host().to_string(), p.percentage()))
                .collect(),
            alerts: self.shared.alerts.lock().len(),
            elapsed: self.elapsed(),
        }
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        if let Some(handle) = self.coordinator.lock().take() {
            self.shared.control.stop();
            for process in self.shared.host_processes.lock().iter() {
                process.stop();
            }
            let _ = handle.join();
        }
        // Host processes point back at the shared state
        self.shared.host_processes.lock().clear();
    }
}
