//! Per-host scan driver
//!
//! A [`HostProcess`] collects the scannable nodes of one host below its
//! start nodes, then runs every queued plugin over them in factory order.
//! It owns the host's knowledge base and analyser and is the alert sink and
//! request path of every plugin instance it creates.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::alert::{Alert, AlertSink};
use super::analyser::Analyser;
use super::filter::{FilterResult, ScanFilter};
use super::kb::Kb;
use super::name_value_pair::NameValuePair;
use super::param::{ParamExclusions, ScannerParam};
use super::plugin::{Plugin, PluginFactory, PluginTarget};
use super::variant::{Variant, VariantFactory};
use crate::http::{HttpMessage, HttpSender};
use crate::model::{Context, CustomPageType, HistoryType, NodeId, SiteNode, SiteTree, TechSet};

pub const SKIP_NO_NODES: &str = "no nodes to scan";
pub const SKIP_TECH: &str = "scanner does not target selected technologies";

/// What a host process needs from the scan that owns it
pub trait ScannerParent: Send + Sync {
    /// `name` is the logical node name, e.g. `GET:https://example.com/login`
    fn is_in_scope(&self, name: &str) -> bool;

    fn scan_children(&self) -> bool;

    fn scan_filters(&self) -> Vec<Arc<dyn ScanFilter>>;

    fn notify_filtered_message(&self, msg: &HttpMessage, reason: &str);

    fn notify_host_progress(&self, host: &str, status: Option<&str>, percentage: u8);

    fn notify_host_complete(&self, host: &str);

    fn alert_found(&self, alert: &Alert);

    fn wait_if_paused(&self);

    fn is_stop(&self) -> bool;
}

/// What happened to one plugin on one host
#[derive(Debug, Clone, Default, Serialize)]
pub struct PluginStats {
    pub skipped: bool,
    pub skip_reason: Option<String>,
    pub message_count: usize,
    pub alert_count: usize,
    pub time_started: Option<DateTime<Utc>>,
    pub time_finished: Option<DateTime<Utc>>,
}

pub struct HostProcess {
    host: String,
    tree: Arc<SiteTree>,
    parent: Arc<dyn ScannerParent>,
    sender: Arc<dyn HttpSender>,
    param: ScannerParam,
    context: Option<Arc<dyn Context>>,
    tech_set: TechSet,
    factory: Mutex<PluginFactory>,
    variants: VariantFactory,
    exclusions: ParamExclusions,
    kb: Kb,
    analyser: Analyser,
    start_nodes: Mutex<Vec<NodeId>>,
    stats: Mutex<BTreeMap<u32, PluginStats>>,
    stopped_plugins: Mutex<HashSet<u32>>,
    stopped: AtomicBool,
    completed: AtomicBool,
    tests_total: AtomicUsize,
    tests_done: AtomicUsize,
}

impl fmt::Debug for HostProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostProcess")
            .field("host", &self.host)
            .field("start_nodes", &self.start_nodes.lock().len())
            .field("stopped", &self.stopped.load(Ordering::Relaxed))
            .field("completed", &self.completed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl HostProcess {
    pub fn new(
        host: &str,
        tree: Arc<SiteTree>,
        parent: Arc<dyn ScannerParent>,
        sender: Arc<dyn HttpSender>,
        factory: PluginFactory,
        param: ScannerParam,
    ) -> Self {
        Self {
            host: host.to_string(),
            tree,
            parent,
            analyser: Analyser::new(),
            sender,
            variants: VariantFactory::from_param(&param),
            exclusions: ParamExclusions::new(&param.excluded_params),
            param,
            context: None,
            tech_set: TechSet::all(),
            factory: Mutex::new(factory),
            kb: Kb::new(),
            start_nodes: Mutex::new(Vec::new()),
            stats: Mutex::new(BTreeMap::new()),
            stopped_plugins: Mutex::new(HashSet::new()),
            stopped: AtomicBool::new(false),
            completed: AtomicBool::new(false),
            tests_total: AtomicUsize::new(0),
            tests_done: AtomicUsize::new(0),
        }
    }

    /// Use the context's custom pages and technologies
    pub fn with_context(mut self, context: Arc<dyn Context>) -> Self {
        self.tech_set = context.tech_set();
        self.context = Some(context);
        self
    }

    pub fn with_tech_set(mut self, tech_set: TechSet) -> Self {
        self.tech_set = tech_set;
        self
    }

    pub fn with_variant_factory(mut self, variants: VariantFactory) -> Self {
        self.variants = variants;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Replace the start nodes; `None` is ignored
    pub fn set_start_node(&self, node: Option<NodeId>) {
        if let Some(node) = node {
            let mut start_nodes = self.start_nodes.lock();
            start_nodes.clear();
            start_nodes.push(node);
        }
    }

    /// Add a start node; `None` is ignored
    pub fn add_start_node(&self, node: Option<NodeId>) {
        if let Some(node) = node {
            self.start_nodes.lock().push(node);
        }
    }

    pub fn tech_set(&self) -> &TechSet {
        &self.tech_set
    }

    pub fn kb(&self) -> &Kb {
        &self.kb
    }

    pub fn analyser(&self) -> &Analyser {
        &self.analyser
    }

    pub fn plugin_stats(&self, plugin_id: u32) -> Option<PluginStats> {
        self.stats.lock().get(&plugin_id).cloned()
    }

    pub fn all_plugin_stats(&self) -> BTreeMap<u32, PluginStats> {
        self.stats.lock().clone()
    }

    pub fn tests_total(&self) -> usize {
        self.tests_total.load(Ordering::SeqCst)
    }

    pub fn tests_done(&self) -> usize {
        self.tests_done.load(Ordering::SeqCst)
    }

    pub fn percentage(&self) -> u8 {
        let total = self.tests_total();
        if total == 0 {
            return 0;
        }
        (self.tests_done() * 100 / total).min(100) as u8
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stop(&self) -> bool {
        self.stopped.load(Ordering::SeqCst) || self.parent.is_stop()
    }

    pub fn stop_plugin(&self, plugin_id: u32) {
        self.stopped_plugins.lock().insert(plugin_id);
    }

    pub fn is_plugin_stopped(&self, plugin_id: u32) -> bool {
        self.is_stop() || self.stopped_plugins.lock().contains(&plugin_id)
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn wait_if_paused(&self) {
        self.parent.wait_if_paused();
    }

    /// Variants that apply to `msg`, primed with its parameters
    pub fn variants_for(&self, msg: &HttpMessage) -> Vec<Box<dyn Variant>> {
        self.variants.variants_for(msg)
    }

    pub fn is_excluded(&self, param: &NameValuePair) -> bool {
        self.exclusions.is_excluded(param)
    }

    /// Custom page check against the active context; false without one
    pub fn is_custom_page(&self, msg: &HttpMessage, page_type: CustomPageType) -> bool {
        self.context
            .as_ref()
            .map(|c| c.is_custom_page(msg, page_type))
            .unwrap_or(false)
    }

    /// Send a request on behalf of a plugin
    pub fn send_and_receive(&self, plugin_id: u32, msg: &mut HttpMessage) -> anyhow::Result<()> {
        self.parent.wait_if_paused();
        if self.is_stop() {
            anyhow::bail!("scan of {} stopped", self.host);
        }
        self.sender.send_and_receive(msg)?;
        self.stats.lock().entry(plugin_id).or_default().message_count += 1;
        Ok(())
    }

    /// Whether `msg` points at an existing resource; the not-found request
    /// goes out on behalf of `plugin_id`, honouring pause and stop
    pub fn is_file_exist(&self, plugin_id: u32, msg: &HttpMessage) -> bool {
        self.analyser
            .is_file_exist(msg, |missing| self.send_and_receive(plugin_id, missing))
    }

    /// Scan the host; returns once every plugin has run or the scan stopped
    pub fn run(self: &Arc<Self>) {
        tracing::info!("Scanning host {}", self.host);
        let nodes = self.nodes_to_scan();
        tracing::debug!("{} nodes to scan on {}", nodes.len(), self.host);

        if nodes.is_empty() {
            let skipped = self.factory.lock().drain_pending();
            for plugin in skipped {
                self.mark_skipped(plugin.id(), SKIP_NO_NODES);
            }
            self.notify_complete();
            return;
        }

        let plugin_count = self.factory.lock().total_plugins_to_run();
        self.tests_total
            .store(plugin_count * nodes.len(), Ordering::SeqCst);

        while !self.is_stop() {
            let next = {
                let mut factory = self.factory.lock();
                if !factory.exist_plugin_to_run() {
                    break;
                }
                factory.next_plugin()
            };
            let plugin = match next {
                Some(plugin) => plugin,
                None => {
                    tracing::warn!("Plugins left on {} have unmet dependencies", self.host);
                    break;
                }
            };

            let id = plugin.id();
            self.run_plugin(plugin.as_ref(), &nodes);
            self.factory.lock().set_running_plugin_completed(id);
        }

        self.notify_complete();
    }

    fn run_plugin(self: &Arc<Self>, plugin: &dyn Plugin, nodes: &[NodeId]) {
        let id = plugin.id();
        self.stats.lock().entry(id).or_default().time_started = Some(Utc::now());

        if !plugin.targets_tech(&self.tech_set) {
            tracing::debug!("Skipping plugin {} on {}: {}", id, self.host, SKIP_TECH);
            self.mark_skipped(id, SKIP_TECH);
            self.tests_done.fetch_add(nodes.len(), Ordering::SeqCst);
            self.notify_progress(plugin.name());
            return;
        }

        tracing::debug!("Running plugin {} ({}) on {}", id, plugin.name(), self.host);
        match plugin.target() {
            PluginTarget::Host => {
                self.scan_node(plugin, nodes[0]);
                self.tests_done.fetch_add(nodes.len(), Ordering::SeqCst);
                self.notify_progress(plugin.name());
            }
            PluginTarget::Node => {
                for &node in nodes {
                    if self.is_plugin_stopped(id) {
                        break;
                    }
                    self.parent.wait_if_paused();
                    self.scan_node(plugin, node);
                    self.tests_done.fetch_add(1, Ordering::SeqCst);
                    self.notify_progress(plugin.name());
                }
            }
        }

        self.stats.lock().entry(id).or_default().time_finished = Some(Utc::now());
    }

    fn scan_node(self: &Arc<Self>, prototype: &dyn Plugin, node: NodeId) {
        let msg = match self.tree.node(node).and_then(SiteNode::message) {
            Some(msg) => msg.clone(),
            None => return,
        };
        let uri = msg.uri().to_string();

        let mut plugin = prototype.clone_box();
        plugin.core_mut().set_delay_in_ms(self.param.delay_in_ms);
        plugin.core_mut().set_tech_set(self.tech_set.clone());
        plugin.init(msg, Arc::clone(self));

        match panic::catch_unwind(AssertUnwindSafe(|| plugin.scan())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!("Plugin {} failed on {}: {}", plugin.id(), uri, e);
            }
            Err(_) => {
                tracing::warn!("Plugin {} panicked on {}", plugin.id(), uri);
            }
        }
    }

    fn mark_skipped(&self, plugin_id: u32, reason: &str) {
        let now = Utc::now();
        let mut stats = self.stats.lock();
        let entry = stats.entry(plugin_id).or_default();
        entry.skipped = true;
        entry.skip_reason = Some(reason.to_string());
        entry.time_started.get_or_insert(now);
        entry.time_finished = Some(now);
    }

    fn notify_progress(&self, status: &str) {
        self.parent
            .notify_host_progress(&self.host, Some(status), self.percentage());
    }

    fn notify_complete(&self) {
        if self.completed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.parent.notify_host_progress(&self.host, None, 100);
        self.parent.notify_host_complete(&self.host);
        tracing::info!("Finished scanning host {}", self.host);
    }

    /// Scannable nodes below the start nodes, each listed once
    fn nodes_to_scan(&self) -> Vec<NodeId> {
        let starts = self.start_nodes.lock().clone();
        let mut visited = HashSet::new();
        let mut nodes = Vec::new();
        for start in starts {
            self.traverse(start, true, &mut visited, &mut nodes);
        }
        nodes
    }

    fn traverse(
        &self,
        id: NodeId,
        include_related: bool,
        visited: &mut HashSet<NodeId>,
        out: &mut Vec<NodeId>,
    ) {
        if self.is_stop() || !visited.insert(id) {
            return;
        }
        let node = match self.tree.node(id) {
            Some(node) => node,
            None => return,
        };
        if self.is_scannable(node) {
            out.push(id);
        }
        if !self.parent.scan_children() {
            return;
        }

        // A leaf like `GET:login(user)` shares its children with the
        // directory node `login` next to it
        let mut parents = vec![id];
        if include_related {
            if let Some(up) = node.parent().and_then(|p| self.tree.node(p)) {
                parents.extend(up.children().iter().copied().filter(|&sibling| {
                    sibling != id
                        && self
                            .tree
                            .node(sibling)
                            .map(|s| s.clean_name() == node.clean_name())
                            .unwrap_or(false)
                }));
            }
        }

        for parent in parents {
            let children = match self.tree.node(parent) {
                Some(p) => p.children().to_vec(),
                None => continue,
            };
            for child in children {
                if self.is_stop() {
                    return;
                }
                self.parent.wait_if_paused();
                self.traverse(child, false, visited, out);
            }
        }
    }

    fn is_scannable(&self, node: &SiteNode) -> bool {
        let history = match node.history() {
            Some(history) => history,
            None => return false,
        };
        if history.history_type == HistoryType::Scanner {
            tracing::debug!("Skipping {}: sent by the scanner", node.name());
            return false;
        }

        let name = node.logical_name();
        if !self.parent.is_in_scope(&name) {
            tracing::debug!("Skipping {}: out of scope", name);
            return false;
        }

        for filter in self.parent.scan_filters() {
            match panic::catch_unwind(AssertUnwindSafe(|| filter.is_filtered(node))) {
                Ok(Ok(FilterResult::NotFiltered)) => {}
                Ok(Ok(FilterResult::Filtered(reason))) => {
                    tracing::debug!("Skipping {}: {}", name, reason);
                    self.parent.notify_filtered_message(&history.message, &reason);
                    return false;
                }
                Ok(Err(e)) => tracing::warn!("Scan filter failed on {}: {}", name, e),
                Err(_) => tracing::warn!("Scan filter panicked on {}", name),
            }
        }
        true
    }
}

impl AlertSink for HostProcess {
    fn alert_found(&self, alert: Alert) {
        let plugin_id = alert.plugin_id;
        let count = {
            let mut stats = self.stats.lock();
            let entry = stats.entry(plugin_id).or_default();
            entry.alert_count += 1;
            entry.alert_count
        };

        self.parent.alert_found(&alert);

        let max = self.param.max_alerts_per_rule;
        if max > 0 && count >= max {
            tracing::info!(
                "Plugin {} raised {} alerts on {}, stopping it",
                plugin_id,
                count,
                self.host
            );
            self.stop_plugin(plugin_id);
        }
    }
}
