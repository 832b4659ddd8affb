//! Plugin registry and per-scan plugin ordering

use parking_lot::RwLock;
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap, HashSet};

use super::{AlertThreshold, AttackStrength, Plugin};
use crate::app::ConfigStore;
use crate::error::PluginError;

/// Plugins available to scans.
///
/// Shared between scans; each scan instantiates its own copies through a
/// [`PluginFactory`].
#[derive(Debug, Default)]
pub struct PluginRegistry {
    loaded: RwLock<Vec<Box<dyn Plugin>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin, replacing a loaded plugin with the same id
    pub fn register(&self, plugin: Box<dyn Plugin>) {
        let mut loaded = self.loaded.write();
        loaded.retain(|p| p.id() != plugin.id());
        tracing::debug!("Loaded plugin {} ({})", plugin.id(), plugin.name());
        loaded.push(plugin);
    }

    pub fn unregister(&self, id: u32) -> Result<Box<dyn Plugin>, PluginError> {
        let mut loaded = self.loaded.write();
        let index = loaded
            .iter()
            .position(|p| p.id() == id)
            .ok_or_else(|| PluginError::UnknownPlugin(id.to_string()))?;
        Ok(loaded.remove(index))
    }

    pub fn contains(&self, id: u32) -> bool {
        self.loaded.read().iter().any(|p| p.id() == id)
    }

    pub fn get(&self, id: u32) -> Option<Box<dyn Plugin>> {
        self.loaded.read().iter().find(|p| p.id() == id).cloned()
    }

    /// Copies of every loaded plugin
    pub fn loaded(&self) -> Vec<Box<dyn Plugin>> {
        self.loaded.read().clone()
    }

    pub fn len(&self) -> usize {
        self.loaded.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.read().is_empty()
    }
}

/// The plugins of one scan and the order they run in.
///
/// The queue holds every enabled plugin plus the plugins they depend on.
/// Dependencies run first; otherwise higher risk, then more mature status,
/// then lower id goes first.
#[derive(Debug)]
pub struct PluginFactory {
    config: ConfigStore,
    plugins: Vec<Box<dyn Plugin>>,
    pending: Vec<u32>,
    running: Vec<u32>,
    completed: Vec<u32>,
    total: usize,
}

impl Clone for PluginFactory {
    /// Independent factory with its own plugins and configuration
    fn clone(&self) -> Self {
        let config = self.config.deep_clone();
        let plugins = self
            .plugins
            .iter()
            .map(|p| {
                let mut copy = p.clone_box();
                copy.set_config(config.clone());
                copy
            })
            .collect();

        Self {
            config,
            plugins,
            pending: self.pending.clone(),
            running: self.running.clone(),
            completed: self.completed.clone(),
            total: self.total,
        }
    }
}

impl PluginFactory {
    pub fn new(config: ConfigStore) -> Self {
        Self {
            config,
            plugins: Vec::new(),
            pending: Vec::new(),
            running: Vec::new(),
            completed: Vec::new(),
            total: 0,
        }
    }

    /// Instantiate every visible, non-deprecated plugin of `registry` and queue them
    pub fn load_all_plugins(&mut self, registry: &PluginRegistry) {
        self.plugins = registry
            .loaded()
            .into_iter()
            .filter(|p| p.is_visible() && !p.is_deprecated())
            .map(|mut p| {
                p.set_config(self.config.clone());
                p
            })
            .collect();
        self.reset();
    }

    pub fn add_plugin(&mut self, mut plugin: Box<dyn Plugin>) {
        plugin.set_config(self.config.clone());
        self.plugins.retain(|p| p.id() != plugin.id());
        self.plugins.push(plugin);
        self.reset();
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn all_plugins(&self) -> &[Box<dyn Plugin>] {
        &self.plugins
    }

    pub fn plugin(&self, id: u32) -> Option<&dyn Plugin> {
        self.plugins.iter().find(|p| p.id() == id).map(|p| p.as_ref())
    }

    pub fn plugin_mut(&mut self, id: u32) -> Option<&mut Box<dyn Plugin>> {
        self.plugins.iter_mut().find(|p| p.id() == id)
    }

    /// Push policy defaults into every plugin
    pub fn set_defaults(&mut self, threshold: AlertThreshold, strength: AttackStrength) {
        for plugin in self.plugins.iter_mut() {
            plugin.set_default_alert_threshold(threshold);
            plugin.set_default_attack_strength(strength);
        }
    }

    /// Rebuild the queue from the current configuration
    pub fn reset(&mut self) {
        self.running.clear();
        self.completed.clear();
        self.pending = self.resolve_order();
        self.total = self.pending.len();
    }

    fn resolve_order(&self) -> Vec<u32> {
        let by_code_name: HashMap<&str, &dyn Plugin> = self
            .plugins
            .iter()
            .map(|p| (p.code_name(), p.as_ref()))
            .collect();

        // Enabled plugins and everything they depend on
        let mut queued: HashMap<u32, &dyn Plugin> = HashMap::new();
        let mut stack: Vec<&dyn Plugin> = self
            .plugins
            .iter()
            .filter(|p| p.is_enabled())
            .map(|p| p.as_ref())
            .collect();
        let mut unresolvable: HashSet<u32> = HashSet::new();

        while let Some(plugin) = stack.pop() {
            if queued.insert(plugin.id(), plugin).is_some() {
                continue;
            }
            for dependency in plugin.dependencies() {
                match by_code_name.get(dependency) {
                    Some(dep) => stack.push(*dep),
                    None => {
                        tracing::warn!(
                            "Plugin {} depends on unknown plugin {}, it will not run",
                            plugin.id(),
                            dependency
                        );
                        unresolvable.insert(plugin.id());
                    }
                }
            }
        }

        // Dependency edges within the queue
        let mut remaining_deps: HashMap<u32, usize> = HashMap::new();
        let mut dependents: HashMap<u32, Vec<u32>> = HashMap::new();
        for (&id, plugin) in &queued {
            let deps: BTreeSet<u32> = plugin
                .dependencies()
                .iter()
                .filter_map(|d| by_code_name.get(d).map(|p| p.id()))
                .collect();
            remaining_deps.insert(id, deps.len());
            for dep in deps {
                dependents.entry(dep).or_default().push(id);
            }
        }

        let priority = |id: u32| {
            let p = queued[&id];
            (Reverse(p.risk()), Reverse(p.status().rank()), id)
        };

        let mut ready: BTreeSet<_> = remaining_deps
            .iter()
            .filter(|(id, n)| **n == 0 && !unresolvable.contains(*id))
            .map(|(&id, _)| priority(id))
            .collect();
        let mut order = Vec::with_capacity(queued.len());

        while let Some(next) = ready.pop_first() {
            let id = next.2;
            order.push(id);
            for dependent in dependents.get(&id).into_iter().flatten() {
                if let Some(n) = remaining_deps.get_mut(dependent) {
                    *n -= 1;
                    if *n == 0 && !unresolvable.contains(dependent) {
                        ready.insert(priority(*dependent));
                    }
                }
            }
        }

        for id in queued.keys() {
            if !order.contains(id) && !unresolvable.contains(id) {
                tracing::warn!("Plugin {} has cyclic or unsatisfiable dependencies, it will not run", id);
            }
        }
        order
    }

    /// Queued plugin ids in run order
    pub fn pending(&self) -> &[u32] {
        &self.pending
    }

    /// Next plugin whose dependencies have all completed
    pub fn next_plugin(&mut self) -> Option<Box<dyn Plugin>> {
        let completed: HashSet<u32> = self.completed.iter().copied().collect();
        let ids: HashMap<&str, u32> = self
            .plugins
            .iter()
            .map(|p| (p.code_name(), p.id()))
            .collect();

        let index = self.pending.iter().position(|id| {
            self.plugin(*id)
                .map(|p| {
                    p.dependencies()
                        .iter()
                        .all(|d| ids.get(d).map(|dep| completed.contains(dep)).unwrap_or(false))
                })
                .unwrap_or(false)
        })?;

        let id = self.pending.remove(index);
        self.running.push(id);
        self.plugin(id).map(|p| p.clone_box())
    }

    pub fn set_running_plugin_completed(&mut self, id: u32) {
        if let Some(index) = self.running.iter().position(|r| *r == id) {
            self.running.remove(index);
            self.completed.push(id);
        }
    }

    /// Drain the queue without running anything
    pub fn drain_pending(&mut self) -> Vec<Box<dyn Plugin>> {
        let pending = std::mem::take(&mut self.pending);
        let plugins = pending
            .iter()
            .filter_map(|id| self.plugin(*id).map(|p| p.clone_box()))
            .collect();
        self.completed.extend(pending);
        plugins
    }

    pub fn exist_plugin_to_run(&self) -> bool {
        !self.pending.is_empty() || !self.running.is_empty()
    }

    pub fn total_plugins_to_run(&self) -> usize {
        self.total
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::alert::Risk;
    use crate::scanner::plugin::tests::TestPlugin;
    use crate::scanner::plugin::Status;

    fn plugin(id: u32, risk: Risk, status: Status) -> Box<dyn Plugin> {
        Box::new(TestPlugin::new(id, risk, status))
    }

    fn named(id: u32, code_name: &'static str, deps: &'static [&'static str]) -> Box<dyn Plugin> {
        let mut p = TestPlugin::new(id, Risk::Info, Status::Release);
        p.info.code_name = code_name;
        p.info.dependencies = deps;
        Box::new(p)
    }

    fn factory(registry: &PluginRegistry) -> PluginFactory {
        let mut factory = PluginFactory::new(ConfigStore::new());
        factory.load_all_plugins(registry);
        factory
    }

    #[test]
    fn test_order_by_risk_status_id() {
        let registry = PluginRegistry::new();
        for p in [
            plugin(5, Risk::Low, Status::Release),
            plugin(4, Risk::High, Status::Alpha),
            plugin(3, Risk::High, Status::Release),
            plugin(2, Risk::High, Status::Release),
            plugin(1, Risk::Medium, Status::Example),
            plugin(6, Risk::High, Status::Beta),
        ] {
            registry.register(p);
        }

        assert_eq!(factory(&registry).pending(), &[2, 3, 6, 4, 1, 5]);
    }

    #[test]
    fn test_dependencies_run_first() {
        let registry = PluginRegistry::new();
        let mut high = TestPlugin::new(1, Risk::High, Status::Release);
        high.info.code_name = "High";
        high.info.dependencies = &["Base"];
        registry.register(Box::new(high));
        registry.register(named(9, "Base", &[]));
        registry.register(named(3, "Other", &[]));

        let mut factory = factory(&registry);
        assert_eq!(factory.pending(), &[3, 9, 1]);

        let first = factory.next_plugin().unwrap();
        assert_eq!(first.id(), 3);
        let second = factory.next_plugin().unwrap();
        assert_eq!(second.id(), 9);
        assert!(factory.next_plugin().is_none());

        factory.set_running_plugin_completed(9);
        assert_eq!(factory.next_plugin().unwrap().id(), 1);
        factory.set_running_plugin_completed(3);
        factory.set_running_plugin_completed(1);
        assert!(!factory.exist_plugin_to_run());
        assert_eq!(factory.completed_count(), 3);
    }

    #[test]
    fn test_disabled_dependency_is_still_queued() {
        let registry = PluginRegistry::new();
        registry.register(named(1, "A", &["B"]));
        registry.register(named(2, "B", &[]));
        registry.register(named(3, "C", &[]));

        let config = ConfigStore::new();
        config.set("plugins.p2.enabled", "false");
        config.set("plugins.p3.enabled", "false");
        let mut factory = PluginFactory::new(config);
        factory.load_all_plugins(&registry);

        assert_eq!(factory.pending(), &[2, 1]);
        assert_eq!(factory.total_plugins_to_run(), 2);
    }

    #[test]
    fn test_unknown_dependency_and_cycle_are_excluded() {
        let registry = PluginRegistry::new();
        registry.register(named(1, "A", &["Missing"]));
        registry.register(named(2, "B", &["C"]));
        registry.register(named(3, "C", &["B"]));
        registry.register(named(4, "D", &[]));

        assert_eq!(factory(&registry).pending(), &[4]);
    }

    #[test]
    fn test_reset_is_stable() {
        let registry = PluginRegistry::new();
        registry.register(named(2, "B", &[]));
        registry.register(named(1, "A", &["B"]));
        let mut factory = factory(&registry);
        let before = factory.pending().to_vec();
        factory.next_plugin();
        factory.reset();
        assert_eq!(factory.pending(), before.as_slice());
    }

    #[test]
    fn test_clone_is_independent() {
        let registry = PluginRegistry::new();
        registry.register(named(1, "A", &[]));
        let original = factory(&registry);
        let mut copy = original.clone();

        copy.plugin_mut(1)
            .unwrap()
            .set_alert_threshold(AlertThreshold::High)
            .unwrap();
        assert_eq!(
            copy.plugin(1).unwrap().alert_threshold(true),
            AlertThreshold::High
        );
        assert_eq!(
            original.plugin(1).unwrap().alert_threshold(true),
            AlertThreshold::Default
        );
    }

    #[test]
    fn test_registry_unregister() {
        let registry = PluginRegistry::new();
        registry.register(named(1, "A", &[]));
        assert!(registry.contains(1));
        assert!(registry.unregister(1).is_ok());
        assert!(matches!(registry.unregister(1), Err(PluginError::UnknownPlugin(_))));
        assert!(registry.is_empty());
    }
}
