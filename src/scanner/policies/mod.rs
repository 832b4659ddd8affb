//! Scan policies
//!
//! A policy is a named set of plugin tunables plus the threshold and
//! strength used by plugins left at `DEFAULT`. It builds the
//! [`PluginFactory`] of a scan.

use std::fmt;

use super::plugin::{plugin_key, AlertThreshold, AttackStrength, PluginFactory, PluginRegistry};
use crate::app::{ConfigStore, PolicyConfig};

/// Reflected XSS matters little to JSON APIs
const XSS_PLUGIN_ID: u32 = 40012;

/// Scan policy configuration
#[derive(Clone)]
pub struct ScanPolicy {
    /// Policy name
    pub name: String,

    /// Description
    pub description: String,

    /// Threshold for plugins left at DEFAULT
    pub default_threshold: AlertThreshold,

    /// Strength for plugins left at DEFAULT
    pub default_strength: AttackStrength,

    /// Per-plugin tunables (`plugins.p<id>.*`)
    pub plugins: ConfigStore,
}

impl fmt::Debug for ScanPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanPolicy")
            .field("name", &self.name)
            .field("default_threshold", &self.default_threshold)
            .field("default_strength", &self.default_strength)
            .field("plugin_settings", &self.plugins.len())
            .finish()
    }
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl ScanPolicy {
    /// Standard scan policy - balanced between speed and coverage
    pub fn standard() -> Self {
        Self {
            name: "Standard".to_string(),
            description: "Balanced scan with common vulnerability checks".to_string(),
            default_threshold: AlertThreshold::Medium,
            default_strength: AttackStrength::Medium,
            plugins: ConfigStore::new(),
        }
    }

    /// Quick scan - fast but limited coverage
    pub fn quick() -> Self {
        let mut policy = Self::standard();
        policy.name = "Quick".to_string();
        policy.description = "Fast scan with reduced payloads".to_string();
        policy.default_strength = AttackStrength::Low;
        policy
    }

    /// Full scan - comprehensive but slow
    pub fn full() -> Self {
        let mut policy = Self::standard();
        policy.name = "Full".to_string();
        policy.description = "Comprehensive scan with every payload and low thresholds".to_string();
        policy.default_threshold = AlertThreshold::Low;
        policy.default_strength = AttackStrength::High;
        policy
    }

    /// API-focused scan
    pub fn api() -> Self {
        let mut policy = Self::standard();
        policy.name = "API".to_string();
        policy.description = "Optimized for REST APIs".to_string();
        policy
            .plugins
            .set(plugin_key(XSS_PLUGIN_ID, "level"), AlertThreshold::High.name());
        policy
    }

    /// Preset by case-insensitive name
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "standard" => Some(Self::standard()),
            "quick" => Some(Self::quick()),
            "full" => Some(Self::full()),
            "api" => Some(Self::api()),
            _ => None,
        }
    }

    /// Preset named by `config`, with its defaults and the `store` tunables applied on top
    pub fn from_config(config: &PolicyConfig, store: &ConfigStore) -> Self {
        let mut policy = Self::by_name(&config.name).unwrap_or_else(|| {
            tracing::warn!("Unknown scan policy {:?}, using standard", config.name);
            Self::standard()
        });
        if config.default_threshold != AlertThreshold::Default {
            policy.default_threshold = config.default_threshold;
        }
        if config.default_strength != AttackStrength::Default {
            policy.default_strength = config.default_strength;
        }
        for (key, value) in store.subset("plugins") {
            policy.plugins.set(key, value);
        }
        policy
    }

    pub fn enable_plugin(&self, id: u32) {
        self.plugins.set(plugin_key(id, "enabled"), "true");
    }

    pub fn disable_plugin(&self, id: u32) {
        self.plugins.set(plugin_key(id, "enabled"), "false");
    }

    pub fn set_threshold(&self, id: u32, level: AlertThreshold) {
        self.plugins.set(plugin_key(id, "level"), level.name());
    }

    pub fn set_strength(&self, id: u32, level: AttackStrength) {
        self.plugins.set(plugin_key(id, "strength"), level.name());
    }

    /// Factory with every registered plugin, configured by this policy.
    ///
    /// The factory works on a copy of the tunables, so the policy can be
    /// reused for further scans.
    pub fn create_factory(&self, registry: &PluginRegistry) -> PluginFactory {
        let mut factory = PluginFactory::new(self.plugins.deep_clone());
        factory.load_all_plugins(registry);
        factory.set_defaults(self.default_threshold, self.default_strength);
        factory.reset();
        tracing::debug!(
            "Policy {} queued {} of {} plugins",
            self.name,
            factory.total_plugins_to_run(),
            factory.all_plugins().len()
        );
        factory
    }
}
