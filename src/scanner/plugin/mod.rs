//! Active scan plugins
//!
//! A plugin is one vulnerability check. Static metadata comes from a
//! [`PluginInfo`]; per-instance state (tunables, the message under test,
//! the owning host process) lives in an embedded [`PluginCore`]. Tunables
//! persist in a [`ConfigStore`] under `plugins.p<id>.enabled`,
//! `plugins.p<id>.level` and `plugins.p<id>.strength`.

mod factory;
mod param;
mod threshold;

pub use factory::{PluginFactory, PluginRegistry};
pub use param::{scan_variants, AppParamPlugin};
pub use threshold::{AlertThreshold, AttackStrength};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::alert::{Alert, AlertBuilder, AlertSink, Confidence, Risk};
use super::host_process::HostProcess;
use super::kb::Kb;
use crate::app::ConfigStore;
use crate::error::{AlertError, PluginError};
use crate::http::HttpMessage;
use crate::model::{CustomPageType, TechSet};

/// Maturity of a plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Unknown,
    Example,
    Alpha,
    Beta,
    Release,
}

impl Status {
    /// Ordering weight, higher runs first
    pub fn rank(&self) -> u8 {
        match self {
            Status::Unknown | Status::Example => 0,
            Status::Alpha => 1,
            Status::Beta => 2,
            Status::Release => 3,
        }
    }
}

/// What a plugin runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginTarget {
    /// Once per scanned node
    Node,
    /// Once per host, against the first scanned node
    Host,
}

/// Static description of a plugin
#[derive(Debug, Clone)]
pub struct PluginInfo {
    pub id: u32,
    pub name: &'static str,
    /// Name other plugins use to depend on this one
    pub code_name: &'static str,
    pub description: &'static str,
    pub solution: &'static str,
    pub reference: &'static str,
    pub risk: Risk,
    pub cwe_id: i32,
    pub wasc_id: i32,
    pub status: Status,
    pub target: PluginTarget,
    pub dependencies: &'static [&'static str],
}

/// Config key of a plugin tunable
pub fn plugin_key(id: u32, field: &str) -> String {
    format!("plugins.p{}.{}", id, field)
}

/// State every plugin instance carries
#[derive(Clone)]
pub struct PluginCore {
    config: Option<ConfigStore>,
    enabled: bool,
    default_threshold: AlertThreshold,
    default_strength: AttackStrength,
    message: Option<HttpMessage>,
    parent: Option<Arc<HostProcess>>,
    delay_in_ms: u64,
    tech_set: TechSet,
}

impl Default for PluginCore {
    fn default() -> Self {
        Self {
            config: None,
            enabled: true,
            default_threshold: AlertThreshold::Medium,
            default_strength: AttackStrength::Medium,
            message: None,
            parent: None,
            delay_in_ms: 0,
            tech_set: TechSet::all(),
        }
    }
}

impl fmt::Debug for PluginCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCore")
            .field("has_config", &self.config.is_some())
            .field("enabled", &self.enabled)
            .field("default_threshold", &self.default_threshold)
            .field("default_strength", &self.default_strength)
            .field("delay_in_ms", &self.delay_in_ms)
            .finish_non_exhaustive()
    }
}

impl PluginCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delay_in_ms(&self) -> u64 {
        self.delay_in_ms
    }

    pub fn set_delay_in_ms(&mut self, delay_in_ms: u64) {
        self.delay_in_ms = delay_in_ms;
    }

    pub fn tech_set(&self) -> &TechSet {
        &self.tech_set
    }

    pub fn set_tech_set(&mut self, tech_set: TechSet) {
        self.tech_set = tech_set;
    }

    pub fn default_threshold(&self) -> AlertThreshold {
        self.default_threshold
    }

    pub fn default_strength(&self) -> AttackStrength {
        self.default_strength
    }

    pub fn message(&self) -> Option<&HttpMessage> {
        self.message.as_ref()
    }

    pub fn parent(&self) -> Option<&Arc<HostProcess>> {
        self.parent.as_ref()
    }
}

/// Shorthand alert fields for [`Plugin::bingo_full`]
#[derive(Debug, Clone)]
pub struct QuickAlert {
    pub risk: Risk,
    pub confidence: Confidence,
    pub uri: String,
    pub param: String,
    pub attack: String,
    pub other_info: String,
    pub evidence: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub solution: Option<String>,
    pub reference: Option<String>,
    pub cwe_id: Option<i32>,
    pub wasc_id: Option<i32>,
    pub message: HttpMessage,
}

impl QuickAlert {
    pub fn new(risk: Risk, confidence: Confidence, message: HttpMessage) -> Self {
        Self {
            risk,
            confidence,
            uri: String::new(),
            param: String::new(),
            attack: String::new(),
            other_info: String::new(),
            evidence: String::new(),
            name: None,
            description: None,
            solution: None,
            reference: None,
            cwe_id: None,
            wasc_id: None,
            message,
        }
    }
}

/// Object-safe cloning and downcasting, implemented for every `Plugin + Clone`
pub trait PluginBase {
    fn clone_box(&self) -> Box<dyn Plugin>;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Plugin + Clone + 'static> PluginBase for T {
    fn clone_box(&self) -> Box<dyn Plugin> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Clone for Box<dyn Plugin> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

pub trait Plugin: PluginBase + Send + Sync {
    fn info(&self) -> &PluginInfo;

    fn core(&self) -> &PluginCore;

    fn core_mut(&mut self) -> &mut PluginCore;

    /// Run the check against the message set by [`Plugin::init`]
    fn scan(&mut self) -> anyhow::Result<()>;

    /// Hook called once the message and parent are set
    fn on_init(&mut self) {}

    fn targets_tech(&self, _tech: &TechSet) -> bool {
        true
    }

    fn is_visible(&self) -> bool {
        true
    }

    fn is_deprecated(&self) -> bool {
        false
    }

    fn id(&self) -> u32 {
        self.info().id
    }

    fn name(&self) -> &str {
        self.info().name
    }

    fn code_name(&self) -> &str {
        self.info().code_name
    }

    fn risk(&self) -> Risk {
        self.info().risk
    }

    fn status(&self) -> Status {
        self.info().status
    }

    fn target(&self) -> PluginTarget {
        self.info().target
    }

    fn dependencies(&self) -> &[&'static str] {
        self.info().dependencies
    }

    // Configuration

    fn config(&self) -> Option<&ConfigStore> {
        self.core().config.as_ref()
    }

    fn set_config(&mut self, config: ConfigStore) {
        self.core_mut().config = Some(config);
    }

    fn require_config(&self) -> Result<ConfigStore, PluginError> {
        self.config()
            .cloned()
            .ok_or(PluginError::NullConfiguration(self.id()))
    }

    fn is_enabled(&self) -> bool {
        let fallback = self.core().enabled;
        self.config()
            .and_then(|c| c.get_bool(&plugin_key(self.id(), "enabled")))
            .unwrap_or(fallback)
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<(), PluginError> {
        let config = self.require_config()?;
        if self.is_enabled() != enabled {
            config.set(plugin_key(self.id(), "enabled"), enabled.to_string());
            if enabled && self.alert_threshold(false) == AlertThreshold::Off {
                self.set_alert_threshold(AlertThreshold::Default)?;
            }
        }
        Ok(())
    }

    /// Resolved threshold; `inc_default` keeps `Default` instead of resolving it
    fn alert_threshold(&self, inc_default: bool) -> AlertThreshold {
        let explicit = self
            .config()
            .and_then(|c| c.get(&plugin_key(self.id(), "level")))
            .and_then(|v| v.parse::<AlertThreshold>().ok());
        let default = if inc_default {
            AlertThreshold::Default
        } else {
            self.core().default_threshold
        };

        match explicit {
            None if self.is_enabled() => default,
            None => AlertThreshold::Off,
            Some(AlertThreshold::Default) => default,
            Some(level) => level,
        }
    }

    fn set_alert_threshold(&mut self, level: AlertThreshold) -> Result<(), PluginError> {
        let config = self.require_config()?;
        config.set(plugin_key(self.id(), "level"), level.name());
        self.set_enabled(level != AlertThreshold::Off)
    }

    fn attack_strength(&self, inc_default: bool) -> AttackStrength {
        let explicit = self
            .config()
            .and_then(|c| c.get(&plugin_key(self.id(), "strength")))
            .and_then(|v| v.parse::<AttackStrength>().ok());

        match explicit {
            Some(AttackStrength::Default) | None if inc_default => AttackStrength::Default,
            Some(AttackStrength::Default) | None => self.core().default_strength,
            Some(level) => level,
        }
    }

    fn set_attack_strength(&mut self, level: AttackStrength) -> Result<(), PluginError> {
        let config = self.require_config()?;
        config.set(plugin_key(self.id(), "strength"), level.name());
        Ok(())
    }

    fn set_default_alert_threshold(&mut self, level: AlertThreshold) {
        self.core_mut().default_threshold = level;
    }

    fn set_default_attack_strength(&mut self, level: AttackStrength) {
        self.core_mut().default_strength = level;
    }

    /// Copy this plugin's entries from `store` into the attached configuration
    fn load_from(&mut self, store: &ConfigStore) -> Result<(), PluginError> {
        let config = self.require_config()?;
        if config.same_store(store) {
            return Ok(());
        }
        for (key, value) in store.subset(&format!("plugins.p{}", self.id())) {
            config.set(key, value);
        }
        Ok(())
    }

    /// Write the resolved tunables into `store`
    fn save_to(&self, store: &ConfigStore) {
        let id = self.id();
        store.set(plugin_key(id, "enabled"), self.is_enabled().to_string());
        store.set(plugin_key(id, "level"), self.alert_threshold(true).name());
        store.set(plugin_key(id, "strength"), self.attack_strength(true).name());
    }

    /// Copy tunables into another instance of the same concrete type
    fn copy_tunables_into(&self, other: &mut dyn Plugin) -> Result<(), PluginError> {
        if self.as_any().type_id() != other.as_any().type_id() {
            return Err(PluginError::TypeMismatch {
                from: self.id(),
                to: other.id(),
            });
        }
        let destination = other.require_config()?;

        other.set_enabled(self.is_enabled())?;
        other.set_alert_threshold(self.alert_threshold(true))?;
        other.set_attack_strength(self.attack_strength(true))?;
        other.set_default_alert_threshold(self.core().default_threshold);
        other.set_default_attack_strength(self.core().default_strength);
        other.core_mut().tech_set = self.core().tech_set.clone();
        other.save_to(&destination);
        Ok(())
    }

    // Scanning

    fn init(&mut self, msg: HttpMessage, parent: Arc<HostProcess>) {
        let core = self.core_mut();
        core.message = Some(msg);
        core.parent = Some(parent);
        self.on_init();
    }

    fn base_message(&self) -> anyhow::Result<&HttpMessage> {
        self.core()
            .message
            .as_ref()
            .ok_or_else(|| anyhow!("plugin {} has not been initialised", self.id()))
    }

    /// Fresh copy of the message under test
    fn new_msg(&self) -> anyhow::Result<HttpMessage> {
        Ok(self.base_message()?.clone_request())
    }

    fn parent(&self) -> anyhow::Result<Arc<HostProcess>> {
        self.core()
            .parent
            .clone()
            .ok_or_else(|| anyhow!("plugin {} has no host process", self.id()))
    }

    fn send_and_receive(&self, msg: &mut HttpMessage) -> anyhow::Result<()> {
        let parent = self.parent()?;
        let delay = self.core().delay_in_ms;
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        parent.send_and_receive(self.id(), msg)
    }

    /// Whether the response of `msg` is a real resource rather than a
    /// not-found page
    fn is_file_exist(&self, msg: &HttpMessage) -> bool {
        match self.parent() {
            Ok(parent) => parent.is_file_exist(self.id(), msg),
            Err(_) => (200..300).contains(&msg.response_header.status_code),
        }
    }

    fn is_stop(&self) -> bool {
        self.core()
            .parent
            .as_ref()
            .map(|p| p.is_plugin_stopped(self.id()))
            .unwrap_or(false)
    }

    fn kb(&self) -> Option<&Kb> {
        self.core().parent.as_ref().map(|p| p.kb())
    }

    // Alerts

    /// Builder pre-seeded with this plugin's metadata and delivering to the host process
    fn new_alert(&self) -> AlertBuilder {
        let info = self.info();
        let builder = Alert::builder(info.id)
            .with_name(info.name)
            .with_risk(info.risk)
            .with_confidence(Confidence::Medium)
            .with_description(info.description)
            .with_solution(info.solution)
            .with_reference(info.reference)
            .with_cwe_id(info.cwe_id)
            .with_wasc_id(info.wasc_id);

        match &self.core().parent {
            Some(parent) => builder.with_sink(parent.clone() as Arc<dyn AlertSink>),
            None => builder,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn bingo(
        &self,
        risk: Risk,
        confidence: Confidence,
        uri: &str,
        param: &str,
        attack: &str,
        other_info: &str,
        msg: &HttpMessage,
    ) -> Result<Alert, AlertError> {
        self.bingo_with_evidence(risk, confidence, uri, param, attack, other_info, "", msg)
    }

    #[allow(clippy::too_many_arguments)]
    fn bingo_with_evidence(
        &self,
        risk: Risk,
        confidence: Confidence,
        uri: &str,
        param: &str,
        attack: &str,
        other_info: &str,
        evidence: &str,
        msg: &HttpMessage,
    ) -> Result<Alert, AlertError> {
        let mut quick = QuickAlert::new(risk, confidence, msg.clone());
        quick.uri = uri.to_string();
        quick.param = param.to_string();
        quick.attack = attack.to_string();
        quick.other_info = other_info.to_string();
        quick.evidence = evidence.to_string();
        self.bingo_full(quick)
    }

    fn bingo_full(&self, quick: QuickAlert) -> Result<Alert, AlertError> {
        let mut builder = self
            .new_alert()
            .with_risk(quick.risk)
            .with_confidence(quick.confidence)
            .with_uri(quick.uri)
            .with_param(quick.param)
            .with_attack(quick.attack)
            .with_other_info(quick.other_info)
            .with_evidence(quick.evidence)
            .with_message(quick.message);

        if let Some(name) = quick.name {
            builder = builder.with_name(name);
        }
        if let Some(description) = quick.description {
            builder = builder.with_description(description);
        }
        if let Some(solution) = quick.solution {
            builder = builder.with_solution(solution);
        }
        if let Some(reference) = quick.reference {
            builder = builder.with_reference(reference);
        }
        if let Some(cwe_id) = quick.cwe_id {
            builder = builder.with_cwe_id(cwe_id);
        }
        if let Some(wasc_id) = quick.wasc_id {
            builder = builder.with_wasc_id(wasc_id);
        }
        builder.raise()
    }

    // Response classification

    fn is_custom_page(&self, msg: &HttpMessage, page_type: CustomPageType) -> bool {
        self.core()
            .parent
            .as_ref()
            .map(|p| p.is_custom_page(msg, page_type))
            .unwrap_or(false)
    }

    fn is_page_200(&self, msg: &HttpMessage) -> bool {
        if self.is_custom_page(msg, CustomPageType::Ok200) {
            return true;
        }
        if self.is_custom_page(msg, CustomPageType::NotFound404)
            || self.is_custom_page(msg, CustomPageType::Error500)
        {
            return false;
        }
        msg.response_header.status_code == 200
    }

    fn is_page_404(&self, msg: &HttpMessage) -> bool {
        if self.is_custom_page(msg, CustomPageType::NotFound404) {
            return true;
        }
        if self.is_custom_page(msg, CustomPageType::Ok200) {
            return false;
        }
        msg.response_header.status_code == 404
    }

    fn is_page_500(&self, msg: &HttpMessage) -> bool {
        if self.is_custom_page(msg, CustomPageType::Error500) {
            return true;
        }
        if self.is_custom_page(msg, CustomPageType::Ok200)
            || self.is_custom_page(msg, CustomPageType::NotFound404)
        {
            return false;
        }
        msg.response_header.status_code == 500
    }

    fn is_success(&self, msg: &HttpMessage) -> bool {
        if self.is_custom_page(msg, CustomPageType::Ok200) {
            return true;
        }
        if self.is_custom_page(msg, CustomPageType::NotFound404)
            || self.is_custom_page(msg, CustomPageType::Error500)
        {
            return false;
        }
        (200..300).contains(&msg.response_header.status_code)
    }

    fn is_client_error(&self, msg: &HttpMessage) -> bool {
        if self.is_custom_page(msg, CustomPageType::NotFound404) {
            return true;
        }
        if self.is_custom_page(msg, CustomPageType::Ok200)
            || self.is_custom_page(msg, CustomPageType::Error500)
        {
            return false;
        }
        (400..500).contains(&msg.response_header.status_code)
    }

    fn is_server_error(&self, msg: &HttpMessage) -> bool {
        if self.is_custom_page(msg, CustomPageType::Error500) {
            return true;
        }
        if self.is_custom_page(msg, CustomPageType::Ok200)
            || self.is_custom_page(msg, CustomPageType::NotFound404)
        {
            return false;
        }
        (500..600).contains(&msg.response_header.status_code)
    }
}

impl fmt::Debug for dyn Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}

impl PartialEq for dyn Plugin {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for dyn Plugin {}

impl PartialOrd for dyn Plugin {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for dyn Plugin {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id().cmp(&other.id())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal plugin used across scanner tests
    #[derive(Debug, Clone)]
    pub struct TestPlugin {
        pub info: PluginInfo,
        pub core: PluginCore,
    }

    impl TestPlugin {
        pub fn new(id: u32, risk: Risk, status: Status) -> Self {
            Self {
                info: PluginInfo {
                    id,
                    name: "Test plugin",
                    code_name: "TestPlugin",
                    description: "desc",
                    solution: "fix it",
                    reference: "https://example.com/ref",
                    risk,
                    cwe_id: 79,
                    wasc_id: 8,
                    status,
                    target: PluginTarget::Node,
                    dependencies: &[],
                },
                core: PluginCore::new(),
            }
        }

        pub fn configured(id: u32) -> Self {
            let mut plugin = Self::new(id, Risk::Medium, Status::Release);
            plugin.set_config(ConfigStore::new());
            plugin
        }
    }

    impl Plugin for TestPlugin {
        fn info(&self) -> &PluginInfo {
            &self.info
        }

        fn core(&self) -> &PluginCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut PluginCore {
            &mut self.core
        }

        fn scan(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[derive(Debug, Clone)]
    struct OtherPlugin(TestPlugin);

    impl Plugin for OtherPlugin {
        fn info(&self) -> &PluginInfo {
            &self.0.info
        }

        fn core(&self) -> &PluginCore {
            &self.0.core
        }

        fn core_mut(&mut self) -> &mut PluginCore {
            &mut self.0.core
        }

        fn scan(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_mutators_need_configuration() {
        let mut plugin = TestPlugin::new(1, Risk::Low, Status::Beta);
        assert_eq!(
            plugin.set_alert_threshold(AlertThreshold::High),
            Err(PluginError::NullConfiguration(1))
        );
        assert_eq!(
            plugin.set_attack_strength(AttackStrength::Low),
            Err(PluginError::NullConfiguration(1))
        );
        assert_eq!(plugin.set_enabled(false), Err(PluginError::NullConfiguration(1)));
        assert!(plugin.is_enabled());
    }

    #[test]
    fn test_threshold_resolution() {
        let mut plugin = TestPlugin::configured(7);
        assert_eq!(plugin.alert_threshold(true), AlertThreshold::Default);
        assert_eq!(plugin.alert_threshold(false), AlertThreshold::Medium);

        plugin.set_default_alert_threshold(AlertThreshold::Low);
        assert_eq!(plugin.alert_threshold(false), AlertThreshold::Low);

        plugin.set_alert_threshold(AlertThreshold::High).unwrap();
        assert_eq!(plugin.alert_threshold(false), AlertThreshold::High);
        assert_eq!(plugin.config().unwrap().get("plugins.p7.level").as_deref(), Some("HIGH"));
    }

    #[test]
    fn test_threshold_off_and_enabled_are_linked() {
        let mut plugin = TestPlugin::configured(7);

        plugin.set_alert_threshold(AlertThreshold::Off).unwrap();
        assert!(!plugin.is_enabled());
        assert_eq!(plugin.alert_threshold(true), AlertThreshold::Off);

        plugin.set_alert_threshold(AlertThreshold::Low).unwrap();
        assert!(plugin.is_enabled());

        plugin.set_alert_threshold(AlertThreshold::Off).unwrap();
        plugin.set_enabled(true).unwrap();
        assert_eq!(plugin.alert_threshold(true), AlertThreshold::Default);
        assert_eq!(plugin.alert_threshold(false), AlertThreshold::Medium);
    }

    #[test]
    fn test_disabled_without_level_reads_off() {
        let mut plugin = TestPlugin::configured(7);
        plugin.set_enabled(false).unwrap();
        assert_eq!(plugin.alert_threshold(false), AlertThreshold::Off);
    }

    #[test]
    fn test_strength_resolution() {
        let mut plugin = TestPlugin::configured(7);
        assert_eq!(plugin.attack_strength(true), AttackStrength::Default);
        assert_eq!(plugin.attack_strength(false), AttackStrength::Medium);
        plugin.set_attack_strength(AttackStrength::Insane).unwrap();
        assert_eq!(plugin.attack_strength(true), AttackStrength::Insane);
    }

    #[test]
    fn test_copy_tunables_into() {
        let mut source = TestPlugin::configured(7);
        source.set_alert_threshold(AlertThreshold::High).unwrap();
        source.set_attack_strength(AttackStrength::Low).unwrap();

        let mut unconfigured = TestPlugin::new(7, Risk::Medium, Status::Release);
        assert_eq!(
            source.copy_tunables_into(&mut unconfigured),
            Err(PluginError::NullConfiguration(7))
        );

        let mut other = OtherPlugin(TestPlugin::configured(7));
        assert!(matches!(
            source.copy_tunables_into(&mut other),
            Err(PluginError::TypeMismatch { .. })
        ));

        let mut target = TestPlugin::configured(7);
        source.copy_tunables_into(&mut target).unwrap();
        assert_eq!(target.alert_threshold(true), AlertThreshold::High);
        assert_eq!(target.attack_strength(true), AttackStrength::Low);
        assert!(target.is_enabled());
    }

    #[test]
    fn test_load_from_other_plugin_is_noop() {
        let foreign = ConfigStore::new();
        foreign.set("plugins.p8.level", "HIGH");
        foreign.set("plugins.p8.enabled", "false");

        let mut plugin = TestPlugin::configured(7);
        plugin.load_from(&foreign).unwrap();
        assert!(plugin.is_enabled());
        assert_eq!(plugin.alert_threshold(true), AlertThreshold::Default);

        let own = ConfigStore::new();
        own.set("plugins.p7.level", "LOW");
        plugin.load_from(&own).unwrap();
        assert_eq!(plugin.alert_threshold(true), AlertThreshold::Low);
    }

    #[test]
    fn test_equality_is_by_id() {
        let a: Box<dyn Plugin> = Box::new(TestPlugin::new(5, Risk::High, Status::Alpha));
        let b: Box<dyn Plugin> = Box::new(TestPlugin::new(5, Risk::Low, Status::Release));
        let c: Box<dyn Plugin> = Box::new(TestPlugin::new(6, Risk::High, Status::Alpha));
        assert!(*a == *b);
        assert!(*a != *c);
        assert!(*a < *c);
    }

    #[test]
    fn test_status_rank() {
        assert!(Status::Release.rank() > Status::Beta.rank());
        assert!(Status::Beta.rank() > Status::Alpha.rank());
        assert!(Status::Alpha.rank() > Status::Unknown.rank());
        assert_eq!(Status::Example.rank(), Status::Unknown.rank());
    }

    #[test]
    fn test_new_alert_is_seeded_and_needs_parent() {
        let plugin = TestPlugin::new(40, Risk::High, Status::Release);
        let msg = HttpMessage::get("https://example.com/x").unwrap();

        let alert = plugin.new_alert().with_message(msg.clone()).build().unwrap();
        assert_eq!(alert.plugin_id, 40);
        assert_eq!(alert.risk, Risk::High);
        assert_eq!(alert.solution, "fix it");
        assert_eq!(alert.cwe_id, 79);
        assert_eq!(alert.uri, "https://example.com/x");

        assert_eq!(
            plugin.bingo(Risk::Low, Confidence::High, "", "q", "x", "", &msg).err(),
            Some(AlertError::NoParent)
        );
    }

    #[test]
    fn test_page_classification_without_context() {
        let plugin = TestPlugin::new(1, Risk::Info, Status::Release);
        let mut msg = HttpMessage::get("https://example.com/").unwrap();

        msg.response_header.status_code = 200;
        assert!(plugin.is_page_200(&msg) && plugin.is_success(&msg));

        msg.response_header.status_code = 404;
        assert!(plugin.is_page_404(&msg) && plugin.is_client_error(&msg));

        msg.response_header.status_code = 503;
        assert!(plugin.is_server_error(&msg) && !plugin.is_page_500(&msg));
    }
}
