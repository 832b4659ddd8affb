//! Active security scanner
//!
//! Built-in plugins that attack parameters with payloads and judge the
//! responses.

pub mod attacks;

use super::plugin::PluginRegistry;

/// Registry preloaded with every built-in plugin
pub fn builtin_registry() -> PluginRegistry {
    let registry = PluginRegistry::new();
    attacks::register_all(&registry);
    tracing::debug!("Registered {} built-in plugins", registry.len());
    registry
}
