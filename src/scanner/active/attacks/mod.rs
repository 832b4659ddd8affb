//! Built-in attack plugins

pub mod path_traversal;
pub mod sqli;
pub mod xss;

use crate::http::HttpMessage;
use crate::scanner::name_value_pair::NameValuePair;
use crate::scanner::plugin::{AttackStrength, PluginRegistry};
use crate::scanner::variant::Variant;

pub use path_traversal::PathTraversal;
pub use sqli::SqlInjection;
pub use xss::CrossSiteScripting;

/// Register every built-in attack plugin
pub fn register_all(registry: &PluginRegistry) {
    registry.register(Box::new(CrossSiteScripting::new()));
    registry.register(Box::new(SqlInjection::new()));
    registry.register(Box::new(PathTraversal::new()));
}

/// How many of `total` payloads a plugin may send at `strength`
pub(crate) fn payload_budget(strength: AttackStrength, total: usize) -> usize {
    let budget = match strength {
        AttackStrength::Low => 3,
        AttackStrength::Default | AttackStrength::Medium => 8,
        AttackStrength::High => 16,
        AttackStrength::Insane => usize::MAX,
    };
    budget.min(total)
}

/// Copy of `msg` with `payload` as the value of `param`
pub(crate) fn inject(
    msg: &HttpMessage,
    variant: &dyn Variant,
    param: &NameValuePair,
    payload: &str,
) -> HttpMessage {
    let mut attack = msg.clone_request();
    variant.set_parameter(&mut attack, param, param.name(), Some(payload));
    attack
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::app::ConfigStore;
    use crate::http::FnSender;
    use crate::model::{HistoryType, SiteTree};
    use crate::scanner::alert::Alert;
    use crate::scanner::engine::Scanner;
    use crate::scanner::param::ScannerParam;
    use crate::scanner::plugin::{Plugin, PluginFactory};

    /// Scan one GET request with `plugin`, answering with `respond`
    pub fn scan_with<F>(plugin: Box<dyn Plugin>, url: &str, respond: F) -> (Vec<Alert>, usize)
    where
        F: Fn(&mut HttpMessage) + Send + Sync + 'static,
    {
        let mut tree = SiteTree::new();
        let node = tree.add_message(HttpMessage::get(url).unwrap(), HistoryType::Proxied);

        let mut factory = PluginFactory::new(ConfigStore::new());
        factory.add_plugin(plugin);

        let sender = Arc::new(FnSender::new(respond));
        let scanner = Scanner::new(ScannerParam::default(), sender.clone(), factory);
        scanner.start(Arc::new(tree), &[node]).unwrap();
        scanner.wait_for_completion();
        (scanner.alerts(), sender.count())
    }

    /// Decoded value of query parameter `name`
    pub fn query_value(msg: &HttpMessage, name: &str) -> String {
        let query = msg.uri().escaped_query().unwrap_or_default().to_string();
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default()
    }

    #[test]
    fn test_payload_budget() {
        assert_eq!(payload_budget(AttackStrength::Low, 10), 3);
        assert_eq!(payload_budget(AttackStrength::Default, 10), 8);
        assert_eq!(payload_budget(AttackStrength::Insane, 10), 10);
        assert_eq!(payload_budget(AttackStrength::High, 4), 4);
    }

    #[test]
    fn test_register_all() {
        let registry = PluginRegistry::new();
        register_all(&registry);
        assert_eq!(registry.len(), 3);
        assert!(registry.contains(40012) && registry.contains(40018) && registry.contains(6));
    }
}
