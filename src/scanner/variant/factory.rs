//! Selection of the variants that apply to a message

use std::fmt;
use std::sync::Arc;

use super::{
    CookieVariant, CustomVariant, FormQueryVariant, HeaderVariant, JsonVariant, MultipartVariant,
    ODataFilterVariant, ODataIdVariant, UrlPathVariant, UrlQueryVariant, UserDefinedVariant,
    Variant,
};
use crate::http::HttpMessage;
use crate::scanner::param::ScannerParam;
use crate::scripting::VariantScript;

/// Builds a variant for a message, or declines with `None`
pub type VariantConstructor = Arc<dyn Fn(&HttpMessage) -> Option<Box<dyn Variant>> + Send + Sync>;

/// Ordered set of variant constructors.
///
/// Built from the scanner parameters; extra constructors can be registered
/// on top. [`VariantFactory::variants_for`] returns the variants already
/// primed with the message.
#[derive(Clone, Default)]
pub struct VariantFactory {
    constructors: Vec<(String, VariantConstructor)>,
}

impl fmt::Debug for VariantFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariantFactory")
            .field("constructors", &self.names())
            .finish()
    }
}

fn simple<V, F>(build: F) -> VariantConstructor
where
    V: Variant + 'static,
    F: Fn() -> V + Send + Sync + 'static,
{
    Arc::new(move |_msg: &HttpMessage| Some(Box::new(build()) as Box<dyn Variant>))
}

impl VariantFactory {
    /// Empty factory
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_param(param: &ScannerParam) -> Self {
        let mut factory = Self::new();
        let targets = &param.targets;
        let rpc = &param.rpc;

        if targets.query {
            factory.register("url_query", simple(UrlQueryVariant::new));
        }
        if targets.post_data {
            factory.register("form_query", simple(FormQueryVariant::new));
            if rpc.multipart {
                factory.register("multipart", simple(MultipartVariant::new));
            }
            if rpc.json {
                factory.register("json", simple(JsonVariant::new));
            }
        }
        if targets.url_path {
            factory.register("url_path", simple(UrlPathVariant::new));
        }
        if targets.headers {
            let all_requests = param.scan_headers_all_requests;
            factory.register(
                "header",
                Arc::new(move |msg: &HttpMessage| {
                    if all_requests || msg.has_params() {
                        Some(Box::new(HeaderVariant::new()) as Box<dyn Variant>)
                    } else {
                        None
                    }
                }),
            );
        }
        if targets.cookies {
            factory.register("cookie", simple(CookieVariant::new));
        }
        if rpc.odata {
            factory.register("odata_id", simple(ODataIdVariant::new));
            factory.register("odata_filter", simple(ODataFilterVariant::new));
        }
        if rpc.custom {
            for path in &param.custom_scripts {
                match VariantScript::from_file(path) {
                    Ok(script) => {
                        let script = Arc::new(script);
                        let name = format!("custom:{}", script.name());
                        factory.register(
                            &name,
                            Arc::new(move |_msg: &HttpMessage| {
                                if script.is_enabled() {
                                    Some(Box::new(CustomVariant::new(script.clone())) as Box<dyn Variant>)
                                } else {
                                    None
                                }
                            }),
                        );
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load variant script {}: {}", path.display(), e);
                    }
                }
            }
        }
        if rpc.user_defined && !param.user_defined.is_empty() {
            let ranges = param.user_defined.clone();
            factory.register(
                "user_defined",
                Arc::new(move |_msg: &HttpMessage| {
                    Some(Box::new(UserDefinedVariant::new(ranges.clone())) as Box<dyn Variant>)
                }),
            );
        }

        factory
    }

    /// Add a constructor, replacing any registered under the same name
    pub fn register(&mut self, name: &str, constructor: VariantConstructor) {
        if let Some(entry) = self.constructors.iter_mut().find(|(n, _)| n == name) {
            entry.1 = constructor;
        } else {
            self.constructors.push((name.to_string(), constructor));
        }
    }

    pub fn unregister(&mut self, name: &str) {
        self.constructors.retain(|(n, _)| n != name);
    }

    pub fn names(&self) -> Vec<&str> {
        self.constructors.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Variants applicable to `msg`, with their parameters extracted
    pub fn variants_for(&self, msg: &HttpMessage) -> Vec<Box<dyn Variant>> {
        self.constructors
            .iter()
            .filter_map(|(_, build)| build(msg))
            .map(|mut variant| {
                variant.set_message(msg);
                variant
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::param::InjectableTargets;

    #[test]
    fn test_defaults_follow_targets() {
        let factory = VariantFactory::from_param(&ScannerParam::default());
        assert_eq!(
            factory.names(),
            vec!["url_query", "form_query", "multipart", "json", "odata_id", "odata_filter"]
        );
    }

    #[test]
    fn test_header_variant_needs_params_unless_configured() {
        let mut param = ScannerParam::default();
        param.targets = InjectableTargets::all();
        let factory = VariantFactory::from_param(&param);

        let bare = HttpMessage::get("https://example.com/").unwrap();
        let with_query = HttpMessage::get("https://example.com/?a=1").unwrap();
        let has_header = |msg: &HttpMessage, factory: &VariantFactory| {
            factory
                .variants_for(msg)
                .iter()
                .any(|v| v.short_name() == "header")
        };
        assert!(!has_header(&bare, &factory));
        assert!(has_header(&with_query, &factory));

        param.scan_headers_all_requests = true;
        let factory = VariantFactory::from_param(&param);
        assert!(has_header(&bare, &factory));
    }

    #[test]
    fn test_custom_registration_and_priming() {
        let mut factory = VariantFactory::new();
        factory.register("url_query", simple(UrlQueryVariant::new));
        factory.register("none", Arc::new(|_msg: &HttpMessage| None));

        let msg = HttpMessage::get("https://example.com/?a=1&b=2").unwrap();
        let variants = factory.variants_for(&msg);
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].param_list().len(), 2);

        factory.unregister("url_query");
        assert!(factory.variants_for(&msg).is_empty());
    }
}
