//! Script-defined injectable locations

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::Variant;
use crate::http::HttpMessage;
use crate::scanner::name_value_pair::{NameValuePair, ParamKind};
use crate::scripting::{ScriptEdit, ScriptMessage, VariantScript};

#[derive(Debug, Deserialize)]
struct ScriptParam {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

/// Delegates extraction, injection and naming to a [`VariantScript`].
///
/// Script failures are logged and read as "nothing found" or "no name",
/// never as errors.
pub struct CustomVariant {
    script: Arc<VariantScript>,
    params: Vec<NameValuePair>,
}

impl CustomVariant {
    pub fn new(script: Arc<VariantScript>) -> Self {
        Self {
            script,
            params: Vec::new(),
        }
    }

    fn call(&self, function: &str, args: &[Value]) -> Option<Value> {
        match self.script.call(function, args) {
            Ok(Value::Null) => None,
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Variant script {} failed in {}: {}", self.script.name(), function, e);
                None
            }
        }
    }

    fn inject(
        &self,
        msg: &mut HttpMessage,
        original: &NameValuePair,
        name: Option<&str>,
        value: Option<&str>,
        escaped: bool,
    ) -> Option<String> {
        let args = [
            json!(ScriptMessage::from_message(msg)),
            json!({
                "name": original.name(),
                "value": original.value(),
                "position": original.position(),
            }),
            json!(name),
            json!(value),
            json!(escaped),
        ];
        let edit: ScriptEdit = match serde_json::from_value(self.call("setParameter", &args)?) {
            Ok(edit) => edit,
            Err(e) => {
                tracing::warn!("Variant script {} returned an invalid edit: {}", self.script.name(), e);
                return None;
            }
        };

        if let Err(e) = edit.apply(msg) {
            tracing::warn!("Variant script {} edit not applied: {}", self.script.name(), e);
            return None;
        }
        Some(edit.fragment.unwrap_or_else(|| value.unwrap_or_default().to_string()))
    }
}

impl Variant for CustomVariant {
    fn short_name(&self) -> &'static str {
        "custom"
    }

    fn set_message(&mut self, msg: &HttpMessage) {
        let parsed = self
            .call("parseParameters", &[json!(ScriptMessage::from_message(msg))])
            .map(serde_json::from_value::<Vec<ScriptParam>>);

        self.params = match parsed {
            Some(Ok(params)) => params
                .into_iter()
                .enumerate()
                .map(|(position, p)| {
                    NameValuePair::with_optional(ParamKind::Custom, p.name, p.value, position)
                })
                .collect(),
            Some(Err(e)) => {
                tracing::warn!("Variant script {} returned invalid parameters: {}", self.script.name(), e);
                Vec::new()
            }
            None => Vec::new(),
        };
    }

    fn param_list(&self) -> &[NameValuePair] {
        &self.params
    }

    fn set_parameter(
        &self,
        msg: &mut HttpMessage,
        original: &NameValuePair,
        name: Option<&str>,
        value: Option<&str>,
    ) -> Option<String> {
        self.inject(msg, original, name, value, false)
    }

    fn set_escaped_parameter(
        &self,
        msg: &mut HttpMessage,
        original: &NameValuePair,
        name: Option<&str>,
        value: Option<&str>,
    ) -> Option<String> {
        self.inject(msg, original, name, value, true)
    }

    fn leaf_name(&self, node_name: &str, msg: &HttpMessage) -> Option<String> {
        match self.call("getLeafName", &[json!(node_name), json!(ScriptMessage::from_message(msg))])? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    fn tree_path(&self, msg: &HttpMessage) -> Option<Vec<String>> {
        let value = self.call("getTreePath", &[json!(ScriptMessage::from_message(msg))])?;
        serde_json::from_value(value).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"
        function parseParameters(msg) {
            var m = msg.uri.match(/\/rpc\/(\w+)\/(\w+)/);
            if (!m) { return []; }
            return [{name: "method", value: m[1]}, {name: "arg", value: m[2]}];
        }
        function setParameter(msg, param, name, value, escaped) {
            var parts = msg.uri.split("/");
            parts[parts.length - 2 + param.position] = escaped ? value : encodeURIComponent(value);
            return {uri: parts.join("/"), fragment: value};
        }
        function getLeafName(nodeName, msg) { return "rpc:" + nodeName; }
    "#;

    fn variant() -> CustomVariant {
        CustomVariant::new(Arc::new(VariantScript::new("rpc.js", SCRIPT)))
    }

    #[test]
    fn test_script_extracts_and_injects() {
        let msg = HttpMessage::get("https://example.com/rpc/getUser/42").unwrap();
        let mut variant = variant();
        variant.set_message(&msg);
        assert_eq!(
            variant.param_list(),
            &[
                NameValuePair::new(ParamKind::Custom, "method", "getUser", 0),
                NameValuePair::new(ParamKind::Custom, "arg", "42", 1),
            ]
        );

        let arg = variant.param_list()[1].clone();
        let mut attacked = msg.clone_request();
        let fragment = variant.set_parameter(&mut attacked, &arg, None, Some("1 OR 1"));
        assert_eq!(fragment.as_deref(), Some("1 OR 1"));
        assert_eq!(attacked.uri().to_string(), "https://example.com/rpc/getUser/1%20OR%201");
    }

    #[test]
    fn test_naming_hooks_fall_back_to_none() {
        let msg = HttpMessage::get("https://example.com/rpc/a/b").unwrap();
        let variant = variant();
        assert_eq!(variant.leaf_name("b", &msg).as_deref(), Some("rpc:b"));
        assert!(variant.tree_path(&msg).is_none());

        variant.script.set_enabled(false);
        assert!(variant.leaf_name("b", &msg).is_none());
    }

    #[test]
    fn test_throwing_script_yields_no_params() {
        let script = VariantScript::new("bad.js", "function parseParameters() { throw 'nope'; }");
        let mut variant = CustomVariant::new(Arc::new(script));
        variant.set_message(&HttpMessage::get("https://example.com/").unwrap());
        assert!(variant.param_list().is_empty());
    }
}
