//! JavaScript scripting engine
//!
//! Scripts define injectable locations the built-in variants do not know
//! about. A script is plain JavaScript exposing some of these functions:
//!
//! ```text
//! parseParameters(msg)                         -> [{name, value}, ...]
//! setParameter(msg, param, name, value, escaped) -> {uri?, headers?, body?, fragment?}
//! getLeafName(nodeName, msg)                   -> string | null
//! getTreePath(msg)                             -> [string, ...] | null
//! ```
//!
//! `msg` is `{method, uri, headers: [[name, value], ...], body}`. Values
//! cross the boundary as JSON. Every call runs in a fresh context.

use boa_engine::{Context as JsContext, Source};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::ScriptError;
use crate::http::{Headers, HttpMessage, Uri};

/// Script execution context
pub struct ScriptContext {
    /// JavaScript context
    js_context: JsContext,
}

/// Result of script execution
#[derive(Debug, Clone)]
pub struct ScriptResult {
    /// Whether the script succeeded
    pub success: bool,

    /// Return value (if any)
    pub value: Option<String>,

    /// Error message (if failed)
    pub error: Option<String>,
}

impl Default for ScriptContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptContext {
    pub fn new() -> Self {
        Self {
            js_context: JsContext::default(),
        }
    }

    /// Execute a script
    pub fn execute(&mut self, script: &str) -> ScriptResult {
        let source = Source::from_bytes(script);

        match self.js_context.eval(source) {
            Ok(value) => {
                let value_str = value
                    .to_string(&mut self.js_context)
                    .map(|s| s.to_std_string_escaped())
                    .ok();

                ScriptResult {
                    success: true,
                    value: value_str,
                    error: None,
                }
            }
            Err(e) => ScriptResult {
                success: false,
                value: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Message shape exchanged with scripts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptMessage {
    pub method: String,
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ScriptMessage {
    pub fn from_message(msg: &HttpMessage) -> Self {
        Self {
            method: msg.request_header.method().to_string(),
            uri: msg.uri().to_string(),
            headers: msg
                .request_header
                .headers()
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            body: msg.request_body_str().into_owned(),
        }
    }
}

/// Changes a script made through `setParameter`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScriptEdit {
    pub uri: Option<String>,
    pub headers: Option<Vec<(String, String)>>,
    pub body: Option<String>,
    pub fragment: Option<String>,
}

impl ScriptEdit {
    /// Apply the edit; an unparsable URI fails before anything changes
    pub fn apply(&self, msg: &mut HttpMessage) -> Result<(), ScriptError> {
        if let Some(uri) = &self.uri {
            let uri = Uri::parse(uri).map_err(|e| ScriptError::BadResult(e.to_string()))?;
            msg.request_header.set_uri(uri);
        }
        if let Some(headers) = &self.headers {
            let mut replaced = Headers::new();
            for (name, value) in headers {
                replaced.add(name.clone(), value.clone());
            }
            *msg.request_header.headers_mut() = replaced;
        }
        if let Some(body) = &self.body {
            msg.set_request_body(body.as_bytes());
        }
        Ok(())
    }
}

/// A loaded variant script
#[derive(Debug)]
pub struct VariantScript {
    name: String,
    source: String,
    enabled: AtomicBool,
}

impl VariantScript {
    pub fn new(name: &str, source: &str) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let source = std::fs::read_to_string(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(&name, &source))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Call `function` with JSON arguments and parse its JSON result.
    ///
    /// A missing function or an `undefined` result reads as `Value::Null`.
    pub fn call(&self, function: &str, args: &[Value]) -> Result<Value, ScriptError> {
        if !self.is_enabled() {
            return Err(ScriptError::Disabled(self.name.clone()));
        }

        let args = serde_json::to_string(args)
            .map_err(|e| ScriptError::BadResult(e.to_string()))?;
        let args_literal = serde_json::to_string(&args)
            .map_err(|e| ScriptError::BadResult(e.to_string()))?;

        let script = format!(
            "{source}\n;(function() {{\n  if (typeof {f} !== 'function') {{ return 'null'; }}\n  var r = {f}.apply(null, JSON.parse({args}));\n  return r === undefined ? 'null' : JSON.stringify(r);\n}})()",
            source = self.source,
            f = function,
            args = args_literal,
        );

        let mut context = ScriptContext::new();
        let result = context.execute(&script);
        if !result.success {
            return Err(ScriptError::ExecutionError(
                result.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        let text = result.value.unwrap_or_else(|| "null".to_string());
        serde_json::from_str(&text).map_err(|e| ScriptError::BadResult(format!("{}: {}", e, text)))
    }
}
