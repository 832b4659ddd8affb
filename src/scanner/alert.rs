//! Scan alerts
//!
//! Alerts are assembled with [`AlertBuilder`] and are immutable once built.
//! A builder obtained from a plugin is pre-seeded with the plugin metadata
//! and knows where to deliver the alert when it is raised.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::AlertError;
use crate::http::HttpMessage;

/// Maximum length of an alert reference
pub const MAX_ALERT_REF_LENGTH: usize = 255;

/// Risk of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    Info,
    Low,
    Medium,
    High,
}

impl Risk {
    pub fn as_str(&self) -> &'static str {
        match self {
            Risk::Info => "info",
            Risk::Low => "low",
            Risk::Medium => "medium",
            Risk::High => "high",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Risk::Info => "Informational",
            Risk::Low => "Low",
            Risk::Medium => "Medium",
            Risk::High => "High",
        }
    }

    /// All risks, highest first
    pub fn all_desc() -> [Risk; 4] {
        [Risk::High, Risk::Medium, Risk::Low, Risk::Info]
    }
}

impl fmt::Display for Risk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How sure the plugin is about a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
    Confirmed,
}

impl Confidence {
    pub fn name(&self) -> &'static str {
        match self {
            Confidence::Low => "Low",
            Confidence::Medium => "Medium",
            Confidence::High => "High",
            Confidence::Confirmed => "Confirmed",
        }
    }
}

/// Receives raised alerts
pub trait AlertSink: Send + Sync {
    fn alert_found(&self, alert: Alert);
}

/// A reported finding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Unique ID
    pub id: String,
    pub plugin_id: u32,
    pub name: String,
    pub risk: Risk,
    pub confidence: Confidence,
    pub description: String,
    pub uri: String,
    pub method: String,
    pub param: String,
    pub attack: String,
    pub evidence: String,
    pub other_info: String,
    pub solution: String,
    pub reference: String,
    pub cwe_id: i32,
    pub wasc_id: i32,
    pub alert_ref: String,
    pub tags: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,

    /// Message that triggered the alert
    #[serde(skip)]
    pub message: Option<HttpMessage>,
}

impl Alert {
    pub fn builder(plugin_id: u32) -> AlertBuilder {
        AlertBuilder::new(plugin_id)
    }
}

fn cwe_tag_key(cwe_id: i32) -> String {
    format!("CWE-{}", cwe_id)
}

fn cwe_tag_value(cwe_id: i32) -> String {
    format!("https://cwe.mitre.org/data/definitions/{}.html", cwe_id)
}

/// Accumulates alert fields until `build` or `raise`
#[derive(Clone)]
pub struct AlertBuilder {
    plugin_id: u32,
    name: String,
    risk: Risk,
    confidence: Confidence,
    description: String,
    uri: String,
    param: String,
    attack: String,
    evidence: String,
    other_info: String,
    solution: String,
    reference: String,
    cwe_id: i32,
    wasc_id: i32,
    alert_ref: Option<String>,
    tags: BTreeMap<String, String>,
    message: Option<HttpMessage>,
    sink: Option<Arc<dyn AlertSink>>,
}

impl fmt::Debug for AlertBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertBuilder")
            .field("plugin_id", &self.plugin_id)
            .field("name", &self.name)
            .field("risk", &self.risk)
            .field("alert_ref", &self.alert_ref)
            .field("has_sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

impl AlertBuilder {
    pub fn new(plugin_id: u32) -> Self {
        Self {
            plugin_id,
            name: String::new(),
            risk: Risk::Info,
            confidence: Confidence::Medium,
            description: String::new(),
            uri: String::new(),
            param: String::new(),
            attack: String::new(),
            evidence: String::new(),
            other_info: String::new(),
            solution: String::new(),
            reference: String::new(),
            cwe_id: 0,
            wasc_id: 0,
            alert_ref: None,
            tags: BTreeMap::new(),
            message: None,
            sink: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_risk(mut self, risk: Risk) -> Self {
        self.risk = risk;
        self
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = param.into();
        self
    }

    pub fn with_attack(mut self, attack: impl Into<String>) -> Self {
        self.attack = attack.into();
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = evidence.into();
        self
    }

    pub fn with_other_info(mut self, other_info: impl Into<String>) -> Self {
        self.other_info = other_info.into();
        self
    }

    pub fn with_solution(mut self, solution: impl Into<String>) -> Self {
        self.solution = solution.into();
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    /// Set the CWE id, replacing the tag of any previously set id
    pub fn with_cwe_id(mut self, cwe_id: i32) -> Self {
        if self.cwe_id > 0 {
            self.tags.remove(&cwe_tag_key(self.cwe_id));
        }
        self.cwe_id = cwe_id;
        if cwe_id > 0 {
            self.tags.insert(cwe_tag_key(cwe_id), cwe_tag_value(cwe_id));
        }
        self
    }

    pub fn with_wasc_id(mut self, wasc_id: i32) -> Self {
        self.wasc_id = wasc_id;
        self
    }

    pub fn with_alert_ref(mut self, alert_ref: impl Into<String>) -> Self {
        self.alert_ref = Some(alert_ref.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Replace all tags; the CWE tag is kept in step with the CWE id
    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        if self.cwe_id > 0 {
            self.tags
                .insert(cwe_tag_key(self.cwe_id), cwe_tag_value(self.cwe_id));
        }
        self
    }

    pub fn with_message(mut self, message: HttpMessage) -> Self {
        self.message = Some(message);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    fn validated_alert_ref(&self) -> Result<String, AlertError> {
        let id = self.plugin_id.to_string();
        let alert_ref = match &self.alert_ref {
            None => return Ok(id),
            Some(alert_ref) => alert_ref,
        };

        if alert_ref.len() > MAX_ALERT_REF_LENGTH {
            return Err(AlertError::AlertRefTooLong {
                max: MAX_ALERT_REF_LENGTH,
            });
        }

        let valid = match alert_ref.strip_prefix(&id) {
            Some("") => true,
            Some(rest) => rest
                .strip_prefix('-')
                .map(|suffix| !suffix.chars().any(char::is_whitespace))
                .unwrap_or(false),
            None => false,
        };

        if valid {
            Ok(alert_ref.clone())
        } else {
            Err(AlertError::InvalidAlertRef {
                plugin_id: self.plugin_id,
                alert_ref: alert_ref.clone(),
            })
        }
    }

    /// Build the alert without delivering it
    pub fn build(self) -> Result<Alert, AlertError> {
        let alert_ref = self.validated_alert_ref()?;

        let (uri, method) = match &self.message {
            Some(msg) if self.uri.is_empty() => {
                (msg.uri().to_string(), msg.request_header.method().to_string())
            }
            Some(msg) => (self.uri, msg.request_header.method().to_string()),
            None => (self.uri, String::new()),
        };

        Ok(Alert {
            id: uuid::Uuid::new_v4().to_string(),
            plugin_id: self.plugin_id,
            name: self.name,
            risk: self.risk,
            confidence: self.confidence,
            description: self.description,
            uri,
            method,
            param: self.param,
            attack: self.attack,
            evidence: self.evidence,
            other_info: self.other_info,
            solution: self.solution,
            reference: self.reference,
            cwe_id: self.cwe_id,
            wasc_id: self.wasc_id,
            alert_ref,
            tags: self.tags,
            timestamp: Utc::now(),
            message: self.message,
        })
    }

    /// Build the alert and deliver it to the owning host process
    pub fn raise(self) -> Result<Alert, AlertError> {
        if self.message.is_none() {
            return Err(AlertError::MissingMessage);
        }
        let sink = self.sink.clone().ok_or(AlertError::NoParent)?;
        let alert = self.build()?;
        sink.alert_found(alert.clone());
        Ok(alert)
    }
}
