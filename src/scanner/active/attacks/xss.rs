//! Cross-Site Scripting (reflected) testing

use anyhow::Result;

use super::{inject, payload_budget};
use crate::http::HttpMessage;
use crate::scanner::alert::{Confidence, Risk};
use crate::scanner::name_value_pair::NameValuePair;
use crate::scanner::plugin::{
    scan_variants, AlertThreshold, AppParamPlugin, Plugin, PluginCore, PluginInfo, PluginTarget,
    Status,
};
use crate::scanner::variant::Variant;

/// XSS test payloads, most likely first
const XSS_PAYLOADS: &[(&str, &str)] = &[
    ("<script>alert(1);</script>", "script-tag"),
    ("\"><script>alert(1);</script>", "attribute-breakout"),
    ("<img src=x onerror=alert(1)>", "img-onerror"),
    ("<svg onload=alert(1)>", "svg-onload"),
    ("'\"><script>alert(1);</script>", "quote-breakout"),
    ("</title><script>alert(1);</script>", "title-breakout"),
    ("</textarea><script>alert(1);</script>", "textarea-breakout"),
    ("javascript:alert(1);", "javascript-uri"),
    ("<body onload=alert(1)>", "body-onload"),
    ("<input onfocus=alert(1) autofocus>", "input-autofocus"),
    ("<details open ontoggle=alert(1)>", "details-ontoggle"),
    ("<iframe src=\"javascript:alert(1)\">", "iframe-javascript"),
    ("'-alert(1)-'", "js-context-break"),
    ("\";alert(1);//", "js-string-break"),
];

/// Fragments that survive partial filtering
const REFLECTED_INDICATORS: &[&str] = &["<script>", "onerror=", "onload=", "onfocus=", "javascript:"];

static INFO: PluginInfo = PluginInfo {
    id: 40012,
    name: "Cross Site Scripting (Reflected)",
    code_name: "TestCrossSiteScriptV2",
    description: "Cross-site Scripting (XSS) is an attack technique that involves echoing \
        attacker-supplied code into a user's browser instance.",
    solution: "Encode all user input before rendering it in HTML. Use context-aware output \
        encoding and a Content Security Policy.",
    reference: "https://owasp.org/www-community/attacks/xss/",
    risk: Risk::High,
    cwe_id: 79,
    wasc_id: 8,
    status: Status::Release,
    target: PluginTarget::Node,
    dependencies: &[],
};

#[derive(Debug, Clone)]
pub struct CrossSiteScripting {
    core: PluginCore,
}

impl CrossSiteScripting {
    pub fn new() -> Self {
        Self {
            core: PluginCore::new(),
        }
    }
}

impl Default for CrossSiteScripting {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for CrossSiteScripting {
    fn info(&self) -> &PluginInfo {
        &INFO
    }

    fn core(&self) -> &PluginCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PluginCore {
        &mut self.core
    }

    fn scan(&mut self) -> Result<()> {
        scan_variants(self)
    }
}

impl AppParamPlugin for CrossSiteScripting {
    fn scan_param(
        &mut self,
        msg: HttpMessage,
        variant: &dyn Variant,
        param: &NameValuePair,
    ) -> Result<()> {
        let name = param.name().unwrap_or_default();
        let original = self.base_message()?.response_body_str().to_lowercase();
        let budget = payload_budget(self.attack_strength(false), XSS_PAYLOADS.len());

        for (payload, payload_type) in &XSS_PAYLOADS[..budget] {
            if self.is_stop() {
                break;
            }
            let mut attack = inject(&msg, variant, param, payload);
            self.send_and_receive(&mut attack)?;
            let body = attack.response_body_str();

            if body.contains(payload) {
                self.bingo_with_evidence(
                    Risk::High,
                    Confidence::Medium,
                    "",
                    name,
                    payload,
                    &format!("Payload type: {}", payload_type),
                    payload,
                    &attack,
                )?;
                return Ok(());
            }

            // Partial reflections are only worth reporting at a low threshold
            if self.alert_threshold(false) != AlertThreshold::Low {
                continue;
            }
            let lower = body.to_lowercase();
            let indicator = REFLECTED_INDICATORS
                .iter()
                .copied()
                .find(|i| payload.contains(i) && lower.contains(i) && !original.contains(i));
            if let Some(indicator) = indicator {
                self.bingo_with_evidence(
                    Risk::Medium,
                    Confidence::Low,
                    "",
                    name,
                    payload,
                    &format!("Indicator {} appeared after injecting the payload", indicator),
                    indicator,
                    &attack,
                )?;
                return Ok(());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::active::attacks::tests::{query_value, scan_with};
    use crate::scanner::plugin::AttackStrength;

    #[test]
    fn test_reflected_payload_raises_alert() {
        let (alerts, sent) = scan_with(
            Box::new(CrossSiteScripting::new()),
            "https://example.com/search?q=shoes",
            |msg| {
                msg.response_header.status_code = 200;
                let q = query_value(msg, "q");
                msg.response_body = format!("<p>Results for {}</p>", q).into_bytes();
            },
        );

        assert_eq!(sent, 1);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].plugin_id, 40012);
        assert_eq!(alerts[0].param, "q");
        assert_eq!(alerts[0].attack, XSS_PAYLOADS[0].0);
        assert_eq!(alerts[0].risk, Risk::High);
        assert!(alerts[0].uri.starts_with("https://example.com/search?q="));
    }

    #[test]
    fn test_unreflected_input_is_not_reported() {
        let (alerts, sent) = scan_with(
            Box::new(CrossSiteScripting::new()),
            "https://example.com/search?q=shoes",
            |msg| {
                msg.response_header.status_code = 200;
                msg.response_body = b"<p>No results</p>".to_vec();
            },
        );

        assert!(alerts.is_empty());
        assert_eq!(sent, payload_budget(AttackStrength::Medium, XSS_PAYLOADS.len()));
    }
}
