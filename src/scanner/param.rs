//! Scanner parameters

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::name_value_pair::{NameValuePair, ParamKind};

/// Scan engine options (`[scanner]` section)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerParam {
    /// Hosts scanned concurrently
    pub hosts_per_scan: usize,

    /// Delay before each request, in milliseconds
    pub delay_in_ms: u64,

    /// Descend into the children of start nodes
    pub scan_children: bool,

    /// Skip nodes outside the scope
    pub in_scope_only: bool,

    /// Stop a plugin on a host after this many alerts (0 = unlimited)
    pub max_alerts_per_rule: usize,

    /// Locations that get injected into
    pub targets: InjectableTargets,

    /// Structured request formats that get injected into
    pub rpc: RpcTargets,

    /// Scan headers even on requests without query or form parameters
    pub scan_headers_all_requests: bool,

    /// Parameters that are never attacked
    pub excluded_params: Vec<ExcludedParam>,

    /// Byte ranges attacked by the user-defined variant
    pub user_defined: Vec<InjectionRange>,

    /// Scripts backing the custom variant
    pub custom_scripts: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectableTargets {
    pub query: bool,
    pub post_data: bool,
    pub url_path: bool,
    pub headers: bool,
    pub cookies: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcTargets {
    pub multipart: bool,
    pub json: bool,
    pub odata: bool,
    pub custom: bool,
    pub user_defined: bool,
}

/// Parameter that plugins must leave alone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedParam {
    /// Regex matched against the whole parameter name
    pub name: String,

    /// Only exclude parameters of this kind (any kind when absent)
    #[serde(default)]
    pub kind: Option<ParamKind>,
}

/// Where a user-defined range lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeLocation {
    Header,
    Body,
}

/// A byte range of a request to inject into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionRange {
    pub location: RangeLocation,
    pub start: usize,
    pub end: usize,
}

impl Default for ScannerParam {
    fn default() -> Self {
        Self {
            hosts_per_scan: 2,
            delay_in_ms: 0,
            scan_children: true,
            in_scope_only: false,
            max_alerts_per_rule: 0,
            targets: InjectableTargets::default(),
            rpc: RpcTargets::default(),
            scan_headers_all_requests: false,
            excluded_params: default_excluded_params(),
            user_defined: Vec::new(),
            custom_scripts: Vec::new(),
        }
    }
}

impl Default for InjectableTargets {
    fn default() -> Self {
        Self {
            query: true,
            post_data: true,
            url_path: false,
            headers: false,
            cookies: false,
        }
    }
}

impl Default for RpcTargets {
    fn default() -> Self {
        Self {
            multipart: true,
            json: true,
            odata: true,
            custom: false,
            user_defined: false,
        }
    }
}

impl InjectableTargets {
    pub fn all() -> Self {
        Self {
            query: true,
            post_data: true,
            url_path: true,
            headers: true,
            cookies: true,
        }
    }
}

fn default_excluded_params() -> Vec<ExcludedParam> {
    let mut excluded: Vec<ExcludedParam> = [
        "__VIEWSTATE",
        "__EVENTVALIDATION",
        "__EVENTTARGET",
        "__EVENTARGUMENT",
    ]
    .iter()
    .map(|name| ExcludedParam {
        name: name.to_string(),
        kind: Some(ParamKind::PostData),
    })
    .collect();

    excluded.extend(["(?i)jsessionid", "(?i)phpsessid", "(?i)aspsessionid.*"].iter().map(
        |name| ExcludedParam {
            name: name.to_string(),
            kind: Some(ParamKind::Cookie),
        },
    ));
    excluded
}

/// Compiled exclusion rules
#[derive(Debug, Clone, Default)]
pub struct ParamExclusions {
    rules: Vec<(Regex, Option<ParamKind>)>,
}

impl ParamExclusions {
    /// Invalid patterns are skipped with a warning
    pub fn new(excluded: &[ExcludedParam]) -> Self {
        let rules = excluded
            .iter()
            .filter_map(|e| match Regex::new(&format!("^(?:{})$", e.name)) {
                Ok(re) => Some((re, e.kind)),
                Err(err) => {
                    tracing::warn!("Ignoring excluded parameter {:?}: {}", e.name, err);
                    None
                }
            })
            .collect();
        Self { rules }
    }

    pub fn is_excluded(&self, pair: &NameValuePair) -> bool {
        let name = match pair.name() {
            Some(name) => name,
            None => return false,
        };
        self.rules.iter().any(|(re, kind)| {
            kind.map(|k| k == pair.kind()).unwrap_or(true) && re.is_match(name)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusions_respect_kind() {
        let exclusions = ParamExclusions::new(&ScannerParam::default().excluded_params);

        let viewstate = NameValuePair::new(ParamKind::PostData, "__VIEWSTATE", "x", 0);
        assert!(exclusions.is_excluded(&viewstate));

        let query_viewstate = NameValuePair::new(ParamKind::Query, "__VIEWSTATE", "x", 0);
        assert!(!exclusions.is_excluded(&query_viewstate));

        let session = NameValuePair::new(ParamKind::Cookie, "JSESSIONID", "1", 0);
        assert!(exclusions.is_excluded(&session));
    }

    #[test]
    fn test_exclusion_is_anchored() {
        let exclusions = ParamExclusions::new(&[ExcludedParam {
            name: "id".into(),
            kind: None,
        }]);
        assert!(exclusions.is_excluded(&NameValuePair::new(ParamKind::Query, "id", "1", 0)));
        assert!(!exclusions.is_excluded(&NameValuePair::new(ParamKind::Query, "userid", "1", 0)));
    }

    #[test]
    fn test_default_targets() {
        let param = ScannerParam::default();
        assert!(param.targets.query && param.targets.post_data);
        assert!(!param.targets.headers && !param.targets.cookies);
        assert!(param.rpc.json && !param.rpc.custom);
        assert!(param.scan_children);
    }
}
