//! Scan filters
//!
//! Filters decide whether a node is skipped before any plugin sees it. A
//! filter that fails is treated as not matching.

use regex::Regex;

use crate::model::SiteNode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterResult {
    NotFiltered,
    /// Skip the node, with the reason shown to the user
    Filtered(String),
}

impl FilterResult {
    pub fn is_filtered(&self) -> bool {
        matches!(self, FilterResult::Filtered(_))
    }
}

pub trait ScanFilter: Send + Sync {
    fn is_filtered(&self, node: &SiteNode) -> anyhow::Result<FilterResult>;
}

/// Skips requests using one of the listed methods
#[derive(Debug, Clone)]
pub struct MethodFilter {
    methods: Vec<String>,
}

impl MethodFilter {
    pub fn new<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            methods: methods
                .into_iter()
                .map(|m| m.as_ref().to_uppercase())
                .collect(),
        }
    }
}

impl ScanFilter for MethodFilter {
    fn is_filtered(&self, node: &SiteNode) -> anyhow::Result<FilterResult> {
        let msg = match node.message() {
            Some(msg) => msg,
            None => return Ok(FilterResult::NotFiltered),
        };
        let method = msg.request_header.method();
        if self.methods.iter().any(|m| m == method) {
            Ok(FilterResult::Filtered(format!("method {} is excluded", method)))
        } else {
            Ok(FilterResult::NotFiltered)
        }
    }
}

/// Skips nodes whose URL matches a regex
#[derive(Debug, Clone)]
pub struct UrlRegexFilter {
    pattern: Regex,
}

impl UrlRegexFilter {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }
}

impl ScanFilter for UrlRegexFilter {
    fn is_filtered(&self, node: &SiteNode) -> anyhow::Result<FilterResult> {
        let url = node
            .message()
            .map(|m| m.uri().to_string())
            .unwrap_or_else(|| node.url().to_string());
        if self.pattern.is_match(&url) {
            Ok(FilterResult::Filtered(format!(
                "URL matches excluded pattern {}",
                self.pattern.as_str()
            )))
        } else {
            Ok(FilterResult::NotFiltered)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMessage;
    use crate::model::{HistoryType, SiteTree};

    fn tree() -> (SiteTree, crate::model::NodeId) {
        let mut tree = SiteTree::new();
        let msg = HttpMessage::from_request(
            "DELETE https://example.com/admin/users HTTP/1.1\r\n\r\n",
            "",
        )
        .unwrap();
        let id = tree.add_message(msg, HistoryType::Proxied);
        (tree, id)
    }

    #[test]
    fn test_method_filter() {
        let (tree, id) = tree();
        let node = tree.node(id).unwrap();
        assert!(MethodFilter::new(["delete"]).is_filtered(node).unwrap().is_filtered());
        assert_eq!(
            MethodFilter::new(["PUT"]).is_filtered(node).unwrap(),
            FilterResult::NotFiltered
        );
    }

    #[test]
    fn test_url_filter() {
        let (tree, id) = tree();
        let node = tree.node(id).unwrap();
        let filter = UrlRegexFilter::new("/admin/").unwrap();
        assert!(filter.is_filtered(node).unwrap().is_filtered());
        assert!(UrlRegexFilter::new("(").is_err());
    }
}
