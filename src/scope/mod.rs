//! Scan scope
//!
//! Decides which site nodes a scan may touch. Patterns are evaluated
//! against node logical names (`GET:https://example.com/login`); the
//! method prefix is ignored so URL patterns work unchanged.

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Include/exclude rules for one scan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scope {
    /// Patterns that are in scope; empty means everything
    pub include: Vec<ScopePattern>,
    /// Patterns that are never in scope
    pub exclude: Vec<ScopePattern>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_include(&mut self, pattern: ScopePattern) {
        self.include.push(pattern);
    }

    pub fn add_exclude(&mut self, pattern: ScopePattern) {
        self.exclude.push(pattern);
    }

    /// Include everything under the scheme, host and port of `url`
    pub fn add_target_url(&mut self, url: &str) -> Result<(), ScopeError> {
        self.include.push(ScopePattern::from_url(url)?);
        Ok(())
    }

    /// Check a node logical name or a plain URL
    pub fn is_in_scope(&self, name: &str) -> bool {
        let url = strip_method(name);

        if self.exclude.iter().any(|p| p.matches(url)) {
            return false;
        }

        self.include.is_empty() || self.include.iter().any(|p| p.matches(url))
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

/// `GET:https://host/path` -> `https://host/path`
fn strip_method(name: &str) -> &str {
    match name.split_once(':') {
        Some((method, rest))
            if !method.is_empty()
                && method.chars().all(|c| c.is_ascii_uppercase())
                && rest.contains("://") =>
        {
            rest
        }
        _ => name,
    }
}

/// A pattern for matching URLs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScopePattern {
    /// Match URL prefix
    UrlPrefix { prefix: String },
    /// Match domain (with optional subdomain matching)
    Domain {
        domain: String,
        include_subdomains: bool,
    },
    /// Match using regex pattern
    Regex { pattern: String },
    /// Match any path under a base URL
    BaseUrl { base: String },
}

impl ScopePattern {
    /// Base URL pattern for the scheme, host and port of `url`
    pub fn from_url(url: &str) -> Result<Self, ScopeError> {
        let parsed = Url::parse(url).map_err(|e| ScopeError::InvalidUrl(e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| ScopeError::InvalidUrl(url.to_string()))?;

        let base = match parsed.port() {
            Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
            None => format!("{}://{}", parsed.scheme(), host),
        };

        Ok(ScopePattern::BaseUrl { base })
    }

    pub fn domain(domain: &str, include_subdomains: bool) -> Self {
        ScopePattern::Domain {
            domain: domain.to_string(),
            include_subdomains,
        }
    }

    pub fn regex(pattern: &str) -> Result<Self, ScopeError> {
        Regex::new(pattern).map_err(|e| ScopeError::InvalidRegex(e.to_string()))?;
        Ok(ScopePattern::Regex {
            pattern: pattern.to_string(),
        })
    }

    pub fn matches(&self, url: &str) -> bool {
        match self {
            ScopePattern::UrlPrefix { prefix } => url.starts_with(prefix.as_str()),

            ScopePattern::Domain {
                domain,
                include_subdomains,
            } => Url::parse(url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .map(|host| {
                    host == *domain
                        || (*include_subdomains && host.ends_with(&format!(".{}", domain)))
                })
                .unwrap_or(false),

            ScopePattern::Regex { pattern } => Regex::new(pattern)
                .map(|re| re.is_match(url))
                .unwrap_or(false),

            ScopePattern::BaseUrl { base } => {
                let url = url.to_lowercase();
                let base = base.to_lowercase();
                url == base
                    || url
                        .strip_prefix(&base)
                        .map(|rest| rest.starts_with('/') || rest.starts_with('?'))
                        .unwrap_or(false)
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid regex: {0}")]
    InvalidRegex(String),
}
