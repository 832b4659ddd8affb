//! Scan contexts
//!
//! A context groups the nodes of one application with what is known about
//! it: the technologies it runs on and how it renders custom error pages.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::tech::TechSet;
use crate::http::HttpMessage;
use crate::scope::Scope;

/// Kind of page an application renders instead of the real status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomPageType {
    Ok200,
    NotFound404,
    Error500,
    AuthRequired401,
    Other,
}

pub trait Context: Send + Sync {
    fn name(&self) -> &str;

    fn is_in_context(&self, name: &str) -> bool;

    fn is_custom_page(&self, msg: &HttpMessage, page_type: CustomPageType) -> bool;

    fn tech_set(&self) -> TechSet;
}

/// Where a custom page rule looks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomPageLocation {
    Url,
    Response,
}

/// One custom page rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomPage {
    pub content: String,
    #[serde(default)]
    pub regex: bool,
    pub location: CustomPageLocation,
    pub page_type: CustomPageType,
}

impl CustomPage {
    pub fn matches(&self, msg: &HttpMessage) -> bool {
        let haystack = match self.location {
            CustomPageLocation::Url => msg.uri().to_string(),
            CustomPageLocation::Response => msg.response_body_str().into_owned(),
        };

        if self.regex {
            match Regex::new(&self.content) {
                Ok(re) => re.is_match(&haystack),
                Err(e) => {
                    tracing::warn!("Invalid custom page pattern {:?}: {}", self.content, e);
                    false
                }
            }
        } else {
            haystack.contains(&self.content)
        }
    }
}

/// Context defined by a scope, a technology set and custom page rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopedContext {
    pub name: String,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default = "TechSet::all")]
    pub tech: TechSet,
    #[serde(default)]
    pub custom_pages: Vec<CustomPage>,
}

impl ScopedContext {
    pub fn new(name: &str, scope: Scope) -> Self {
        Self {
            name: name.to_string(),
            scope,
            tech: TechSet::all(),
            custom_pages: Vec::new(),
        }
    }

    pub fn with_tech(mut self, tech: TechSet) -> Self {
        self.tech = tech;
        self
    }

    pub fn with_custom_page(mut self, page: CustomPage) -> Self {
        self.custom_pages.push(page);
        self
    }
}

impl Context for ScopedContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_in_context(&self, name: &str) -> bool {
        self.scope.is_in_scope(name)
    }

    fn is_custom_page(&self, msg: &HttpMessage, page_type: CustomPageType) -> bool {
        self.custom_pages
            .iter()
            .any(|p| p.page_type == page_type && p.matches(msg))
    }

    fn tech_set(&self) -> TechSet {
        self.tech.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_page_by_response_content() {
        let ctx = ScopedContext::new("app", Scope::new()).with_custom_page(CustomPage {
            content: "Sorry, we could not find".into(),
            regex: false,
            location: CustomPageLocation::Response,
            page_type: CustomPageType::NotFound404,
        });

        let mut msg = HttpMessage::get("https://example.com/missing").unwrap();
        msg.response_body = b"<h1>Sorry, we could not find that</h1>".to_vec();

        assert!(ctx.is_custom_page(&msg, CustomPageType::NotFound404));
        assert!(!ctx.is_custom_page(&msg, CustomPageType::Error500));
    }

    #[test]
    fn test_custom_page_by_url_regex() {
        let ctx = ScopedContext::new("app", Scope::new()).with_custom_page(CustomPage {
            content: r"/error\.aspx".into(),
            regex: true,
            location: CustomPageLocation::Url,
            page_type: CustomPageType::Error500,
        });

        let msg = HttpMessage::get("https://example.com/error.aspx?code=1").unwrap();
        assert!(ctx.is_custom_page(&msg, CustomPageType::Error500));
    }
}
