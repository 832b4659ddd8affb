//! Session model consumed by the scanner
//!
//! The site tree, the technologies a target runs on and the contexts that
//! group nodes into applications.

mod context;
mod site;
mod tech;

pub use context::{Context, CustomPage, CustomPageLocation, CustomPageType, ScopedContext};
pub use site::{clean_name, HistoryReference, HistoryType, NodeId, SiteEntry, SiteNode, SiteTree};
pub use tech::{Tech, TechSet};
