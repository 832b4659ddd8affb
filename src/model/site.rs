//! Site tree
//!
//! Previously observed requests arranged by host and path. The tree is an
//! arena: nodes refer to each other through [`NodeId`]s so it can be shared
//! read-only between host workers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::MessageError;
use crate::http::{HttpMessage, RequestHeader, Uri};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// How a request ended up in the history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryType {
    Proxied,
    Manual,
    Spider,
    /// Sent by the active scanner itself
    Scanner,
    Temporary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryReference {
    pub id: u64,
    pub history_type: HistoryType,
    pub message: HttpMessage,
}

#[derive(Debug, Clone)]
pub struct SiteNode {
    id: NodeId,
    name: String,
    url: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    history: Option<HistoryReference>,
}

impl SiteNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Display name, e.g. `GET:login(password,user)` or `images`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn history(&self) -> Option<&HistoryReference> {
        self.history.as_ref()
    }

    pub fn message(&self) -> Option<&HttpMessage> {
        self.history.as_ref().map(|h| &h.message)
    }

    /// `METHOD:url-without-query`, or the bare URL for nodes without history
    pub fn logical_name(&self) -> String {
        match &self.history {
            Some(h) => format!(
                "{}:{}",
                h.message.request_header.method(),
                h.message.uri().without_query()
            ),
            None => self.url.clone(),
        }
    }

    /// Name without the method prefix and parameter list
    pub fn clean_name(&self) -> &str {
        clean_name(&self.name)
    }
}

/// `GET:login(user)` -> `login`
pub fn clean_name(name: &str) -> &str {
    let name = match name.split_once(':') {
        Some((method, rest))
            if !method.is_empty() && method.chars().all(|c| c.is_ascii_uppercase()) =>
        {
            rest
        }
        _ => name,
    };
    match name.find('(') {
        Some(idx) if name.ends_with(')') => &name[..idx],
        _ => name,
    }
}

/// Serialized request used to build a tree from a file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteEntry {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: String,
    #[serde(default = "default_history_type")]
    pub history_type: HistoryType,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_history_type() -> HistoryType {
    HistoryType::Proxied
}

impl SiteEntry {
    pub fn to_message(&self) -> Result<HttpMessage, MessageError> {
        let mut header = RequestHeader::new(&self.method, Uri::parse(&self.url)?);
        for (name, value) in &self.headers {
            header.add_header(name, value);
        }
        let mut msg = HttpMessage::new(header);
        if !self.body.is_empty() {
            msg.set_request_body(self.body.as_bytes());
        }
        Ok(msg)
    }
}

#[derive(Debug, Clone)]
pub struct SiteTree {
    nodes: Vec<SiteNode>,
    next_history_id: u64,
}

impl Default for SiteTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![SiteNode {
                id: NodeId(0),
                name: "Sites".to_string(),
                url: String::new(),
                parent: None,
                children: Vec::new(),
                history: None,
            }],
            next_history_id: 1,
        }
    }

    pub fn from_entries(entries: &[SiteEntry]) -> Result<Self, MessageError> {
        let mut tree = Self::new();
        for entry in entries {
            tree.add_message(entry.to_message()?, entry.history_type);
        }
        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> Option<&SiteNode> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn nodes(&self) -> impl Iterator<Item = &SiteNode> {
        self.nodes.iter()
    }

    /// Host nodes directly below the root
    pub fn hosts(&self) -> &[NodeId] {
        &self.nodes[0].children
    }

    /// Nodes that carry a request, in insertion order
    pub fn nodes_with_history(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.history.is_some())
            .map(|n| n.id)
            .collect()
    }

    fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.nodes[parent.0]
            .children
            .iter()
            .copied()
            .find(|c| self.nodes[c.0].name == name)
    }

    fn add_child(&mut self, parent: NodeId, name: String, url: String) -> NodeId {
        if let Some(existing) = self.child_named(parent, &name) {
            return existing;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(SiteNode {
            id,
            name,
            url,
            parent: Some(parent),
            children: Vec::new(),
            history: None,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Insert a request, creating host and directory nodes as needed
    pub fn add_message(&mut self, msg: HttpMessage, history_type: HistoryType) -> NodeId {
        let uri = msg.uri().clone();
        let host_url = uri.host_url();
        let mut current = self.add_child(self.root(), host_url.clone(), host_url.clone());

        let path = uri.escaped_path().to_string();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let is_directory = segments.is_empty() || path.ends_with('/');

        let mut url = host_url;
        let dir_count = if is_directory {
            segments.len()
        } else {
            segments.len() - 1
        };
        for segment in &segments[..dir_count] {
            url = format!("{}/{}", url, segment);
            current = self.add_child(current, segment.to_string(), url.clone());
        }

        if !is_directory {
            let leaf = segments[segments.len() - 1];
            let name = format!(
                "{}:{}{}",
                msg.request_header.method(),
                leaf,
                param_suffix(&msg)
            );
            url = format!("{}/{}", url, leaf);
            current = self.add_child(current, name, url);
        }

        if self.nodes[current.0].history.is_none() {
            let id = self.next_history_id;
            self.next_history_id += 1;
            self.nodes[current.0].history = Some(HistoryReference {
                id,
                history_type,
                message: msg,
            });
        }
        current
    }
}

/// `(a,b)` listing query and form parameter names, or empty
fn param_suffix(msg: &HttpMessage) -> String {
    let mut names: Vec<String> = Vec::new();
    let mut collect = |raw: &str| {
        for segment in raw.split('&').filter(|s| !s.is_empty()) {
            let name = segment.split('=').next().unwrap_or(segment);
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    };
    if let Some(query) = msg.uri().escaped_query() {
        collect(query);
    }
    if msg.request_header.has_content_type("x-www-form-urlencoded") {
        collect(&msg.request_body_str());
    }
    if names.is_empty() {
        String::new()
    } else {
        names.sort();
        format!("({})", names.join(","))
    }
}
