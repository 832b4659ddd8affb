//! HTTP message types
//!
//! The scanner rewrites requests in place, so the request line keeps the
//! escaped path and query exactly as written. Nothing here normalises or
//! re-encodes what a variant puts into the message.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::error::MessageError;

/// Absolute request URI with its escaped components kept verbatim
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uri {
    scheme: String,
    authority: String,
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl Uri {
    /// Parse an absolute URI (`scheme://authority/path?query#fragment`)
    pub fn parse(input: &str) -> Result<Self, MessageError> {
        let input = input.trim();
        let (scheme, rest) = input
            .split_once("://")
            .ok_or_else(|| MessageError::InvalidUri(input.to_string()))?;

        if scheme.is_empty()
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
        {
            return Err(MessageError::InvalidUri(input.to_string()));
        }

        let (rest, fragment) = match rest.split_once('#') {
            Some((r, f)) => (r, Some(f.to_string())),
            None => (rest, None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((r, q)) => (r, Some(q.to_string())),
            None => (rest, None),
        };
        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };

        if authority.is_empty() {
            return Err(MessageError::InvalidUri(input.to_string()));
        }

        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            authority: authority.to_string(),
            path: path.to_string(),
            query,
            fragment,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Host name without user info or port
    pub fn host(&self) -> &str {
        let host_port = self
            .authority
            .rsplit_once('@')
            .map(|(_, h)| h)
            .unwrap_or(&self.authority);
        if host_port.starts_with('[') {
            return host_port
                .find(']')
                .map(|end| &host_port[..=end])
                .unwrap_or(host_port);
        }
        host_port.split(':').next().unwrap_or(host_port)
    }

    /// Explicit port, or the scheme default
    pub fn port(&self) -> Option<u16> {
        let host_port = self
            .authority
            .rsplit_once('@')
            .map(|(_, h)| h)
            .unwrap_or(&self.authority);
        let explicit = host_port
            .rsplit_once(':')
            .filter(|(h, _)| !h.ends_with(']') || host_port.starts_with('['))
            .and_then(|(_, p)| p.parse::<u16>().ok());
        explicit.or(match self.scheme.as_str() {
            "http" => Some(80),
            "https" => Some(443),
            _ => None,
        })
    }

    /// `scheme://authority`, the key used to group nodes per host
    pub fn host_url(&self) -> String {
        format!("{}://{}", self.scheme, self.authority)
    }

    pub fn escaped_path(&self) -> &str {
        &self.path
    }

    pub fn set_escaped_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    /// Path with percent escapes decoded (falls back to the raw path)
    pub fn path(&self) -> Cow<'_, str> {
        urlencoding::decode(&self.path).unwrap_or(Cow::Borrowed(&self.path))
    }

    pub fn escaped_query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn set_escaped_query(&mut self, query: Option<String>) {
        self.query = query;
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// The URI without query and fragment
    pub fn without_query(&self) -> String {
        format!("{}://{}{}", self.scheme, self.authority, self.path)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.authority, self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{}", query)?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{}", fragment)?;
        }
        Ok(())
    }
}

impl FromStr for Uri {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uri::parse(s)
    }
}

impl TryFrom<String> for Uri {
    type Error = MessageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Uri::parse(&value)
    }
}

impl From<Uri> for String {
    fn from(uri: Uri) -> Self {
        uri.to_string()
    }
}

/// Ordered, case-insensitive header list shared by requests and responses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First value of the named header
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values of the named header, in order
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Replace every occurrence of the header with one value, or remove it.
    ///
    /// The replacement keeps the position of the first occurrence.
    pub fn set(&mut self, name: &str, value: Option<&str>) {
        let first = self.0.iter().position(|(n, _)| n.eq_ignore_ascii_case(name));
        match (first, value) {
            (Some(idx), Some(value)) => {
                self.0[idx].1 = value.to_string();
                let mut i = 0;
                self.0.retain(|(n, _)| {
                    let keep = i == idx || !n.eq_ignore_ascii_case(name);
                    i += 1;
                    keep
                });
            }
            (None, Some(value)) => self.0.push((name.to_string(), value.to_string())),
            (_, None) => self.remove(name),
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.0.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Entry at an absolute index
    pub fn entry(&self, index: usize) -> Option<(&str, &str)> {
        self.0.get(index).map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn set_value_at(&mut self, index: usize, value: &str) {
        if let Some(entry) = self.0.get_mut(index) {
            entry.1 = value.to_string();
        }
    }

    pub fn remove_at(&mut self, index: usize) {
        if index < self.0.len() {
            self.0.remove(index);
        }
    }
}

/// HTTP request line and headers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHeader {
    method: String,
    uri: Uri,
    version: String,
    headers: Headers,
}

impl RequestHeader {
    pub fn new(method: &str, uri: Uri) -> Self {
        Self {
            method: method.to_uppercase(),
            uri,
            version: "HTTP/1.1".to_string(),
            headers: Headers::new(),
        }
    }

    /// Parse a textual request header (request line, header lines, blank line)
    pub fn parse(text: &str) -> Result<Self, MessageError> {
        let mut lines = text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));

        let request_line = lines
            .next()
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| MessageError::InvalidHeader("missing request line".into()))?;

        let mut parts = request_line.split_whitespace();
        let (method, uri, version) = match (parts.next(), parts.next(), parts.next()) {
            (Some(m), Some(u), v) => (m, u, v.unwrap_or("HTTP/1.1")),
            _ => return Err(MessageError::InvalidHeader(request_line.to_string())),
        };

        let mut header = RequestHeader::new(method, Uri::parse(uri)?);
        header.version = version.to_string();

        for line in lines {
            if line.is_empty() {
                break;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| MessageError::InvalidHeader(line.to_string()))?;
            header.headers.add(name.trim(), value.trim_start());
        }

        Ok(header)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn set_method(&mut self, method: &str) {
        self.method = method.to_uppercase();
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn uri_mut(&mut self) -> &mut Uri {
        &mut self.uri
    }

    pub fn set_uri(&mut self, uri: Uri) {
        self.uri = uri;
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers.get_all(name)
    }

    pub fn set_header(&mut self, name: &str, value: Option<&str>) {
        self.headers.set(name, value);
    }

    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.add(name, value);
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    /// Case-insensitive check of the Content-Type header
    pub fn has_content_type(&self, fragment: &str) -> bool {
        self.content_type()
            .map(|ct| ct.to_ascii_lowercase().contains(&fragment.to_ascii_lowercase()))
            .unwrap_or(false)
    }
}

impl fmt::Display for RequestHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}\r\n", self.method, self.uri, self.version)?;
        for (name, value) in self.headers.iter() {
            write!(f, "{}: {}\r\n", name, value)?;
        }
        write!(f, "\r\n")
    }
}

/// HTTP status line and headers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHeader {
    pub status_code: u16,
    pub reason: String,
    pub version: String,
    pub headers: Headers,
}

impl Default for ResponseHeader {
    fn default() -> Self {
        Self {
            status_code: 0,
            reason: String::new(),
            version: "HTTP/1.1".to_string(),
            headers: Headers::new(),
        }
    }
}

impl ResponseHeader {
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            ..Default::default()
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.status_code == 0
    }
}

/// A request/response pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpMessage {
    pub request_header: RequestHeader,
    #[serde(default)]
    pub request_body: Vec<u8>,
    #[serde(default)]
    pub response_header: ResponseHeader,
    #[serde(default)]
    pub response_body: Vec<u8>,
    /// Round trip time of the last send
    #[serde(default)]
    pub time_elapsed_ms: u64,
}

impl HttpMessage {
    pub fn new(request_header: RequestHeader) -> Self {
        Self {
            request_header,
            request_body: Vec::new(),
            response_header: ResponseHeader::default(),
            response_body: Vec::new(),
            time_elapsed_ms: 0,
        }
    }

    /// Convenience constructor for a bodiless request
    pub fn get(uri: &str) -> Result<Self, MessageError> {
        Ok(Self::new(RequestHeader::new("GET", Uri::parse(uri)?)))
    }

    /// Build a message from a request header text and a body
    pub fn from_request(header: &str, body: &str) -> Result<Self, MessageError> {
        let mut msg = Self::new(RequestHeader::parse(header)?);
        msg.request_body = body.as_bytes().to_vec();
        Ok(msg)
    }

    pub fn uri(&self) -> &Uri {
        self.request_header.uri()
    }

    pub fn request_body_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.request_body)
    }

    pub fn response_body_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.response_body)
    }

    /// Replace the request body and keep Content-Length in step with it
    pub fn set_request_body(&mut self, body: impl Into<Vec<u8>>) {
        self.request_body = body.into();
        let has_length = self.request_header.header("Content-Length").is_some();
        if has_length || !self.request_body.is_empty() {
            let len = self.request_body.len().to_string();
            self.request_header.set_header("Content-Length", Some(&len));
        }
    }

    /// Copy of the request with the response cleared, ready to be resent
    pub fn clone_request(&self) -> Self {
        Self {
            request_header: self.request_header.clone(),
            request_body: self.request_body.clone(),
            response_header: ResponseHeader::default(),
            response_body: Vec::new(),
            time_elapsed_ms: 0,
        }
    }

    /// True when the request carries query or form parameters
    pub fn has_params(&self) -> bool {
        let has_query = self
            .uri()
            .escaped_query()
            .map(|q| !q.is_empty())
            .unwrap_or(false);
        let has_form = !self.request_body.is_empty()
            && self.request_header.has_content_type("x-www-form-urlencoded");
        has_query || has_form
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_keeps_escaped_components() {
        let uri = Uri::parse("https://example.com:8443/a%20b/c?x=1%26&y=<z>#frag").unwrap();
        assert_eq!(uri.scheme(), "https");
        assert_eq!(uri.host(), "example.com");
        assert_eq!(uri.port(), Some(8443));
        assert_eq!(uri.escaped_path(), "/a%20b/c");
        assert_eq!(uri.path(), "/a b/c");
        assert_eq!(uri.escaped_query(), Some("x=1%26&y=<z>"));
        assert_eq!(uri.fragment(), Some("frag"));
        assert_eq!(uri.to_string(), "https://example.com:8443/a%20b/c?x=1%26&y=<z>#frag");
    }

    #[test]
    fn test_uri_default_port_and_host_url() {
        let uri = Uri::parse("http://example.com").unwrap();
        assert_eq!(uri.port(), Some(80));
        assert_eq!(uri.escaped_path(), "");
        assert_eq!(uri.host_url(), "http://example.com");
        assert!(Uri::parse("/relative").is_err());
    }

    #[test]
    fn test_headers_set_replaces_all_occurrences() {
        let mut headers = Headers::new();
        headers.add("Cookie", "a=b");
        headers.add("Accept", "*/*");
        headers.add("cookie", "c=d");

        headers.set("COOKIE", Some("a=b; c=d"));
        assert_eq!(headers.get_all("cookie"), vec!["a=b; c=d"]);
        assert_eq!(headers.entry(0), Some(("Cookie", "a=b; c=d")));

        headers.set("cookie", None);
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_request_header_round_trip() {
        let text = "POST https://example.com/login?next=%2F HTTP/1.1\r\nHost: example.com\r\nContent-Type: application/x-www-form-urlencoded\r\n\r\n";
        let header = RequestHeader::parse(text).unwrap();
        assert_eq!(header.method(), "POST");
        assert_eq!(header.header("host"), Some("example.com"));
        assert_eq!(header.to_string(), text);
    }

    #[test]
    fn test_set_request_body_updates_content_length() {
        let mut msg = HttpMessage::get("https://example.com/").unwrap();
        msg.set_request_body("a=1&b=2");
        assert_eq!(msg.request_header.header("Content-Length"), Some("7"));
    }
}
