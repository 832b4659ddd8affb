//! Request headers
//!
//! Transport and session headers are never extracted. Injection replaces
//! the value of the n-th injectable header of the live message; the
//! supplied name is ignored and a missing value deletes the header.

use super::Variant;
use crate::http::HttpMessage;
use crate::scanner::name_value_pair::{NameValuePair, ParamKind};

/// Headers the scanner must not tamper with
pub const NON_INJECTABLE_HEADERS: &[&str] = &[
    "Content-Length",
    "Pragma",
    "Cache-Control",
    "Cookie",
    "Authorization",
    "Proxy-Authorization",
    "Connection",
    "Proxy-Connection",
    "If-Modified-Since",
    "If-None-Match",
    "X-Csrf-Token",
    "X-CSRFToken",
    "X-XSRF-TOKEN",
];

fn is_injectable(name: &str) -> bool {
    !NON_INJECTABLE_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

#[derive(Debug, Clone, Default)]
pub struct HeaderVariant {
    params: Vec<NameValuePair>,
}

impl HeaderVariant {
    pub fn new() -> Self {
        Self::default()
    }

    fn inject(&self, msg: &mut HttpMessage, original: &NameValuePair, value: Option<&str>) -> Option<String> {
        let index = msg
            .request_header
            .headers()
            .iter()
            .enumerate()
            .filter(|(_, (name, _))| is_injectable(name))
            .nth(original.position())
            .map(|(i, _)| i)?;

        let headers = msg.request_header.headers_mut();
        match value {
            Some(v) => {
                headers.set_value_at(index, v);
                Some(v.to_string())
            }
            None => {
                headers.remove_at(index);
                Some(String::new())
            }
        }
    }
}

impl Variant for HeaderVariant {
    fn short_name(&self) -> &'static str {
        "header"
    }

    fn set_message(&mut self, msg: &HttpMessage) {
        self.params = msg
            .request_header
            .headers()
            .iter()
            .filter(|(name, _)| is_injectable(name))
            .enumerate()
            .map(|(position, (name, value))| {
                NameValuePair::new(ParamKind::Header, name, value, position)
            })
            .collect();
    }

    fn param_list(&self) -> &[NameValuePair] {
        &self.params
    }

    fn set_parameter(
        &self,
        msg: &mut HttpMessage,
        original: &NameValuePair,
        _name: Option<&str>,
        value: Option<&str>,
    ) -> Option<String> {
        self.inject(msg, original, value)
    }

    fn set_escaped_parameter(
        &self,
        msg: &mut HttpMessage,
        original: &NameValuePair,
        _name: Option<&str>,
        value: Option<&str>,
    ) -> Option<String> {
        self.inject(msg, original, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> HttpMessage {
        HttpMessage::from_request(
            "GET https://example.com/ HTTP/1.1\r\nHost: example.com\r\nCookie: a=b\r\nUser-Agent: test\r\nAuthorization: Basic x\r\nReferer: https://example.com/\r\n\r\n",
            "",
        )
        .unwrap()
    }

    #[test]
    fn test_deny_listed_headers_are_skipped() {
        let mut variant = HeaderVariant::new();
        variant.set_message(&message());

        let names: Vec<&str> = variant.param_list().iter().filter_map(|p| p.name()).collect();
        assert_eq!(names, vec!["Host", "User-Agent", "Referer"]);
        assert_eq!(variant.param_list()[2].position(), 2);
    }

    #[test]
    fn test_injection_ignores_name_and_none_deletes() {
        let msg = message();
        let mut variant = HeaderVariant::new();
        variant.set_message(&msg);
        let agent = variant.param_list()[1].clone();
        let referer = variant.param_list()[2].clone();

        let mut attacked = msg.clone_request();
        variant.set_parameter(&mut attacked, &agent, Some("X-Ignored"), Some("<script>"));
        assert_eq!(attacked.request_header.header("User-Agent"), Some("<script>"));
        assert!(attacked.request_header.header("X-Ignored").is_none());

        variant.set_parameter(&mut attacked, &referer, None, None);
        assert!(attacked.request_header.header("Referer").is_none());
        assert_eq!(attacked.request_header.header("Authorization"), Some("Basic x"));
    }
}
