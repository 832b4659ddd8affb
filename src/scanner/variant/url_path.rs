//! Segments of the URL path
//!
//! Positions are the index of the segment in the `/`-split escaped path,
//! so the leading empty segment takes position 0 and real segments start
//! at 1. Empty segments produce no parameter.

use super::Variant;
use crate::http::HttpMessage;
use crate::scanner::name_value_pair::{NameValuePair, ParamKind};

#[derive(Debug, Clone, Default)]
pub struct UrlPathVariant {
    params: Vec<NameValuePair>,
}

fn decode_segment(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

impl UrlPathVariant {
    pub fn new() -> Self {
        Self::default()
    }

    fn inject(&self, msg: &mut HttpMessage, original: &NameValuePair, value: Option<&str>, escaped: bool) -> Option<String> {
        let position = original.position();
        if position == 0 {
            return None;
        }

        let path = msg.uri().escaped_path().to_string();
        let mut segments: Vec<String> = path.split('/').map(str::to_string).collect();
        if position >= segments.len() {
            return None;
        }

        let written = match value {
            Some(v) if escaped => v.to_string(),
            Some(v) => urlencoding::encode(v).into_owned(),
            None => String::new(),
        };
        segments[position] = written.clone();
        msg.request_header
            .uri_mut()
            .set_escaped_path(segments.join("/"));
        Some(written)
    }
}

impl Variant for UrlPathVariant {
    fn short_name(&self) -> &'static str {
        "path"
    }

    fn set_message(&mut self, msg: &HttpMessage) {
        self.params = msg
            .uri()
            .escaped_path()
            .split('/')
            .enumerate()
            .skip(1)
            .filter(|(_, segment)| !segment.is_empty())
            .map(|(position, segment)| {
                let decoded = decode_segment(segment);
                NameValuePair::new(ParamKind::UrlPath, decoded.clone(), decoded, position)
            })
            .collect();
    }

    fn param_list(&self) -> &[NameValuePair] {
        &self.params
    }

    /// The injected name is ignored; a segment has no name of its own
    fn set_parameter(
        &self,
        msg: &mut HttpMessage,
        original: &NameValuePair,
        _name: Option<&str>,
        value: Option<&str>,
    ) -> Option<String> {
        self.inject(msg, original, value, false)
    }

    fn set_escaped_parameter(
        &self,
        msg: &mut HttpMessage,
        original: &NameValuePair,
        _name: Option<&str>,
        value: Option<&str>,
    ) -> Option<String> {
        self.inject(msg, original, value, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_are_one_based_segment_indexes() {
        let msg = HttpMessage::get("https://example.com/api//v1%20beta/users/").unwrap();
        let mut variant = UrlPathVariant::new();
        variant.set_message(&msg);

        let params: Vec<(&str, usize)> = variant
            .param_list()
            .iter()
            .map(|p| (p.value().unwrap(), p.position()))
            .collect();
        assert_eq!(params, vec![("api", 1), ("v1 beta", 3), ("users", 4)]);
    }

    #[test]
    fn test_injection_encodes_and_keeps_trailing_slash() {
        let msg = HttpMessage::get("https://example.com/a/b/?x=1").unwrap();
        let mut variant = UrlPathVariant::new();
        variant.set_message(&msg);
        let b = variant.param_list()[1].clone();

        let mut attacked = msg.clone_request();
        let written = variant.set_parameter(&mut attacked, &b, None, Some("../etc passwd"));
        assert_eq!(written.as_deref(), Some("..%2Fetc%20passwd"));
        assert_eq!(attacked.uri().to_string(), "https://example.com/a/..%2Fetc%20passwd/?x=1");
    }

    #[test]
    fn test_empty_value_collapses_segment() {
        let msg = HttpMessage::get("https://example.com/a/b/c").unwrap();
        let mut variant = UrlPathVariant::new();
        variant.set_message(&msg);
        let b = variant.param_list()[1].clone();

        let mut attacked = msg.clone_request();
        variant.set_escaped_parameter(&mut attacked, &b, None, None);
        assert_eq!(attacked.uri().escaped_path(), "/a//c");
    }
}
