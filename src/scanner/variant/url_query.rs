//! Parameters of the URL query string

use super::query::QueryCodec;
use super::Variant;
use crate::http::HttpMessage;
use crate::scanner::name_value_pair::{NameValuePair, ParamKind};

#[derive(Debug, Clone)]
pub struct UrlQueryVariant {
    codec: QueryCodec,
}

impl Default for UrlQueryVariant {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlQueryVariant {
    pub fn new() -> Self {
        Self {
            codec: QueryCodec::new(ParamKind::Query),
        }
    }

    fn inject(
        &self,
        msg: &mut HttpMessage,
        original: &NameValuePair,
        name: Option<&str>,
        value: Option<&str>,
        escaped: bool,
    ) -> Option<String> {
        let raw = msg.uri().escaped_query()?.to_string();
        let (query, fragment) = self
            .codec
            .inject(&raw, original.position(), name, value, escaped)?;
        let query = if query.is_empty() { None } else { Some(query) };
        msg.request_header.uri_mut().set_escaped_query(query);
        Some(fragment)
    }
}

impl Variant for UrlQueryVariant {
    fn short_name(&self) -> &'static str {
        "query"
    }

    fn set_message(&mut self, msg: &HttpMessage) {
        self.codec.parse(msg.uri().escaped_query().unwrap_or(""));
    }

    fn param_list(&self) -> &[NameValuePair] {
        self.codec.params()
    }

    fn set_parameter(
        &self,
        msg: &mut HttpMessage,
        original: &NameValuePair,
        name: Option<&str>,
        value: Option<&str>,
    ) -> Option<String> {
        self.inject(msg, original, name, value, false)
    }

    fn set_escaped_parameter(
        &self,
        msg: &mut HttpMessage,
        original: &NameValuePair,
        name: Option<&str>,
        value: Option<&str>,
    ) -> Option<String> {
        self.inject(msg, original, name, value, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_query_pairs() {
        let msg = HttpMessage::get("https://example.com/search?q=a%20b&page=2").unwrap();
        let mut variant = UrlQueryVariant::new();
        variant.set_message(&msg);

        let params = variant.param_list();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0], NameValuePair::new(ParamKind::Query, "q", "a b", 0));
        assert_eq!(params[1], NameValuePair::new(ParamKind::Query, "page", "2", 1));
    }

    #[test]
    fn test_injection_is_positional() {
        let msg = HttpMessage::get("https://example.com/?a=1&b=2").unwrap();
        let mut variant = UrlQueryVariant::new();
        variant.set_message(&msg);
        let b = variant.param_list()[1].clone();

        let mut attacked = msg.clone_request();
        variant.set_escaped_parameter(&mut attacked, &b, Some("b"), Some("first"));
        // the pair still says b=2 but the live message now has b=first
        let fragment = variant.set_escaped_parameter(&mut attacked, &b, Some("b"), Some("'"));
        assert_eq!(fragment.as_deref(), Some("b='"));
        assert_eq!(attacked.uri().to_string(), "https://example.com/?a=1&b='");
    }

    #[test]
    fn test_no_query_is_a_no_op() {
        let msg = HttpMessage::get("https://example.com/").unwrap();
        let mut variant = UrlQueryVariant::new();
        variant.set_message(&msg);
        assert!(variant.param_list().is_empty());

        let mut attacked = msg.clone_request();
        let pair = NameValuePair::new(ParamKind::Query, "a", "1", 0);
        assert!(variant.set_parameter(&mut attacked, &pair, Some("a"), Some("x")).is_none());
        assert_eq!(attacked, msg.clone_request());
    }
}
