//! Cookies of the `Cookie` request headers
//!
//! Every `name=value` fragment across all Cookie headers is one parameter,
//! numbered in header order then fragment order. Any injection merges the
//! headers into a single one.

use super::Variant;
use crate::http::HttpMessage;
use crate::scanner::name_value_pair::{NameValuePair, ParamKind};

#[derive(Debug, Clone, Default)]
pub struct CookieVariant {
    params: Vec<NameValuePair>,
}

/// Raw fragments of every Cookie header, in order
fn fragments(msg: &HttpMessage) -> Vec<String> {
    msg.request_header
        .header_values("Cookie")
        .iter()
        .flat_map(|line| line.split(';'))
        .map(str::trim_start)
        .filter(|fragment| !fragment.is_empty())
        .map(str::to_string)
        .collect()
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

impl CookieVariant {
    pub fn new() -> Self {
        Self::default()
    }

    fn inject(
        &self,
        msg: &mut HttpMessage,
        original: &NameValuePair,
        name: Option<&str>,
        value: Option<&str>,
        escaped: bool,
    ) -> Option<String> {
        let mut cookies = fragments(msg);
        if original.position() >= cookies.len() {
            return None;
        }

        let escape = |s: &str| -> String {
            if escaped {
                s.to_string()
            } else {
                urlencoding::encode(s).into_owned()
            }
        };
        let fragment = match (name, value) {
            (Some(n), Some(v)) => format!("{}={}", escape(n), escape(v)),
            (Some(n), None) => format!("{}=", escape(n)),
            (None, Some(v)) => escape(v),
            (None, None) => String::new(),
        };

        if fragment.is_empty() {
            cookies.remove(original.position());
        } else {
            cookies[original.position()] = fragment.clone();
        }

        if cookies.is_empty() {
            msg.request_header.set_header("Cookie", None);
        } else {
            msg.request_header
                .set_header("Cookie", Some(&cookies.join("; ")));
        }
        Some(fragment)
    }
}

impl Variant for CookieVariant {
    fn short_name(&self) -> &'static str {
        "cookie"
    }

    fn set_message(&mut self, msg: &HttpMessage) {
        self.params = fragments(msg)
            .iter()
            .enumerate()
            .map(|(position, fragment)| match fragment.split_once('=') {
                Some((name, value)) => NameValuePair::new(
                    ParamKind::Cookie,
                    decode(name),
                    decode(value),
                    position,
                ),
                None => NameValuePair::with_optional(
                    ParamKind::Cookie,
                    None,
                    Some(decode(fragment)),
                    position,
                ),
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

    fn with_cookies(lines: &[&str]) -> HttpMessage {
        let mut msg = HttpMessage::get("https://example.com/").unwrap();
        for line in lines {
            msg.request_header.add_header("Cookie", line);
        }
        msg
    }

    #[test]
    fn test_inject_at_first_position() {
        let msg = with_cookies(&["a=b; c=d; e=f"]);
        let mut variant = CookieVariant::new();
        variant.set_message(&msg);
        let first = variant.param_list()[0].clone();

        let mut attacked = msg.clone_request();
        let fragment = variant.set_escaped_parameter(&mut attacked, &first, Some("y"), Some("z"));
        assert_eq!(fragment.as_deref(), Some("y=z"));
        assert_eq!(attacked.request_header.header("Cookie"), Some("y=z; c=d; e=f"));
    }

    #[test]
    fn test_positions_span_headers_and_malformed_fragments() {
        let msg = with_cookies(&["a=b;flag", "c=; d=1=2"]);
        let mut variant = CookieVariant::new();
        variant.set_message(&msg);

        let params = variant.param_list();
        assert_eq!(params.len(), 4);
        assert_eq!(params[0], NameValuePair::new(ParamKind::Cookie, "a", "b", 0));
        assert_eq!(
            params[1],
            NameValuePair::with_optional(ParamKind::Cookie, None, Some("flag".into()), 1)
        );
        assert_eq!(params[2], NameValuePair::new(ParamKind::Cookie, "c", "", 2));
        assert_eq!(params[3], NameValuePair::new(ParamKind::Cookie, "d", "1=2", 3));
    }

    #[test]
    fn test_leading_whitespace_is_not_part_of_the_name() {
        let msg = with_cookies(&["a=1;  b=2;\tc=3"]);
        let mut variant = CookieVariant::new();
        variant.set_message(&msg);

        let names: Vec<_> = variant
            .param_list()
            .iter()
            .map(|p| p.name().unwrap_or_default())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        let b = variant.param_list()[1].clone();
        let mut attacked = msg.clone_request();
        variant.set_escaped_parameter(&mut attacked, &b, Some("b"), Some("9"));
        assert_eq!(attacked.request_header.header("Cookie"), Some("a=1; b=9; c=3"));
    }

    #[test]
    fn test_injection_merges_headers() {
        let msg = with_cookies(&["a=1", "b=2"]);
        let mut variant = CookieVariant::new();
        variant.set_message(&msg);
        let b = variant.param_list()[1].clone();

        let mut attacked = msg.clone_request();
        variant.set_parameter(&mut attacked, &b, Some("b"), Some("x y"));
        assert_eq!(attacked.request_header.header_values("Cookie"), vec!["a=1; b=x%20y"]);
    }

    #[test]
    fn test_removing_sole_cookie_drops_header() {
        let msg = with_cookies(&["only=1"]);
        let mut variant = CookieVariant::new();
        variant.set_message(&msg);
        let only = variant.param_list()[0].clone();

        let mut attacked = msg.clone_request();
        variant.set_parameter(&mut attacked, &only, None, None);
        assert!(attacked.request_header.header("Cookie").is_none());
    }
}
