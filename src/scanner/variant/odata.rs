//! OData resource keys and `$filter` expressions
//!
//! The id variant reads the key of the last path segment, either a single
//! key (`Books(42)`) or named keys (`Orders(id=1,item='x')`). The filter
//! variant reads the operands of comparisons in the `$filter` query
//! parameter. Only the matched token is ever replaced; messages without
//! either construct produce no parameters and injection is a no-op.

use regex::Regex;
use std::sync::OnceLock;

use super::query::{decode, encode};
use super::Variant;
use crate::http::HttpMessage;
use crate::scanner::name_value_pair::{NameValuePair, ParamKind};

fn resource_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\w+)\((.+)\)$").expect("Invalid OData resource regex"))
}

/// `field op operand`, whitespace around the operator possibly escaped
fn filter_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(\w+)(?:\s|%20|\+)+(eq|ne|gt|ge|lt|le)(?:\s|%20|\+)+('(?:[^']|'')*'|[^\s)&+%]+)",
        )
        .expect("Invalid OData filter regex")
    })
}

/// `(name, value, absolute start, absolute end)` of the keys in the last segment
fn id_tokens(msg: &HttpMessage) -> Vec<(String, String, usize, usize)> {
    let path = msg.uri().escaped_path();
    let segment_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    let segment = &path[segment_start..];

    let caps = match resource_regex().captures(segment) {
        Some(c) => c,
        None => return Vec::new(),
    };
    let (resource, keys) = match (caps.get(1), caps.get(2)) {
        (Some(r), Some(k)) => (r, k),
        _ => return Vec::new(),
    };

    let base = segment_start + keys.start();
    let keys = keys.as_str();
    if !keys.contains('=') {
        return vec![(
            resource.as_str().to_string(),
            decode_path(keys),
            base,
            base + keys.len(),
        )];
    }

    let mut tokens = Vec::new();
    let mut offset = 0;
    for item in keys.split(',') {
        if let Some((name, value)) = item.split_once('=') {
            let start = base + offset + name.len() + 1;
            tokens.push((
                name.trim().to_string(),
                decode_path(value),
                start,
                start + value.len(),
            ));
        }
        offset += item.len() + 1;
    }
    tokens
}

fn decode_path(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// `(field, operand, absolute start, absolute end)` of each comparison in the query
fn filter_tokens(msg: &HttpMessage) -> Vec<(String, String, usize, usize)> {
    let query = match msg.uri().escaped_query() {
        Some(q) => q,
        None => return Vec::new(),
    };

    let mut tokens = Vec::new();
    let mut offset = 0;
    for segment in query.split('&') {
        let value_offset = ["$filter=", "%24filter="]
            .iter()
            .find(|prefix| segment.starts_with(*prefix))
            .map(|prefix| prefix.len());
        if let Some(value_offset) = value_offset {
            let expression = &segment[value_offset..];
            for caps in filter_regex().captures_iter(expression) {
                if let (Some(field), Some(operand)) = (caps.get(1), caps.get(3)) {
                    tokens.push((
                        field.as_str().to_string(),
                        decode(operand.as_str()),
                        offset + value_offset + operand.start(),
                        offset + value_offset + operand.end(),
                    ));
                }
            }
        }
        offset += segment.len() + 1;
    }
    tokens
}

#[derive(Debug, Clone, Default)]
pub struct ODataIdVariant {
    params: Vec<NameValuePair>,
}

impl ODataIdVariant {
    pub fn new() -> Self {
        Self::default()
    }

    fn inject(&self, msg: &mut HttpMessage, original: &NameValuePair, value: Option<&str>, escaped: bool) -> Option<String> {
        let (_, _, start, end) = id_tokens(msg).into_iter().nth(original.position())?;
        let value = value.unwrap_or("");
        let written = if escaped {
            value.to_string()
        } else {
            urlencoding::encode(value).into_owned()
        };

        let path = msg.uri().escaped_path();
        let rewritten = format!("{}{}{}", &path[..start], written, &path[end..]);
        msg.request_header.uri_mut().set_escaped_path(rewritten);
        Some(written)
    }
}

impl Variant for ODataIdVariant {
    fn short_name(&self) -> &'static str {
        "odata_id"
    }

    fn set_message(&mut self, msg: &HttpMessage) {
        self.params = id_tokens(msg)
            .into_iter()
            .enumerate()
            .map(|(position, (name, value, _, _))| {
                NameValuePair::new(ParamKind::ODataId, name, value, position)
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

#[derive(Debug, Clone, Default)]
pub struct ODataFilterVariant {
    params: Vec<NameValuePair>,
}

impl ODataFilterVariant {
    pub fn new() -> Self {
        Self::default()
    }

    fn inject(&self, msg: &mut HttpMessage, original: &NameValuePair, value: Option<&str>, escaped: bool) -> Option<String> {
        let (_, _, start, end) = filter_tokens(msg).into_iter().nth(original.position())?;
        let value = value.unwrap_or("");
        let written = if escaped {
            value.to_string()
        } else {
            encode(value)
        };

        let query = msg.uri().escaped_query()?;
        let rewritten = format!("{}{}{}", &query[..start], written, &query[end..]);
        msg.request_header
            .uri_mut()
            .set_escaped_query(Some(rewritten));
        Some(written)
    }
}

impl Variant for ODataFilterVariant {
    fn short_name(&self) -> &'static str {
        "odata_filter"
    }

    fn set_message(&mut self, msg: &HttpMessage) {
        self.params = filter_tokens(msg)
            .into_iter()
            .enumerate()
            .map(|(position, (name, value, _, _))| {
                NameValuePair::new(ParamKind::ODataFilter, name, value, position)
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
    fn test_single_key() {
        let msg = HttpMessage::get("https://example.com/odata/Books(42)").unwrap();
        let mut variant = ODataIdVariant::new();
        variant.set_message(&msg);
        assert_eq!(
            variant.param_list(),
            &[NameValuePair::new(ParamKind::ODataId, "Books", "42", 0)]
        );

        let mut attacked = msg.clone_request();
        variant.set_escaped_parameter(&mut attacked, &variant.param_list()[0], None, Some("42'"));
        assert_eq!(attacked.uri().escaped_path(), "/odata/Books(42')");
    }

    #[test]
    fn test_named_keys() {
        let msg = HttpMessage::get("https://example.com/odata/Orders(id=1,item='pen')?$top=1").unwrap();
        let mut variant = ODataIdVariant::new();
        variant.set_message(&msg);
        let names: Vec<(&str, &str)> = variant
            .param_list()
            .iter()
            .map(|p| (p.name().unwrap(), p.value().unwrap()))
            .collect();
        assert_eq!(names, vec![("id", "1"), ("item", "'pen'")]);

        let mut attacked = msg.clone_request();
        let item = variant.param_list()[1].clone();
        variant.set_parameter(&mut attacked, &item, None, Some("x y"));
        assert_eq!(attacked.uri().to_string(), "https://example.com/odata/Orders(id=1,item=x%20y)?$top=1");
    }

    #[test]
    fn test_filter_operands_with_varied_whitespace() {
        let msg = HttpMessage::get(
            "https://example.com/odata/Books?$top=5&$filter=Price%20lt%2010%20and%20Title+eq+'It''s'",
        )
        .unwrap();
        let mut variant = ODataFilterVariant::new();
        variant.set_message(&msg);

        let pairs: Vec<(&str, &str)> = variant
            .param_list()
            .iter()
            .map(|p| (p.name().unwrap(), p.value().unwrap()))
            .collect();
        assert_eq!(pairs, vec![("Price", "10"), ("Title", "'It''s'")]);

        let mut attacked = msg.clone_request();
        let price = variant.param_list()[0].clone();
        variant.set_escaped_parameter(&mut attacked, &price, None, Some("10%20or%201%20eq%201"));
        assert_eq!(
            attacked.uri().escaped_query(),
            Some("$top=5&$filter=Price%20lt%2010%20or%201%20eq%201%20and%20Title+eq+'It''s'")
        );
    }

    #[test]
    fn test_absent_constructs_are_no_ops() {
        let msg = HttpMessage::get("https://example.com/odata/Books?$top=1").unwrap();
        let mut id = ODataIdVariant::new();
        let mut filter = ODataFilterVariant::new();
        id.set_message(&msg);
        filter.set_message(&msg);
        assert!(id.param_list().is_empty());
        assert!(filter.param_list().is_empty());

        let mut attacked = msg.clone_request();
        let pair = NameValuePair::new(ParamKind::ODataFilter, "a", "1", 0);
        assert!(filter.set_parameter(&mut attacked, &pair, None, Some("x")).is_none());
        assert!(id.set_parameter(&mut attacked, &pair, None, Some("x")).is_none());
        assert_eq!(attacked, msg.clone_request());
    }
}
