//! `name=value&name=value` encoding shared by the URL query and form body

use crate::scanner::name_value_pair::{NameValuePair, ParamKind};

/// Extracts and rewrites `&`/`=` separated parameters.
///
/// Empty segments (`a=1&&b=2`) are skipped and do not take a position; a
/// segment without `=` yields the name with an empty value.
#[derive(Debug, Clone)]
pub struct QueryCodec {
    kind: ParamKind,
    params: Vec<NameValuePair>,
}

impl QueryCodec {
    pub fn new(kind: ParamKind) -> Self {
        Self {
            kind,
            params: Vec::new(),
        }
    }

    pub fn params(&self) -> &[NameValuePair] {
        &self.params
    }

    pub fn parse(&mut self, raw: &str) {
        self.params = raw
            .split('&')
            .filter(|segment| !segment.is_empty())
            .enumerate()
            .map(|(position, segment)| {
                let (name, value) = segment.split_once('=').unwrap_or((segment, ""));
                NameValuePair::new(self.kind, decode(name), decode(value), position)
            })
            .collect();
    }

    /// Rewrite the occurrence at `position` in `raw`.
    ///
    /// Returns the new raw text and the fragment that was written, or `None`
    /// when there is no such occurrence. Other segments are kept as they are.
    pub fn inject(
        &self,
        raw: &str,
        position: usize,
        name: Option<&str>,
        value: Option<&str>,
        escaped: bool,
    ) -> Option<(String, String)> {
        let (bytes, fragment) = self.inject_bytes(raw.as_bytes(), position, name, value, escaped)?;
        // Spliced from a str and a String at `&` boundaries
        let text = String::from_utf8(bytes).ok()?;
        Some((text, fragment))
    }

    /// Byte level [`QueryCodec::inject`]; segments that are not UTF-8 are
    /// copied through untouched.
    pub fn inject_bytes(
        &self,
        raw: &[u8],
        position: usize,
        name: Option<&str>,
        value: Option<&str>,
        escaped: bool,
    ) -> Option<(Vec<u8>, String)> {
        let mut segments: Vec<&[u8]> = raw.split(|b| *b == b'&').collect();
        let index = segments
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_empty())
            .nth(position)
            .map(|(i, _)| i)?;

        let escape = |s: &str| -> String {
            if escaped {
                s.to_string()
            } else {
                encode(s)
            }
        };
        let fragment = match (name, value) {
            (Some(n), Some(v)) => format!("{}={}", escape(n), escape(v)),
            (Some(n), None) => escape(n),
            (None, Some(v)) => format!("={}", escape(v)),
            (None, None) => String::new(),
        };

        if fragment.is_empty() {
            segments.remove(index);
        } else {
            segments[index] = fragment.as_bytes();
        }
        Some((segments.join(&b'&'), fragment))
    }
}

/// Form URL decoding; undecodable text is kept as it is
pub fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Form URL encoding (spaces become `+`)
pub fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_handles_malformed_segments() {
        let mut codec = QueryCodec::new(ParamKind::Query);
        codec.parse("a=1&&flag&b=x%20y+z&c=1=2");

        let pairs: Vec<(Option<&str>, Option<&str>, usize)> = codec
            .params()
            .iter()
            .map(|p| (p.name(), p.value(), p.position()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (Some("a"), Some("1"), 0),
                (Some("flag"), Some(""), 1),
                (Some("b"), Some("x y z"), 2),
                (Some("c"), Some("1=2"), 3),
            ]
        );
    }

    #[test]
    fn test_inject_keeps_other_segments_verbatim() {
        let codec = QueryCodec::new(ParamKind::Query);
        let raw = "a=%41&&b=2";

        let (query, fragment) = codec
            .inject(raw, 1, Some("b"), Some("<x y>"), false)
            .unwrap();
        assert_eq!(fragment, "b=%3Cx+y%3E");
        assert_eq!(query, "a=%41&&b=%3Cx+y%3E");

        let (query, _) = codec.inject(raw, 0, Some("a"), Some("<"), true).unwrap();
        assert_eq!(query, "a=<&&b=2");

        assert!(codec.inject(raw, 5, Some("a"), Some("1"), false).is_none());
    }

    #[test]
    fn test_inject_bytes_keeps_non_utf8_segments() {
        let codec = QueryCodec::new(ParamKind::PostData);
        let (body, fragment) = codec
            .inject_bytes(b"a=1&b=\xe9t\xe9", 0, Some("a"), Some("2"), true)
            .unwrap();
        assert_eq!(fragment, "a=2");
        assert_eq!(body, b"a=2&b=\xe9t\xe9".to_vec());
    }

    #[test]
    fn test_inject_none_removes_segment() {
        let codec = QueryCodec::new(ParamKind::PostData);
        let (body, fragment) = codec.inject("a=1&b=2", 0, None, None, false).unwrap();
        assert_eq!(body, "b=2");
        assert!(fragment.is_empty());
    }
}
