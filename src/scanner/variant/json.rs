//! Primitive values of a JSON body
//!
//! The body is walked by hand so every primitive keeps its exact byte span;
//! string contents are reported verbatim, escapes included. Array elements
//! are named `@items[<index>]`. Bodies nested deeper than [`MAX_DEPTH`]
//! yield no parameters.

use super::Variant;
use crate::http::HttpMessage;
use crate::scanner::name_value_pair::{NameValuePair, ParamKind};

#[derive(Debug, Clone, Default)]
pub struct JsonVariant {
    params: Vec<NameValuePair>,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    name: String,
    value: String,
    start: usize,
    end: usize,
}

/// Same nesting limit as serde_json
pub const MAX_DEPTH: usize = 128;

struct Walker<'a> {
    text: &'a [u8],
    pos: usize,
    depth: usize,
    tokens: Vec<Token>,
}

impl<'a> Walker<'a> {
    fn walk(text: &'a [u8]) -> Result<Vec<Token>, String> {
        let mut walker = Walker {
            text,
            pos: 0,
            depth: 0,
            tokens: Vec::new(),
        };
        walker.skip_ws();
        walker.value(String::new())?;
        walker.skip_ws();
        if walker.pos != text.len() {
            return Err(format!("trailing characters at {}", walker.pos));
        }
        Ok(walker.tokens)
    }

    fn peek(&self) -> Option<u8> {
        self.text.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), String> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(format!("expected '{}' at {}", byte as char, self.pos))
        }
    }

    fn lossy(&self, start: usize, end: usize) -> String {
        String::from_utf8_lossy(&self.text[start..end]).into_owned()
    }

    fn value(&mut self, name: String) -> Result<(), String> {
        match self.peek() {
            Some(b'{' | b'[') => {
                self.depth += 1;
                if self.depth > MAX_DEPTH {
                    return Err(format!("nesting deeper than {} at {}", MAX_DEPTH, self.pos));
                }
                let nested = if self.peek() == Some(b'{') {
                    self.object()
                } else {
                    self.array()
                };
                self.depth -= 1;
                nested
            }
            Some(b'"') => {
                let (start, end) = self.string()?;
                self.tokens.push(Token {
                    name,
                    value: self.lossy(start + 1, end - 1),
                    start,
                    end,
                });
                Ok(())
            }
            Some(_) => {
                let start = self.pos;
                while !matches!(
                    self.peek(),
                    None | Some(b',' | b'}' | b']' | b' ' | b'\t' | b'\r' | b'\n')
                ) {
                    self.pos += 1;
                }
                let literal = std::str::from_utf8(&self.text[start..self.pos]).unwrap_or("");
                let valid = matches!(literal, "true" | "false" | "null")
                    || literal.parse::<f64>().is_ok();
                if !valid {
                    return Err(format!("invalid literal {:?} at {}", literal, start));
                }
                self.tokens.push(Token {
                    name,
                    value: literal.to_string(),
                    start,
                    end: self.pos,
                });
                Ok(())
            }
            None => Err("unexpected end of input".to_string()),
        }
    }

    /// Span of a string token, quotes included
    fn string(&mut self) -> Result<(usize, usize), String> {
        let start = self.pos;
        self.expect(b'"')?;
        loop {
            match self.peek() {
                Some(b'\\') => self.pos = (self.pos + 2).min(self.text.len()),
                Some(b'"') => {
                    self.pos += 1;
                    return Ok((start, self.pos));
                }
                Some(_) => self.pos += 1,
                None => return Err(format!("unterminated string at {}", start)),
            }
        }
    }

    fn object(&mut self) -> Result<(), String> {
        self.expect(b'{')?;
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(());
        }
        loop {
            self.skip_ws();
            let (start, end) = self.string()?;
            let key = self.lossy(start + 1, end - 1);
            self.skip_ws();
            self.expect(b':')?;
            self.skip_ws();
            self.value(key)?;
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => return Err(format!("expected ',' or '}}' at {}", self.pos)),
            }
        }
    }

    fn array(&mut self) -> Result<(), String> {
        self.expect(b'[')?;
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(());
        }
        let mut index = 0;
        loop {
            self.skip_ws();
            self.value(format!("@items[{}]", index))?;
            index += 1;
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => return Err(format!("expected ',' or ']' at {}", self.pos)),
            }
        }
    }
}

fn tokens_of(msg: &HttpMessage) -> Vec<Token> {
    if !msg.request_header.has_content_type("json") {
        return Vec::new();
    }
    let body = &msg.request_body;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Vec::new();
    }
    match Walker::walk(body) {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::debug!("Ignoring malformed JSON body of {}: {}", msg.uri(), e);
            Vec::new()
        }
    }
}

impl JsonVariant {
    pub fn new() -> Self {
        Self::default()
    }

    fn inject(&self, msg: &mut HttpMessage, original: &NameValuePair, value: Option<&str>, escaped: bool) -> Option<String> {
        let token = tokens_of(msg).into_iter().nth(original.position())?;

        let written = match value {
            None => "null".to_string(),
            Some(v) if escaped => format!("\"{}\"", v),
            Some(v) => serde_json::Value::String(v.to_string()).to_string(),
        };

        let mut body = msg.request_body.clone();
        body.splice(token.start..token.end, written.bytes());
        msg.set_request_body(body);
        Some(written)
    }
}

impl Variant for JsonVariant {
    fn short_name(&self) -> &'static str {
        "json"
    }

    fn set_message(&mut self, msg: &HttpMessage) {
        self.params = tokens_of(msg)
            .into_iter()
            .enumerate()
            .map(|(position, token)| {
                NameValuePair::new(ParamKind::Json, token.name, token.value, position)
            })
            .collect();
    }

    fn param_list(&self) -> &[NameValuePair] {
        &self.params
    }

    /// Keys are not renamed; only the value is replaced
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

    fn json(body: &str) -> HttpMessage {
        HttpMessage::from_request(
            "POST https://example.com/api HTTP/1.1\r\nContent-Type: application/json; charset=utf-8\r\n\r\n",
            body,
        )
        .unwrap()
    }

    #[test]
    fn test_walks_nested_objects_and_arrays() {
        let msg = json(r#"{"user": {"name": "a\"b", "age": 30}, "tags": ["x", true, null], "empty": {}}"#);
        let mut variant = JsonVariant::new();
        variant.set_message(&msg);

        let pairs: Vec<(&str, &str)> = variant
            .param_list()
            .iter()
            .map(|p| (p.name().unwrap(), p.value().unwrap()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("name", r#"a\"b"#),
                ("age", "30"),
                ("@items[0]", "x"),
                ("@items[1]", "true"),
                ("@items[2]", "null"),
            ]
        );
    }

    #[test]
    fn test_injection_replaces_only_the_token() {
        let msg = json(r#"{"a": "1", "b" : 2 }"#);
        let mut variant = JsonVariant::new();
        variant.set_message(&msg);
        let b = variant.param_list()[1].clone();

        let mut attacked = msg.clone_request();
        let written = variant.set_parameter(&mut attacked, &b, None, Some("x\"y"));
        assert_eq!(written.as_deref(), Some(r#""x\"y""#));
        assert_eq!(attacked.request_body_str(), r#"{"a": "1", "b" : "x\"y" }"#);

        variant.set_message(&attacked);
        assert_eq!(variant.param_list()[1].value(), Some(r#"x\"y"#));
    }

    #[test]
    fn test_escaped_injection_is_verbatim() {
        let msg = json(r#"["a","b"]"#);
        let mut variant = JsonVariant::new();
        variant.set_message(&msg);
        let second = variant.param_list()[1].clone();

        let mut attacked = msg.clone_request();
        variant.set_escaped_parameter(&mut attacked, &second, None, Some("<x>"));
        assert_eq!(attacked.request_body_str(), r#"["a","<x>"]"#);
    }

    #[test]
    fn test_malformed_or_non_json_bodies_yield_nothing() {
        let mut variant = JsonVariant::new();
        variant.set_message(&json(r#"{"a": }"#));
        assert!(variant.param_list().is_empty());

        let form = HttpMessage::from_request(
            "POST https://example.com/ HTTP/1.1\r\nContent-Type: text/plain\r\n\r\n",
            r#"{"a":"b"}"#,
        )
        .unwrap();
        variant.set_message(&form);
        assert!(variant.param_list().is_empty());
    }

    #[test]
    fn test_deep_nesting_yields_nothing() {
        let mut variant = JsonVariant::new();
        variant.set_message(&json(&"[".repeat(200_000)));
        assert!(variant.param_list().is_empty());

        let too_deep = format!("{}1{}", "[".repeat(MAX_DEPTH + 1), "]".repeat(MAX_DEPTH + 1));
        variant.set_message(&json(&too_deep));
        assert!(variant.param_list().is_empty());

        let at_limit = format!("{}1{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
        variant.set_message(&json(&at_limit));
        assert_eq!(variant.param_list().len(), 1);
    }

    #[test]
    fn test_non_utf8_bytes_outside_the_token_survive() {
        let mut msg = json("");
        msg.set_request_body(b"{\"a\": \"1\", \"b\": \"\xe9\"}".to_vec());
        let mut variant = JsonVariant::new();
        variant.set_message(&msg);
        let a = variant.param_list()[0].clone();

        let mut attacked = msg.clone_request();
        variant.set_escaped_parameter(&mut attacked, &a, None, Some("2"));
        assert_eq!(attacked.request_body, b"{\"a\": \"2\", \"b\": \"\xe9\"}".to_vec());
    }
}
