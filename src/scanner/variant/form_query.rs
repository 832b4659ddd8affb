//! Parameters of a `application/x-www-form-urlencoded` body

use super::query::QueryCodec;
use super::Variant;
use crate::http::HttpMessage;
use crate::scanner::name_value_pair::{NameValuePair, ParamKind};

#[derive(Debug, Clone)]
pub struct FormQueryVariant {
    codec: QueryCodec,
}

impl Default for FormQueryVariant {
    fn default() -> Self {
        Self::new()
    }
}

/// Bodies without a Content-Type are treated as form data
fn is_form(msg: &HttpMessage) -> bool {
    match msg.request_header.content_type() {
        None => true,
        Some(_) => msg.request_header.has_content_type("application/x-www-form-urlencoded"),
    }
}

impl FormQueryVariant {
    pub fn new() -> Self {
        Self {
            codec: QueryCodec::new(ParamKind::PostData),
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
        if !is_form(msg) {
            return None;
        }
        let (body, fragment) = self.codec.inject_bytes(
            &msg.request_body,
            original.position(),
            name,
            value,
            escaped,
        )?;
        msg.set_request_body(body);
        Some(fragment)
    }
}

impl Variant for FormQueryVariant {
    fn short_name(&self) -> &'static str {
        "form"
    }

    fn set_message(&mut self, msg: &HttpMessage) {
        if is_form(msg) {
            self.codec.parse(&msg.request_body_str());
        } else {
            self.codec.parse("");
        }
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

    fn form(body: &str, content_type: &str) -> HttpMessage {
        HttpMessage::from_request(
            &format!(
                "POST https://example.com/login HTTP/1.1\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n",
                content_type,
                body.len()
            ),
            body,
        )
        .unwrap()
    }

    #[test]
    fn test_injection_updates_content_length() {
        let msg = form("user=admin&pass=secret", "application/x-www-form-urlencoded");
        let mut variant = FormQueryVariant::new();
        variant.set_message(&msg);
        assert_eq!(variant.param_list().len(), 2);

        let pass = variant.param_list()[1].clone();
        let mut attacked = msg.clone_request();
        let fragment = variant.set_parameter(&mut attacked, &pass, Some("pass"), Some("' OR '1'='1"));

        assert_eq!(fragment.as_deref(), Some("pass=%27+OR+%271%27%3D%271"));
        assert_eq!(attacked.request_body_str(), "user=admin&pass=%27+OR+%271%27%3D%271");
        assert_eq!(
            attacked.request_header.header("Content-Length"),
            Some(attacked.request_body.len().to_string().as_str())
        );
    }

    #[test]
    fn test_untouched_latin1_value_survives_injection() {
        let mut msg = form("", "application/x-www-form-urlencoded");
        msg.set_request_body(b"a=1&b=\xe9t\xe9".to_vec());
        let mut variant = FormQueryVariant::new();
        variant.set_message(&msg);
        let a = variant.param_list()[0].clone();

        let mut attacked = msg.clone_request();
        variant.set_escaped_parameter(&mut attacked, &a, Some("a"), Some("2"));
        assert_eq!(attacked.request_body, b"a=2&b=\xe9t\xe9".to_vec());
    }

    #[test]
    fn test_other_content_types_are_ignored() {
        let msg = form("{\"a\":1}", "application/json");
        let mut variant = FormQueryVariant::new();
        variant.set_message(&msg);
        assert!(variant.param_list().is_empty());
    }
}
