//! Byte ranges picked by the user
//!
//! Ranges address either the serialized request header or the body of the
//! message being scanned. Header ranges count characters of the header
//! text, body ranges raw bytes. Ranges that fall outside the message, split
//! a header character or overlap an earlier range are ignored.

use super::Variant;
use crate::http::{HttpMessage, RequestHeader};
use crate::scanner::name_value_pair::{NameValuePair, ParamKind};
use crate::scanner::param::{InjectionRange, RangeLocation};

#[derive(Debug, Clone, Default)]
pub struct UserDefinedVariant {
    ranges: Vec<InjectionRange>,
    params: Vec<NameValuePair>,
}

fn location_name(location: RangeLocation) -> &'static str {
    match location {
        RangeLocation::Header => "header",
        RangeLocation::Body => "body",
    }
}

impl UserDefinedVariant {
    pub fn new(ranges: Vec<InjectionRange>) -> Self {
        Self {
            ranges,
            params: Vec::new(),
        }
    }

    /// Ranges usable against `msg`, in configuration order
    fn usable(&self, msg: &HttpMessage) -> Vec<InjectionRange> {
        let header = msg.request_header.to_string();
        let mut accepted: Vec<InjectionRange> = Vec::new();

        for range in &self.ranges {
            let fits = range.start < range.end
                && match range.location {
                    RangeLocation::Header => {
                        range.end <= header.len()
                            && header.is_char_boundary(range.start)
                            && header.is_char_boundary(range.end)
                    }
                    RangeLocation::Body => range.end <= msg.request_body.len(),
                };
            let overlaps = accepted.iter().any(|r| {
                r.location == range.location && range.start < r.end && r.start < range.end
            });
            if fits && !overlaps {
                accepted.push(range.clone());
            } else {
                tracing::debug!(
                    "Ignoring user-defined range {}..{} in {}",
                    range.start,
                    range.end,
                    location_name(range.location)
                );
            }
        }
        accepted
    }

    fn inject(&self, msg: &mut HttpMessage, original: &NameValuePair, value: Option<&str>) -> Option<String> {
        let range = self.usable(msg).into_iter().nth(original.position())?;
        let value = value.unwrap_or("");

        match range.location {
            RangeLocation::Header => {
                let text = msg.request_header.to_string();
                let rewritten = format!("{}{}{}", &text[..range.start], value, &text[range.end..]);
                match RequestHeader::parse(&rewritten) {
                    Ok(header) => msg.request_header = header,
                    Err(e) => {
                        tracing::debug!("User-defined injection broke the request header: {}", e);
                        return None;
                    }
                }
            }
            RangeLocation::Body => {
                let mut body = msg.request_body.clone();
                body.splice(range.start..range.end, value.bytes());
                msg.set_request_body(body);
            }
        }
        Some(value.to_string())
    }
}

impl Variant for UserDefinedVariant {
    fn short_name(&self) -> &'static str {
        "user_defined"
    }

    fn set_message(&mut self, msg: &HttpMessage) {
        let header = msg.request_header.to_string();

        self.params = self
            .usable(msg)
            .into_iter()
            .enumerate()
            .map(|(position, range)| {
                let value = match range.location {
                    RangeLocation::Header => header[range.start..range.end].to_string(),
                    RangeLocation::Body => {
                        String::from_utf8_lossy(&msg.request_body[range.start..range.end])
                            .into_owned()
                    }
                };
                NameValuePair::new(
                    ParamKind::UserDefined,
                    format!("{}[{},{}]", location_name(range.location), range.start, range.end),
                    value,
                    position,
                )
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
