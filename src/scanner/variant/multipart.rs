//! Fields of a `multipart/form-data` body
//!
//! Plain parts yield one parameter for their content. File parts yield
//! three: the file name, the part content type (when present) and the
//! file content. Injection splices bytes into the live body so everything
//! outside the replaced span, boundaries included, is kept byte for byte.

use super::Variant;
use crate::http::HttpMessage;
use crate::scanner::name_value_pair::{NameValuePair, ParamKind};

#[derive(Debug, Clone, Default)]
pub struct MultipartVariant {
    params: Vec<NameValuePair>,
}

#[derive(Debug, Clone, PartialEq)]
struct Field {
    kind: ParamKind,
    name: String,
    value: String,
    start: usize,
    end: usize,
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Boundary parameter of a multipart Content-Type
fn boundary(content_type: &str) -> Option<String> {
    if !content_type.to_ascii_lowercase().contains("multipart/form-data") {
        return None;
    }
    content_type
        .split(';')
        .map(str::trim)
        .find_map(|p| {
            let (key, value) = p.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("boundary")
                .then(|| value.trim().trim_matches('"').to_string())
        })
        .filter(|b| !b.is_empty())
}

/// `(param name, value start, value end)` of a Content-Disposition line,
/// offsets relative to the line
fn disposition_params(line: &str) -> Vec<(String, usize, usize)> {
    let bytes = line.as_bytes();
    let len = bytes.len();
    let mut params = Vec::new();

    let mut i = line.find(':').map(|c| c + 1).unwrap_or(len);
    while i < len && bytes[i] != b';' {
        i += 1;
    }

    while i < len {
        i += 1;
        while i < len && bytes[i] == b' ' {
            i += 1;
        }
        let key_start = i;
        while i < len && bytes[i] != b'=' && bytes[i] != b';' {
            i += 1;
        }
        let key = line[key_start..i].trim().to_ascii_lowercase();
        if i >= len || bytes[i] == b';' {
            continue;
        }
        i += 1;

        let (start, end) = if i < len && bytes[i] == b'"' {
            let start = i + 1;
            i = start;
            while i < len && bytes[i] != b'"' {
                if bytes[i] == b'\\' {
                    i += 1;
                }
                i += 1;
            }
            let end = i.min(len);
            (start, end)
        } else {
            let start = i;
            while i < len && bytes[i] != b';' {
                i += 1;
            }
            (start, start + line[start..i].trim_end().len())
        };
        params.push((key, start, end));

        while i < len && bytes[i] != b';' {
            i += 1;
        }
    }
    params
}

fn parse_part(body: &[u8], start: usize, end: usize, fields: &mut Vec<Field>) {
    let header_end = match find(&body[..end], b"\r\n\r\n", start) {
        Some(idx) => idx,
        None => return,
    };
    let headers = match std::str::from_utf8(&body[start..header_end]) {
        Ok(h) => h,
        Err(_) => return,
    };
    let content_start = header_end + 4;

    let mut name: Option<String> = None;
    let mut filename: Option<(String, usize, usize)> = None;
    let mut content_type: Option<(String, usize, usize)> = None;

    let mut offset = start;
    for line in headers.split("\r\n") {
        let lower = line.to_ascii_lowercase();
        if lower.starts_with("content-disposition:") {
            for (key, s, e) in disposition_params(line) {
                let value = line[s..e].to_string();
                match key.as_str() {
                    "name" => name = Some(value),
                    "filename" => filename = Some((value, offset + s, offset + e)),
                    _ => {}
                }
            }
        } else if lower.starts_with("content-type:") {
            let colon = "content-type:".len();
            let value_start = colon + (line.len() - colon - line[colon..].trim_start().len());
            let value = line[value_start..].trim_end();
            content_type = Some((
                value.to_string(),
                offset + value_start,
                offset + value_start + value.len(),
            ));
        }
        offset += line.len() + 2;
    }

    let name = name.unwrap_or_default();
    let content = String::from_utf8_lossy(&body[content_start..end]).into_owned();

    match filename {
        Some((file, s, e)) => {
            fields.push(Field {
                kind: ParamKind::MultipartFileName,
                name: name.clone(),
                value: file,
                start: s,
                end: e,
            });
            if let Some((ct, s, e)) = content_type {
                fields.push(Field {
                    kind: ParamKind::MultipartFileContentType,
                    name: name.clone(),
                    value: ct,
                    start: s,
                    end: e,
                });
            }
            fields.push(Field {
                kind: ParamKind::MultipartFileParam,
                name,
                value: content,
                start: content_start,
                end,
            });
        }
        None => fields.push(Field {
            kind: ParamKind::MultipartParam,
            name,
            value: content,
            start: content_start,
            end,
        }),
    }
}

fn fields_of(msg: &HttpMessage) -> Vec<Field> {
    let boundary = match msg.request_header.content_type().and_then(boundary) {
        Some(b) => b,
        None => return Vec::new(),
    };
    let body = &msg.request_body;
    let delimiter = format!("--{}", boundary).into_bytes();
    let mut fields = Vec::new();

    let mut pos = match find(body, &delimiter, 0) {
        Some(p) => p,
        None => return fields,
    };
    loop {
        let after = pos + delimiter.len();
        let part_start = if body[after..].starts_with(b"\r\n") {
            after + 2
        } else {
            break;
        };
        let next = match find(body, &delimiter, part_start) {
            Some(n) => n,
            None => break,
        };
        let part_end = if next >= part_start + 2 && &body[next - 2..next] == b"\r\n" {
            next - 2
        } else {
            next
        };
        parse_part(body, part_start, part_end, &mut fields);
        pos = next;
    }
    fields
}

/// Keep quoted header values on one line and inside their quotes
fn escape_header_value(value: &str, quoted: bool) -> String {
    let mut escaped = value.replace('\r', "%0D").replace('\n', "%0A");
    if quoted {
        escaped = escaped.replace('"', "%22");
    }
    escaped
}

impl MultipartVariant {
    pub fn new() -> Self {
        Self::default()
    }

    fn inject(&self, msg: &mut HttpMessage, original: &NameValuePair, value: Option<&str>, escaped: bool) -> Option<String> {
        let field = fields_of(msg).into_iter().nth(original.position())?;
        let value = value.unwrap_or("");

        let written = if escaped {
            value.to_string()
        } else {
            match field.kind {
                ParamKind::MultipartFileName => escape_header_value(value, true),
                ParamKind::MultipartFileContentType => escape_header_value(value, false),
                _ => value.to_string(),
            }
        };

        let mut body = Vec::with_capacity(msg.request_body.len() + written.len());
        body.extend_from_slice(&msg.request_body[..field.start]);
        body.extend_from_slice(written.as_bytes());
        body.extend_from_slice(&msg.request_body[field.end..]);
        msg.set_request_body(body);
        Some(written)
    }
}

impl Variant for MultipartVariant {
    fn short_name(&self) -> &'static str {
        "multipart"
    }

    fn set_message(&mut self, msg: &HttpMessage) {
        self.params = fields_of(msg)
            .into_iter()
            .enumerate()
            .map(|(position, f)| NameValuePair::new(f.kind, f.name, f.value, position))
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

    const BODY: &str = "--AaB03x\r\n\
Content-Disposition: form-data; name=\"title\"\r\n\
\r\n\
Hello\r\n\
--AaB03x\r\n\
Content-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n\
Content-Type: text/plain\r\n\
\r\n\
file body\r\n\
--AaB03x--\r\n";

    fn message() -> HttpMessage {
        HttpMessage::from_request(
            "POST https://example.com/upload HTTP/1.1\r\nContent-Type: multipart/form-data; boundary=AaB03x\r\n\r\n",
            BODY,
        )
        .unwrap()
    }

    #[test]
    fn test_extracts_plain_and_file_parts() {
        let mut variant = MultipartVariant::new();
        variant.set_message(&message());

        let params: Vec<(ParamKind, &str, &str)> = variant
            .param_list()
            .iter()
            .map(|p| (p.kind(), p.name().unwrap(), p.value().unwrap()))
            .collect();
        assert_eq!(
            params,
            vec![
                (ParamKind::MultipartParam, "title", "Hello"),
                (ParamKind::MultipartFileName, "upload", "a.txt"),
                (ParamKind::MultipartFileContentType, "upload", "text/plain"),
                (ParamKind::MultipartFileParam, "upload", "file body"),
            ]
        );
    }

    #[test]
    fn test_injection_preserves_framing() {
        let msg = message();
        let mut variant = MultipartVariant::new();
        variant.set_message(&msg);
        let title = variant.param_list()[0].clone();
        let file_name = variant.param_list()[1].clone();

        let mut attacked = msg.clone_request();
        variant.set_parameter(&mut attacked, &title, None, Some("<x>"));
        assert_eq!(attacked.request_body_str(), BODY.replace("Hello", "<x>"));

        let mut attacked = msg.clone_request();
        let written = variant.set_parameter(&mut attacked, &file_name, None, Some("a\".php"));
        assert_eq!(written.as_deref(), Some("a%22.php"));
        assert_eq!(
            attacked.request_body_str(),
            BODY.replace("filename=\"a.txt\"", "filename=\"a%22.php\"")
        );

        variant.set_message(&attacked);
        assert_eq!(variant.param_list()[1].value(), Some("a%22.php"));
        assert_eq!(variant.param_list()[3].value(), Some("file body"));
    }

    #[test]
    fn test_boundary_with_regex_characters() {
        let body = "--a.b+c*\r\nContent-Disposition: form-data; name=\"q\"\r\n\r\n1\r\n--a.b+c*--\r\n";
        let msg = HttpMessage::from_request(
            "POST https://example.com/ HTTP/1.1\r\nContent-Type: multipart/form-data; boundary=\"a.b+c*\"\r\n\r\n",
            body,
        )
        .unwrap();
        let mut variant = MultipartVariant::new();
        variant.set_message(&msg);
        assert_eq!(variant.param_list().len(), 1);
        assert_eq!(variant.param_list()[0].value(), Some("1"));
    }
}
