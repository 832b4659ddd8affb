//! Response analysis shared by the plugins of one host

use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use std::collections::HashMap;

use crate::http::{HttpMessage, Uri};

/// Regex matching URIs with the same path as `uri`, and optionally the
/// same query parameter names with any values
pub fn path_regex(uri: &Uri) -> Regex {
    let mut pattern = format!("^{}", regex::escape(&uri.without_query()));

    if let Some(query) = uri.escaped_query().filter(|q| !q.is_empty()) {
        let params: Vec<String> = query
            .split('&')
            .map(|segment| match segment.split_once('=') {
                Some((name, _)) => format!("{}=[^&]*", regex::escape(name)),
                None => regex::escape(segment),
            })
            .collect();
        pattern.push_str(&format!("(?:\\?{})?", params.join("&")));
    }
    pattern.push('$');

    // Every literal is escaped, so this only fails on size limits
    Regex::new(&pattern).unwrap_or_else(|_| {
        Regex::new(&format!("^{}", regex::escape(&uri.without_query())))
            .unwrap_or_else(|_| Regex::new("$^").expect("static regex"))
    })
}

/// Status and body of a response, with request-specific text removed
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    status: u16,
    body: String,
}

impl Fingerprint {
    fn of(msg: &HttpMessage, token: &str) -> Self {
        let body = msg.response_body_str();
        let body = if token.is_empty() {
            body.into_owned()
        } else {
            body.replace(token, "")
        };
        Self {
            status: msg.response_header.status_code,
            body,
        }
    }
}

/// Works out what a "file not found" response looks like, per directory
/// and extension, by requesting a random resource once.
#[derive(Default)]
pub struct Analyser {
    not_found: Mutex<HashMap<(String, String), Fingerprint>>,
}

fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

/// Directory URL and extension of the last path segment
fn split_resource(uri: &Uri) -> (String, String, String) {
    let path = uri.escaped_path();
    let (dir, file) = match path.rfind('/') {
        Some(idx) => (&path[..=idx], &path[idx + 1..]),
        None => ("/", path),
    };
    let ext = match file.rfind('.') {
        Some(idx) if idx > 0 => file[idx..].to_string(),
        _ => String::new(),
    };
    (format!("{}{}", uri.host_url(), dir), file.to_string(), ext)
}

impl Analyser {
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found_fingerprint(
        &self,
        dir: &str,
        ext: &str,
        template: &HttpMessage,
        send: impl FnOnce(&mut HttpMessage) -> anyhow::Result<()>,
    ) -> anyhow::Result<Fingerprint> {
        let key = (dir.to_string(), ext.to_string());
        if let Some(fp) = self.not_found.lock().get(&key) {
            return Ok(fp.clone());
        }

        let token = random_token();
        let uri = Uri::parse(&format!("{}{}{}", dir, token, ext))?;
        let mut missing = template.clone_request();
        missing.request_header.set_uri(uri);
        missing.set_request_body(Vec::new());
        send(&mut missing)?;

        let fp = Fingerprint::of(&missing, &format!("{}{}", token, ext));
        tracing::debug!("Not-found fingerprint for {}*{}: status {}", dir, ext, fp.status);
        self.not_found.lock().insert(key, fp.clone());
        Ok(fp)
    }

    /// True when the response of `msg` does not look like a not-found page.
    ///
    /// `send` delivers the request for a random resource next to `msg`, at
    /// most once per directory and extension.
    pub fn is_file_exist(
        &self,
        msg: &HttpMessage,
        send: impl FnOnce(&mut HttpMessage) -> anyhow::Result<()>,
    ) -> bool {
        let status = msg.response_header.status_code;
        if status == 404 || status == 0 {
            return false;
        }

        let (dir, file, ext) = split_resource(msg.uri());
        match self.not_found_fingerprint(&dir, &ext, msg, send) {
            Ok(not_found) => Fingerprint::of(msg, &file) != not_found,
            Err(e) => {
                tracing::debug!("File analysis failed for {}: {}", msg.uri(), e);
                (200..300).contains(&status)
            }
        }
    }

    /// Forget cached fingerprints
    pub fn clear(&self) {
        self.not_found.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{FnSender, HttpSender};
    use std::sync::Arc;

    #[test]
    fn test_path_regex_tolerates_metacharacters() {
        let uri = Uri::parse("https://example.com/a.b/c(1)?q=[x]&n+1=*").unwrap();
        let re = path_regex(&uri);

        assert!(re.is_match("https://example.com/a.b/c(1)"));
        assert!(re.is_match("https://example.com/a.b/c(1)?q=other&n+1=2"));
        assert!(!re.is_match("https://example.com/aXb/c(1)"));
        assert!(!re.is_match("https://example.com/a.b/c(1)?z=1"));
    }

    #[test]
    fn test_soft_404_is_detected_once_per_directory() {
        let sender = Arc::new(FnSender::new(|msg: &mut HttpMessage| {
            msg.response_header.status_code = 200;
            let path = msg.uri().escaped_path().to_string();
            msg.response_body = if path.ends_with("/real.php") {
                b"<h1>Real page</h1>".to_vec()
            } else {
                format!("Sorry, {} was not found", path.rsplit('/').next().unwrap_or("")).into_bytes()
            };
        }));
        let analyser = Analyser::new();
        let send = |msg: &mut HttpMessage| sender.send_and_receive(msg);

        let fetch = |path: &str| {
            let mut msg = HttpMessage::get(&format!("https://example.com/app/{}", path)).unwrap();
            sender.send_and_receive(&mut msg).unwrap();
            msg
        };

        assert!(analyser.is_file_exist(&fetch("real.php"), send));
        assert!(!analyser.is_file_exist(&fetch("missing.php"), send));
        // two fetches plus one random resource for /app/*.php
        assert_eq!(sender.count(), 3);
    }

    #[test]
    fn test_hard_404() {
        let sender = Arc::new(FnSender::new(|_msg: &mut HttpMessage| {}));
        let analyser = Analyser::new();
        let mut msg = HttpMessage::get("https://example.com/x").unwrap();
        msg.response_header.status_code = 404;
        assert!(!analyser.is_file_exist(&msg, |m| sender.send_and_receive(m)));
        assert_eq!(sender.count(), 0);
    }
}
