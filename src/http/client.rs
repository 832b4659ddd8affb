//! HTTP transport boundary
//!
//! The engine is synchronous (one worker thread per host), so the sender
//! contract is blocking. `ReqwestSender` bridges into the async reqwest
//! client through a runtime handle captured at construction time.

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;

use super::message::{Headers, HttpMessage, ResponseHeader};
use crate::app::HttpConfig;

/// Sends a request and fills in the response of the same message
pub trait HttpSender: Send + Sync {
    fn send_and_receive(&self, msg: &mut HttpMessage) -> Result<()>;
}

/// Headers reqwest computes itself
const TRANSPORT_MANAGED_HEADERS: &[&str] = &["content-length", "host", "transfer-encoding"];

/// reqwest-backed sender
pub struct ReqwestSender {
    /// Inner reqwest client
    client: reqwest::Client,

    /// Runtime used to drive the async client from worker threads
    handle: Handle,
}

impl ReqwestSender {
    /// Create a new sender; must be called from within a tokio runtime
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let handle = Handle::try_current().context("No tokio runtime available")?;
        Self::with_handle(config, handle)
    }

    pub fn with_handle(config: &HttpConfig, handle: Handle) -> Result<Self> {
        let redirect = if config.follow_redirects {
            reqwest::redirect::Policy::limited(config.max_redirects)
        } else {
            reqwest::redirect::Policy::none()
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .redirect(redirect)
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, handle })
    }

    async fn execute(&self, msg: &mut HttpMessage) -> Result<()> {
        let start = Instant::now();

        let method = reqwest::Method::from_str(msg.request_header.method())
            .context("Invalid HTTP method")?;
        let url = msg.uri().to_string();

        let mut headers = HeaderMap::new();
        for (key, value) in msg.request_header.headers().iter() {
            if TRANSPORT_MANAGED_HEADERS.contains(&key.to_ascii_lowercase().as_str()) {
                continue;
            }
            if let (Ok(name), Ok(val)) = (HeaderName::from_str(key), HeaderValue::from_str(value)) {
                headers.append(name, val);
            }
        }

        let mut builder = self.client.request(method, &url).headers(headers);
        if !msg.request_body.is_empty() {
            builder = builder.body(msg.request_body.clone());
        }

        let response = builder.send().await.context("Request failed")?;

        let mut response_header = ResponseHeader::new(response.status().as_u16());
        response_header.reason = response
            .status()
            .canonical_reason()
            .unwrap_or("")
            .to_string();
        response_header.version = format!("{:?}", response.version());
        let mut response_headers = Headers::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                response_headers.add(key.as_str(), v);
            }
        }
        response_header.headers = response_headers;

        let body = response.bytes().await.context("Failed to read response body")?;

        msg.response_header = response_header;
        msg.response_body = body.to_vec();
        msg.time_elapsed_ms = start.elapsed().as_millis() as u64;

        tracing::trace!(
            status = msg.response_header.status_code,
            elapsed_ms = msg.time_elapsed_ms,
            "{} {}",
            msg.request_header.method(),
            url
        );
        Ok(())
    }
}

impl HttpSender for ReqwestSender {
    fn send_and_receive(&self, msg: &mut HttpMessage) -> Result<()> {
        self.handle.block_on(self.execute(msg))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Answers every request with a closure and records what was sent
    pub struct FnSender<F> {
        respond: F,
        pub sent: Mutex<Vec<HttpMessage>>,
    }

    impl<F> FnSender<F>
    where
        F: Fn(&mut HttpMessage) + Send + Sync,
    {
        pub fn new(respond: F) -> Self {
            Self {
                respond,
                sent: Mutex::new(Vec::new()),
            }
        }

        pub fn count(&self) -> usize {
            self.sent.lock().len()
        }
    }

    impl<F> HttpSender for FnSender<F>
    where
        F: Fn(&mut HttpMessage) + Send + Sync,
    {
        fn send_and_receive(&self, msg: &mut HttpMessage) -> Result<()> {
            (self.respond)(msg);
            self.sent.lock().push(msg.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_sender_creation() {
        let config = HttpConfig::default();
        let sender = ReqwestSender::new(&config);
        assert!(sender.is_ok());
    }

    #[test]
    fn test_sender_requires_runtime() {
        let config = HttpConfig::default();
        assert!(ReqwestSender::new(&config).is_err());
    }
}
