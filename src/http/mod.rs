//! HTTP module
//!
//! Message types the scanner injects into, and the transport boundary
//! used to send them.

mod client;
mod message;

pub use client::{HttpSender, ReqwestSender};
pub use message::{Headers, HttpMessage, RequestHeader, ResponseHeader, Uri};

#[cfg(test)]
pub(crate) use client::tests::FnSender;
