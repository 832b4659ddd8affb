//! ascan - active scan engine
//!
//! Replays the requests of a site tree with attack payloads injected into
//! every parameter location and reports what the plugins find.

pub mod app;
pub mod error;
pub mod http;
pub mod model;
pub mod reporting;
pub mod scanner;
pub mod scope;
pub mod scripting;

pub use error::*;
