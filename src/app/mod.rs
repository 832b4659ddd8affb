//! Application core module
//!
//! Configuration loading and the plugin tunable store shared by policies,
//! factories and plugins.

mod config;
mod store;

pub use config::{Config, HttpConfig, PolicyConfig};
pub use store::ConfigStore;
