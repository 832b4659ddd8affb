//! Custom error types for the active scanner
//!
//! Provides structured error handling with context propagation
//! and operator-friendly error messages.

use thiserror::Error;

/// Main error type for scanner operations
#[derive(Error, Debug)]
pub enum AscanError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Plugin configuration and lifecycle errors
    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    /// Alert construction errors
    #[error("Alert error: {0}")]
    Alert(#[from] AlertError),

    /// HTTP message parsing errors
    #[error("Message error: {0}")]
    Message(#[from] MessageError),

    /// Scripting engine errors
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {path}")]
    ReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration value: {field} - {reason}")]
    ValidationError { field: String, reason: String },

    #[error("Configuration file not found: {0}")]
    NotFound(String),
}

/// Plugin errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    #[error("Plugin {0} has no configuration attached")]
    NullConfiguration(u32),

    #[error("Cannot copy settings from plugin {from} into plugin {to} of a different type")]
    TypeMismatch { from: u32, to: u32 },

    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),
}

/// Alert construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlertError {
    #[error("Alert ref '{alert_ref}' is not valid for plugin {plugin_id}")]
    InvalidAlertRef { plugin_id: u32, alert_ref: String },

    #[error("Alert ref exceeds {max} characters")]
    AlertRefTooLong { max: usize },

    #[error("No message set on the alert")]
    MissingMessage,

    #[error("Plugin is not attached to a host process")]
    NoParent,
}

/// HTTP message parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Invalid request header: {0}")]
    InvalidHeader(String),
}

/// Scripting engine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Script execution failed: {0}")]
    ExecutionError(String),

    #[error("Script is disabled: {0}")]
    Disabled(String),

    #[error("Script returned an unexpected result: {0}")]
    BadResult(String),
}

impl AscanError {
    /// Create an error with additional context
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        AscanError::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            AscanError::Config(e) => format!("Configuration problem: {}", e.user_hint()),
            AscanError::Plugin(e) => format!("Plugin problem: {}", e.user_hint()),
            AscanError::Alert(e) => format!("Alert problem: {}", e.user_hint()),
            AscanError::Message(e) => format!("Message problem: {}", e),
            AscanError::Script(e) => format!("Script issue: {}", e),
            AscanError::Io(e) => format!("File system issue: {}", e),
            AscanError::WithContext { context, source } => {
                format!("{}: {}", context, source)
            }
        }
    }
}

/// Trait for providing user-friendly hints
pub trait UserHint {
    fn user_hint(&self) -> String;
}

impl UserHint for ConfigError {
    fn user_hint(&self) -> String {
        match self {
            ConfigError::ReadError { path, .. } => {
                format!("Could not read '{}'. Check if the file exists and you have read permissions.", path)
            }
            ConfigError::ParseError(_) => {
                "The configuration file has invalid syntax. Check for TOML formatting errors.".into()
            }
            ConfigError::ValidationError { field, reason } => {
                format!("Invalid value for '{}': {}", field, reason)
            }
            ConfigError::NotFound(path) => {
                format!("Configuration file '{}' not found. Run with --generate-config to create one.", path)
            }
        }
    }
}

impl UserHint for PluginError {
    fn user_hint(&self) -> String {
        match self {
            PluginError::NullConfiguration(id) => {
                format!("Plugin {} must be given a configuration before it can be tuned.", id)
            }
            PluginError::UnknownPlugin(name) => {
                format!("No plugin named '{}' is loaded.", name)
            }
            _ => self.to_string(),
        }
    }
}

impl UserHint for AlertError {
    fn user_hint(&self) -> String {
        match self {
            AlertError::InvalidAlertRef { plugin_id, .. } => {
                format!("Alert refs must be '{}' or start with '{}-'.", plugin_id, plugin_id)
            }
            AlertError::MissingMessage => "Alerts can only be raised for a message.".into(),
            _ => self.to_string(),
        }
    }
}

/// Extension trait for adding context to Result types
pub trait ResultExt<T, E> {
    fn with_context<C>(self, context: C) -> Result<T, AscanError>
    where
        C: Into<String>;
}

impl<T, E> ResultExt<T, E> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_context<C>(self, context: C) -> Result<T, AscanError>
    where
        C: Into<String>,
    {
        self.map_err(|e| AscanError::with_context(context, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_configuration_hint_names_plugin() {
        let err = AscanError::from(PluginError::NullConfiguration(40012));
        assert!(err.user_message().contains("40012"));
    }

    #[test]
    fn test_with_context_wraps_source() {
        let res: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = res.with_context("loading site tree").unwrap_err();
        assert_eq!(err.to_string(), "loading site tree: gone");
    }
}
