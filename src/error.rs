//! Custom error types for the library.
//!
//! This module defines the primary error type, `HubError`, used by the settings
//! panel, the reconciliation service and the configuration loader. Errors that
//! originate from the scheduling web service have their own type,
//! [`ScheduleError`](crate::schedule::ScheduleError), so callers can tell a
//! failed poll apart from a legitimately empty schedule.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps errors from `figment` while reading the TOML file or
//!   environment overrides.
//! - **`Configuration`**: Semantic problems found by `HubConfig::validate`,
//!   reported when the PI service is built.
//! - **`Validation`**: A settings field rejected a user-entered value (bad
//!   endstation identifier, malformed email address).
//! - **`ParameterReadOnly`**: A direct edit hit a field that is currently
//!   driven by the service (the PI email while automatic mode is on).
//! - **`ServiceClosed`**: The reconciliation actor is no longer running.
//!
//! By using `#[from]`, `HubError` can be created from the underlying error
//! types with the `?` operator.

use thiserror::Error;

/// Convenience alias for results using the library error type.
pub type HubResult<T> = std::result::Result<T, HubError>;

/// Errors produced by the ALSHub settings and reconciliation layer.
#[derive(Error, Debug)]
pub enum HubError {
    /// Configuration file or environment could not be read.
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Configuration was readable but semantically invalid.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// A settings field rejected the value.
    #[error("Invalid value for '{field}': {reason}")]
    Validation {
        /// Display name of the field.
        field: String,
        /// Why the value was rejected.
        reason: &'static str,
    },

    /// The field cannot be edited directly right now.
    #[error("Parameter '{0}' is read-only")]
    ParameterReadOnly(String),

    /// No settings field has this name.
    #[error("Unknown setting: {0}")]
    UnknownSetting(String),

    /// Filesystem problem (session files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization problem (session files, generic setters).
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The reconciliation actor has stopped.
    #[error("PI service is not running")]
    ServiceClosed,
}

impl From<figment::Error> for HubError {
    fn from(err: figment::Error) -> Self {
        HubError::Config(Box::new(err))
    }
}

impl HubError {
    /// Whether the caller can reasonably retry or correct the input.
    pub fn can_recover(&self) -> bool {
        match self {
            HubError::Config(_) | HubError::Configuration(_) | HubError::ServiceClosed => false,
            HubError::Validation { .. }
            | HubError::ParameterReadOnly(_)
            | HubError::UnknownSetting(_)
            | HubError::Io(_)
            | HubError::Serialization(_) => true,
        }
    }
}
