//! Typed error handling for the datatable engine
//!
//! Errors are split by the moment they can happen and by who caused them:
//!
//! - [`ConfigError`]: registration-time mistakes (unknown columns, scopes,
//!   validators). They should abort application startup.
//! - [`FilterError`]: a filter request was rejected. These are recoverable and
//!   are collected as user-facing messages keyed by group.
//! - [`ActionError`]: a malformed mutation command. Fatal for the request.
//! - [`StorageError`]: the view-state store failed.
//!
//! # Example
//!
//! ```rust,ignore
//! match engine.apply(&session, command) {
//!     Ok(outcome) => { /* ... */ }
//!     Err(DataTableError::Action(ActionError::InvalidAction { action, .. })) => {
//!         tracing::warn!("caller sent unknown action {}", action);
//!     }
//!     Err(e) => return Err(e),
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

/// The main error type of the engine
#[derive(Debug)]
pub enum DataTableError {
    /// Registration / configuration errors
    Config(ConfigError),

    /// A filter could not be applied
    Filter(FilterError),

    /// Malformed mutation command
    Action(ActionError),

    /// View-state store errors
    Storage(StorageError),

    /// Internal errors (should not happen in normal operation)
    Internal(String),
}

impl fmt::Display for DataTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataTableError::Config(e) => write!(f, "{}", e),
            DataTableError::Filter(e) => write!(f, "{}", e),
            DataTableError::Action(e) => write!(f, "{}", e),
            DataTableError::Storage(e) => write!(f, "{}", e),
            DataTableError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for DataTableError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataTableError::Config(e) => Some(e),
            DataTableError::Filter(e) => Some(e),
            DataTableError::Action(e) => Some(e),
            DataTableError::Storage(e) => Some(e),
            DataTableError::Internal(_) => None,
        }
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl DataTableError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            DataTableError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DataTableError::Filter(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DataTableError::Action(_) => StatusCode::BAD_REQUEST,
            DataTableError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DataTableError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            DataTableError::Config(_) => "CONFIG_ERROR",
            DataTableError::Filter(e) => e.error_code(),
            DataTableError::Action(e) => e.error_code(),
            DataTableError::Storage(_) => "STORAGE_ERROR",
            DataTableError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            DataTableError::Filter(FilterError::Validation { group, messages }) => {
                Some(serde_json::json!({ "group": group, "messages": messages }))
            }
            DataTableError::Action(ActionError::InvalidAction { target, action }) => {
                Some(serde_json::json!({ "target": target, "action": action }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for DataTableError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors raised while registering models, scopes and filters
#[derive(Debug)]
pub enum ConfigError {
    /// Model was never described in the schema catalog
    UnknownModel { model: String },

    /// Column is not part of the model's table
    UnknownColumn { table: String, column: String },

    /// Association is not declared on the model
    UnknownAssociation { model: String, association: String },

    /// Association chains deeper than one level, or associations inside a concatenation
    UnsupportedNesting { model: String, context: String },

    /// The filter names a query operation the model does not provide
    UnknownScope {
        model: String,
        group: String,
        scope: String,
    },

    /// A validation method name is neither built-in nor defined on the model
    UnknownValidator { model: String, validator: String },

    /// A caption method name is not defined on the model
    UnknownCaptionMethod { model: String, method: String },

    /// `record_existence` was requested but no record lookup is configured
    MissingRecordLookup { model: String, scope: String },

    /// No view is bound under that key
    UnknownView { view: String },

    /// The session header name is not a valid HTTP header name
    InvalidHeader { header: String },

    /// Failed to parse configuration
    ParseError {
        file: Option<String>,
        message: String,
    },

    /// Configuration file not found
    FileNotFound { path: String },

    /// IO error while reading configuration
    IoError { message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownModel { model } => {
                write!(f, "The model '{}' is not part of the schema catalog", model)
            }
            ConfigError::UnknownColumn { table, column } => {
                write!(
                    f,
                    "The table '{}' does not have a column named '{}'",
                    table, column
                )
            }
            ConfigError::UnknownAssociation { model, association } => {
                write!(
                    f,
                    "The model '{}' has no association named '{}'",
                    model, association
                )
            }
            ConfigError::UnsupportedNesting { model, context } => {
                write!(
                    f,
                    "Unsupported nested column specification in model '{}': {}",
                    model, context
                )
            }
            ConfigError::UnknownScope {
                model,
                group,
                scope,
            } => {
                write!(
                    f,
                    "The scope '{}' in group '{}' does not exist in the model '{}'",
                    scope, group, model
                )
            }
            ConfigError::UnknownValidator { model, validator } => {
                write!(
                    f,
                    "The method '{}' was set up as validation method in model '{}', but doesn't exist",
                    validator, model
                )
            }
            ConfigError::UnknownCaptionMethod { model, method } => {
                write!(
                    f,
                    "The method '{}' was set up as caption method in model '{}', but doesn't exist",
                    method, model
                )
            }
            ConfigError::MissingRecordLookup { model, scope } => {
                write!(
                    f,
                    "The scope '{}' of model '{}' validates record existence, but no record lookup is configured",
                    scope, model
                )
            }
            ConfigError::UnknownView { view } => {
                write!(f, "No view is bound under the key '{}'", view)
            }
            ConfigError::InvalidHeader { header } => {
                write!(f, "'{}' is not a valid header name", header)
            }
            ConfigError::ParseError { file, message } => {
                if let Some(file) = file {
                    write!(f, "Failed to parse config file '{}': {}", file, message)
                } else {
                    write!(f, "Failed to parse config: {}", message)
                }
            }
            ConfigError::FileNotFound { path } => {
                write!(f, "Configuration file not found: {}", path)
            }
            ConfigError::IoError { message } => {
                write!(f, "IO error: {}", message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for DataTableError {
    fn from(err: ConfigError) -> Self {
        DataTableError::Config(err)
    }
}

// =============================================================================
// Filter Errors
// =============================================================================

/// Reasons a filter request is rejected
///
/// None of these leave the mutation boundary as a hard failure: the session
/// records them and `add_filter` answers `false`.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    /// The operation was never registered for that group
    NotRegistered {
        model: String,
        group: String,
        scope: String,
    },

    /// Supplied argument count differs from the declared one
    ArityMismatch {
        model: String,
        group: String,
        scope: String,
        expected: usize,
        given: usize,
    },

    /// The validation chain produced messages
    Validation { group: String, messages: Vec<String> },
}

impl FilterError {
    /// Group the error is attached to
    pub fn group(&self) -> &str {
        match self {
            FilterError::NotRegistered { group, .. } => group,
            FilterError::ArityMismatch { group, .. } => group,
            FilterError::Validation { group, .. } => group,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            FilterError::NotRegistered { .. } => "FILTER_NOT_REGISTERED",
            FilterError::ArityMismatch { .. } => "FILTER_ARITY_MISMATCH",
            FilterError::Validation { .. } => "FILTER_VALIDATION_FAILED",
        }
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::NotRegistered {
                model,
                group,
                scope,
            } => {
                write!(
                    f,
                    "The filter '{}' in group '{}' is not registered for model '{}'",
                    scope, group, model
                )
            }
            FilterError::ArityMismatch {
                model,
                group,
                scope,
                expected,
                given,
            } => {
                write!(
                    f,
                    "The filter '{}' in group '{}' of model '{}' expects {} argument(s), {} given",
                    scope, group, model, expected, given
                )
            }
            FilterError::Validation { group, messages } => {
                write!(
                    f,
                    "Validation failed for group '{}': {}",
                    group,
                    messages.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for FilterError {}

impl From<FilterError> for DataTableError {
    fn from(err: FilterError) -> Self {
        DataTableError::Filter(err)
    }
}

// =============================================================================
// Action Errors
// =============================================================================

/// Malformed mutation commands
#[derive(Debug, Clone, PartialEq)]
pub enum ActionError {
    /// Unrecognized action discriminator
    InvalidAction { target: String, action: String },

    /// Known action with missing or malformed fields
    Malformed { target: String, message: String },

    /// Sort command names a column the model does not have
    UnknownColumn { model: String, column: String },
}

impl ActionError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ActionError::InvalidAction { .. } => "INVALID_ACTION",
            ActionError::Malformed { .. } => "MALFORMED_COMMAND",
            ActionError::UnknownColumn { .. } => "UNKNOWN_SORT_COLUMN",
        }
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionError::InvalidAction { target, action } => {
                write!(f, "Invalid {} action '{}' was given", target, action)
            }
            ActionError::Malformed { target, message } => {
                write!(f, "Malformed {} command: {}", target, message)
            }
            ActionError::UnknownColumn { model, column } => {
                write!(f, "Unknown sort column '{}' for model '{}'", column, model)
            }
        }
    }
}

impl std::error::Error for ActionError {}

impl From<ActionError> for DataTableError {
    fn from(err: ActionError) -> Self {
        DataTableError::Action(err)
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors related to the view-state store
#[derive(Debug)]
pub enum StorageError {
    /// A lock guarding the store was poisoned
    LockPoisoned { message: String },

    /// Persisted state could not be (de)serialized
    Serialization { message: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::LockPoisoned { message } => {
                write!(f, "Failed to acquire state store lock: {}", message)
            }
            StorageError::Serialization { message } => {
                write!(f, "Failed to (de)serialize view state: {}", message)
            }
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for DataTableError {
    fn from(err: StorageError) -> Self {
        DataTableError::Storage(err)
    }
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError {
            file: None,
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Convert from anyhow::Error for callers that mix in their own failures
impl From<anyhow::Error> for DataTableError {
    fn from(err: anyhow::Error) -> Self {
        DataTableError::Internal(err.to_string())
    }
}

/// A specialized Result type for engine operations
pub type DataTableResult<T> = Result<T, DataTableError>;
