//! Typed error handling for the data-access layer
//!
//! Every failure a service can report is a variant of [`CrudError`], so callers
//! (typically a thin transport layer) can map them onto responses without
//! string matching.
//!
//! # Error Categories
//!
//! - Entity lookups: [`CrudError::AlreadyExists`], [`CrudError::NotFound`]
//! - Construction: [`CrudError::DuplicateHookOrder`], [`CrudError::Config`]
//! - Request validation: [`CrudError::BadFilter`], [`CrudError::BadSort`],
//!   [`CrudError::BadPagination`], [`CrudError::BadId`]
//! - Hook failures: [`CrudError::Status`] (raised on purpose by a handler) and
//!   [`CrudError::Internal`] (anything else)
//! - Collaborators: [`CrudError::Storage`]
//!
//! # Example
//!
//! ```rust,ignore
//! match books.edit(book) {
//!     Ok(saved) => println!("saved {:?}", saved),
//!     Err(CrudError::NotFound { id, .. }) => println!("no book {}", id),
//!     Err(e) => eprintln!("{} ({})", e, e.status_code()),
//! }
//! ```

use crate::core::hooks::HookKind;
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// The main error type returned by services
#[derive(Debug, Error)]
pub enum CrudError {
    /// Create was called with an id that is already stored
    #[error("{entity_type} with id '{id}' already exists")]
    AlreadyExists { entity_type: String, id: String },

    /// Edit, delete or an id lookup missed
    #[error("{entity_type} with id '{id}' not found")]
    NotFound { entity_type: String, id: String },

    /// Two handlers of the same kind declared the same order on one service
    #[error("hook order {order} already exists for {kind} on service '{service}'")]
    DuplicateHookOrder {
        service: String,
        kind: HookKind,
        order: i32,
    },

    /// Unknown filter key, mismatched filter lists or a missing mandatory filter
    #[error("Bad filter: {message}")]
    BadFilter { message: String },

    /// Unknown sort key
    #[error("Bad sort: '{key}'")]
    BadSort { key: String },

    /// Only one of start/count was supplied
    #[error("Bad pagination: start and count must both be set or both be absent")]
    BadPagination {
        start: Option<u64>,
        count: Option<u64>,
    },

    /// Malformed identifier string
    #[error("Bad id '{value}': {message}")]
    BadId { value: String, message: String },

    /// The operation is switched off for this service by configuration
    #[error("{operation} is disabled on service '{service}'")]
    OperationDisabled {
        service: String,
        operation: &'static str,
    },

    /// A hook rejected the operation with a status of its own choosing
    #[error("{message}")]
    Status { code: StatusCode, message: String },

    /// A hook failed unexpectedly
    #[error("Internal error: {0}")]
    Internal(String),

    /// A persistence or query collaborator failed
    #[error("Storage error during {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },

    /// Configuration could not be loaded or is incomplete
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Error response structure for transport layers
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

impl CrudError {
    /// Wrap a collaborator failure
    pub fn storage(operation: &'static str, err: anyhow::Error) -> Self {
        CrudError::Storage {
            operation,
            message: format!("{:#}", err),
        }
    }

    /// Shorthand for a [`CrudError::BadFilter`]
    pub fn bad_filter(message: impl Into<String>) -> Self {
        CrudError::BadFilter {
            message: message.into(),
        }
    }

    /// Whether the caller is at fault (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            CrudError::AlreadyExists { .. } => StatusCode::CONFLICT,
            CrudError::NotFound { .. } => StatusCode::NOT_FOUND,
            CrudError::DuplicateHookOrder { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            CrudError::BadFilter { .. }
            | CrudError::BadSort { .. }
            | CrudError::BadPagination { .. }
            | CrudError::BadId { .. } => StatusCode::BAD_REQUEST,
            CrudError::OperationDisabled { .. } => StatusCode::NOT_FOUND,
            CrudError::Status { code, .. } => *code,
            CrudError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CrudError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            CrudError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            CrudError::AlreadyExists { .. } => "ENTITY_ALREADY_EXISTS",
            CrudError::NotFound { .. } => "ENTITY_NOT_FOUND",
            CrudError::DuplicateHookOrder { .. } => "DUPLICATE_HOOK_ORDER",
            CrudError::BadFilter { .. } => "BAD_FILTER",
            CrudError::BadSort { .. } => "BAD_SORT",
            CrudError::BadPagination { .. } => "BAD_PAGINATION",
            CrudError::BadId { .. } => "BAD_ID",
            CrudError::OperationDisabled { .. } => "OPERATION_DISABLED",
            CrudError::Status { .. } => "HOOK_STATUS",
            CrudError::Internal(_) => "INTERNAL_ERROR",
            CrudError::Storage { .. } => "STORAGE_ERROR",
            CrudError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Convert to an error response
    ///
    /// Internal failures keep their message out of the response body; the
    /// details were already logged where they happened.
    pub fn to_response(&self) -> ErrorResponse {
        let message = match self {
            CrudError::Internal(_) | CrudError::Storage { .. } => {
                "An internal error occurred".to_string()
            }
            _ => self.to_string(),
        };
        ErrorResponse {
            code: self.error_code().to_string(),
            message,
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            CrudError::AlreadyExists { entity_type, id }
            | CrudError::NotFound { entity_type, id } => Some(serde_json::json!({
                "entity_type": entity_type,
                "id": id,
            })),
            CrudError::BadSort { key } => Some(serde_json::json!({ "sort": key })),
            CrudError::BadPagination { start, count } => Some(serde_json::json!({
                "start": start,
                "count": count,
            })),
            CrudError::Status { code, .. } => Some(serde_json::json!({ "status": code.as_u16() })),
            _ => None,
        }
    }
}

// =============================================================================
// Hook Errors
// =============================================================================

/// Failure raised by a hook handler
///
/// `Status` carries a response code chosen by the handler and reaches the
/// caller unchanged. Anything else becomes [`CrudError::Internal`].
#[derive(Debug, Error)]
pub enum HookError {
    /// Intentional rejection with a status code
    #[error("{message}")]
    Status { code: StatusCode, message: String },

    /// Unexpected failure
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl HookError {
    /// Reject the operation with the given status
    pub fn status(code: StatusCode, message: impl Into<String>) -> Self {
        HookError::Status {
            code,
            message: message.into(),
        }
    }
}

/// Result type returned by hook handlers
pub type HookResult<T> = Result<T, HookError>;

// =============================================================================
// Config Errors
// =============================================================================

/// Errors related to configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse configuration
    #[error("Failed to parse config{}: {message}", .file.as_deref().map(|f| format!(" file '{}'", f)).unwrap_or_default())]
    ParseError {
        file: Option<String>,
        message: String,
    },

    /// A required part was not provided
    #[error("Missing required field '{field}' in {context}")]
    MissingField { field: String, context: String },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// IO error while reading configuration
    #[error("IO error: {message}")]
    IoError { message: String },
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError {
            file: None,
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Result type alias
// =============================================================================

/// A specialized Result type for service operations
pub type CrudResult<T> = Result<T, CrudError>;
