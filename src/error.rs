//! Error types for the SQL Server tool gateway.
//!
//! Every failure is a [`ServerError`]. Each variant belongs to exactly one
//! [`ErrorCategory`], which decides the JSON-RPC error code and the HTTP
//! status a caller sees. SQL Server error numbers are mapped onto semantic
//! variants so messages stay readable.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// The four failure classes a caller can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCategory {
    /// Malformed request or missing required field.
    InvalidRequest,
    /// Unrecognized top-level method.
    MethodNotFound,
    /// Backend unreachable, call failed, or returned a malformed payload.
    UpstreamError,
    /// Anything else.
    InternalError,
}

impl ErrorCategory {
    /// JSON-RPC wire code for this category.
    pub fn code(self) -> i64 {
        use crate::constants::{INTERNAL_ERROR_CODE, INVALID_REQUEST_CODE, METHOD_NOT_FOUND_CODE};

        match self {
            ErrorCategory::InvalidRequest => INVALID_REQUEST_CODE,
            ErrorCategory::MethodNotFound => METHOD_NOT_FOUND_CODE,
            ErrorCategory::UpstreamError | ErrorCategory::InternalError => INTERNAL_ERROR_CODE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::InvalidRequest => "InvalidRequest",
            ErrorCategory::MethodNotFound => "MethodNotFound",
            ErrorCategory::UpstreamError => "UpstreamError",
            ErrorCategory::InternalError => "InternalError",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain-specific errors for the gateway.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection error
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Database not found
    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    /// Object not found (procedure, function, table)
    #[error("{object_type} not found: {name}")]
    ObjectNotFound { object_type: String, name: String },

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Query execution error
    #[error("Query execution error: {message}")]
    QueryExecution {
        message: String,
        sql_error_code: Option<i32>,
    },

    /// Backend call exceeded the command timeout
    #[error("Query timeout: operation exceeded {timeout_seconds} seconds")]
    Timeout { timeout_seconds: u64 },

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Backend returned text that is not the JSON it promised
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Invalid or missing request input
    #[error("{0}")]
    InvalidInput(String),

    /// Tool name not present in a static catalog
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Unrecognized protocol method
    #[error("unknown method: {0}")]
    MethodNotFound(String),

    /// Internal error
    #[error("{0}")]
    Internal(String),
}

impl ServerError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a connection error with a source.
    pub fn connection_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an authentication error.
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create an object not found error.
    pub fn object_not_found(object_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ObjectNotFound {
            object_type: object_type.into(),
            name: name.into(),
        }
    }

    /// Create a permission denied error.
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    /// Create a query execution error.
    pub fn query_error(msg: impl Into<String>) -> Self {
        Self::QueryExecution {
            message: msg.into(),
            sql_error_code: None,
        }
    }

    /// Create a query execution error carrying the SQL Server error number.
    pub fn query_error_with_code(msg: impl Into<String>, code: i32) -> Self {
        Self::QueryExecution {
            message: msg.into(),
            sql_error_code: Some(code),
        }
    }

    /// Create a timeout error.
    pub fn timeout(seconds: u64) -> Self {
        Self::Timeout {
            timeout_seconds: seconds,
        }
    }

    /// Create a malformed payload error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPayload(msg.into())
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an unknown method error.
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::MethodNotFound(method.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The failure class of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidInput(_) | Self::UnknownTool(_) => ErrorCategory::InvalidRequest,
            Self::MethodNotFound(_) => ErrorCategory::MethodNotFound,
            Self::Connection { .. }
            | Self::Authentication(_)
            | Self::DatabaseNotFound(_)
            | Self::ObjectNotFound { .. }
            | Self::PermissionDenied(_)
            | Self::QueryExecution { .. }
            | Self::Timeout { .. }
            | Self::ConstraintViolation(_)
            | Self::MalformedPayload(_) => ErrorCategory::UpstreamError,
            Self::Config(_) | Self::Internal(_) => ErrorCategory::InternalError,
        }
    }

    /// Message as it appears on the wire: `"<category>: <detail>"`.
    ///
    /// Unknown methods keep the bare `unknown method: <name>` text.
    pub fn wire_message(&self) -> String {
        match self {
            Self::MethodNotFound(_) => self.to_string(),
            _ => format!("{}: {}", self.category(), self),
        }
    }

    /// Get a user-friendly suggestion for how to fix this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Config(_) => Some("Check your environment variables and configuration"),
            Self::Connection { .. } => {
                Some("Check server hostname, port, and network connectivity")
            }
            Self::Authentication(_) => Some("Verify your username and password are correct"),
            Self::DatabaseNotFound(_) => Some("Check the database name and ensure it exists"),
            Self::ObjectNotFound { .. } => Some("Check the object name and schema"),
            Self::PermissionDenied(_) => {
                Some("Request appropriate permissions from your database administrator")
            }
            Self::Timeout { .. } => Some("Try a simpler call or increase MSSQL_COMMAND_TIMEOUT"),
            Self::ConstraintViolation(_) => {
                Some("Check the constraint definition and your data values")
            }
            Self::UnknownTool(_) => Some("Call tools/list to see the available tools"),
            _ => None,
        }
    }
}

/// Map SQL Server error codes to semantic ServerError types.
pub fn from_sql_error(code: i32, message: &str) -> ServerError {
    match code {
        18456 => ServerError::auth(format!("Login failed: {}", message)),

        4060 => ServerError::DatabaseNotFound(message.to_string()),

        208 => ServerError::object_not_found("Object", message),
        2812 => ServerError::object_not_found("Stored procedure", message),
        4121 => ServerError::object_not_found("Function", message),

        229 | 230 => ServerError::permission_denied(message),

        -2 => ServerError::timeout(0),

        -1 => ServerError::connection("Connection broken"),
        53 => ServerError::connection("Server not found or not accessible"),

        547 => ServerError::ConstraintViolation(message.to_string()),
        2601 | 2627 => ServerError::ConstraintViolation(format!("Duplicate key: {}", message)),

        102 => ServerError::query_error_with_code(format!("Syntax error: {}", message), code),
        207 => ServerError::query_error_with_code(format!("Invalid column: {}", message), code),
        8144 => ServerError::query_error_with_code(format!("Too many arguments: {}", message), code),
        201 => ServerError::query_error_with_code(
            format!("Missing parameter: {}", message),
            code,
        ),

        1205 => ServerError::query_error_with_code(
            "Transaction was deadlocked and has been rolled back",
            code,
        ),

        _ => ServerError::query_error_with_code(message, code),
    }
}

impl From<tiberius::error::Error> for ServerError {
    fn from(e: tiberius::error::Error) -> Self {
        use tiberius::error::Error;

        match &e {
            Error::Server(token) => from_sql_error(token.code() as i32, token.message()),
            Error::Io { .. } => ServerError::connection(format!("IO error: {}", e)),
            Error::Tls(_) => ServerError::connection(format!("TLS error: {}", e)),
            Error::Routing { host, port } => {
                ServerError::connection(format!("Server requested routing to {}:{}", host, port))
            }
            Error::Protocol(_) => ServerError::connection(format!("Protocol error: {}", e)),
            Error::Conversion(_) => {
                ServerError::query_error(format!("Type conversion error: {}", e))
            }
            _ => ServerError::query_error(e.to_string()),
        }
    }
}
