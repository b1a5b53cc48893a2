//! Centralized constants for the SQL Server tool gateway.
//!
//! Protocol identifiers, default values, and wire codes live here so they
//! are easy to find and change.

use std::time::Duration;

// =============================================================================
// Protocol Constants
// =============================================================================

/// JSON-RPC envelope version.
pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol version reported by `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Server name reported by `initialize`.
pub const SERVER_NAME: &str = env!("CARGO_PKG_NAME");

/// Server version reported by `initialize`.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Malformed request.
pub const INVALID_REQUEST_CODE: i64 = -32600;

/// Unknown method.
pub const METHOD_NOT_FOUND_CODE: i64 = -32601;

/// Upstream and internal failures.
pub const INTERNAL_ERROR_CODE: i64 = -32603;

// =============================================================================
// Timeout Constants
// =============================================================================

/// Default connection (TCP + login) timeout in seconds.
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Default per-call backend timeout in seconds.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 180;

/// Default connection timeout as Duration.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECS);

/// Default command timeout as Duration.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS);

// =============================================================================
// Result Size Constants
// =============================================================================

/// Default maximum rows materialized from one row set.
pub const DEFAULT_MAX_RESULT_ROWS: usize = 10_000;

// =============================================================================
// Catalog Constants
// =============================================================================

/// Schema holding tool procedures and the tool-list function.
pub const DEFAULT_TOOL_SCHEMA: &str = "mcp";

/// Schema holding REST resource functions and procedures.
pub const DEFAULT_API_SCHEMA: &str = "api";

/// Scalar function returning the JSON tool list.
pub const TOOLS_LIST_FUNCTION: &str = "ToolsList";

/// Name of the execution-plan tool in the static catalog.
pub const EXECUTION_PLAN_TOOL: &str = "ShowEstimatedExecutionPlan";

/// Plan text used when the backend returns no plan row.
pub const NO_PLAN_MESSAGE: &str = "No execution plan returned";

/// Output parameter carrying a REST procedure's JSON response.
pub const RESPONSE_OUTPUT_PARAMETER: &str = "response";

// =============================================================================
// HTTP Constants
// =============================================================================

/// Default HTTP bind host.
pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";

/// Default HTTP port.
pub const DEFAULT_HTTP_PORT: u16 = 51433;

/// Default maximum request body size in bytes.
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

// =============================================================================
// Logging Constants
// =============================================================================

/// Default truncation length for SQL text in logs.
pub const LOG_QUERY_TRUNCATE_LENGTH: usize = 200;
